mod logger;
mod utils;
mod errors;
mod history;
mod gsp;
mod slot_ranges;
mod balanced_bidding;
mod sigmoid;
mod budget;
mod estimator;
mod agents;
mod simulationrun;
mod scenarios;

use logger::{Logger, LogEvent, ConsoleReceiver, FileReceiver, sanitize_filename};
use std::path::PathBuf;

use scenarios::get_scenario_catalog;
use utils::RAND_SEED;
use std::sync::atomic::Ordering;

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    // Filter out --verbose auction
    let mut args = Vec::new();
    let mut skip_next = false;
    for (i, arg) in raw_args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--verbose" {
            if i + 1 < raw_args.len() && raw_args[i + 1] == "auction" {
                utils::VERBOSE_AUCTION.store(true, Ordering::Relaxed);
                skip_next = true;
            }
            continue;
        }
        args.push(arg.clone());
    }

    if args.len() < 2 {
        // Default: run the balanced bidding scenario with per-agent summaries on the console
        let mut logger = Logger::new();
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Agent, LogEvent::Scenario, LogEvent::Validation]));
        if let Err(e) = scenarios::balanced_bidding::run("balanced_bidding", &mut logger) {
            eprintln!("Error running scenario: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let scenario_arg = &args[1];
    let seed = if args.len() > 2 {
        match args[2].parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: Invalid seed parameter '{}'. Expected a number.", args[2]);
                std::process::exit(1);
            }
        }
    } else {
        0
    };
    RAND_SEED.store(seed, Ordering::Relaxed);

    let all_scenarios = get_scenario_catalog();
    let scenarios: Vec<_> = if scenario_arg == "all" {
        all_scenarios.clone()
    } else {
        match all_scenarios.iter().find(|s| s.short_name == scenario_arg) {
            Some(scenario) => vec![scenario.clone()],
            None => {
                eprintln!("Error: Scenario '{}' not found.", scenario_arg);
                eprintln!("Available scenarios:");
                for s in &all_scenarios {
                    eprintln!("  - {}", s.short_name);
                }
                std::process::exit(1);
            }
        }
    };

    // A single scenario also shows its individual validations
    let mut logger = Logger::new();
    if scenario_arg == "all" {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
    } else {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation, LogEvent::Scenario]));
    }

    let summary_receiver_id = match FileReceiver::new(&PathBuf::from("log/summary.log"), vec![LogEvent::Validation]) {
        Ok(receiver) => Some(logger.add_receiver(receiver)),
        Err(e) => {
            eprintln!("Warning: cannot write log/summary.log: {}", e);
            None
        }
    };

    if scenario_arg == "all" {
        logln!(&mut logger, LogEvent::Validation, "Running all scenarios with seed {}...\n", seed);
    } else {
        logln!(&mut logger, LogEvent::Validation, "Running scenario '{}' with seed {}...\n", scenario_arg, seed);
    }

    let mut failures = 0;
    for scenario in &scenarios {
        log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);

        let scenario_path = PathBuf::from(format!("log/{}/scenario.log", sanitize_filename(scenario.short_name)));
        let scenario_receiver_id = match FileReceiver::new(&scenario_path, vec![LogEvent::Scenario]) {
            Ok(receiver) => Some(logger.add_receiver(receiver)),
            Err(e) => {
                eprintln!("Warning: cannot write {}: {}", scenario_path.display(), e);
                None
            }
        };

        match (scenario.run)(scenario.short_name, &mut logger) {
            Ok(()) => {
                logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
            }
            Err(e) => {
                failures += 1;
                logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
            }
        }
        let _ = logger.flush();

        if let Some(receiver_id) = scenario_receiver_id {
            logger.remove_receiver(receiver_id);
        }
    }

    logln!(&mut logger, LogEvent::Validation, "\n{} of {} scenarios passed", scenarios.len() - failures, scenarios.len());
    if let Some(receiver_id) = summary_receiver_id {
        logger.remove_receiver(receiver_id);
    }
    if failures > 0 {
        std::process::exit(1);
    }
}
