/// Plain balanced bidders competing for four slots with sinusoidal clicks.
///
/// Every agent best-responds to last round's bids as submitted. The run has
/// no reserve, so every bid is valid and the slots always fill.
///
/// - Variant A: sinusoidal clicks over 48 rounds
///
/// - Variant B: fixed clicks [60, 45, 30, 15] over 24 rounds

use crate::agents::{AgentType, Agents};
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::scenarios::{check, finish};
use crate::simulationrun::{ClickModel, SimulationParams, SimulationRun, SimulationStat};
use crate::utils;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "balanced_bidding",
    run,
});

const NUM_AGENTS: usize = 6;

fn prepare_agents() -> Agents {
    let mut agents = Agents::new();
    let mut rng = utils::seeded_rng(0);
    agents.add_population("BB", NUM_AGENTS, &AgentType::BALANCED_BIDDING, &mut rng);
    agents
}

fn validate(variant: &str, agents: &Agents, simulation_run: &SimulationRun, stat: &SimulationStat, params: &SimulationParams, logger: &mut Logger, errors: &mut Vec<String>) {
    let rounds = simulation_run.history.rounds();

    let out_of_range = rounds.iter()
        .flat_map(|round| round.bids.iter())
        .filter(|&&(agent_id, bid)| bid < 0.0 || bid > agents.agents[agent_id].value())
        .count();
    check(logger, errors, out_of_range == 0,
        format!("Variant {}: every bid lies between zero and the bidder's value ({} outside)", variant, out_of_range));

    let unfilled = rounds.iter().filter(|round| round.occupants.len() != params.num_slots).count();
    check(logger, errors, unfilled == 0,
        format!("Variant {}: all {} slots are filled in every round ({} rounds short)", variant, params.num_slots, unfilled));

    let worst_utility = stat.agent_stats.iter().map(|s| s.utility).fold(f64::INFINITY, f64::min);
    check(logger, errors, worst_utility >= 0.0,
        format!("Variant {}: no agent ends with negative utility (lowest {:.2})", variant, worst_utility));
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let params_a = SimulationParams {
        num_rounds: 48,
        num_slots: 4,
        reserve: 0.0,
        click_model: ClickModel::SINUSOIDAL,
    };
    let mut agents_a = prepare_agents();
    let (run_a, stats_a) = SimulationRun::run_variant(&mut agents_a, &params_a, "Balanced bidding, sinusoidal clicks", scenario_name, "sinusoidal", logger)?;

    let params_b = SimulationParams {
        num_rounds: 24,
        num_slots: 4,
        reserve: 0.0,
        click_model: ClickModel::FIXED { clicks: vec![60.0, 45.0, 30.0, 15.0] },
    };
    let mut agents_b = prepare_agents();
    let (run_b, stats_b) = SimulationRun::run_variant(&mut agents_b, &params_b, "Balanced bidding, fixed clicks", scenario_name, "fixed", logger)?;

    logln!(logger, LogEvent::Scenario, "");

    let mut errors: Vec<String> = Vec::new();
    validate("A", &agents_a, &run_a, &stats_a, &params_a, logger, &mut errors);
    validate("B", &agents_b, &run_b, &stats_b, &params_b, logger, &mut errors);

    finish(scenario_name, errors)
}
