/// One agent infers the values of balanced bidders from their bids.
///
/// The competitors have no budget, so they submit their balanced bid every
/// round. Agent 0 bids the same way while inverting each competitor's bid
/// against the round it answered.
///
/// - Variant A: running mean of all samples
///
/// - Variant B: latest sample only

use crate::agents::{AgentType, Agents};
use crate::budget::ParticipationParams;
use crate::estimator::{EstimateMerge, EstimatorParams};
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::scenarios::{check, finish};
use crate::simulationrun::{ClickModel, SimulationParams, SimulationRun};
use crate::utils::{self, VALUE_MAX, VALUE_MIN};

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "value_estimation",
    run,
});

const NUM_COMPETITORS: usize = 5;
/// Largest acceptable mean absolute estimation error at the end of the run
const MAX_MEAN_ERROR: f64 = 25.0;

fn prepare_agents(merge: EstimateMerge) -> Agents {
    let mut agents = Agents::new();
    let mut rng = utils::seeded_rng(0);
    let estimating = AgentType::BUDGET_BALANCED {
        budget: None,
        participation: ParticipationParams::default(),
        estimator: Some(EstimatorParams { merge, ..EstimatorParams::default() }),
    };
    let competitor = AgentType::BUDGET_BALANCED {
        budget: None,
        participation: ParticipationParams::default(),
        estimator: None,
    };
    agents.add_population("Estimator", 1, &estimating, &mut rng);
    agents.add_population("BB", NUM_COMPETITORS, &competitor, &mut rng);
    agents
}

fn validate(variant: &str, agents: &Agents, logger: &mut Logger, errors: &mut Vec<String>) {
    let estimator = &agents.agents[0];
    let Some(estimates) = estimator.value_estimates() else {
        check(logger, errors, false, format!("Variant {}: agent 0 keeps value estimates", variant));
        return;
    };

    check(logger, errors, estimates.len() == NUM_COMPETITORS,
        format!("Variant {}: every competitor has an estimate ({} of {})", variant, estimates.len(), NUM_COMPETITORS));

    let out_of_support = estimates.values().filter(|estimate| !(VALUE_MIN..=VALUE_MAX).contains(*estimate)).count();
    check(logger, errors, out_of_support == 0,
        format!("Variant {}: estimates stay within [{}, {}] ({} outside)", variant, VALUE_MIN, VALUE_MAX, out_of_support));

    let mut total_error = 0.0;
    for (&agent_id, &estimate) in estimates {
        let value = agents.agents[agent_id].value();
        logln!(logger, LogEvent::Scenario, "  Variant {}: agent {} value {:.2} estimate {:.2}", variant, agent_id, value, estimate);
        total_error += (estimate - value).abs();
    }
    let mean_error = total_error / estimates.len().max(1) as f64;
    check(logger, errors, mean_error < MAX_MEAN_ERROR,
        format!("Variant {}: mean absolute estimation error is below {:.1}: {:.2}", variant, MAX_MEAN_ERROR, mean_error));
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let params = SimulationParams {
        num_rounds: 48,
        num_slots: 4,
        reserve: 0.0,
        click_model: ClickModel::SINUSOIDAL,
    };

    let mut agents_a = prepare_agents(EstimateMerge::RUNNING_MEAN);
    SimulationRun::run_variant(&mut agents_a, &params, "Value estimation, running mean", scenario_name, "running-mean", logger)?;

    let mut agents_b = prepare_agents(EstimateMerge::LATEST_SAMPLE);
    SimulationRun::run_variant(&mut agents_b, &params, "Value estimation, latest sample", scenario_name, "latest-sample", logger)?;

    logln!(logger, LogEvent::Scenario, "");

    let mut errors: Vec<String> = Vec::new();
    validate("A", &agents_a, logger, &mut errors);
    validate("B", &agents_b, logger, &mut errors);

    finish(scenario_name, errors)
}
