/// Budgeted balanced bidders deciding each round whether to take part.
///
/// Participation odds fall as the run ages, as an agent outspends the rest
/// and as its proposed bid grows. A reserve of 10 keeps every price positive.
///
/// - Variant A: eight agents with budgets over 96 rounds
///
/// - Variant B: the same agents without budgets, who never sit out

use crate::agents::{AgentType, Agents};
use crate::budget::ParticipationParams;
use crate::history::History;
use crate::logger::{LogEvent, Logger};
use crate::logln;
use crate::scenarios::{check, finish};
use crate::simulationrun::{ClickModel, SimulationParams, SimulationRun};
use crate::utils;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "budget_participation",
    run,
});

const NUM_AGENTS: usize = 8;
const BUDGET: f64 = 500.0;

fn prepare_agents(budget: Option<f64>) -> Agents {
    let mut agents = Agents::new();
    let mut rng = utils::seeded_rng(0);
    let agent_type = AgentType::BUDGET_BALANCED {
        budget,
        participation: ParticipationParams::default(),
        estimator: None,
    };
    agents.add_population("Budget", NUM_AGENTS, &agent_type, &mut rng);
    agents
}

/// Zero bids in rounds `from..to`; round 0 is the opening round and never counts
fn abstentions(history: &History, from: usize, to: usize) -> usize {
    history.rounds()[from.max(1)..to].iter()
        .map(|round| round.bids.iter().filter(|&&(_, bid)| bid == 0.0).count())
        .sum()
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let params = SimulationParams {
        num_rounds: 96,
        num_slots: 4,
        reserve: 10.0,
        click_model: ClickModel::SINUSOIDAL,
    };

    let mut agents_a = prepare_agents(Some(BUDGET));
    let (run_a, _) = SimulationRun::run_variant(&mut agents_a, &params, "Budgeted balanced bidding", scenario_name, "budgeted", logger)?;

    let mut agents_b = prepare_agents(None);
    let (run_b, _) = SimulationRun::run_variant(&mut agents_b, &params, "Balanced bidding without budgets", scenario_name, "unbudgeted", logger)?;

    logln!(logger, LogEvent::Scenario, "");

    let mut errors: Vec<String> = Vec::new();
    let half = params.num_rounds / 2;

    let first_half = abstentions(&run_a.history, 0, half);
    let second_half = abstentions(&run_a.history, half, params.num_rounds);
    check(logger, &mut errors, first_half + second_half > 0,
        format!("Variant A: budgeted agents sit out some rounds ({} abstentions)", first_half + second_half));
    check(logger, &mut errors, second_half > first_half,
        format!("Variant A: abstentions rise in the second half of the run: {} > {}", second_half, first_half));

    let mut mismatched = Vec::new();
    for agent in &agents_a.agents {
        let Some(counters) = agent.participation_counters() else {
            continue;
        };
        let zero_bids = run_a.history.rounds()[1..].iter()
            .filter(|round| round.bid_of(agent.agent_id()) == Some(0.0))
            .count();
        if counters.abstained != zero_bids || counters.participated + counters.abstained != params.num_rounds - 1 {
            mismatched.push(agent.agent_name().to_string());
        }
    }
    check(logger, &mut errors, mismatched.is_empty(),
        format!("Variant A: every abstention shows up as a zero bid and every round after the first is counted (mismatched: {:?})", mismatched));

    let unbudgeted = abstentions(&run_b.history, 0, params.num_rounds);
    check(logger, &mut errors, unbudgeted == 0,
        format!("Variant B: agents without budgets never sit out ({} abstentions)", unbudgeted));

    finish(scenario_name, errors)
}
