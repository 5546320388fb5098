/// This file contains the SimulationRun struct, which plays one repeated slot auction.
///
/// Every round each agent submits a bid given the rounds before it, the bids
/// are cleared with GSP and the cleared round is appended to the history.
/// SimulationStat then sums up clicks, payments and utility per agent.

use std::error::Error;
use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use crate::agents::Agents;
use crate::errors::BidError;
use crate::gsp::Gsp;
use crate::history::History;
use crate::logger::{sanitize_filename, FileReceiver, LogEvent, Logger};
use crate::utils::VERBOSE_AUCTION;
use crate::{errln, logln};

/// Click-through decay from one slot to the one below
const CLICK_DECAY: f64 = 0.75;

/// Clicks available per slot in each round
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum ClickModel {
    /// Top slot gets round(30 * sin(pi * t / 24) + 50), each slot below 0.75 of the one above
    SINUSOIDAL,
    /// The same clicks every round; the vector length is the slot count
    FIXED { clicks: Vec<f64> },
}

impl ClickModel {
    pub fn clicks(&self, t: usize, num_slots: usize) -> Vec<f64> {
        match self {
            ClickModel::SINUSOIDAL => {
                let top = (30.0 * (PI * t as f64 / 24.0).sin() + 50.0).round();
                std::iter::successors(Some(top), |clicks| Some(clicks * CLICK_DECAY))
                    .take(num_slots)
                    .collect()
            }
            ClickModel::FIXED { clicks } => clicks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub num_rounds: usize,
    pub num_slots: usize,
    pub reserve: f64,
    pub click_model: ClickModel,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            num_rounds: 48,
            num_slots: 3,
            reserve: 0.0,
            click_model: ClickModel::SINUSOIDAL,
        }
    }
}

/// A completed run: round t of the history holds the bids and clearing of round t
pub struct SimulationRun {
    pub history: History,
}

impl SimulationRun {
    /// Play `params.num_rounds` rounds with `agents`
    /// The first agent error ends the run
    pub fn new(agents: &mut Agents, params: &SimulationParams, logger: &mut Logger) -> Result<Self, BidError> {
        let mut history = History::new();
        for t in 0..params.num_rounds {
            let clicks = params.click_model.clicks(t, params.num_slots);
            if clicks.is_empty() {
                return Err(BidError::NoSlots { round: t });
            }

            let mut bids = Vec::with_capacity(agents.len());
            for agent in agents.agents.iter_mut() {
                match agent.bid(t, &history, params.reserve, logger) {
                    Ok(bid) => bids.push((agent.agent_id(), bid)),
                    Err(e) => {
                        errln!(logger, LogEvent::Round, "t={} {}: {}", t, agent.agent_name(), e);
                        return Err(e);
                    }
                }
            }

            let round = Gsp::clear(bids, clicks, params.reserve);
            for &(agent_id, bid) in &round.bids {
                let slot = round.occupants.iter().position(|&occupant| occupant == agent_id);
                match slot {
                    Some(slot) => logln!(logger, LogEvent::Auction, "{},{},{:.4},{},{:.4},{:.4}",
                        t, agent_id, bid, slot, round.clicks[slot], round.per_click_prices[slot]),
                    None => logln!(logger, LogEvent::Auction, "{},{},{:.4},,,", t, agent_id, bid),
                }
            }
            history.push(round);
        }
        Ok(Self { history })
    }

    /// Run one variant of a scenario with its own log files
    ///
    /// # Arguments
    /// * `variant_description` - Heading written to the variant log
    /// * `scenario_name` - Names the log directory
    /// * `variant_name` - Names the log files within it
    pub fn run_variant(
        agents: &mut Agents,
        params: &SimulationParams,
        variant_description: &str,
        scenario_name: &str,
        variant_name: &str,
        logger: &mut Logger,
    ) -> Result<(SimulationRun, SimulationStat), Box<dyn Error>> {
        let log_dir = PathBuf::from("log").join(sanitize_filename(scenario_name));
        let rounds_receiver_id = logger.add_receiver(FileReceiver::new(&log_dir.join(format!("rounds-{}.log", sanitize_filename(variant_name))), vec![LogEvent::Round])?);
        let variant_receiver_id = logger.add_receiver(FileReceiver::new(&log_dir.join(format!("variant-{}.log", sanitize_filename(variant_name))), vec![LogEvent::Agent])?);
        let auctions_receiver_id = if VERBOSE_AUCTION.load(Ordering::Relaxed) {
            let receiver_id = logger.add_receiver(FileReceiver::new(&log_dir.join(format!("auctions-{}.csv", sanitize_filename(variant_name))), vec![LogEvent::Auction])?);
            logln!(logger, LogEvent::Auction, "round,agent_id,bid,slot,clicks,per_click_price");
            Some(receiver_id)
        } else {
            None
        };

        logln!(logger, LogEvent::Agent, "\n=== {} ===", variant_description);
        logln!(logger, LogEvent::Agent, "Agents: {}, rounds: {}, slots: {}, reserve: {:.2}",
            agents.len(), params.num_rounds, params.num_slots, params.reserve);

        let result = SimulationRun::new(agents, params, logger).map(|simulation_run| {
            let stat = SimulationStat::new(agents, &simulation_run);
            logln!(logger, LogEvent::Agent, "Rounds played: {}", simulation_run.history.len());
            stat.printout(agents, logger);
            (simulation_run, stat)
        });

        if let Some(receiver_id) = auctions_receiver_id {
            logger.remove_receiver(receiver_id);
        }
        logger.remove_receiver(variant_receiver_id);
        logger.remove_receiver(rounds_receiver_id);

        Ok(result?)
    }
}

/// Statistics for a single agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentStat {
    pub rounds_won: usize,
    pub clicks: f64,
    pub payment: f64,
    /// Clicks times value, less payment
    pub utility: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverallStat {
    pub clicks: f64,
    pub revenue: f64,
    pub utility: f64,
}

pub struct SimulationStat {
    pub agent_stats: Vec<AgentStat>,
    pub overall_stat: OverallStat,
}

impl SimulationStat {
    pub fn new(agents: &Agents, simulation_run: &SimulationRun) -> Self {
        let mut agent_stats = vec![AgentStat::default(); agents.len()];
        let mut overall_stat = OverallStat::default();

        for round in simulation_run.history.rounds() {
            for (slot, &agent_id) in round.occupants.iter().enumerate() {
                let clicks = round.clicks[slot];
                let payment = clicks * round.per_click_prices[slot];
                let utility = clicks * agents.agents[agent_id].value() - payment;

                let agent_stat = &mut agent_stats[agent_id];
                agent_stat.rounds_won += 1;
                agent_stat.clicks += clicks;
                agent_stat.payment += payment;
                agent_stat.utility += utility;

                overall_stat.clicks += clicks;
                overall_stat.revenue += payment;
                overall_stat.utility += utility;
            }
        }

        Self { agent_stats, overall_stat }
    }

    pub fn printout(&self, agents: &Agents, logger: &mut Logger) {
        logln!(logger, LogEvent::Agent, "\n=== Agent Statistics ===");
        for (agent, agent_stat) in agents.agents.iter().zip(&self.agent_stats) {
            logln!(logger, LogEvent::Agent, "\nAgent {} ({}) - {}", agent.agent_id(), agent.agent_name(), agent.type_string());
            logln!(logger, LogEvent::Agent, "  Value per click: {:.2}", agent.value());
            if let Some(budget) = agent.budget() {
                logln!(logger, LogEvent::Agent, "  Budget: {:.2}", budget);
            }
            logln!(logger, LogEvent::Agent, "  Rounds won: {}, clicks: {:.2}", agent_stat.rounds_won, agent_stat.clicks);
            logln!(logger, LogEvent::Agent, "  Payment / utility: {:.2} / {:.2}", agent_stat.payment, agent_stat.utility);
            if let Some(ledger) = agent.spend_ledger() {
                logln!(logger, LogEvent::Agent, "  Spend ledger: own {:.2} of {:.2} across {} bidders", ledger.spent_by(agent.agent_id()), ledger.total(), ledger.spent().len());
            }
            if let Some(counters) = agent.participation_counters() {
                logln!(logger, LogEvent::Agent, "  Participated / abstained: {} / {}", counters.participated, counters.abstained);
            }
            if let Some(estimates) = agent.value_estimates() {
                let listed: Vec<String> = estimates.iter()
                    .map(|(agent_id, estimate)| format!("{}: {:.2}", agent_id, estimate))
                    .collect();
                logln!(logger, LogEvent::Agent, "  Value estimates: {}", listed.join(", "));
            }
        }

        logln!(logger, LogEvent::Agent, "\n=== Overall Statistics ===");
        logln!(logger, LogEvent::Agent, "Clicks sold: {:.2}", self.overall_stat.clicks);
        logln!(logger, LogEvent::Agent, "Revenue / utility: {:.2} / {:.2}", self.overall_stat.revenue, self.overall_stat.utility);
    }
}
