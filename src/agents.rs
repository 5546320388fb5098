use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Distribution;

use crate::balanced_bidding::BalancedBidder;
use crate::budget::{Participation, ParticipationCounters, ParticipationParams, SpendLedger};
use crate::errors::BidError;
use crate::estimator::{EstimatorParams, ValueEstimator};
use crate::history::{AgentId, History};
use crate::logger::{LogEvent, Logger};
use crate::slot_ranges::PricePolicy;
use crate::utils::{seeded_rng, valuation_dist};
use crate::{logln, warnln};

/// Seed offset of the participation streams; agent ids are added to it
const PARTICIPATION_SEED_OFFSET: u64 = 7_919;

/// Agent type determining the bidding strategy
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum AgentType {
    /// Plain balanced bidding on raw competitor bids
    BALANCED_BIDDING,
    /// Balanced bidding on reserve-normalized prices, with a spend ledger,
    /// participation draws when a budget is set, and optional value estimation
    BUDGET_BALANCED {
        budget: Option<f64>,
        participation: ParticipationParams,
        estimator: Option<EstimatorParams>,
    },
}

/// Trait for agents bidding in the slot auction
pub trait AgentTrait {
    fn agent_id(&self) -> AgentId;

    fn agent_name(&self) -> &str;

    /// Private value per click
    fn value(&self) -> f64;

    fn budget(&self) -> Option<f64> {
        None
    }

    /// Bid for round 0, when there is no history to react to
    fn initial_bid(&self, reserve: f64) -> f64;

    /// Bid for round `t` given rounds `0..t`
    /// Round 0 gets the initial bid; a zero bid from a budgeted agent means it sits the round out
    fn bid(&mut self, t: usize, history: &History, reserve: f64, logger: &mut Logger) -> Result<f64, BidError>;

    /// Estimated values of competitors, for agents that track them
    fn value_estimates(&self) -> Option<&BTreeMap<AgentId, f64>> {
        None
    }

    fn participation_counters(&self) -> Option<ParticipationCounters> {
        None
    }

    fn spend_ledger(&self) -> Option<&SpendLedger> {
        None
    }

    /// Short description of the strategy for summaries
    fn type_string(&self) -> String;
}

/// Balanced bidding on competitors' bids exactly as submitted
pub struct AgentBalancedBidding {
    pub agent_name: String,
    pub bidder: BalancedBidder,
}

impl AgentTrait for AgentBalancedBidding {
    fn agent_id(&self) -> AgentId {
        self.bidder.agent_id
    }

    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn value(&self) -> f64 {
        self.bidder.value
    }

    fn initial_bid(&self, reserve: f64) -> f64 {
        self.bidder.initial_bid(reserve)
    }

    fn bid(&mut self, t: usize, history: &History, reserve: f64, logger: &mut Logger) -> Result<f64, BidError> {
        if t == 0 {
            return Ok(self.initial_bid(reserve));
        }
        let bid = self.bidder.bid(t, history, reserve)?;
        logln!(logger, LogEvent::Round, "t={} {}: bid {:.2}", t, self.agent_name, bid);
        Ok(bid)
    }

    fn type_string(&self) -> String {
        format!("Balanced bidding ({} prices)", self.bidder.price_policy.name())
    }
}

/// Balanced bidding with spend tracking, participation draws and value estimation
pub struct AgentBudgetBalanced {
    pub agent_name: String,
    pub bidder: BalancedBidder,
    pub budget: Option<f64>,
    pub ledger: SpendLedger,
    pub participation: Participation,
    pub estimator: Option<ValueEstimator>,
    rng: StdRng,
}

impl AgentBudgetBalanced {
    pub fn new(agent_id: AgentId, agent_name: String, value: f64, budget: Option<f64>, participation: ParticipationParams, estimator: Option<EstimatorParams>, rng: StdRng) -> Self {
        Self {
            agent_name,
            bidder: BalancedBidder::new(agent_id, value, PricePolicy::NORMALIZED),
            budget,
            ledger: SpendLedger::new(),
            participation: Participation::new(participation),
            estimator: estimator.map(ValueEstimator::new),
            rng,
        }
    }
}

impl AgentTrait for AgentBudgetBalanced {
    fn agent_id(&self) -> AgentId {
        self.bidder.agent_id
    }

    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn value(&self) -> f64 {
        self.bidder.value
    }

    fn budget(&self) -> Option<f64> {
        self.budget
    }

    fn initial_bid(&self, reserve: f64) -> f64 {
        self.bidder.initial_bid(reserve)
    }

    fn bid(&mut self, t: usize, history: &History, reserve: f64, logger: &mut Logger) -> Result<f64, BidError> {
        if t == 0 {
            return Ok(self.initial_bid(reserve));
        }
        let agent_id = self.agent_id();
        let previous = history.lookback(t, 1)?;
        let solved = self.bidder.solve(t, history, reserve)?;
        self.ledger.update_spent(previous, reserve);

        let spend_gap = self.ledger.spend_gap(agent_id);
        let decision = self.participation.participate(t, solved.bid, spend_gap, self.budget, &mut self.rng);
        if decision.participate {
            let price = solved.t_star.map_or("top".to_string(), |t_star| format!("{:.2}", t_star));
            logln!(logger, LogEvent::Round, "t={} {}: slot {} [{:.2}, {:.2}] price {} bid {:.2} (p={:.3}, spend gap {:.2})",
                t, self.agent_name, solved.target.slot, solved.target.min_bid, solved.target.max_bid, price, solved.bid, decision.probability, spend_gap);
        } else {
            logln!(logger, LogEvent::Round, "t={} {}: sits out, solved bid {:.2} (p={:.3}, spend gap {:.2})",
                t, self.agent_name, solved.bid, decision.probability, spend_gap);
        }

        if let Some(estimator) = &mut self.estimator {
            let estimation = estimator.estimate_values(agent_id, t, history, reserve);
            for (competitor_id, slot) in &estimation.skipped {
                warnln!(logger, LogEvent::Round, "t={} {}: no estimate update for agent {}, slot {} has the clicks of the slot above",
                    t, self.agent_name, competitor_id, slot);
            }
            for update in &estimation.updated {
                logln!(logger, LogEvent::Round, "t={} {}: agent {} sample {:.2} ({:?}) estimate {:.2} from {} samples",
                    t, self.agent_name, update.agent_id, update.sample, update.source, update.estimate, estimator.sample_count(update.agent_id));
            }
        }

        Ok(decision.bid)
    }

    fn value_estimates(&self) -> Option<&BTreeMap<AgentId, f64>> {
        self.estimator.as_ref().map(|estimator| estimator.estimates())
    }

    fn participation_counters(&self) -> Option<ParticipationCounters> {
        Some(self.participation.counters)
    }

    fn spend_ledger(&self) -> Option<&SpendLedger> {
        Some(&self.ledger)
    }

    fn type_string(&self) -> String {
        let budget = match self.budget {
            Some(budget) => format!("budget {:.2}", budget),
            None => "no budget".to_string(),
        };
        let estimating = if self.estimator.is_some() { ", estimating values" } else { "" };
        format!("Budget balanced bidding ({}{})", budget, estimating)
    }
}

/// Container for agents; an agent's id is its index
pub struct Agents {
    pub agents: Vec<Box<dyn AgentTrait>>,
}

impl Agents {
    pub fn new() -> Self {
        Self { agents: Vec::new() }
    }

    /// Add an agent and return its id
    ///
    /// # Arguments
    /// * `agent_name` - Name used in logs
    /// * `value` - Private value per click
    /// * `agent_type` - Bidding strategy
    pub fn add(&mut self, agent_name: String, value: f64, agent_type: AgentType) -> AgentId {
        let agent_id = self.agents.len();
        match agent_type {
            AgentType::BALANCED_BIDDING => {
                self.agents.push(Box::new(AgentBalancedBidding {
                    agent_name,
                    bidder: BalancedBidder::new(agent_id, value, PricePolicy::RAW),
                }));
            }
            AgentType::BUDGET_BALANCED { budget, participation, estimator } => {
                let rng = seeded_rng(PARTICIPATION_SEED_OFFSET + agent_id as u64);
                self.agents.push(Box::new(AgentBudgetBalanced::new(agent_id, agent_name, value, budget, participation, estimator, rng)));
            }
        }
        agent_id
    }

    /// Add `count` agents of one type with values drawn from the valuation support
    pub fn add_population<R: Rng>(&mut self, name_prefix: &str, count: usize, agent_type: &AgentType, rng: &mut R) -> Vec<AgentId> {
        let dist = valuation_dist();
        (0..count)
            .map(|index| {
                let value = dist.sample(&mut *rng);
                self.add(format!("{} {}", name_prefix, index), value, agent_type.clone())
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }
}

impl Default for Agents {
    fn default() -> Self {
        Self::new()
    }
}
