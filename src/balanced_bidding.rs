/// Balanced bidding (BB).
///
/// Given last round's competitor bids, an agent targets the slot
/// `s* = argmax_s clicks[s] * (value - price[s])` and bids the `b` solving
///
///   clicks[s*] * (value - price[s*]) = clicks[s* - 1] * (value - b)
///
/// so it is indifferent between its target slot at today's price and the slot
/// above at price `b`. In the top slot it bids its value.

use crate::errors::BidError;
use crate::history::{AgentId, History};
use crate::slot_ranges::{expected_utils, slot_ranges, PricePolicy, SlotRange};
use crate::utils::argmax_index;

/// Slack allowed when checking the solved bid against its range
const RANGE_TOLERANCE: f64 = 1e-9;

/// A bid together with the slot it was solved for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolvedBid {
    pub target: SlotRange,
    /// Price of the target slot; None when the top slot is targeted
    pub t_star: Option<f64>,
    pub bid: f64,
}

/// Balanced-bidding solver for one agent
#[derive(Debug, Clone)]
pub struct BalancedBidder {
    pub agent_id: AgentId,
    pub value: f64,
    pub price_policy: PricePolicy,
}

impl BalancedBidder {
    pub fn new(agent_id: AgentId, value: f64, price_policy: PricePolicy) -> Self {
        Self { agent_id, value, price_policy }
    }

    /// Opening bid for round 0, before any history exists
    pub fn initial_bid(&self, _reserve: f64) -> f64 {
        self.value / 2.0
    }

    pub fn slot_ranges(&self, t: usize, history: &History, reserve: f64) -> Result<Vec<SlotRange>, BidError> {
        slot_ranges(t, history, self.agent_id, reserve)
    }

    /// Price of winning each slot in round `t`, per this bidder's price policy
    pub fn effective_prices(&self, t: usize, history: &History, reserve: f64) -> Result<Vec<f64>, BidError> {
        let previous = history.lookback(t, 1)?;
        let others = previous.competitor_bids(self.agent_id);
        Ok(self.price_policy.effective_prices(&others, previous.num_slots(), reserve))
    }

    /// Expected utility of winning each slot in round `t`, assuming competitors repeat last round's bids
    pub fn expected_utils(&self, t: usize, history: &History, reserve: f64) -> Result<Vec<f64>, BidError> {
        let previous = history.lookback(t, 1)?;
        let prices = self.effective_prices(t, history, reserve)?;
        Ok(expected_utils(self.value, &previous.clicks, &prices))
    }

    /// Utility-maximizing slot; ties go to the higher slot
    /// With nothing priced (no competitors under the raw policy) the top slot is free to take
    pub fn target_slot(&self, t: usize, history: &History, reserve: f64) -> Result<SlotRange, BidError> {
        let ranges = self.slot_ranges(t, history, reserve)?;
        let utils = self.expected_utils(t, history, reserve)?;
        let slot = argmax_index(&utils).unwrap_or(0);
        Ok(ranges[slot])
    }

    pub fn solve(&self, t: usize, history: &History, reserve: f64) -> Result<SolvedBid, BidError> {
        let previous = history.lookback(t, 1)?;
        let target = self.target_slot(t, history, reserve)?;
        if target.slot == 0 {
            return Ok(SolvedBid { target, t_star: None, bid: self.value });
        }

        let prices = self.effective_prices(t, history, reserve)?;
        let t_star = prices[target.slot];
        if self.value - t_star < 0.0 {
            return Ok(SolvedBid { target, t_star: Some(t_star), bid: self.value });
        }

        let clicks = previous.clicks[target.slot];
        let clicks_above = previous.clicks[target.slot - 1];
        if clicks == clicks_above || clicks_above <= 0.0 {
            return Err(BidError::DivisionByZero { slot: target.slot, clicks });
        }

        let bid = self.value - (clicks / clicks_above) * (self.value - t_star);
        if !target.contains(bid, RANGE_TOLERANCE) {
            return Err(BidError::InvariantViolation {
                agent_id: self.agent_id,
                slot: target.slot,
                bid,
                min_bid: target.min_bid,
                max_bid: target.max_bid,
            });
        }
        Ok(SolvedBid { target, t_star: Some(t_star), bid })
    }

    pub fn bid(&self, t: usize, history: &History, reserve: f64) -> Result<f64, BidError> {
        self.solve(t, history, reserve).map(|solved| solved.bid)
    }
}
