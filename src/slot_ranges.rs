/// Per-slot bid ranges and effective prices, derived from the previous round.
///
/// Everything here is a pure function of the round it is given: the agent's own
/// bid is excluded, and the remaining bids are what the agent expects to face
/// again in the next round.

use crate::errors::BidError;
use crate::gsp::Gsp;
use crate::history::{AgentId, History, Round};

/// Bids landing an agent in `slot`: at least `min_bid` and at most `max_bid`
/// For the top slot (or when nobody holds the slot above) `max_bid` is `2 * min_bid`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotRange {
    pub slot: usize,
    pub min_bid: f64,
    pub max_bid: f64,
}

impl SlotRange {
    pub fn contains(&self, bid: f64, tolerance: f64) -> bool {
        bid >= self.min_bid - tolerance && bid <= self.max_bid + tolerance
    }
}

/// How competitor bids turn into the price of winning each slot
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PricePolicy {
    /// Competitor bids as submitted, highest first, one price per competitor
    /// (capped at the slot count); no reserve clamp and no padding
    RAW,
    /// Competitor bids clamped to the reserve, padded with reserve-priced
    /// phantom bids and truncated, giving exactly one price per slot
    NORMALIZED,
}

impl PricePolicy {
    /// Price of winning each slot against `competitor_bids` (highest first)
    pub fn effective_prices(&self, competitor_bids: &[(AgentId, f64)], num_slots: usize, reserve: f64) -> Vec<f64> {
        match self {
            PricePolicy::RAW => competitor_bids.iter()
                .take(num_slots)
                .map(|&(_, bid)| bid)
                .collect(),
            PricePolicy::NORMALIZED => normalized_prices(competitor_bids, num_slots, reserve),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PricePolicy::RAW => "raw",
            PricePolicy::NORMALIZED => "normalized",
        }
    }
}

/// Exactly `num_slots` prices: clamped competitor bids, then reserve-priced phantoms
pub fn normalized_prices(competitor_bids: &[(AgentId, f64)], num_slots: usize, reserve: f64) -> Vec<f64> {
    let mut prices: Vec<f64> = competitor_bids.iter()
        .map(|&(_, bid)| bid.max(reserve))
        .collect();
    prices.sort_by(|a, b| b.total_cmp(a));
    prices.resize(num_slots, reserve);
    prices
}

/// Expected utility of winning each priced slot: `clicks[s] * (value - prices[s])`
pub fn expected_utils(value: f64, clicks: &[f64], prices: &[f64]) -> Vec<f64> {
    prices.iter()
        .zip(clicks)
        .map(|(price, slot_clicks)| slot_clicks * (value - price))
        .collect()
}

/// Slot ranges for `agent_id` against the bids of `round`
pub fn slot_ranges_for_round(round: &Round, round_index: usize, agent_id: AgentId, reserve: f64) -> Result<Vec<SlotRange>, BidError> {
    if round.clicks.is_empty() {
        return Err(BidError::NoSlots { round: round_index });
    }
    let others = round.competitor_bids(agent_id);
    let ranges = (0..round.num_slots())
        .map(|slot| {
            let (min_bid, max_bid) = Gsp::bid_range_for_slot(slot, reserve, &others);
            SlotRange {
                slot,
                min_bid,
                max_bid: max_bid.unwrap_or(2.0 * min_bid),
            }
        })
        .collect();
    Ok(ranges)
}

/// Slot ranges for bidding in round `t`, computed from round `t - 1`
pub fn slot_ranges(t: usize, history: &History, agent_id: AgentId, reserve: f64) -> Result<Vec<SlotRange>, BidError> {
    let previous = history.lookback(t, 1)?;
    slot_ranges_for_round(previous, t - 1, agent_id, reserve)
}
