/// Generalized Second Price mechanism for ranked slots.
///
/// Bids at or above the reserve are ranked highest first; equal bids go to the
/// lower agent id. The top `num_slots` bidders win a slot each and pay, per
/// click, the next lower valid bid (or the reserve when there is none).

use crate::history::{AgentId, Round};

/// Allocation and per-click prices of one cleared round
#[derive(Debug, Clone, PartialEq)]
pub struct GspOutcome {
    pub occupants: Vec<AgentId>,
    pub per_click_prices: Vec<f64>,
}

pub struct Gsp;

impl Gsp {
    /// Rank bids highest first with ties going to the lower agent id
    fn rank(bids: &[(AgentId, f64)]) -> Vec<(AgentId, f64)> {
        let mut ranked = bids.to_vec();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    /// Clear one round
    pub fn compute(clicks: &[f64], reserve: f64, bids: &[(AgentId, f64)]) -> GspOutcome {
        let valid: Vec<(AgentId, f64)> = Self::rank(bids)
            .into_iter()
            .filter(|&(_, bid)| bid >= reserve)
            .collect();
        let allocated = valid.len().min(clicks.len());

        let occupants = valid[..allocated].iter().map(|&(agent_id, _)| agent_id).collect();
        let per_click_prices = (0..allocated)
            .map(|k| valid.get(k + 1).map_or(reserve, |&(_, next)| next.max(reserve)))
            .collect();

        GspOutcome { occupants, per_click_prices }
    }

    /// Clear a round and record the outcome alongside bids and clicks
    pub fn clear(bids: Vec<(AgentId, f64)>, clicks: Vec<f64>, reserve: f64) -> Round {
        let outcome = Self::compute(&clicks, reserve, &bids);
        let mut round = Round::new(bids, clicks);
        round.occupants = outcome.occupants;
        round.per_click_prices = outcome.per_click_prices;
        round
    }

    /// Range of bids that lands a new bidder in `slot` against `other_bids`
    ///
    /// Returns `(min_bid, max_bid)`: `min_bid` ties the bidder currently holding
    /// `slot` (the reserve when nobody holds it) and `max_bid` is the bid holding
    /// the slot above. `max_bid` is None for the top slot and whenever no
    /// competitor holds the slot above.
    pub fn bid_range_for_slot(slot: usize, reserve: f64, other_bids: &[(AgentId, f64)]) -> (f64, Option<f64>) {
        let ranked = Self::rank(other_bids);
        let min_bid = ranked.get(slot).map_or(reserve, |&(_, bid)| bid.max(reserve));
        let max_bid = match slot.checked_sub(1) {
            Some(above) => ranked.get(above).map(|&(_, bid)| bid.max(reserve)),
            None => None,
        };
        (min_bid, max_bid)
    }
}
