/// Budget awareness for balanced bidders.
///
/// A budgeted agent keeps a ledger of what every bidder has spent so far and,
/// each round, flips a coin on whether to submit its balanced bid or to sit
/// the round out with a bid of zero. Participation gets less likely as the
/// run ages, as the agent outspends the others, and as the proposed bid grows.

use std::collections::BTreeMap;

use rand::Rng;

use crate::gsp::Gsp;
use crate::history::{AgentId, Round};
use crate::sigmoid::Sigmoid;

/// Cumulative per-click spend of every agent seen in the auction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpendLedger {
    spent: BTreeMap<AgentId, f64>,
}

impl SpendLedger {
    pub fn new() -> Self {
        Self { spent: BTreeMap::new() }
    }

    /// Accrue the clearing prices of `round`
    ///
    /// The outcome recorded with the round is used as is. A round carrying only
    /// bids and clicks is cleared here: bids below the reserve win nothing and
    /// the top `num_slots` valid bids each pay the next lower valid bid, never
    /// less than the reserve. Every bidder in the round gets a ledger entry,
    /// winners or not.
    pub fn update_spent(&mut self, round: &Round, reserve: f64) {
        for &(agent_id, _) in &round.bids {
            self.spent.entry(agent_id).or_insert(0.0);
        }
        let computed;
        let (occupants, prices) = if round.occupants.is_empty() {
            computed = Gsp::compute(&round.clicks, reserve, &round.bids);
            (&computed.occupants, &computed.per_click_prices)
        } else {
            (&round.occupants, &round.per_click_prices)
        };
        for (&agent_id, &price) in occupants.iter().zip(prices) {
            *self.spent.entry(agent_id).or_insert(0.0) += price;
        }
    }

    pub fn spent_by(&self, agent_id: AgentId) -> f64 {
        self.spent.get(&agent_id).copied().unwrap_or(0.0)
    }

    /// Mean spend of everyone but `agent_id`; zero when nobody else is known
    pub fn mean_spent_excluding(&self, agent_id: AgentId) -> f64 {
        let others: Vec<f64> = self.spent.iter()
            .filter(|&(&id, _)| id != agent_id)
            .map(|(_, &spent)| spent)
            .collect();
        if others.is_empty() {
            0.0
        } else {
            others.iter().sum::<f64>() / others.len() as f64
        }
    }

    /// How far `agent_id` is ahead of the average other spender
    pub fn spend_gap(&self, agent_id: AgentId) -> f64 {
        self.spent_by(agent_id) - self.mean_spent_excluding(agent_id)
    }

    pub fn total(&self) -> f64 {
        self.spent.values().sum()
    }

    pub fn spent(&self) -> &BTreeMap<AgentId, f64> {
        &self.spent
    }
}

/// Shape of the participation curve
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipationParams {
    /// Round at which time pressure is zero
    pub time_center: f64,
    /// Rounds per unit of time pressure
    pub time_scale: f64,
    /// Pressure at which participation is a coin flip
    pub bias: f64,
    /// Bid per unit of bid pressure
    pub bid_scale: f64,
}

impl Default for ParticipationParams {
    fn default() -> Self {
        Self {
            time_center: 24.0,
            time_scale: 48.0,
            bias: 2.0,
            bid_scale: 100.0,
        }
    }
}

impl ParticipationParams {
    /// Combined pressure against participating in round `t`
    /// The spend gap is measured in units of the agent's budget
    pub fn pressure(&self, t: usize, spend_gap: f64, budget: f64, proposed_bid: f64) -> f64 {
        let time_pressure = (t as f64 - self.time_center) / self.time_scale;
        let spend_pressure = spend_gap / budget.max(f64::EPSILON);
        let bid_pressure = proposed_bid / self.bid_scale;
        time_pressure + spend_pressure + bid_pressure
    }

    pub fn probability(&self, t: usize, spend_gap: f64, budget: f64, proposed_bid: f64) -> f64 {
        Sigmoid::new(self.bias, -1.0).get_probability(self.pressure(t, spend_gap, budget, proposed_bid))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticipationCounters {
    pub participated: usize,
    pub abstained: usize,
}

/// Outcome of one participation draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticipationDecision {
    pub participate: bool,
    pub probability: f64,
    /// The bid to submit: the proposed bid, or exactly zero when abstaining
    pub bid: f64,
}

/// Participation state of one agent
#[derive(Debug, Clone)]
pub struct Participation {
    pub params: ParticipationParams,
    pub counters: ParticipationCounters,
}

impl Participation {
    pub fn new(params: ParticipationParams) -> Self {
        Self {
            params,
            counters: ParticipationCounters::default(),
        }
    }

    /// Decide whether to submit `proposed_bid` in round `t`
    /// Agents without a budget always participate and consume no draw
    pub fn participate<R: Rng>(&mut self, t: usize, proposed_bid: f64, spend_gap: f64, budget: Option<f64>, rng: &mut R) -> ParticipationDecision {
        let probability = match budget {
            Some(budget) => {
                let probability = self.params.probability(t, spend_gap, budget, proposed_bid);
                let draw: f64 = rng.gen();
                if draw >= probability {
                    self.counters.abstained += 1;
                    return ParticipationDecision { participate: false, probability, bid: 0.0 };
                }
                probability
            }
            None => 1.0,
        };
        self.counters.participated += 1;
        ParticipationDecision { participate: true, probability, bid: proposed_bid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const CLICKS: [f64; 3] = [50.0, 30.0, 10.0];

    #[test]
    fn test_update_spent_next_price() {
        let round = Round::new(vec![(0, 64.0), (1, 80.0), (2, 40.0), (3, 10.0)], CLICKS.to_vec());
        let mut ledger = SpendLedger::new();
        ledger.update_spent(&round, 0.0);
        assert_eq!(ledger.spent_by(1), 64.0);
        assert_eq!(ledger.spent_by(0), 40.0);
        assert_eq!(ledger.spent_by(2), 10.0);
        assert_eq!(ledger.spent_by(3), 0.0);
        assert_eq!(ledger.spent().len(), 4);
    }

    #[test]
    fn test_update_spent_accumulates_across_rounds() {
        let round = Round::new(vec![(0, 64.0), (1, 80.0)], CLICKS.to_vec());
        let mut ledger = SpendLedger::new();
        ledger.update_spent(&round, 5.0);
        ledger.update_spent(&round, 5.0);
        assert_eq!(ledger.spent_by(1), 128.0);
        assert_eq!(ledger.spent_by(0), 10.0);
    }

    #[test]
    fn test_update_spent_reads_recorded_outcome() {
        // Cleared at reserve 20; clearing again at reserve 0 would hand agent 0 the bottom slot
        let round = Gsp::clear(vec![(0, 12.0), (1, 80.0), (2, 25.0)], CLICKS.to_vec(), 20.0);
        let mut ledger = SpendLedger::new();
        ledger.update_spent(&round, 0.0);
        assert_eq!(ledger.spent_by(1), 25.0);
        assert_eq!(ledger.spent_by(2), 20.0);
        assert_eq!(ledger.spent_by(0), 0.0);
        assert_eq!(ledger.spent().len(), 3);
    }

    #[test]
    fn test_sub_reserve_bidders_spend_nothing() {
        let round = Round::new(vec![(0, 12.0), (1, 80.0), (2, 19.9)], CLICKS.to_vec());
        let mut ledger = SpendLedger::new();
        ledger.update_spent(&round, 20.0);
        assert_eq!(ledger.spent_by(0), 0.0);
        assert_eq!(ledger.spent_by(2), 0.0);
        assert_eq!(ledger.spent_by(1), 20.0);
    }

    #[test]
    fn test_spend_conservation() {
        let bid_sets = [
            vec![(0, 64.0), (1, 80.0), (2, 40.0), (3, 10.0), (4, 90.0)],
            vec![(0, 5.0), (1, 5.0)],
            vec![(0, 150.0)],
            vec![(0, 30.0), (1, 31.0), (2, 32.0)],
        ];
        for reserve in [0.0, 15.0, 35.0] {
            for bids in &bid_sets {
                let round = Round::new(bids.clone(), CLICKS.to_vec());
                let mut ledger = SpendLedger::new();
                ledger.update_spent(&round, reserve);
                let max_bid = bids.iter().map(|&(_, bid)| bid).fold(0.0, f64::max);
                assert!(ledger.total() <= CLICKS.len() as f64 * max_bid);
                for &(agent_id, bid) in bids {
                    if bid < reserve {
                        assert_eq!(ledger.spent_by(agent_id), 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_mean_spent_excluding() {
        let round = Round::new(vec![(0, 64.0), (1, 80.0), (2, 40.0)], CLICKS.to_vec());
        let mut ledger = SpendLedger::new();
        ledger.update_spent(&round, 0.0);
        // 1 pays 64, 0 pays 40, 2 pays 0
        assert_eq!(ledger.mean_spent_excluding(1), 20.0);
        assert_eq!(ledger.spend_gap(1), 44.0);
        assert_eq!(SpendLedger::new().mean_spent_excluding(0), 0.0);
    }

    #[test]
    fn test_probability_falls_with_time_spend_and_bid() {
        let params = ParticipationParams::default();
        let base = params.probability(10, 0.0, 100.0, 50.0);
        assert!(params.probability(40, 0.0, 100.0, 50.0) < base);
        assert!(params.probability(10, 50.0, 100.0, 50.0) < base);
        assert!(params.probability(10, 0.0, 100.0, 90.0) < base);
        // At round 24 with no spend gap and a zero bid only the bias remains
        let centered = params.probability(24, 0.0, 100.0, 0.0);
        assert!((centered - 1.0 / (1.0 + (-2.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_unbudgeted_always_participates() {
        let mut participation = Participation::new(ParticipationParams::default());
        let mut rng = StdRng::seed_from_u64(1);
        for t in 0..100 {
            let decision = participation.participate(t, 170.0, 1e6, None, &mut rng);
            assert!(decision.participate);
            assert_eq!(decision.bid, 170.0);
        }
        assert_eq!(participation.counters, ParticipationCounters { participated: 100, abstained: 0 });
    }

    #[test]
    fn test_abstention_bids_zero_and_counts() {
        let mut participation = Participation::new(ParticipationParams::default());
        let mut rng = StdRng::seed_from_u64(3);
        // Huge spend gap: participation probability is effectively zero
        for t in 1..=20 {
            let decision = participation.participate(t, 80.0, 1e4, Some(10.0), &mut rng);
            assert!(!decision.participate);
            assert_eq!(decision.bid, 0.0);
        }
        assert_eq!(participation.counters, ParticipationCounters { participated: 0, abstained: 20 });
    }

    #[test]
    fn test_participation_is_reproducible_with_seed() {
        let run = |seed| {
            let mut participation = Participation::new(ParticipationParams::default());
            let mut rng = StdRng::seed_from_u64(seed);
            (0..48).map(|t| participation.participate(t, 60.0, 5.0, Some(100.0), &mut rng).participate).collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_participation_rate_tracks_probability() {
        let params = ParticipationParams::default();
        let mut participation = Participation::new(params.clone());
        let mut rng = StdRng::seed_from_u64(5);
        let trials = 4000;
        for _ in 0..trials {
            participation.participate(24, 100.0, 0.0, Some(100.0), &mut rng);
        }
        let expected = params.probability(24, 0.0, 100.0, 100.0);
        let observed = participation.counters.participated as f64 / trials as f64;
        assert!((observed - expected).abs() < 0.05, "observed {} expected {}", observed, expected);
    }
}
