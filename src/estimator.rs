/// Inference of competitors' hidden valuations.
///
/// Every competitor is assumed to play balanced bidding. Its bid in round
/// `t - 1` was its answer to the bids of round `t - 2`, so inverting the balance
/// equation on that round recovers the value that would have produced the bid:
///
///   value = (clicks[s] * t* - bid * clicks[s - 1]) / (clicks[s] - clicks[s - 1])
///
/// where `s` is the slot the competitor must have targeted, found with the
/// current estimate of its value.

use std::collections::BTreeMap;

use crate::history::{AgentId, History};
use crate::slot_ranges::{expected_utils, normalized_prices};
use crate::utils::{argmax_index, VALUE_MAX, VALUE_MIN};

/// How a fresh sample enters the running estimate
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EstimateMerge {
    /// Mean of all samples merged so far
    RUNNING_MEAN,
    /// Latest sample only
    LATEST_SAMPLE,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorParams {
    pub min_value: f64,
    pub max_value: f64,
    /// Estimate given to a competitor before any inference
    pub seed_value: f64,
    pub merge: EstimateMerge,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            min_value: VALUE_MIN,
            max_value: VALUE_MAX,
            seed_value: (VALUE_MIN + VALUE_MAX) / 2.0,
            merge: EstimateMerge::RUNNING_MEAN,
        }
    }
}

/// How one competitor's sample was obtained
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleSource {
    /// Balance equation inverted at the implied target slot
    INVERTED { slot: usize },
    /// Implied target is the top slot, where a bid does not reveal value
    TOP_SLOT_BID,
    /// Implied target has negative utility; the bid is taken at face value
    UNPROFITABLE_BID { slot: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateUpdate {
    pub agent_id: AgentId,
    pub source: SampleSource,
    /// Sample after clamping to the valuation support
    pub sample: f64,
    pub estimate: f64,
}

/// Result of one estimation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimationRound {
    pub updated: Vec<EstimateUpdate>,
    /// Competitors left unchanged because their implied slot had the same clicks as the slot above
    pub skipped: Vec<(AgentId, usize)>,
}

/// Running valuation estimates of one agent's competitors
#[derive(Debug, Clone)]
pub struct ValueEstimator {
    pub params: EstimatorParams,
    estimates: BTreeMap<AgentId, f64>,
    samples: BTreeMap<AgentId, usize>,
}

impl ValueEstimator {
    pub fn new(params: EstimatorParams) -> Self {
        Self {
            params,
            estimates: BTreeMap::new(),
            samples: BTreeMap::new(),
        }
    }

    pub fn estimates(&self) -> &BTreeMap<AgentId, f64> {
        &self.estimates
    }

    /// Number of samples merged into the estimate of `agent_id`
    pub fn sample_count(&self, agent_id: AgentId) -> usize {
        self.samples.get(&agent_id).copied().unwrap_or(0)
    }

    fn seed(&mut self, agent_id: AgentId) -> f64 {
        let seed_value = self.params.seed_value;
        *self.estimates.entry(agent_id).or_insert(seed_value)
    }

    fn merge(&mut self, agent_id: AgentId, sample: f64) -> f64 {
        let count = self.samples.entry(agent_id).or_insert(0);
        let estimate = self.estimates.entry(agent_id).or_insert(sample);
        *estimate = match self.params.merge {
            EstimateMerge::RUNNING_MEAN => (*estimate * *count as f64 + sample) / (*count + 1) as f64,
            EstimateMerge::LATEST_SAMPLE => sample,
        };
        *count += 1;
        *estimate
    }

    /// Refine the estimates with what became visible for bidding in round `t`
    ///
    /// Round 1 only seeds the competitors of round 0. From round 2 on, each
    /// competitor's bid in `t - 1` is inverted against round `t - 2`. Missing
    /// history makes this a no-op.
    pub fn estimate_values(&mut self, self_id: AgentId, t: usize, history: &History, reserve: f64) -> EstimationRound {
        let mut result = EstimationRound::default();
        let Ok(previous) = history.lookback(t, 1) else {
            return result;
        };
        if t == 1 {
            for (agent_id, _) in previous.competitor_bids(self_id) {
                self.seed(agent_id);
            }
            return result;
        }
        let Ok(before) = history.lookback(t, 2) else {
            return result;
        };

        let clicks = &before.clicks;
        for (agent_id, bid) in previous.competitor_bids_by_id(self_id) {
            let current = self.seed(agent_id);
            let prices = normalized_prices(&before.competitor_bids(agent_id), clicks.len(), reserve);
            let utils = expected_utils(current, clicks, &prices);
            let Some(slot) = argmax_index(&utils) else {
                continue;
            };

            let (source, raw_sample) = if slot == 0 {
                (SampleSource::TOP_SLOT_BID, bid)
            } else if utils[slot] < 0.0 {
                (SampleSource::UNPROFITABLE_BID { slot }, bid)
            } else {
                let differential = clicks[slot] - clicks[slot - 1];
                if differential == 0.0 {
                    result.skipped.push((agent_id, slot));
                    continue;
                }
                let t_star = prices[slot];
                (SampleSource::INVERTED { slot }, (clicks[slot] * t_star - bid * clicks[slot - 1]) / differential)
            };

            let sample = raw_sample.clamp(self.params.min_value, self.params.max_value);
            let estimate = self.merge(agent_id, sample);
            result.updated.push(EstimateUpdate { agent_id, source, sample, estimate });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balanced_bidding::BalancedBidder;
    use crate::history::Round;
    use crate::slot_ranges::PricePolicy;

    const CLICKS: [f64; 3] = [50.0, 30.0, 10.0];

    fn history_of(rounds: Vec<Vec<(AgentId, f64)>>, clicks: &[f64]) -> History {
        let mut history = History::new();
        for bids in rounds {
            history.push(Round::new(bids, clicks.to_vec()));
        }
        history
    }

    #[test]
    fn test_inert_before_round_one() {
        let history = history_of(vec![vec![(0, 10.0), (1, 72.0)]], &CLICKS);
        let mut estimator = ValueEstimator::new(EstimatorParams::default());
        let result = estimator.estimate_values(0, 0, &history, 0.0);
        assert_eq!(result, EstimationRound::default());
        assert!(estimator.estimates().is_empty());
    }

    #[test]
    fn test_round_one_seeds_midpoint() {
        let history = history_of(vec![vec![(0, 10.0), (1, 72.0), (2, 80.0)]], &CLICKS);
        let mut estimator = ValueEstimator::new(EstimatorParams::default());
        estimator.estimate_values(0, 1, &history, 0.0);
        assert_eq!(estimator.estimates().get(&1).copied(), Some(100.0));
        assert_eq!(estimator.estimates().get(&2).copied(), Some(100.0));
        assert_eq!(estimator.estimates().get(&0).copied(), None);
        assert_eq!(estimator.sample_count(1), 0);
    }

    #[test]
    fn test_missing_history_is_a_no_op() {
        let history = history_of(vec![vec![(0, 10.0), (1, 72.0)]], &CLICKS);
        let mut estimator = ValueEstimator::new(EstimatorParams::default());
        let result = estimator.estimate_values(0, 5, &history, 0.0);
        assert_eq!(result, EstimationRound::default());
    }

    #[test]
    fn test_inverts_balanced_bid() {
        // Competitor 1 (value 120) faces [80, 40, 10]: targets slot 1 and bids 120 - 0.6 * 80 = 72
        let static_bids = vec![(0, 10.0), (1, 72.0), (2, 80.0), (3, 40.0)];
        let history = history_of(vec![static_bids.clone(), static_bids], &CLICKS);
        let mut estimator = ValueEstimator::new(EstimatorParams::default());
        estimator.estimate_values(0, 1, &history, 0.0);
        let result = estimator.estimate_values(0, 2, &history, 0.0);

        let update = result.updated.iter().find(|u| u.agent_id == 1).unwrap();
        assert_eq!(update.source, SampleSource::INVERTED { slot: 1 });
        assert!((update.sample - 120.0).abs() < 1e-9);
        assert!((estimator.estimates().get(&1).copied().unwrap() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_slot_takes_bid_as_value() {
        // Competitor 2 bids 80 against [30, 20, 10]; with estimate 100 it targets the top slot
        let static_bids = vec![(0, 10.0), (1, 30.0), (2, 80.0), (3, 20.0)];
        let history = history_of(vec![static_bids.clone(), static_bids], &CLICKS);
        let mut estimator = ValueEstimator::new(EstimatorParams::default());
        let result = estimator.estimate_values(0, 2, &history, 0.0);

        let update = result.updated.iter().find(|u| u.agent_id == 2).unwrap();
        assert_eq!(update.source, SampleSource::TOP_SLOT_BID);
        assert_eq!(update.sample, 80.0);
    }

    #[test]
    fn test_unprofitable_target_takes_bid_as_value() {
        // Everything is priced above 100, so agent 1's utilities are all negative
        let bids = vec![(0, 160.0), (1, 150.0), (2, 170.0)];
        let history = history_of(vec![bids.clone(), bids], &[20.0, 10.0]);
        let mut estimator = ValueEstimator::new(EstimatorParams::default());
        let result = estimator.estimate_values(0, 2, &history, 0.0);

        let update = result.updated.iter().find(|u| u.agent_id == 1).unwrap();
        assert_eq!(update.source, SampleSource::UNPROFITABLE_BID { slot: 1 });
        assert_eq!(update.sample, 150.0);
    }

    #[test]
    fn test_samples_are_clamped() {
        let bids = vec![(0, 10.0), (1, 400.0), (2, 1.0)];
        let history = history_of(vec![bids.clone(), bids], &CLICKS);
        let mut estimator = ValueEstimator::new(EstimatorParams::default());
        estimator.estimate_values(0, 2, &history, 0.0);
        assert_eq!(estimator.estimates().get(&1).copied(), Some(175.0));
        assert!(estimator.estimates().values().all(|v| (25.0..=175.0).contains(v)));
    }

    #[test]
    fn test_zero_click_differential_skips_competitor() {
        // Equal clicks in slots 0 and 1; competitor 1 implies slot 1
        let bids = vec![(0, 10.0), (1, 72.0), (2, 80.0), (3, 40.0)];
        let history = history_of(vec![bids.clone(), bids], &[50.0, 50.0, 10.0]);
        let mut estimator = ValueEstimator::new(EstimatorParams::default());
        estimator.estimate_values(0, 1, &history, 0.0);
        let result = estimator.estimate_values(0, 2, &history, 0.0);

        assert!(result.skipped.contains(&(1, 1)));
        assert_eq!(estimator.estimates().get(&1).copied(), Some(100.0));
        assert_eq!(estimator.sample_count(1), 0);
        assert!(estimator.estimates().values().all(|v| v.is_finite()));
    }

    #[test]
    fn test_running_mean_and_latest_sample() {
        let mut mean = ValueEstimator::new(EstimatorParams::default());
        let mut latest = ValueEstimator::new(EstimatorParams {
            merge: EstimateMerge::LATEST_SAMPLE,
            ..EstimatorParams::default()
        });
        for sample in [60.0, 90.0, 120.0] {
            mean.merge(7, sample);
            latest.merge(7, sample);
        }
        assert_eq!(mean.estimates().get(&7).copied(), Some(90.0));
        assert_eq!(latest.estimates().get(&7).copied(), Some(120.0));
        assert_eq!(mean.sample_count(7), 3);
    }

    #[test]
    fn test_converges_on_balanced_bidder() {
        // Agent 1 plays balanced bidding with value 130 against fixed bids; agent 0 estimates it
        let true_value = 130.0;
        let clicks = [60.0, 45.0, 33.75];
        let competitor = BalancedBidder::new(1, true_value, PricePolicy::NORMALIZED);
        let mut history = History::new();
        history.push(Round::new(vec![(0, 20.0), (1, 65.0), (2, 150.0), (3, 90.0)], clicks.to_vec()));
        let mut estimator = ValueEstimator::new(EstimatorParams::default());

        let mut converged_at = None;
        for t in 1..=12 {
            let bid = competitor.bid(t, &history, 0.0).unwrap();
            history.push(Round::new(vec![(0, 20.0), (1, bid), (2, 150.0), (3, 90.0)], clicks.to_vec()));
            estimator.estimate_values(0, t + 1, &history, 0.0);
            let estimate = estimator.estimates().get(&1).copied().unwrap();
            assert!((25.0..=175.0).contains(&estimate));
            if converged_at.is_none() && (estimate - true_value).abs() < 1.0 {
                converged_at = Some(t);
            }
        }
        assert!(converged_at.map_or(false, |t| t <= 10), "converged at {:?}", converged_at);
        assert!((estimator.estimates().get(&1).copied().unwrap() - true_value).abs() < 1.0);
    }

    /// Estimates of competitor 1 after each of `rounds` inversions
    /// Competitor 1 plays balanced bidding with value 60 against fixed bids 40 / 150 / 50,
    /// so it targets slot 2 and bids 45 every round, while the seed of 100 implies slot 1
    fn wrong_seed_trajectory(merge: EstimateMerge, rounds: usize) -> Vec<f64> {
        let clicks = [60.0, 45.0, 33.75];
        let competitor = BalancedBidder::new(1, 60.0, PricePolicy::NORMALIZED);
        let mut history = History::new();
        history.push(Round::new(vec![(0, 40.0), (1, 30.0), (2, 150.0), (3, 50.0)], clicks.to_vec()));
        let mut estimator = ValueEstimator::new(EstimatorParams { merge, ..EstimatorParams::default() });
        estimator.estimate_values(0, 1, &history, 0.0);

        let mut trajectory = Vec::new();
        for t in 1..=rounds {
            let bid = competitor.bid(t, &history, 0.0).unwrap();
            assert!((bid - 45.0).abs() < 1e-9);
            history.push(Round::new(vec![(0, 40.0), (1, bid), (2, 150.0), (3, 50.0)], clicks.to_vec()));
            estimator.estimate_values(0, t + 1, &history, 0.0);
            trajectory.push(estimator.estimates().get(&1).copied().unwrap());
        }
        trajectory
    }

    #[test]
    fn test_latest_sample_recovers_from_wrong_seed_slot() {
        let trajectory = wrong_seed_trajectory(EstimateMerge::LATEST_SAMPLE, 10);
        assert!((trajectory[0] - 30.0).abs() < 1e-9);
        assert!((trajectory[1] - 45.0).abs() < 1e-9);
        assert!(trajectory[2..].iter().all(|estimate| (estimate - 60.0).abs() < 1e-9), "{:?}", trajectory);
    }

    #[test]
    fn test_running_mean_moves_toward_value_from_wrong_seed_slot() {
        let trajectory = wrong_seed_trajectory(EstimateMerge::RUNNING_MEAN, 15);
        assert!(trajectory.iter().all(|estimate| (25.0..=175.0).contains(estimate)));
        assert!(trajectory.windows(2).all(|pair| pair[1] >= pair[0] - 1e-9), "{:?}", trajectory);
        assert!(trajectory.iter().all(|estimate| *estimate <= 60.0 + 1e-9));
        // The wrong-slot sample of 30 stays in the mean, so the gap closes slowly
        assert!((trajectory[9] - 54.0).abs() < 1e-9, "{:?}", trajectory);
        assert!((60.0 - trajectory[14]) < (60.0 - trajectory[9]));
    }
}
