use rand::{rngs::StdRng, SeedableRng};
use rand_distr::Uniform;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Global seed for the current run, set from the command line
pub static RAND_SEED: AtomicU64 = AtomicU64::new(0);

/// When set, every cleared round is written as a CSV line to the Auction log
pub static VERBOSE_AUCTION: AtomicBool = AtomicBool::new(false);

/// Lower end of the valuation support of the simulated population
pub const VALUE_MIN: f64 = 25.0;
/// Upper end of the valuation support of the simulated population
pub const VALUE_MAX: f64 = 175.0;

/// Mix the global seed with a per-use offset so independent streams do not share draws
pub fn get_seed(offset: u64) -> u64 {
    RAND_SEED.load(Ordering::Relaxed).wrapping_mul(1_000_003).wrapping_add(offset)
}

/// Seeded RNG for the stream identified by `offset`
pub fn seeded_rng(offset: u64) -> StdRng {
    StdRng::seed_from_u64(get_seed(offset))
}

/// Uniform distribution over the valuation support [25, 175]
pub fn valuation_dist() -> Uniform<f64> {
    Uniform::new_inclusive(VALUE_MIN, VALUE_MAX)
}

/// Index of the first maximum, or None for an empty slice
/// NaN entries never win
pub fn argmax_index(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &value) in values.iter().enumerate() {
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ if value.is_nan() => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::Distribution;

    #[test]
    fn test_argmax_first_occurrence() {
        assert_eq!(argmax_index(&[1000.0, 1800.0, 1000.0]), Some(1));
        assert_eq!(argmax_index(&[5.0, 5.0, 1.0]), Some(0));
        assert_eq!(argmax_index(&[-3.0, -1.0, -1.0]), Some(1));
        assert_eq!(argmax_index(&[]), None);
    }

    #[test]
    fn test_argmax_skips_nan() {
        assert_eq!(argmax_index(&[f64::NAN, 2.0]), Some(1));
        assert_eq!(argmax_index(&[f64::NAN]), None);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let dist = valuation_dist();
        let mut rng_a = seeded_rng(7);
        let mut rng_b = seeded_rng(7);
        let a: Vec<f64> = (0..5).map(|_| dist.sample(&mut rng_a)).collect();
        let b: Vec<f64> = (0..5).map(|_| dist.sample(&mut rng_b)).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (VALUE_MIN..=VALUE_MAX).contains(v)));
    }
}
