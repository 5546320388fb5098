/// Logistic curve `1 / (1 + exp(-(x - offset) * scale))`
///
/// A negative scale gives a falling curve, which is how participation
/// probability responds to budget pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sigmoid {
    pub offset: f64,
    pub scale: f64,
}

impl Sigmoid {
    pub fn new(offset: f64, scale: f64) -> Self {
        Self { offset, scale }
    }

    pub fn get_probability(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-(x - self.offset) * self.scale).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_probability_at_offset() {
        let sigmoid = Sigmoid::new(2.0, -1.0);
        assert!((sigmoid.get_probability(2.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_falling_curve() {
        let sigmoid = Sigmoid::new(2.0, -1.0);
        assert!(sigmoid.get_probability(0.0) > sigmoid.get_probability(1.0));
        assert!(sigmoid.get_probability(10.0) < 0.01);
    }
}
