//! Numeric helpers shared by the erosion models.

use rand::Rng;

/// Slope from elevation `e1` down to `e2` over horizontal distance `m`.
pub fn slope(e1: f32, e2: f32, m: f32) -> f32 {
    (e1 - e2) / m
}

/// Fast sigmoid approximation mapping all of R into (0, 1).
pub fn sigmoid_approx(x: f32) -> f32 {
    0.5 * (x / (1.0 + x.abs()) + 1.0)
}

/// Linearly interpolate x in [min, max] to [-1, 1].
pub fn linear_min_max(x: f32, min: f32, max: f32) -> f32 {
    2.0 * ((x - min) / (max - min)) - 1.0
}

/// Logistic-like curve over [min, max] ranging (0, 1). `mul` sharpens the
/// transition.
pub fn logistic_between(x: f32, min: f32, max: f32, mul: f32) -> f32 {
    sigmoid_approx(mul * linear_min_max(x, min, max))
}

/// Pick an index with probability proportional to its non-negative weight.
/// Returns `None` when every weight is zero (or negative), which the runoff
/// walk treats as "no downhill neighbor".
pub fn random_weighted_pick<R: Rng>(weights: &[f32], rng: &mut R) -> Option<usize> {
    let total: f32 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }
    let mut r = rng.gen::<f32>() * total;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        if r < w {
            return Some(i);
        }
        r -= w;
    }
    // Floating point round-off can leave a sliver; fall back to the last
    // positive weight.
    weights.iter().rposition(|&w| w > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_slope_sign() {
        assert!(slope(10.0, 5.0, 30.0) > 0.0);
        assert!(slope(5.0, 10.0, 30.0) < 0.0);
        assert_eq!(slope(5.0, 5.0, 30.0), 0.0);
    }

    #[test]
    fn test_sigmoid_approx_bounds() {
        assert!(sigmoid_approx(-100.0) < 0.01);
        assert!(sigmoid_approx(100.0) > 0.99);
        assert!((sigmoid_approx(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_logistic_between_is_monotonic() {
        let lo = logistic_between(0.1, 0.0, 1.0, 1.0);
        let mid = logistic_between(0.5, 0.0, 1.0, 1.0);
        let hi = logistic_between(0.9, 0.0, 1.0, 1.0);
        assert!(lo < mid && mid < hi);
    }

    #[test]
    fn test_weighted_pick_all_zero_returns_none() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(random_weighted_pick(&[0.0; 8], &mut rng), None);
        assert_eq!(random_weighted_pick(&[-1.0, 0.0], &mut rng), None);
    }

    #[test]
    fn test_weighted_pick_single_positive_weight() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let weights = [0.0, 0.0, 3.0, 0.0];
        for _ in 0..20 {
            assert_eq!(random_weighted_pick(&weights, &mut rng), Some(2));
        }
    }

    #[test]
    fn test_weighted_pick_follows_proportions() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let weights = [1.0, 9.0];
        let mut counts = [0usize; 2];
        for _ in 0..2000 {
            counts[random_weighted_pick(&weights, &mut rng).unwrap()] += 1;
        }
        // Index 1 should dominate roughly 9:1.
        assert!(counts[1] > counts[0] * 5);
    }
}
