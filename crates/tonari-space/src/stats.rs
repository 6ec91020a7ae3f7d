//! Small numeric helpers shared by pivot selection.

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance. Zero for slices shorter than two elements.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }

    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Index in `0..n` maximising `score`, or `None` when `n == 0`.
/// Ties resolve to the first occurrence.
pub fn argmax_by(n: usize, score: impl Fn(usize) -> f64) -> Option<usize> {
    if n == 0 {
        return None;
    }

    let mut best_i = 0;
    let mut best_v = score(0);
    for i in 1..n {
        let v = score(i);
        if v > best_v {
            best_v = v;
            best_i = i;
        }
    }
    Some(best_i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[2.0]), 2.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[5.0]), 0.0);
        // Population variance of {2, 4, 6} around mean 4 is 8/3.
        assert!((variance(&[2.0, 4.0, 6.0]) - 8.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_argmax_by() {
        assert_eq!(argmax_by(0, |_| 0.0), None);
        assert_eq!(argmax_by(5, |i| i as f64), Some(4));
        // First occurrence wins on ties.
        assert_eq!(argmax_by(4, |_| 1.0), Some(0));
        assert_eq!(argmax_by(3, |i| if i == 0 { f64::NEG_INFINITY } else { 1.0 }), Some(1));
    }
}
