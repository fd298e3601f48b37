//! Summary statistics over time series.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`).
pub fn std_dev(values: &[f64]) -> f64 {
    (total_sum_of_squares(values) / values.len() as f64).sqrt()
}

/// Sum of squared deviations from the mean.
pub fn total_sum_of_squares(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum()
}

/// Sum of squared differences. Extra trailing entries of the longer slice are ignored.
pub fn sum_squared_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Evenly spaced points over `[lower, upper]`, endpoints included.
///
/// Zero or one point collapses to the midpoint.
pub fn linspace(lower: f64, upper: f64, points: usize) -> Vec<f64> {
    if points <= 1 {
        return vec![0.5 * (lower + upper)];
    }
    let step = (upper - lower) / (points as f64 - 1.0);
    (0..points)
        .map(|i| if i + 1 == points { upper } else { lower + step * i as f64 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_dev_is_population_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v) - 5.0).abs() < 1e-12);
        assert!((std_dev(&v) - 2.0).abs() < 1e-12);
        assert!((total_sum_of_squares(&v) - 32.0).abs() < 1e-12);
    }

    #[test]
    fn linspace_includes_endpoints() {
        let v = linspace(-10.0, 10.0, 5);
        assert_eq!(v, vec![-10.0, -5.0, 0.0, 5.0, 10.0]);
    }

    #[test]
    fn linspace_single_point_is_midpoint() {
        assert_eq!(linspace(-1.0, 3.0, 1), vec![1.0]);
        assert_eq!(linspace(-1.0, 3.0, 0), vec![1.0]);
    }

    #[test]
    fn sse_of_identical_series_is_zero() {
        let a = [1.0, 2.0, 3.0];
        assert_eq!(sum_squared_error(&a, &a), 0.0);
        assert_eq!(sum_squared_error(&a, &[0.0, 0.0, 0.0]), 14.0);
    }
}
