//! Null-propagating arithmetic shared by the ratio and risk engines.
//!
//! Every helper returns `None` instead of a non-finite number so callers can
//! propagate "missing" without special-casing NaN.

/// Keep only finite values.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// `numerator / denominator`, missing when either side is missing, the
/// denominator is exactly zero, or the result is not finite.
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => finite(n / d),
        _ => None,
    }
}

/// Percentile (0-100 scale) with linear interpolation between the two
/// closest order statistics.
pub fn percentile_value(data: &[f64], pct: f64) -> Option<f64> {
    if data.is_empty() || !(0.0..=100.0).contains(&pct) {
        return None;
    }
    let mut sorted: Vec<f64> = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    finite(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Round half away from zero to a fixed number of decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ratio_propagates_missing() {
        assert_eq!(ratio(Some(1.0), Some(2.0)), Some(0.5));
        assert_eq!(ratio(None, Some(2.0)), None);
        assert_eq!(ratio(Some(1.0), None), None);
        assert_eq!(ratio(Some(1.0), Some(0.0)), None);
        assert_eq!(ratio(Some(1.0), Some(-0.0)), None);
        assert_eq!(ratio(Some(f64::MAX), Some(f64::MIN_POSITIVE)), None);
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_relative_eq!(percentile_value(&data, 50.0).unwrap(), 3.0);
        assert_relative_eq!(percentile_value(&data, 5.0).unwrap(), 1.2, epsilon = 1e-12);
        assert_relative_eq!(percentile_value(&data, 100.0).unwrap(), 5.0);
        assert_eq!(percentile_value(&[], 5.0), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(-0.00004, 4), -0.0);
        assert_eq!(round_to(12.0, 4), 12.0);
    }
}
