//! NaN-aware summary statistics and the linear rescale transform.
//!
//! Replicate vectors routinely carry NaN padding (ragged replicate counts,
//! failed wells), so every summary here ignores non-finite entries and
//! returns NaN — not an error — when nothing finite remains.

/// Mean of the finite entries; NaN when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

/// Median of the finite entries; NaN when there are none.
pub fn nan_median(values: &[f64]) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = finite.len();
    if n % 2 == 1 {
        finite[n / 2]
    } else {
        (finite[n / 2 - 1] + finite[n / 2]) / 2.0
    }
}

/// Minimum of the finite entries; NaN when there are none.
pub fn nan_min(values: impl IntoIterator<Item = f64>) -> f64 {
    let min = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(f64::INFINITY, f64::min);
    if min.is_finite() {
        min
    } else {
        f64::NAN
    }
}

/// Linearly map `v` from `[min, max]` onto `[0, 1]`.
///
/// Values outside the range map outside `[0, 1]` — deliberately not clamped,
/// so a wrong rescale window is visible in the output instead of hidden.
pub fn rescale(v: f64, min: f64, max: f64) -> f64 {
    (v - min) / (max - min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_ignores_nan() {
        assert_relative_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean(&[f64::NAN, f64::NAN]).is_nan());
        assert!(nan_mean(&[]).is_nan());
    }

    #[test]
    fn median_odd_even() {
        assert_relative_eq!(nan_median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(nan_median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_relative_eq!(nan_median(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_median(&[]).is_nan());
    }

    #[test]
    fn min_ignores_nan() {
        assert_relative_eq!(nan_min([5.0, f64::NAN, 2.0, 9.0]), 2.0);
        assert!(nan_min([]).is_nan());
    }

    #[test]
    fn rescale_is_linear_and_anchored() {
        assert_relative_eq!(rescale(0.0, 0.0, 100.0), 0.0);
        assert_relative_eq!(rescale(100.0, 0.0, 100.0), 1.0);
        assert_relative_eq!(rescale(25.0, 0.0, 100.0), 0.25);
        // not clamped
        assert_relative_eq!(rescale(150.0, 0.0, 100.0), 1.5);
        assert_relative_eq!(rescale(-50.0, 0.0, 100.0), -0.5);
    }
}
