//! Series window utilities
//!
//! Trailing-window aggregates over an ordered numeric column (usually closes).
//! Every rolling output is aligned to the *end* of its window and uses only the
//! trailing `w` observations. Positions without a full window are `None`.

use serde::{Deserialize, Serialize};

// ============================================================
// SLICE AGGREGATES
// ============================================================

/// Last `n` values, or `None` if fewer than `n` exist.
#[inline]
pub fn tail(values: &[f64], n: usize) -> Option<&[f64]> {
    values.len().checked_sub(n).map(|start| &values[start..])
}

/// Maximum of a slice. `None` for an empty slice.
#[inline]
pub fn max_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Minimum of a slice. `None` for an empty slice.
#[inline]
pub fn min_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Arithmetic mean. `None` for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (divisor `n - 1`). `None` for fewer than 2 values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

// ============================================================
// ROLLING AGGREGATES
// ============================================================

fn rolling<F>(values: &[f64], window: usize, agg: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                None
            } else {
                agg(&values[i + 1 - window..=i])
            }
        })
        .collect()
}

/// Rolling maximum over a trailing window.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, max_of)
}

/// Rolling minimum over a trailing window.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, min_of)
}

/// Rolling mean over a trailing window.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, mean)
}

/// Rolling sample standard deviation over a trailing window.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, sample_std)
}

/// Maximum over the defined values of a rolling series.
pub fn defined_max(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::max)
}

/// Minimum over the defined values of a rolling series.
pub fn defined_min(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::min)
}

// ============================================================
// PERCENT CHANGE / EMA
// ============================================================

/// Sum of the last `window` one-step percent changes:
/// `Σ_{i=n-w+1}^{n} (x_i - x_{i-1}) / x_{i-1}`.
///
/// Needs `window + 1` values. A zero denominator makes the sum undefined.
pub fn pct_change_sum(values: &[f64], window: usize) -> Option<f64> {
    let slice = tail(values, window + 1)?;
    slice.windows(2).try_fold(0.0, |acc, pair| {
        (pair[0] != 0.0).then(|| acc + (pair[1] - pair[0]) / pair[0])
    })
}

/// Exponential moving average with span `s` (`α = 2 / (s + 1)`).
///
/// Seeded with the first observation, not with a simple average of the first
/// `s` points, so the output has the same length as the input and the first
/// `s` values are pulled towards `values[0]`.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

// ============================================================
// PRICE COMPARISON
// ============================================================

/// How two price levels are compared when counting peaks and troughs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "epsilon", rename_all = "snake_case")]
pub enum PriceMatch {
    /// Bit-for-bit float equality.
    #[default]
    Exact,
    /// `|a - b| < epsilon * |a|`
    Relative(f64),
}

impl PriceMatch {
    #[inline]
    pub fn matches(self, reference: f64, candidate: f64) -> bool {
        match self {
            PriceMatch::Exact => reference == candidate,
            PriceMatch::Relative(eps) => (reference - candidate).abs() < eps * reference.abs(),
        }
    }
}
