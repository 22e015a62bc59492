//! Common helper functions for chart pattern detection
//!
//! Tail extraction and the small comparisons shared by both rule sets.

use crate::OHLCV;

// ============================================================
// DEFAULT THRESHOLDS
// ============================================================

/// Minimum summed percent move for a flagpole (10%).
pub const FLAGPOLE_MIN_MOVE: f64 = 0.1;
/// Two levels are "near" when `|a - b| < NEAR_TOLERANCE * a`.
pub const NEAR_TOLERANCE: f64 = 0.01;
/// Close-price standard deviation below which a tail counts as consolidating.
pub const CONSOLIDATION_MAX_STD: f64 = 0.01;
/// Rolling window used by the legacy peak/trough and channel rules.
pub const LEGACY_ROLLING_WINDOW: usize = 10;

// ============================================================
// TAIL ACCESS
// ============================================================

/// Closes of the last `n` bars, or `None` if the series is shorter than `n`.
#[inline]
pub fn tail_closes<T: OHLCV>(bars: &[T], n: usize) -> Option<Vec<f64>> {
    let start = bars.len().checked_sub(n)?;
    Some(bars[start..].iter().map(|b| b.close()).collect())
}

/// Slice counted from the end: `span(c, 10, 5)` is `c[-10:-5]`,
/// `span(c, 5, 0)` is `c[-5:]`.
#[inline]
pub fn span(values: &[f64], from_end: usize, to_end: usize) -> &[f64] {
    let n = values.len();
    &values[n.saturating_sub(from_end)..n.saturating_sub(to_end)]
}

/// Every step strictly up.
#[inline]
pub fn strictly_rising(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] > w[0])
}

/// Every step strictly down.
#[inline]
pub fn strictly_falling(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] < w[0])
}

// ============================================================
// UNDEFINED-AWARE COMPARISONS
// ============================================================
// A rolling value is `None` until its window fills. Any comparison that
// touches an undefined value is false.

#[inline]
pub fn defined_gt(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

#[inline]
pub fn defined_lt(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}
