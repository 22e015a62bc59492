//! Canonical chart pattern detectors
//!
//! Short-window rules (10 to 20 bars) built from percent moves, near-equal
//! levels and an explicit breakout confirmation bar. The confirmation bar is
//! the last close of the tail; every level it is confirmed against is taken
//! from the bars *before* it.

use super::helpers::{
    span, strictly_falling, strictly_rising, tail_closes, FLAGPOLE_MIN_MOVE, NEAR_TOLERANCE,
};
use crate::{
    window::{max_of, mean, min_of, pct_change_sum, sample_std, PriceMatch},
    AnalysisError, PatternDetector, PatternId, Ratio, Result, OHLCV,
};

impl_with_defaults!(
    BullFlagDetector,
    BearFlagDetector,
    DoubleTopDetector,
    DoubleBottomDetector,
    HeadAndShouldersDetector,
    InverseHeadAndShouldersDetector,
    CupAndHandleDetector,
    AscendingTriangleDetector,
    DescendingTriangleDetector,
    SymmetricalTriangleDetector,
    RisingWedgeDetector,
    FallingWedgeDetector,
    RectangleDetector,
    PennantDetector,
    RoundedBottomDetector,
    TripleTopDetector,
    TripleBottomDetector,
);

fn check_tolerance(tolerance: Ratio) -> Result<()> {
    if tolerance.get() <= 0.0 {
        return Err(AnalysisError::InvalidConfig(
            "level tolerance must be > 0".to_string(),
        ));
    }
    Ok(())
}

// ============================================================
// FLAGS
// ============================================================

/// Bull Flag: strong 10-bar rise, a lower-averaging flag, breakout above it.
#[derive(Debug, Clone)]
pub struct BullFlagDetector {
    /// Summed percent change the flagpole must exceed
    pub min_pole_move: Ratio,
}

impl Default for BullFlagDetector {
    fn default() -> Self {
        Self {
            min_pole_move: Ratio::new_const(FLAGPOLE_MIN_MOVE),
        }
    }
}

impl PatternDetector for BullFlagDetector {
    fn id(&self) -> PatternId {
        PatternId::BULL_FLAG
    }

    fn min_bars(&self) -> usize {
        10
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 10)?;
        let last = *c.last()?;

        let flagpole = pct_change_sum(&c, 9)? > self.min_pole_move.get();
        let consolidation = mean(span(&c, 5, 0))? < mean(span(&c, 10, 5))?;
        let breakout = last > max_of(span(&c, 5, 1))?;

        Some(flagpole && consolidation && breakout)
    }
}

/// Bear Flag: strong 10-bar fall, a higher-averaging flag, breakdown below it.
#[derive(Debug, Clone)]
pub struct BearFlagDetector {
    /// Summed percent change the flagpole must fall below (negated)
    pub min_pole_move: Ratio,
}

impl Default for BearFlagDetector {
    fn default() -> Self {
        Self {
            min_pole_move: Ratio::new_const(FLAGPOLE_MIN_MOVE),
        }
    }
}

impl PatternDetector for BearFlagDetector {
    fn id(&self) -> PatternId {
        PatternId::BEAR_FLAG
    }

    fn min_bars(&self) -> usize {
        10
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 10)?;
        let last = *c.last()?;

        let flagpole = pct_change_sum(&c, 9)? < -self.min_pole_move.get();
        let consolidation = mean(span(&c, 5, 0))? > mean(span(&c, 10, 5))?;
        let breakdown = last < min_of(span(&c, 5, 1))?;

        Some(flagpole && consolidation && breakdown)
    }
}

// ============================================================
// DOUBLE TOP / BOTTOM
// ============================================================

/// Double Top: two near-equal peaks in consecutive 5-bar halves, then a close
/// below the first half's low (neckline).
#[derive(Debug, Clone)]
pub struct DoubleTopDetector {
    pub tolerance: Ratio,
}

impl Default for DoubleTopDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(NEAR_TOLERANCE),
        }
    }
}

impl PatternDetector for DoubleTopDetector {
    fn id(&self) -> PatternId {
        PatternId::DOUBLE_TOP
    }

    fn min_bars(&self) -> usize {
        10
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 10)?;
        let last = *c.last()?;

        let resistance = max_of(span(&c, 10, 5))?;
        let second_peak = max_of(span(&c, 5, 0))?;
        let neckline = min_of(span(&c, 10, 5))?;

        let near = PriceMatch::Relative(self.tolerance.get()).matches(resistance, second_peak);
        Some(near && last < neckline)
    }

    fn validate_config(&self) -> Result<()> {
        check_tolerance(self.tolerance)
    }
}

/// Double Bottom: two near-equal troughs, then a close above the first
/// half's high.
#[derive(Debug, Clone)]
pub struct DoubleBottomDetector {
    pub tolerance: Ratio,
}

impl Default for DoubleBottomDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(NEAR_TOLERANCE),
        }
    }
}

impl PatternDetector for DoubleBottomDetector {
    fn id(&self) -> PatternId {
        PatternId::DOUBLE_BOTTOM
    }

    fn min_bars(&self) -> usize {
        10
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 10)?;
        let last = *c.last()?;

        let support = min_of(span(&c, 10, 5))?;
        let second_trough = min_of(span(&c, 5, 0))?;
        let neckline = max_of(span(&c, 10, 5))?;

        let near = PriceMatch::Relative(self.tolerance.get()).matches(support, second_trough);
        Some(near && last > neckline)
    }

    fn validate_config(&self) -> Result<()> {
        check_tolerance(self.tolerance)
    }
}

// ============================================================
// HEAD AND SHOULDERS
// ============================================================

/// Head and Shoulders over three 5-bar segments: the middle peak tops both
/// shoulders and the last close breaks the neckline.
#[derive(Debug, Clone, Default)]
pub struct HeadAndShouldersDetector;

impl PatternDetector for HeadAndShouldersDetector {
    fn id(&self) -> PatternId {
        PatternId::HEAD_AND_SHOULDERS
    }

    fn min_bars(&self) -> usize {
        15
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 15)?;
        let last = *c.last()?;

        let left_shoulder = max_of(span(&c, 15, 10))?;
        let head = max_of(span(&c, 10, 5))?;
        let right_shoulder = max_of(span(&c, 5, 0))?;
        let neckline = min_of(span(&c, 15, 10))?.min(min_of(span(&c, 5, 1))?);

        Some(head > left_shoulder && head > right_shoulder && last < neckline)
    }
}

/// Inverse Head and Shoulders: the middle trough undercuts both shoulders
/// and the last close clears the neckline.
#[derive(Debug, Clone, Default)]
pub struct InverseHeadAndShouldersDetector;

impl PatternDetector for InverseHeadAndShouldersDetector {
    fn id(&self) -> PatternId {
        PatternId::INVERSE_HEAD_AND_SHOULDERS
    }

    fn min_bars(&self) -> usize {
        15
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 15)?;
        let last = *c.last()?;

        let left_shoulder = min_of(span(&c, 15, 10))?;
        let head = min_of(span(&c, 10, 5))?;
        let right_shoulder = min_of(span(&c, 5, 0))?;
        let neckline = max_of(span(&c, 15, 10))?.max(max_of(span(&c, 5, 1))?);

        Some(head < left_shoulder && head < right_shoulder && last > neckline)
    }
}

// ============================================================
// CUP AND HANDLE
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct CupAndHandleDetector;

impl PatternDetector for CupAndHandleDetector {
    fn id(&self) -> PatternId {
        PatternId::CUP_AND_HANDLE
    }

    fn min_bars(&self) -> usize {
        20
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 20)?;
        let last = *c.last()?;

        let cup_window = span(&c, 20, 10);
        let cup_mean = mean(cup_window)?;
        let cup = min_of(cup_window)? < cup_mean;
        let handle = mean(span(&c, 10, 0))? < cup_mean;
        let breakout = last > max_of(span(&c, 10, 1))?;

        Some(cup && handle && breakout)
    }
}

// ============================================================
// TRIANGLES
// ============================================================

/// Ascending Triangle: ten consecutive higher closes, then a close above
/// the resistance they formed.
#[derive(Debug, Clone, Default)]
pub struct AscendingTriangleDetector;

impl PatternDetector for AscendingTriangleDetector {
    fn id(&self) -> PatternId {
        PatternId::ASCENDING_TRIANGLE
    }

    fn min_bars(&self) -> usize {
        11
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 11)?;
        let last = *c.last()?;

        let higher_lows = strictly_rising(span(&c, 11, 1));
        let resistance = max_of(span(&c, 10, 1))?;

        Some(higher_lows && last > resistance)
    }
}

/// Descending Triangle: ten consecutive lower closes, then a close below
/// the support they formed.
#[derive(Debug, Clone, Default)]
pub struct DescendingTriangleDetector;

impl PatternDetector for DescendingTriangleDetector {
    fn id(&self) -> PatternId {
        PatternId::DESCENDING_TRIANGLE
    }

    fn min_bars(&self) -> usize {
        11
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 11)?;
        let last = *c.last()?;

        let lower_highs = strictly_falling(span(&c, 11, 1));
        let support = min_of(span(&c, 10, 1))?;

        Some(lower_highs && last < support)
    }
}

/// Symmetrical Triangle: lower highs then higher lows, then a break out of
/// the last four bars' range in either direction.
#[derive(Debug, Clone, Default)]
pub struct SymmetricalTriangleDetector;

impl PatternDetector for SymmetricalTriangleDetector {
    fn id(&self) -> PatternId {
        PatternId::SYMMETRICAL_TRIANGLE
    }

    fn min_bars(&self) -> usize {
        11
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 11)?;
        let last = *c.last()?;

        let lower_highs = strictly_falling(span(&c, 11, 5));
        let higher_lows = strictly_rising(span(&c, 6, 1));
        let range = span(&c, 5, 1);
        let breakout = last > max_of(range)? || last < min_of(range)?;

        Some(lower_highs && higher_lows && breakout)
    }
}

// ============================================================
// WEDGES
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct RisingWedgeDetector;

impl PatternDetector for RisingWedgeDetector {
    fn id(&self) -> PatternId {
        PatternId::RISING_WEDGE
    }

    fn min_bars(&self) -> usize {
        11
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 11)?;
        let last = *c.last()?;

        let higher_highs = strictly_rising(span(&c, 11, 5));
        let higher_lows = strictly_rising(span(&c, 6, 1));
        let breakdown = last < min_of(span(&c, 5, 1))?;

        Some(higher_highs && higher_lows && breakdown)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FallingWedgeDetector;

impl PatternDetector for FallingWedgeDetector {
    fn id(&self) -> PatternId {
        PatternId::FALLING_WEDGE
    }

    fn min_bars(&self) -> usize {
        11
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 11)?;
        let last = *c.last()?;

        let lower_highs = strictly_falling(span(&c, 11, 5));
        let lower_lows = strictly_falling(span(&c, 6, 1));
        let breakout = last > max_of(span(&c, 5, 1))?;

        Some(lower_highs && lower_lows && breakout)
    }
}

// ============================================================
// RECTANGLE / PENNANT / ROUNDED BOTTOM
// ============================================================

/// Rectangle: the last close leaves the nine-bar support/resistance band.
#[derive(Debug, Clone, Default)]
pub struct RectangleDetector;

impl PatternDetector for RectangleDetector {
    fn id(&self) -> PatternId {
        PatternId::RECTANGLE
    }

    fn min_bars(&self) -> usize {
        10
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 10)?;
        let last = *c.last()?;

        let band = span(&c, 10, 1);
        Some(last > max_of(band)? || last < min_of(band)?)
    }
}

/// Pennant: a flagpole in the first half, a tighter second half, breakout
/// above the second half.
#[derive(Debug, Clone)]
pub struct PennantDetector {
    pub min_pole_move: Ratio,
}

impl Default for PennantDetector {
    fn default() -> Self {
        Self {
            min_pole_move: Ratio::new_const(FLAGPOLE_MIN_MOVE),
        }
    }
}

impl PatternDetector for PennantDetector {
    fn id(&self) -> PatternId {
        PatternId::PENNANT
    }

    fn min_bars(&self) -> usize {
        20
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 20)?;
        let last = *c.last()?;

        let pole = span(&c, 20, 10);
        let flagpole = pct_change_sum(pole, 9)? > self.min_pole_move.get();
        let consolidation = sample_std(span(&c, 10, 0))? < sample_std(pole)?;
        let breakout = last > max_of(span(&c, 10, 1))?;

        Some(flagpole && consolidation && breakout)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoundedBottomDetector;

impl PatternDetector for RoundedBottomDetector {
    fn id(&self) -> PatternId {
        PatternId::ROUNDED_BOTTOM
    }

    fn min_bars(&self) -> usize {
        20
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 20)?;
        let last = *c.last()?;

        let downtrend = mean(span(&c, 20, 10))? > mean(span(&c, 10, 0))?;
        let breakout = last > max_of(span(&c, 10, 1))?;

        Some(downtrend && breakout)
    }
}

// ============================================================
// TRIPLE TOP / BOTTOM
// ============================================================

/// Triple Top: at least three closes near the 14-bar high, then a close
/// below the 14-bar low.
#[derive(Debug, Clone)]
pub struct TripleTopDetector {
    pub tolerance: Ratio,
}

impl Default for TripleTopDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(NEAR_TOLERANCE),
        }
    }
}

impl PatternDetector for TripleTopDetector {
    fn id(&self) -> PatternId {
        PatternId::TRIPLE_TOP
    }

    fn min_bars(&self) -> usize {
        15
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 15)?;
        let last = *c.last()?;

        let body = span(&c, 15, 1);
        let resistance = max_of(body)?;
        let neckline = min_of(body)?;
        let near = PriceMatch::Relative(self.tolerance.get());
        let touches = body.iter().filter(|&&p| near.matches(resistance, p)).count();

        Some(touches >= 3 && last < neckline)
    }

    fn validate_config(&self) -> Result<()> {
        check_tolerance(self.tolerance)
    }
}

/// Triple Bottom: at least three closes near the 14-bar low, then a close
/// above the 14-bar high.
#[derive(Debug, Clone)]
pub struct TripleBottomDetector {
    pub tolerance: Ratio,
}

impl Default for TripleBottomDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(NEAR_TOLERANCE),
        }
    }
}

impl PatternDetector for TripleBottomDetector {
    fn id(&self) -> PatternId {
        PatternId::TRIPLE_BOTTOM
    }

    fn min_bars(&self) -> usize {
        15
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
        let c = tail_closes(bars, 15)?;
        let last = *c.last()?;

        let body = span(&c, 15, 1);
        let support = min_of(body)?;
        let neckline = max_of(body)?;
        let near = PriceMatch::Relative(self.tolerance.get());
        let touches = body.iter().filter(|&&p| near.matches(support, p)).count();

        Some(touches >= 3 && last > neckline)
    }

    fn validate_config(&self) -> Result<()> {
        check_tolerance(self.tolerance)
    }
}
