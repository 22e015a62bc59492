//! Legacy chart pattern detectors
//!
//! Long-window rules (30, 40 or 60 bars) built from a trend flag, the close
//! dispersion and 10-bar rolling highs/lows. Kept as a separately named rule
//! set next to the canonical detectors; see `RuleSet::Legacy`.
//!
//! Rolling values are undefined for the first 9 bars of the tail, and a
//! comparison that reads an undefined value is false. Rules that compare
//! against `rolling[0]` therefore never fire; they are reproduced as-is.
//! Equality against a rolling extreme uses [`PriceMatch`], exact by default.

use super::helpers::{
    defined_gt, defined_lt, tail_closes, CONSOLIDATION_MAX_STD, LEGACY_ROLLING_WINDOW,
};
use crate::{
    window::{
        defined_max, defined_min, max_of, min_of, rolling_max, rolling_min, sample_std, PriceMatch,
    },
    AnalysisError, PatternDetector, PatternId, Result, RuleSet, OHLCV,
};

impl_with_defaults!(
    LegacyBullFlagDetector,
    LegacyBearFlagDetector,
    LegacyDoubleTopDetector,
    LegacyDoubleBottomDetector,
    LegacyHeadAndShouldersDetector,
    LegacyInverseHeadAndShouldersDetector,
    LegacyCupAndHandleDetector,
    LegacyAscendingTriangleDetector,
    LegacyDescendingTriangleDetector,
    LegacySymmetricalTriangleDetector,
    LegacyRisingWedgeDetector,
    LegacyFallingWedgeDetector,
    LegacyRectangleDetector,
    LegacyPennantDetector,
    LegacyRoundedBottomDetector,
    LegacyTripleTopDetector,
    LegacyTripleBottomDetector,
);

/// 10-bar rolling highs and lows of a tail.
struct Channel {
    highs: Vec<Option<f64>>,
    lows: Vec<Option<f64>>,
}

impl Channel {
    fn of(closes: &[f64]) -> Self {
        Self {
            highs: rolling_max(closes, LEGACY_ROLLING_WINDOW),
            lows: rolling_min(closes, LEGACY_ROLLING_WINDOW),
        }
    }

    fn first_high(&self) -> Option<f64> {
        self.highs.first().copied().flatten()
    }

    fn last_high(&self) -> Option<f64> {
        self.highs.last().copied().flatten()
    }

    fn first_low(&self) -> Option<f64> {
        self.lows.first().copied().flatten()
    }

    fn last_low(&self) -> Option<f64> {
        self.lows.last().copied().flatten()
    }
}

fn count_touches(closes: &[f64], level: f64, price_match: PriceMatch) -> usize {
    closes
        .iter()
        .filter(|&&p| price_match.matches(level, p))
        .count()
}

fn check_price_match(price_match: PriceMatch) -> Result<()> {
    match price_match {
        PriceMatch::Relative(eps) if !(eps > 0.0 && eps.is_finite()) => Err(
            AnalysisError::InvalidConfig(format!("price match epsilon must be > 0, got {eps}")),
        ),
        _ => Ok(()),
    }
}

/// Legacy detectors share one shape: a fixed tail length and a rule over it.
macro_rules! legacy_detector {
    ($detector:ident, $id:expr, $bars:expr) => {
        impl PatternDetector for $detector {
            fn id(&self) -> PatternId {
                $id
            }

            fn min_bars(&self) -> usize {
                $bars
            }

            fn rule_set(&self) -> RuleSet {
                RuleSet::Legacy
            }

            fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
                let closes = tail_closes(bars, $bars)?;
                self.rule(&closes)
            }

            fn validate_config(&self) -> Result<()> {
                self.check()
            }
        }
    };
}

// ============================================================
// FLAGS / PENNANT
// ============================================================

/// Bull Flag (30 bars): first close below last, close std under 0.01.
#[derive(Debug, Clone)]
pub struct LegacyBullFlagDetector {
    pub max_std: f64,
}

impl Default for LegacyBullFlagDetector {
    fn default() -> Self {
        Self {
            max_std: CONSOLIDATION_MAX_STD,
        }
    }
}

impl LegacyBullFlagDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        let uptrend = c.first()? < c.last()?;
        Some(uptrend && sample_std(c)? < self.max_std)
    }

    fn check(&self) -> Result<()> {
        check_max_std(self.max_std)
    }
}

legacy_detector!(LegacyBullFlagDetector, PatternId::BULL_FLAG, 30);

/// Bear Flag (30 bars): first close above last, close std under 0.01.
#[derive(Debug, Clone)]
pub struct LegacyBearFlagDetector {
    pub max_std: f64,
}

impl Default for LegacyBearFlagDetector {
    fn default() -> Self {
        Self {
            max_std: CONSOLIDATION_MAX_STD,
        }
    }
}

impl LegacyBearFlagDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        let downtrend = c.first()? > c.last()?;
        Some(downtrend && sample_std(c)? < self.max_std)
    }

    fn check(&self) -> Result<()> {
        check_max_std(self.max_std)
    }
}

legacy_detector!(LegacyBearFlagDetector, PatternId::BEAR_FLAG, 30);

/// Pennant (40 bars): same rule as the bull flag over a longer tail.
#[derive(Debug, Clone)]
pub struct LegacyPennantDetector {
    pub max_std: f64,
}

impl Default for LegacyPennantDetector {
    fn default() -> Self {
        Self {
            max_std: CONSOLIDATION_MAX_STD,
        }
    }
}

impl LegacyPennantDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        let trend = c.first()? < c.last()?;
        Some(trend && sample_std(c)? < self.max_std)
    }

    fn check(&self) -> Result<()> {
        check_max_std(self.max_std)
    }
}

legacy_detector!(LegacyPennantDetector, PatternId::PENNANT, 40);

fn check_max_std(max_std: f64) -> Result<()> {
    if !(max_std > 0.0 && max_std.is_finite()) {
        return Err(AnalysisError::InvalidConfig(format!(
            "consolidation std threshold must be > 0, got {max_std}"
        )));
    }
    Ok(())
}

fn check_range_ratio(ratio: f64) -> Result<()> {
    if !(ratio > 0.0 && ratio.is_finite()) {
        return Err(AnalysisError::InvalidConfig(format!(
            "max/min range ratio must be > 0, got {ratio}"
        )));
    }
    Ok(())
}

// ============================================================
// PEAK / TROUGH COUNTING
// ============================================================

macro_rules! touch_counter {
    ($detector:ident, $id:expr, $bars:expr, $touches:expr, $roll:ident, $extreme:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone)]
        pub struct $detector {
            pub min_touches: usize,
            pub price_match: PriceMatch,
        }

        impl Default for $detector {
            fn default() -> Self {
                Self {
                    min_touches: $touches,
                    price_match: PriceMatch::Exact,
                }
            }
        }

        impl $detector {
            fn rule(&self, c: &[f64]) -> Option<bool> {
                let level = $extreme(&$roll(c, LEGACY_ROLLING_WINDOW))?;
                Some(count_touches(c, level, self.price_match) >= self.min_touches)
            }

            fn check(&self) -> Result<()> {
                if self.min_touches == 0 {
                    return Err(AnalysisError::InvalidConfig(
                        "min_touches must be > 0".to_string(),
                    ));
                }
                check_price_match(self.price_match)
            }
        }

        legacy_detector!($detector, $id, $bars);
    };
}

touch_counter!(
    LegacyDoubleTopDetector,
    PatternId::DOUBLE_TOP,
    40,
    2,
    rolling_max,
    defined_max,
    "Double Top (40 bars): at least 2 closes equal to the highest rolling-10 max."
);

touch_counter!(
    LegacyDoubleBottomDetector,
    PatternId::DOUBLE_BOTTOM,
    40,
    2,
    rolling_min,
    defined_min,
    "Double Bottom (40 bars): at least 2 closes equal to the lowest rolling-10 min."
);

touch_counter!(
    LegacyTripleTopDetector,
    PatternId::TRIPLE_TOP,
    60,
    3,
    rolling_max,
    defined_max,
    "Triple Top (60 bars): at least 3 closes equal to the highest rolling-10 max."
);

touch_counter!(
    LegacyTripleBottomDetector,
    PatternId::TRIPLE_BOTTOM,
    60,
    3,
    rolling_min,
    defined_min,
    "Triple Bottom (60 bars): at least 3 closes equal to the lowest rolling-10 min."
);

// ============================================================
// RANGE RATIO
// ============================================================

/// Head and Shoulders (40 bars): `max(close) / min(close) > 1.2`.
#[derive(Debug, Clone)]
pub struct LegacyHeadAndShouldersDetector {
    pub min_range_ratio: f64,
}

impl Default for LegacyHeadAndShouldersDetector {
    fn default() -> Self {
        Self {
            min_range_ratio: 1.2,
        }
    }
}

impl LegacyHeadAndShouldersDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        Some(max_of(c)? / min_of(c)? > self.min_range_ratio)
    }

    fn check(&self) -> Result<()> {
        check_range_ratio(self.min_range_ratio)
    }
}

legacy_detector!(
    LegacyHeadAndShouldersDetector,
    PatternId::HEAD_AND_SHOULDERS,
    40
);

/// Inverse Head and Shoulders (40 bars): `max(close) / min(close) < 0.8`.
///
/// With positive prices the ratio is at least 1, so this never fires.
#[derive(Debug, Clone)]
pub struct LegacyInverseHeadAndShouldersDetector {
    pub max_range_ratio: f64,
}

impl Default for LegacyInverseHeadAndShouldersDetector {
    fn default() -> Self {
        Self {
            max_range_ratio: 0.8,
        }
    }
}

impl LegacyInverseHeadAndShouldersDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        Some(max_of(c)? / min_of(c)? < self.max_range_ratio)
    }

    fn check(&self) -> Result<()> {
        check_range_ratio(self.max_range_ratio)
    }
}

legacy_detector!(
    LegacyInverseHeadAndShouldersDetector,
    PatternId::INVERSE_HEAD_AND_SHOULDERS,
    40
);

// ============================================================
// CUP AND HANDLE / ROUNDED BOTTOM
// ============================================================

fn first_below_min_last_above(c: &[f64]) -> Option<bool> {
    let min = min_of(c)?;
    Some(*c.first()? < min && *c.last()? > min)
}

/// Cup and Handle (40 bars): `close[0] < min(close) and close[-1] > min(close)`.
#[derive(Debug, Clone, Default)]
pub struct LegacyCupAndHandleDetector;

impl LegacyCupAndHandleDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        first_below_min_last_above(c)
    }

    fn check(&self) -> Result<()> {
        Ok(())
    }
}

legacy_detector!(LegacyCupAndHandleDetector, PatternId::CUP_AND_HANDLE, 40);

/// Rounded Bottom (40 bars): same rule as the legacy cup and handle.
#[derive(Debug, Clone, Default)]
pub struct LegacyRoundedBottomDetector;

impl LegacyRoundedBottomDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        first_below_min_last_above(c)
    }

    fn check(&self) -> Result<()> {
        Ok(())
    }
}

legacy_detector!(LegacyRoundedBottomDetector, PatternId::ROUNDED_BOTTOM, 40);

// ============================================================
// CHANNEL RULES
// ============================================================

/// Ascending Triangle (40 bars): rolling low rises and the last rolling high
/// is the channel maximum.
#[derive(Debug, Clone, Default)]
pub struct LegacyAscendingTriangleDetector {
    pub price_match: PriceMatch,
}

impl LegacyAscendingTriangleDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        let ch = Channel::of(c);
        let higher_lows = defined_gt(ch.last_low(), ch.first_low());
        let flat_top = match (ch.last_high(), defined_max(&ch.highs)) {
            (Some(last), Some(top)) => self.price_match.matches(top, last),
            _ => false,
        };
        Some(higher_lows && flat_top)
    }

    fn check(&self) -> Result<()> {
        check_price_match(self.price_match)
    }
}

legacy_detector!(
    LegacyAscendingTriangleDetector,
    PatternId::ASCENDING_TRIANGLE,
    40
);

/// Descending Triangle (40 bars): rolling high falls and the last rolling
/// low is the channel minimum.
#[derive(Debug, Clone, Default)]
pub struct LegacyDescendingTriangleDetector {
    pub price_match: PriceMatch,
}

impl LegacyDescendingTriangleDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        let ch = Channel::of(c);
        let lower_highs = defined_lt(ch.last_high(), ch.first_high());
        let flat_bottom = match (ch.last_low(), defined_min(&ch.lows)) {
            (Some(last), Some(bottom)) => self.price_match.matches(bottom, last),
            _ => false,
        };
        Some(lower_highs && flat_bottom)
    }

    fn check(&self) -> Result<()> {
        check_price_match(self.price_match)
    }
}

legacy_detector!(
    LegacyDescendingTriangleDetector,
    PatternId::DESCENDING_TRIANGLE,
    40
);

#[derive(Debug, Clone, Default)]
pub struct LegacySymmetricalTriangleDetector;

impl LegacySymmetricalTriangleDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        let ch = Channel::of(c);
        Some(
            defined_gt(ch.last_low(), ch.first_low())
                && defined_lt(ch.last_high(), ch.first_high()),
        )
    }

    fn check(&self) -> Result<()> {
        Ok(())
    }
}

legacy_detector!(
    LegacySymmetricalTriangleDetector,
    PatternId::SYMMETRICAL_TRIANGLE,
    40
);

#[derive(Debug, Clone, Default)]
pub struct LegacyRisingWedgeDetector;

impl LegacyRisingWedgeDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        let ch = Channel::of(c);
        Some(
            defined_gt(ch.last_high(), ch.first_high())
                && defined_gt(ch.last_low(), ch.first_low()),
        )
    }

    fn check(&self) -> Result<()> {
        Ok(())
    }
}

legacy_detector!(LegacyRisingWedgeDetector, PatternId::RISING_WEDGE, 40);

#[derive(Debug, Clone, Default)]
pub struct LegacyFallingWedgeDetector;

impl LegacyFallingWedgeDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        let ch = Channel::of(c);
        Some(
            defined_lt(ch.last_high(), ch.first_high())
                && defined_lt(ch.last_low(), ch.first_low()),
        )
    }

    fn check(&self) -> Result<()> {
        Ok(())
    }
}

legacy_detector!(LegacyFallingWedgeDetector, PatternId::FALLING_WEDGE, 40);

/// Rectangle (40 bars): the last rolling high is the channel maximum and the
/// last rolling low is the channel minimum.
#[derive(Debug, Clone, Default)]
pub struct LegacyRectangleDetector {
    pub price_match: PriceMatch,
}

impl LegacyRectangleDetector {
    fn rule(&self, c: &[f64]) -> Option<bool> {
        let ch = Channel::of(c);
        let top = defined_max(&ch.highs)?;
        let bottom = defined_min(&ch.lows)?;
        let at_top = ch
            .last_high()
            .is_some_and(|h| self.price_match.matches(top, h));
        let at_bottom = ch
            .last_low()
            .is_some_and(|l| self.price_match.matches(bottom, l));
        Some(at_top && at_bottom)
    }

    fn check(&self) -> Result<()> {
        check_price_match(self.price_match)
    }
}

legacy_detector!(LegacyRectangleDetector, PatternId::RECTANGLE, 40);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn series(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(i as i64, c, c, c, c, 1000.0))
            .collect()
    }

    fn detected<D: PatternDetector>(d: &D, closes: &[f64]) -> bool {
        d.detect(&series(closes)).detected
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.9).sin() * 5.0).collect()
    }

    #[test]
    fn test_double_top_exact_touches() {
        let mut closes = vec![100.0; 40];
        for (i, c) in closes.iter_mut().enumerate() {
            *c = 90.0 + (i % 7) as f64;
        }
        closes[12] = 120.0;
        assert!(!detected(&LegacyDoubleTopDetector::default(), &closes));
        closes[31] = 120.0;
        assert!(detected(&LegacyDoubleTopDetector::default(), &closes));
    }

    #[test]
    fn test_double_top_relative_match() {
        let mut closes = vec![95.0; 40];
        closes[10] = 120.0;
        closes[30] = 119.9;
        assert!(!detected(&LegacyDoubleTopDetector::default(), &closes));

        let tolerant = LegacyDoubleTopDetector {
            price_match: PriceMatch::Relative(0.01),
            ..Default::default()
        };
        assert!(detected(&tolerant, &closes));
    }

    #[test]
    fn test_double_bottom_and_triples() {
        let mut closes = vec![100.0; 60];
        for (i, c) in closes.iter_mut().enumerate() {
            *c = 100.0 + (i % 5) as f64;
        }
        closes[5] = 80.0;
        closes[25] = 80.0;
        closes[45] = 80.0;

        // the 40-bar tail only holds two of the troughs
        assert!(detected(&LegacyDoubleBottomDetector::default(), &closes));
        assert!(detected(&LegacyTripleBottomDetector::default(), &closes));

        closes[50] = 130.0;
        assert!(!detected(&LegacyTripleTopDetector::default(), &closes));
    }

    #[test]
    fn test_flags_need_tight_consolidation() {
        let tight: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.0001).collect();
        assert!(detected(&LegacyBullFlagDetector::default(), &tight));
        assert!(!detected(&LegacyBearFlagDetector::default(), &tight));

        let loose: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert!(!detected(&LegacyBullFlagDetector::default(), &loose));

        let tight40: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.0001).collect();
        assert!(detected(&LegacyPennantDetector::default(), &tight40));
    }

    #[test]
    fn test_head_and_shoulders_range_ratio() {
        let mut closes = vec![100.0; 40];
        closes[20] = 125.0;
        assert!(detected(&LegacyHeadAndShouldersDetector::default(), &closes));
        closes[20] = 115.0;
        assert!(!detected(&LegacyHeadAndShouldersDetector::default(), &closes));
        assert!(!detected(
            &LegacyInverseHeadAndShouldersDetector::default(),
            &closes
        ));
    }

    #[test]
    fn test_min_based_rules_cannot_fire() {
        let closes = wave(40);
        assert!(!detected(&LegacyCupAndHandleDetector, &closes));
        assert!(!detected(&LegacyRoundedBottomDetector, &closes));
    }

    #[test]
    fn test_first_rolling_value_is_undefined() {
        let rising: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        assert!(!detected(&LegacyAscendingTriangleDetector::default(), &rising));
        assert!(!detected(&LegacyRisingWedgeDetector, &rising));
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert!(!detected(&LegacyFallingWedgeDetector, &falling));
        assert!(!detected(&LegacyDescendingTriangleDetector::default(), &falling));
        assert!(!detected(&LegacySymmetricalTriangleDetector, &wave(40)));
    }

    #[test]
    fn test_rectangle() {
        let mut closes = vec![100.0; 40];
        closes[33] = 110.0;
        closes[36] = 90.0;
        assert!(detected(&LegacyRectangleDetector::default(), &closes));

        closes[5] = 111.0;
        assert!(!detected(&LegacyRectangleDetector::default(), &closes));
    }

    #[test]
    fn test_short_tail_not_detected() {
        let closes = vec![100.0; 39];
        assert!(!detected(&LegacyHeadAndShouldersDetector::default(), &closes));
        let closes = vec![100.0; 59];
        assert!(!detected(&LegacyTripleTopDetector::default(), &closes));
    }

    #[test]
    fn test_rule_set_and_validation() {
        assert_eq!(
            LegacyDoubleTopDetector::default().rule_set(),
            RuleSet::Legacy
        );
        let bad = LegacyDoubleTopDetector {
            min_touches: 0,
            ..Default::default()
        };
        assert!(bad.validate_config().is_err());
        let bad_eps = LegacyRectangleDetector {
            price_match: PriceMatch::Relative(-1.0),
        };
        assert!(bad_eps.validate_config().is_err());
        let bad_std = LegacyBullFlagDetector { max_std: 0.0 };
        assert!(bad_std.validate_config().is_err());
    }

    #[test]
    fn test_range_ratio_validation() {
        assert!(LegacyHeadAndShouldersDetector::default()
            .validate_config()
            .is_ok());
        assert!(LegacyInverseHeadAndShouldersDetector::default()
            .validate_config()
            .is_ok());

        for ratio in [0.0, -1.2, f64::NAN, f64::INFINITY] {
            let hs = LegacyHeadAndShouldersDetector {
                min_range_ratio: ratio,
            };
            assert!(hs.validate_config().is_err(), "{ratio}");
            let inverse = LegacyInverseHeadAndShouldersDetector {
                max_range_ratio: ratio,
            };
            assert!(inverse.validate_config().is_err(), "{ratio}");
        }
    }
}
