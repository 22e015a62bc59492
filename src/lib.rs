//! # chartfuse - chart pattern and signal fusion
//!
//! Deterministic technical analysis over an OHLCV series: indicators, chart
//! pattern detectors, strategy signal scanners and a decision list that fuses
//! them with a sentiment score into BUY / SELL / HOLD.
//!
//! ## Quick Start
//!
//! ```rust
//! use chartfuse::prelude::*;
//!
//! let bars: Vec<Bar> = (0..60)
//!     .map(|i| {
//!         let c = 100.0 + (i as f64 * 0.3).sin();
//!         Bar::new(i, c, c + 0.5, c - 0.5, c, 1_000.0)
//!     })
//!     .collect();
//!
//! // Canonical detectors plus every strategy scanner
//! let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
//!
//! let analysis = engine.analyze(&bars, Some(0.05)).unwrap();
//! println!("{}", analysis.recommendation);
//! ```

pub mod detectors;
pub mod fusion;
pub mod indicators;
pub mod params;
pub mod report;
pub mod sentiment;
pub mod strategies;
pub mod window;

pub use detectors::RuleSet;

pub mod prelude {
    pub use crate::{
        // Parallel
        analyze_parallel,
        // Detectors
        detectors::*,
        // Fusion
        fusion::{Action, DecisionRule, FusionInputs, FusionRules, Recommendation},
        indicators::IndicatorSnapshot,
        // Parameters
        params::{EngineConfig, IndicatorParams, ParamMeta, ParamType, Parameterized, StrategyParams},
        report::AnalysisReport,
        sentiment::{mean_sentiment, SentimentScorer},
        strategies::*,
        // Engine
        Analysis,
        AnalysisEngine,
        // Errors
        AnalysisError,
        AnalysisFailure,
        Bar,
        BuiltinDetector,
        BuiltinStrategy,
        Direction,
        // Core traits
        DynPatternDetector,
        EngineBuilder,
        OHLCVExt,
        PatternDetector,
        PatternId,
        PatternSignal,
        Period,
        Ratio,
        Result,
        SignalEvent,
        StrategyId,
        StrategyScanner,
        SymbolAnalysis,
        OHLCV,
    };
}

use tracing::{debug, warn};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors raised by configuration and series validation.
///
/// Insufficient data is never an error: detectors report `false`, scanners
/// report no events and indicators report `None`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Timestamp at index {index} ({current}) does not follow {previous}")]
    NonAscendingTimestamp {
        index: usize,
        previous: i64,
        current: i64,
    },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(AnalysisError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(AnalysisError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period or span in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(AnalysisError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
///
/// `timestamp` is an opaque ordering key (epoch seconds, bar number, ...).
/// A series must be strictly ascending by it.
pub trait OHLCV {
    fn timestamp(&self) -> i64;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Blanket impl for references to dyn OHLCV
impl OHLCV for &dyn OHLCV {
    fn timestamp(&self) -> i64 {
        (*self).timestamp()
    }

    fn open(&self) -> f64 {
        (*self).open()
    }

    fn high(&self) -> f64 {
        (*self).high()
    }

    fn low(&self) -> f64 {
        (*self).low()
    }

    fn close(&self) -> f64 {
        (*self).close()
    }

    fn volume(&self) -> f64 {
        (*self).volume()
    }
}

/// One OHLCV observation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Copy any OHLCV source into a `Bar`.
    pub fn from_ohlcv<T: OHLCV + ?Sized>(bar: &T) -> Self {
        Self::new(
            bar.timestamp(),
            bar.open(),
            bar.high(),
            bar.low(),
            bar.close(),
            bar.volume(),
        )
    }
}

impl OHLCV for Bar {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Extension trait with bar-level checks
pub trait OHLCVExt: OHLCV {
    /// Validate a single bar. The reported index is 0; [`validate_series`]
    /// rewrites it to the bar's position.
    ///
    /// Prices must be finite and positive, volume finite and non-negative.
    /// With `enforce_envelope`, `low <= min(open, close)` and
    /// `max(open, close) <= high` must also hold.
    fn validate(&self, enforce_envelope: bool) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(AnalysisError::InvalidBar {
                index: 0,
                reason: "non-finite price",
            });
        }
        if prices.iter().any(|&p| p <= 0.0) {
            return Err(AnalysisError::InvalidBar {
                index: 0,
                reason: "non-positive price",
            });
        }
        if !self.volume().is_finite() {
            return Err(AnalysisError::InvalidBar {
                index: 0,
                reason: "non-finite volume",
            });
        }
        if self.volume() < 0.0 {
            return Err(AnalysisError::InvalidBar {
                index: 0,
                reason: "negative volume",
            });
        }
        if enforce_envelope {
            if self.high() < self.low() {
                return Err(AnalysisError::InvalidBar {
                    index: 0,
                    reason: "high < low",
                });
            }
            if self.low() > self.open().min(self.close())
                || self.high() < self.open().max(self.close())
            {
                return Err(AnalysisError::InvalidBar {
                    index: 0,
                    reason: "open/close outside the high-low range",
                });
            }
        }
        Ok(())
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

/// Reject a malformed series before any detector runs.
///
/// Checks every bar (see [`OHLCVExt::validate`]) and that timestamps are
/// strictly ascending, which also rules out duplicates.
pub fn validate_series<T: OHLCV>(bars: &[T], enforce_envelope: bool) -> Result<()> {
    let mut previous: Option<i64> = None;
    for (i, bar) in bars.iter().enumerate() {
        bar.validate(enforce_envelope).map_err(|e| match e {
            AnalysisError::InvalidBar { reason, .. } => {
                AnalysisError::InvalidBar { index: i, reason }
            }
            other => other,
        })?;

        let current = bar.timestamp();
        if let Some(previous) = previous {
            if current <= previous {
                return Err(AnalysisError::NonAscendingTimestamp {
                    index: i,
                    previous,
                    current,
                });
            }
        }
        previous = Some(current);
    }
    Ok(())
}

// ============================================================
// SIGNALS
// ============================================================

/// Unique identifier for a chart pattern; the string is its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternId(pub &'static str);

impl PatternId {
    pub const BULL_FLAG: Self = Self("Bull Flag");
    pub const BEAR_FLAG: Self = Self("Bear Flag");
    pub const DOUBLE_TOP: Self = Self("Double Top");
    pub const DOUBLE_BOTTOM: Self = Self("Double Bottom");
    pub const HEAD_AND_SHOULDERS: Self = Self("Head and Shoulders");
    pub const INVERSE_HEAD_AND_SHOULDERS: Self = Self("Inverse Head and Shoulders");
    pub const CUP_AND_HANDLE: Self = Self("Cup and Handle");
    pub const ASCENDING_TRIANGLE: Self = Self("Ascending Triangle");
    pub const DESCENDING_TRIANGLE: Self = Self("Descending Triangle");
    pub const SYMMETRICAL_TRIANGLE: Self = Self("Symmetrical Triangle");
    pub const RISING_WEDGE: Self = Self("Rising Wedge");
    pub const FALLING_WEDGE: Self = Self("Falling Wedge");
    pub const RECTANGLE: Self = Self("Rectangle");
    pub const PENNANT: Self = Self("Pennant");
    pub const ROUNDED_BOTTOM: Self = Self("Rounded Bottom");
    pub const TRIPLE_TOP: Self = Self("Triple Top");
    pub const TRIPLE_BOTTOM: Self = Self("Triple Bottom");

    /// Catalog order, shared by both rule sets.
    pub const ALL: [Self; 17] = [
        Self::BULL_FLAG,
        Self::BEAR_FLAG,
        Self::DOUBLE_TOP,
        Self::DOUBLE_BOTTOM,
        Self::HEAD_AND_SHOULDERS,
        Self::INVERSE_HEAD_AND_SHOULDERS,
        Self::CUP_AND_HANDLE,
        Self::ASCENDING_TRIANGLE,
        Self::DESCENDING_TRIANGLE,
        Self::SYMMETRICAL_TRIANGLE,
        Self::RISING_WEDGE,
        Self::FALLING_WEDGE,
        Self::RECTANGLE,
        Self::PENNANT,
        Self::ROUNDED_BOTTOM,
        Self::TRIPLE_TOP,
        Self::TRIPLE_BOTTOM,
    ];

    /// Returns the string identifier
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Returns the typical/expected direction of this pattern.
    ///
    /// - `Some(Direction::Bullish)` - pattern typically signals bullish moves
    /// - `Some(Direction::Bearish)` - pattern typically signals bearish moves
    /// - `Some(Direction::Neutral)` - breakout direction decides (symmetrical
    ///   triangle, rectangle)
    /// - `None` - the pattern is not part of the builtin catalog
    pub fn typical_direction(&self) -> Option<Direction> {
        match self.0 {
            "Bull Flag"
            | "Double Bottom"
            | "Inverse Head and Shoulders"
            | "Cup and Handle"
            | "Ascending Triangle"
            | "Falling Wedge"
            | "Pennant"
            | "Rounded Bottom"
            | "Triple Bottom" => Some(Direction::Bullish),
            "Bear Flag"
            | "Double Top"
            | "Head and Shoulders"
            | "Descending Triangle"
            | "Rising Wedge"
            | "Triple Top" => Some(Direction::Bearish),
            "Symmetrical Triangle" | "Rectangle" => Some(Direction::Neutral),
            _ => None,
        }
    }

    /// Returns true if this pattern can break either way
    pub fn is_bidirectional(&self) -> bool {
        matches!(self.typical_direction(), Some(Direction::Neutral))
    }

    pub fn is_typically_bullish(&self) -> bool {
        matches!(self.typical_direction(), Some(Direction::Bullish))
    }

    pub fn is_typically_bearish(&self) -> bool {
        matches!(self.typical_direction(), Some(Direction::Bearish))
    }
}

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl serde::Serialize for PatternId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.0)
    }
}

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

/// Result of one pattern detector - Copy, no allocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PatternSignal {
    pub pattern: PatternId,
    pub detected: bool,
}

/// Identifier of a strategy scanner; the string is its signal name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrategyId(pub &'static str);

impl StrategyId {
    pub const BREAKOUT: Self = Self("Breakout");
    pub const VWAP_BOUNCE: Self = Self("VWAP Bounce");
    pub const EMA_CROSSOVER: Self = Self("EMA Crossover");
    pub const ABCD: Self = Self("ABCD Pattern");
    pub const UNUSUAL_VOLUME: Self = Self("Unusual Volume");

    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl serde::Serialize for StrategyId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.0)
    }
}

/// One event emitted by a strategy scanner at a specific bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SignalEvent {
    pub timestamp: i64,
    pub index: usize,
    pub strategy: StrategyId,
    pub label: &'static str,
}

// ============================================================
// DETECTOR / SCANNER TRAITS
// ============================================================

/// Generic pattern detector trait - for concrete types
pub trait PatternDetector: Send + Sync {
    fn id(&self) -> PatternId;

    /// Length of the tail the rule reads.
    fn min_bars(&self) -> usize;

    /// Evaluate the rule on the tail of `bars`. `None` means insufficient data.
    fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool>;

    /// Evaluate and wrap the outcome; insufficient data is "not detected".
    fn detect<T: OHLCV>(&self, bars: &[T]) -> PatternSignal {
        PatternSignal {
            pattern: self.id(),
            detected: self.evaluate(bars).unwrap_or(false),
        }
    }

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    fn rule_set(&self) -> RuleSet {
        RuleSet::Canonical
    }
}

/// Object-safe pattern detector trait - for custom detectors
pub trait DynPatternDetector: Send + Sync {
    fn id(&self) -> PatternId;
    fn min_bars(&self) -> usize;
    fn detect(&self, bars: &[&dyn OHLCV]) -> PatternSignal;
    fn validate_config(&self) -> Result<()>;
}

impl<D: PatternDetector> DynPatternDetector for D {
    fn id(&self) -> PatternId {
        PatternDetector::id(self)
    }

    fn min_bars(&self) -> usize {
        PatternDetector::min_bars(self)
    }

    fn detect(&self, bars: &[&dyn OHLCV]) -> PatternSignal {
        PatternDetector::detect(self, bars)
    }

    fn validate_config(&self) -> Result<()> {
        PatternDetector::validate_config(self)
    }
}

/// Whole-series scanner emitting zero or more events.
pub trait StrategyScanner: Send + Sync {
    fn id(&self) -> StrategyId;
    fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<SignalEvent>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;
use strategies::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(&self, bars: &[T]) -> PatternSignal {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars)),*
                }
            }

            #[inline]
            pub fn id(&self) -> PatternId {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            #[inline]
            pub fn rule_set(&self) -> RuleSet {
                match self {
                    $(Self::$variant(d) => PatternDetector::rule_set(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Canonical (17)
    BullFlag(BullFlagDetector),
    BearFlag(BearFlagDetector),
    DoubleTop(DoubleTopDetector),
    DoubleBottom(DoubleBottomDetector),
    HeadAndShoulders(HeadAndShouldersDetector),
    InverseHeadAndShoulders(InverseHeadAndShouldersDetector),
    CupAndHandle(CupAndHandleDetector),
    AscendingTriangle(AscendingTriangleDetector),
    DescendingTriangle(DescendingTriangleDetector),
    SymmetricalTriangle(SymmetricalTriangleDetector),
    RisingWedge(RisingWedgeDetector),
    FallingWedge(FallingWedgeDetector),
    Rectangle(RectangleDetector),
    Pennant(PennantDetector),
    RoundedBottom(RoundedBottomDetector),
    TripleTop(TripleTopDetector),
    TripleBottom(TripleBottomDetector),

    // Legacy (17)
    LegacyBullFlag(LegacyBullFlagDetector),
    LegacyBearFlag(LegacyBearFlagDetector),
    LegacyDoubleTop(LegacyDoubleTopDetector),
    LegacyDoubleBottom(LegacyDoubleBottomDetector),
    LegacyHeadAndShoulders(LegacyHeadAndShouldersDetector),
    LegacyInverseHeadAndShoulders(LegacyInverseHeadAndShouldersDetector),
    LegacyCupAndHandle(LegacyCupAndHandleDetector),
    LegacyAscendingTriangle(LegacyAscendingTriangleDetector),
    LegacyDescendingTriangle(LegacyDescendingTriangleDetector),
    LegacySymmetricalTriangle(LegacySymmetricalTriangleDetector),
    LegacyRisingWedge(LegacyRisingWedgeDetector),
    LegacyFallingWedge(LegacyFallingWedgeDetector),
    LegacyRectangle(LegacyRectangleDetector),
    LegacyPennant(LegacyPennantDetector),
    LegacyRoundedBottom(LegacyRoundedBottomDetector),
    LegacyTripleTop(LegacyTripleTopDetector),
    LegacyTripleBottom(LegacyTripleBottomDetector),
}

macro_rules! define_builtin_strategies {
    (
        $(
            $variant:ident($scanner:ty)
        ),* $(,)?
    ) => {
        /// All builtin strategy scanners - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinStrategy {
            $($variant($scanner)),*
        }

        impl BuiltinStrategy {
            #[inline]
            pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<SignalEvent> {
                match self {
                    $(Self::$variant(s) => StrategyScanner::scan(s, bars)),*
                }
            }

            #[inline]
            pub fn id(&self) -> StrategyId {
                match self {
                    $(Self::$variant(s) => StrategyScanner::id(s)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(s) => StrategyScanner::validate_config(s)),*
                }
            }
        }
    };
}

define_builtin_strategies! {
    Breakout(BreakoutScanner),
    VwapBounce(VwapBounceScanner),
    EmaCrossover(EmaCrossoverScanner),
    Abcd(AbcdScanner),
    UnusualVolume(UnusualVolumeScanner),
}

// ============================================================
// ANALYSIS ENGINE
// ============================================================

use fusion::{FusionInputs, Recommendation};
use indicators::IndicatorSnapshot;
use params::EngineConfig;

/// Everything one analysis produced.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Analysis {
    pub indicators: IndicatorSnapshot,
    pub patterns: Vec<PatternSignal>,
    pub events: Vec<SignalEvent>,
    /// Sentiment actually used by fusion (a missing score counts as 0)
    pub sentiment: f64,
    pub recommendation: Recommendation,
}

impl Analysis {
    pub fn detected_patterns(&self) -> impl Iterator<Item = PatternId> + '_ {
        self.patterns
            .iter()
            .filter(|s| s.detected)
            .map(|s| s.pattern)
    }

    pub fn is_detected(&self, pattern: PatternId) -> bool {
        self.patterns
            .iter()
            .any(|s| s.pattern == pattern && s.detected)
    }
}

/// Main analysis engine
pub struct AnalysisEngine {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    strategies: Vec<BuiltinStrategy>,
    config: EngineConfig,
}

impl AnalysisEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of pattern detectors (builtin and custom).
    pub fn detector_count(&self) -> usize {
        self.builtin.len() + self.custom.len()
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    pub fn builtin_detectors(&self) -> &[BuiltinDetector] {
        &self.builtin
    }

    // ===========================================
    // LOW-LEVEL: Single stages
    // ===========================================

    /// Series validation with this engine's envelope setting.
    pub fn validate_series<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        validate_series(bars, self.config.enforce_bar_envelope)
    }

    /// Latest value of each indicator.
    pub fn indicators<T: OHLCV>(&self, bars: &[T]) -> IndicatorSnapshot {
        IndicatorSnapshot::compute(bars, &self.config.indicators)
    }

    /// Run every detector on the tail of `bars`, in registration order.
    pub fn detect_patterns<T: OHLCV>(&self, bars: &[T]) -> Vec<PatternSignal> {
        let mut signals = Vec::with_capacity(self.detector_count());

        // Fast path: builtin detectors (enum dispatch, no vtable)
        signals.extend(self.builtin.iter().map(|d| d.detect(bars)));

        // Slow path: custom detectors (vtable)
        if !self.custom.is_empty() {
            let bar_refs: Vec<&dyn OHLCV> = bars.iter().map(|b| b as &dyn OHLCV).collect();
            signals.extend(self.custom.iter().map(|d| d.detect(&bar_refs)));
        }

        signals
    }

    /// Run every strategy scanner over the whole series.
    ///
    /// Events come back in bar order; events on the same bar keep scanner
    /// registration order.
    pub fn scan_strategies<T: OHLCV>(&self, bars: &[T]) -> Vec<SignalEvent> {
        let mut events: Vec<SignalEvent> =
            self.strategies.iter().flat_map(|s| s.scan(bars)).collect();
        events.sort_by_key(|e| e.index);
        events
    }

    // ===========================================
    // HIGH-LEVEL: Full pipeline
    // ===========================================

    /// Validate, compute indicators, detect patterns, scan strategies and
    /// fuse everything with `sentiment` into a recommendation.
    ///
    /// A missing sentiment score is treated as neutral (0.0).
    pub fn analyze<T: OHLCV>(&self, bars: &[T], sentiment: Option<f64>) -> Result<Analysis> {
        if let Err(e) = self.validate_series(bars) {
            warn!(error = %e, bars = bars.len(), "rejecting malformed series");
            return Err(e);
        }

        let indicators = self.indicators(bars);
        let patterns = self.detect_patterns(bars);
        let events = self.scan_strategies(bars);
        let sentiment = crate::sentiment::resolve(sentiment);

        debug!(
            bars = bars.len(),
            detectors = patterns.len(),
            detected = patterns.iter().filter(|s| s.detected).count(),
            events = events.len(),
            "series analysed"
        );

        let recommendation = fusion::recommend(
            &self.config.fusion,
            FusionInputs {
                rsi: indicators.rsi,
                macd_histogram: indicators.macd_histogram,
                sentiment,
                signals: fusion::signal_names(&patterns, &events),
            },
        );

        Ok(Analysis {
            indicators,
            patterns,
            events,
            sentiment,
            recommendation,
        })
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        for d in &self.builtin {
            d.validate_config()?;
        }
        for d in &self.custom {
            d.validate_config()?;
        }
        for s in &self.strategies {
            s.validate_config()?;
        }
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating AnalysisEngine instances
///
/// Set [`config`](Self::config) before adding defaults: the default
/// detectors and scanners take their parameters from it.
pub struct EngineBuilder {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    strategies: Vec<BuiltinStrategy>,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an array of `BuiltinDetector` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinDetector::$variant(Default::default())),*]
  };
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            builtin: Vec::new(),
            custom: Vec::new(),
            strategies: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Replace the engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Detectors of the configured rule set plus every strategy scanner
    pub fn with_all_defaults(self) -> Self {
        self.with_default_patterns().with_default_strategies()
    }

    /// Detectors of the configured rule set
    pub fn with_default_patterns(self) -> Self {
        match self.config.rule_set {
            RuleSet::Canonical => self.with_canonical_defaults(),
            RuleSet::Legacy => self.with_legacy_defaults(),
        }
    }

    /// Add the canonical detector family (17)
    pub fn with_canonical_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            BullFlag,
            BearFlag,
            DoubleTop,
            DoubleBottom,
            HeadAndShoulders,
            InverseHeadAndShoulders,
            CupAndHandle,
            AscendingTriangle,
            DescendingTriangle,
            SymmetricalTriangle,
            RisingWedge,
            FallingWedge,
            Rectangle,
            Pennant,
            RoundedBottom,
            TripleTop,
            TripleBottom,
        ]);
        self
    }

    /// Add the legacy detector family (17), comparing levels with the
    /// configured [`PriceMatch`](window::PriceMatch)
    pub fn with_legacy_defaults(mut self) -> Self {
        let price_match = self.config.price_match;
        self.builtin.extend([
            BuiltinDetector::LegacyBullFlag(Default::default()),
            BuiltinDetector::LegacyBearFlag(Default::default()),
            BuiltinDetector::LegacyDoubleTop(LegacyDoubleTopDetector {
                price_match,
                ..Default::default()
            }),
            BuiltinDetector::LegacyDoubleBottom(LegacyDoubleBottomDetector {
                price_match,
                ..Default::default()
            }),
            BuiltinDetector::LegacyHeadAndShoulders(Default::default()),
            BuiltinDetector::LegacyInverseHeadAndShoulders(Default::default()),
            BuiltinDetector::LegacyCupAndHandle(Default::default()),
            BuiltinDetector::LegacyAscendingTriangle(LegacyAscendingTriangleDetector {
                price_match,
            }),
            BuiltinDetector::LegacyDescendingTriangle(LegacyDescendingTriangleDetector {
                price_match,
            }),
            BuiltinDetector::LegacySymmetricalTriangle(Default::default()),
            BuiltinDetector::LegacyRisingWedge(Default::default()),
            BuiltinDetector::LegacyFallingWedge(Default::default()),
            BuiltinDetector::LegacyRectangle(LegacyRectangleDetector { price_match }),
            BuiltinDetector::LegacyPennant(Default::default()),
            BuiltinDetector::LegacyRoundedBottom(Default::default()),
            BuiltinDetector::LegacyTripleTop(LegacyTripleTopDetector {
                price_match,
                ..Default::default()
            }),
            BuiltinDetector::LegacyTripleBottom(LegacyTripleBottomDetector {
                price_match,
                ..Default::default()
            }),
        ]);
        self
    }

    /// Add the five strategy scanners, parameterised from the config
    pub fn with_default_strategies(mut self) -> Self {
        let ind = &self.config.indicators;
        let st = &self.config.strategies;
        self.strategies.extend([
            BuiltinStrategy::Breakout(BreakoutScanner {
                volume_multiplier: st.breakout_volume_multiplier,
            }),
            BuiltinStrategy::VwapBounce(VwapBounceScanner {
                tolerance: st.vwap_bounce_tolerance,
            }),
            BuiltinStrategy::EmaCrossover(EmaCrossoverScanner {
                short: ind.ema_short,
                long: ind.ema_long,
            }),
            BuiltinStrategy::Abcd(AbcdScanner),
            BuiltinStrategy::UnusualVolume(UnusualVolumeScanner {
                window: st.unusual_volume_window,
                threshold: st.unusual_volume_threshold,
            }),
        ]);
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Add a custom detector (slow path)
    pub fn add_custom<D: DynPatternDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    /// Add a builtin strategy scanner
    pub fn add_strategy(mut self, scanner: BuiltinStrategy) -> Self {
        self.strategies.push(scanner);
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<AnalysisEngine> {
        let engine = AnalysisEngine {
            builtin: self.builtin,
            custom: self.custom,
            strategies: self.strategies,
            config: self.config,
        };
        engine.validate()?;
        debug!(
            detectors = engine.detector_count(),
            strategies = engine.strategy_count(),
            rule_set = engine.config.rule_set.as_str(),
            "analysis engine built"
        );
        Ok(engine)
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

use rayon::prelude::*;

/// Result of analysing a single instrument
#[derive(Debug)]
pub struct SymbolAnalysis {
    pub symbol: String,
    pub analysis: Analysis,
}

/// Error from analysing a single instrument
#[derive(Debug)]
pub struct AnalysisFailure {
    pub symbol: String,
    pub error: AnalysisError,
}

/// Parallel analysis of multiple instruments: `(symbol, bars, sentiment)`.
pub fn analyze_parallel<'a, T, I>(
    engine: &AnalysisEngine,
    instruments: I,
) -> (Vec<SymbolAnalysis>, Vec<AnalysisFailure>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T], Option<f64>)>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars, sentiment)| {
            engine
                .analyze(bars, sentiment)
                .map(|analysis| SymbolAnalysis {
                    symbol: symbol.to_string(),
                    analysis,
                })
                .map_err(|error| AnalysisFailure {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => {
                warn!(symbol = %e.symbol, error = %e.error, "analysis failed");
                errors.push(e)
            }
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
