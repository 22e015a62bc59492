//! Engine configuration and parameter metadata
//!
//! This module provides the [`EngineConfig`] value and metadata about every
//! tunable parameter, enabling:
//! - Grid search optimization
//! - Parameter documentation
//! - Building a validated config from a flat name -> value map
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use chartfuse::params::{EngineConfig, Parameterized};
//!
//! for param in EngineConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let mut overrides = HashMap::new();
//! overrides.insert("rsi_length", 21.0);
//! let config = EngineConfig::with_params(&overrides).unwrap();
//! assert_eq!(config.indicators.rsi_length.get(), 21);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
  fusion::FusionRules, window::PriceMatch, AnalysisError, Period, Ratio, Result, RuleSet,
};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value (0.0..=1.0)
  Ratio,
  /// Period value (positive integer)
  Period,
  /// Positive real (multipliers, absolute tolerances, RSI levels)
  Value,
}

/// Metadata for a single parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "rsi_length")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Create a new ParamMeta for a real-valued parameter
  pub const fn value(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Value, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    if !value.is_finite() {
      return Err(AnalysisError::InvalidValue("parameter must be finite"));
    }
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(AnalysisError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(AnalysisError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Value => Ok(()),
    }
  }
}

// ============================================================
// PARAMETERIZED TRAIT
// ============================================================

/// Trait for configuration values that support parameterization
///
/// Implementing this trait enables:
/// - Discovery of available parameters
/// - Creation of values with custom parameters
/// - Grid search optimization
pub trait Parameterized: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a value with parameters from a HashMap
  ///
  /// Missing parameters use their default values; unknown names are rejected.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 1.0 || value.fract() != 0.0 {
    return Err(AnalysisError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Helper to get a plain value from params with default fallback
pub fn get_value(params: &HashMap<&str, f64>, key: &str, default: f64) -> f64 {
  params.get(key).copied().unwrap_or(default)
}

// ============================================================
// CONFIGURATION
// ============================================================

/// Indicator lengths and spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
  pub rsi_length: Period,
  pub macd_fast: Period,
  pub macd_slow: Period,
  pub macd_signal: Period,
  pub ema_short: Period,
  pub ema_long: Period,
}

impl Default for IndicatorParams {
  fn default() -> Self {
    Self {
      rsi_length: Period::new_const(14),
      macd_fast: Period::new_const(12),
      macd_slow: Period::new_const(26),
      macd_signal: Period::new_const(9),
      ema_short: Period::new_const(9),
      ema_long: Period::new_const(20),
    }
  }
}

impl IndicatorParams {
  pub fn validate(&self) -> Result<()> {
    if self.macd_fast >= self.macd_slow {
      return Err(AnalysisError::InvalidConfig(format!(
        "macd_fast {} must be below macd_slow {}",
        self.macd_fast.get(),
        self.macd_slow.get()
      )));
    }
    if self.ema_short >= self.ema_long {
      return Err(AnalysisError::InvalidConfig(format!(
        "ema_short {} must be below ema_long {}",
        self.ema_short.get(),
        self.ema_long.get()
      )));
    }
    Ok(())
  }
}

/// Strategy scanner thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
  /// Breakout volume must exceed this multiple of the previous bar's volume
  pub breakout_volume_multiplier: f64,
  pub unusual_volume_window: Period,
  /// Volume must exceed this multiple of its rolling mean
  pub unusual_volume_threshold: f64,
  /// Absolute close-to-VWAP distance for a bounce
  pub vwap_bounce_tolerance: f64,
}

impl Default for StrategyParams {
  fn default() -> Self {
    Self {
      breakout_volume_multiplier: 1.5,
      unusual_volume_window: Period::new_const(10),
      unusual_volume_threshold: 2.0,
      vwap_bounce_tolerance: 0.2,
    }
  }
}

impl StrategyParams {
  pub fn validate(&self) -> Result<()> {
    for (name, value) in [
      ("breakout_volume_multiplier", self.breakout_volume_multiplier),
      ("unusual_volume_threshold", self.unusual_volume_threshold),
      ("vwap_bounce_tolerance", self.vwap_bounce_tolerance),
    ] {
      if !(value > 0.0 && value.is_finite()) {
        return Err(AnalysisError::InvalidConfig(format!("{name} must be > 0, got {value}")));
      }
    }
    Ok(())
  }
}

/// Full engine configuration. Every field has a default; a partial JSON
/// document only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub indicators: IndicatorParams,
  pub strategies: StrategyParams,
  pub fusion: FusionRules,
  pub rule_set: RuleSet,
  /// Level comparison used by the legacy peak/trough rules
  pub price_match: PriceMatch,
  /// Reject bars whose open/close fall outside high-low
  pub enforce_bar_envelope: bool,
}

impl EngineConfig {
  /// Current value of every field named in [`EngineConfig::param_meta`].
  pub fn param_values(&self) -> [(&'static str, f64); 14] {
    let ind = &self.indicators;
    let st = &self.strategies;
    let fu = &self.fusion;
    [
      ("rsi_length", ind.rsi_length.get() as f64),
      ("macd_fast", ind.macd_fast.get() as f64),
      ("macd_slow", ind.macd_slow.get() as f64),
      ("macd_signal", ind.macd_signal.get() as f64),
      ("ema_short", ind.ema_short.get() as f64),
      ("ema_long", ind.ema_long.get() as f64),
      ("breakout_volume_multiplier", st.breakout_volume_multiplier),
      ("unusual_volume_window", st.unusual_volume_window.get() as f64),
      ("unusual_volume_threshold", st.unusual_volume_threshold),
      ("vwap_bounce_tolerance", st.vwap_bounce_tolerance),
      ("rsi_oversold", fu.rsi_oversold),
      ("rsi_overbought", fu.rsi_overbought),
      ("sentiment_threshold", fu.sentiment_threshold.get()),
      ("risk_tolerance", fu.risk_tolerance.get()),
    ]
  }

  /// Checks every field against its metadata range, then the cross-field
  /// constraints.
  pub fn validate(&self) -> Result<()> {
    for ((name, value), meta) in self.param_values().into_iter().zip(ENGINE_PARAMS.iter()) {
      debug_assert_eq!(name, meta.name);
      meta.validate(value)?;
    }
    self.indicators.validate()?;
    self.strategies.validate()?;
    self.fusion.validate()?;
    if let PriceMatch::Relative(eps) = self.price_match {
      if !(eps > 0.0 && eps.is_finite()) {
        return Err(AnalysisError::InvalidConfig(format!(
          "price match epsilon must be > 0, got {eps}"
        )));
      }
    }
    Ok(())
  }
}

static ENGINE_PARAMS: [ParamMeta; 14] = [
  ParamMeta::period("rsi_length", 14.0, (2.0, 50.0, 1.0), "RSI lookback"),
  ParamMeta::period("macd_fast", 12.0, (2.0, 50.0, 1.0), "MACD fast EMA span"),
  ParamMeta::period("macd_slow", 26.0, (5.0, 100.0, 1.0), "MACD slow EMA span"),
  ParamMeta::period("macd_signal", 9.0, (2.0, 50.0, 1.0), "MACD signal EMA span"),
  ParamMeta::period("ema_short", 9.0, (2.0, 50.0, 1.0), "Short EMA span for crossovers"),
  ParamMeta::period("ema_long", 20.0, (5.0, 200.0, 1.0), "Long EMA span for crossovers"),
  ParamMeta::value(
    "breakout_volume_multiplier",
    1.5,
    (1.0, 5.0, 0.25),
    "Breakout volume vs previous bar",
  ),
  ParamMeta::period("unusual_volume_window", 10.0, (2.0, 50.0, 1.0), "Rolling volume window"),
  ParamMeta::value(
    "unusual_volume_threshold",
    2.0,
    (1.0, 5.0, 0.25),
    "Volume spike vs rolling mean",
  ),
  ParamMeta::value(
    "vwap_bounce_tolerance",
    0.2,
    (0.05, 2.0, 0.05),
    "Absolute close-to-VWAP distance",
  ),
  ParamMeta::value("rsi_oversold", 30.0, (0.0, 50.0, 5.0), "RSI below which BUY is possible"),
  ParamMeta::value(
    "rsi_overbought",
    70.0,
    (50.0, 100.0, 5.0),
    "RSI above which SELL is possible",
  ),
  ParamMeta::ratio(
    "sentiment_threshold",
    0.1,
    (0.0, 1.0, 0.05),
    "Sentiment magnitude required for BUY/SELL",
  ),
  ParamMeta::ratio(
    "risk_tolerance",
    0.5,
    (0.0, 1.0, 0.05),
    "Sentiment magnitude below which HOLD is neutral",
  ),
];

impl Parameterized for EngineConfig {
  fn param_meta() -> &'static [ParamMeta] {
    &ENGINE_PARAMS
  }

  fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    let meta = Self::param_meta();
    for (&name, &value) in params {
      let m = meta
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| AnalysisError::InvalidConfig(format!("unknown parameter: {name}")))?;
      m.validate(value)?;
    }

    let d = EngineConfig::default();
    let config = EngineConfig {
      indicators: IndicatorParams {
        rsi_length: get_period(params, "rsi_length", d.indicators.rsi_length.get())?,
        macd_fast: get_period(params, "macd_fast", d.indicators.macd_fast.get())?,
        macd_slow: get_period(params, "macd_slow", d.indicators.macd_slow.get())?,
        macd_signal: get_period(params, "macd_signal", d.indicators.macd_signal.get())?,
        ema_short: get_period(params, "ema_short", d.indicators.ema_short.get())?,
        ema_long: get_period(params, "ema_long", d.indicators.ema_long.get())?,
      },
      strategies: StrategyParams {
        breakout_volume_multiplier: get_value(
          params,
          "breakout_volume_multiplier",
          d.strategies.breakout_volume_multiplier,
        ),
        unusual_volume_window: get_period(
          params,
          "unusual_volume_window",
          d.strategies.unusual_volume_window.get(),
        )?,
        unusual_volume_threshold: get_value(
          params,
          "unusual_volume_threshold",
          d.strategies.unusual_volume_threshold,
        ),
        vwap_bounce_tolerance: get_value(
          params,
          "vwap_bounce_tolerance",
          d.strategies.vwap_bounce_tolerance,
        ),
      },
      fusion: FusionRules {
        rsi_oversold: get_value(params, "rsi_oversold", d.fusion.rsi_oversold),
        rsi_overbought: get_value(params, "rsi_overbought", d.fusion.rsi_overbought),
        sentiment_threshold: get_ratio(
          params,
          "sentiment_threshold",
          d.fusion.sentiment_threshold.get(),
        )?,
        risk_tolerance: get_ratio(params, "risk_tolerance", d.fusion.risk_tolerance.get())?,
      },
      ..d
    };
    config.validate()?;
    Ok(config)
  }
}

// ============================================================
// TESTS
// ============================================================
