//! Chart pattern detectors
//!
//! Two families of 17 detectors each, one per [`RuleSet`]:
//!
//! - **Canonical** (`*Detector`): short-window percent-move rules with a
//!   breakout confirmation bar. Default.
//! - **Legacy** (`Legacy*Detector`): long-window rules over close dispersion
//!   and 10-bar rolling highs/lows.
//!
//! Every detector reads a fixed-size tail of closes and reports `false` when
//! the series is shorter than that tail.

use serde::{Deserialize, Serialize};

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod canonical;
pub mod legacy;

// Re-export all detectors for convenience
pub use canonical::*;
pub use helpers::*;
pub use legacy::*;

/// Which detector family an engine evaluates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    #[default]
    Canonical,
    Legacy,
}

impl RuleSet {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleSet::Canonical => "canonical",
            RuleSet::Legacy => "legacy",
        }
    }
}
