//! Recommendation fusion
//!
//! A fixed decision list over the latest RSI, the latest MACD histogram, a
//! sentiment score and the set of matched signal names. The first rule that
//! matches decides; signals other than the ones a rule names only show up in
//! the rationale.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AnalysisError, PatternId, PatternSignal, Ratio, Result, SignalEvent, StrategyId};

// ============================================================
// OUTPUT TYPES
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decision-list entry that produced a recommendation, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    OversoldBreakout,
    OverboughtHeadAndShoulders,
    NeutralSentiment,
    RiskManagement,
}

impl DecisionRule {
    pub fn action(self) -> Action {
        match self {
            DecisionRule::OversoldBreakout => Action::Buy,
            DecisionRule::OverboughtHeadAndShoulders => Action::Sell,
            DecisionRule::NeutralSentiment | DecisionRule::RiskManagement => Action::Hold,
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            DecisionRule::OversoldBreakout => "Low RSI, positive sentiment, breakout",
            DecisionRule::OverboughtHeadAndShoulders => {
                "High RSI, negative sentiment, head and shoulders"
            }
            DecisionRule::NeutralSentiment => "Neutral sentiment",
            DecisionRule::RiskManagement => "Risk management applied",
        }
    }

    /// Signal the rule requires, if any.
    fn trigger(self) -> Option<&'static str> {
        match self {
            DecisionRule::OversoldBreakout => Some(StrategyId::BREAKOUT.as_str()),
            DecisionRule::OverboughtHeadAndShoulders => {
                Some(PatternId::HEAD_AND_SHOULDERS.as_str())
            }
            _ => None,
        }
    }
}

/// Final BUY / SELL / HOLD with its rationale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub action: Action,
    pub rule: DecisionRule,
    pub rationale: String,
    pub contributing_signals: BTreeSet<String>,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.action, self.rationale)
    }
}

// ============================================================
// RULES
// ============================================================

/// Thresholds of the decision list.
///
/// BUY needs `rsi < rsi_oversold`, a positive histogram,
/// `sentiment > sentiment_threshold` and a breakout. SELL mirrors it with
/// `rsi_overbought` and a head and shoulders. Otherwise the result is HOLD,
/// labelled neutral when `|sentiment| < risk_tolerance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionRules {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub sentiment_threshold: Ratio,
    pub risk_tolerance: Ratio,
}

impl Default for FusionRules {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            sentiment_threshold: Ratio::new_const(0.1),
            risk_tolerance: Ratio::new_const(0.5),
        }
    }
}

impl FusionRules {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("rsi_oversold", self.rsi_oversold),
            ("rsi_overbought", self.rsi_overbought),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(AnalysisError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: 100.0,
                });
            }
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(AnalysisError::InvalidConfig(format!(
                "rsi_oversold {} must be below rsi_overbought {}",
                self.rsi_oversold, self.rsi_overbought
            )));
        }
        Ok(())
    }

    fn select(&self, inputs: &FusionInputs) -> DecisionRule {
        let threshold = self.sentiment_threshold.get();
        let sentiment = inputs.sentiment;

        if let (Some(rsi), Some(hist)) = (inputs.rsi, inputs.macd_histogram) {
            if rsi < self.rsi_oversold
                && hist > 0.0
                && sentiment > threshold
                && inputs.signals.contains(StrategyId::BREAKOUT.as_str())
            {
                return DecisionRule::OversoldBreakout;
            }
            if rsi > self.rsi_overbought
                && hist < 0.0
                && sentiment < -threshold
                && inputs.signals.contains(PatternId::HEAD_AND_SHOULDERS.as_str())
            {
                return DecisionRule::OverboughtHeadAndShoulders;
            }
        }

        if sentiment.abs() < self.risk_tolerance.get() {
            DecisionRule::NeutralSentiment
        } else {
            DecisionRule::RiskManagement
        }
    }
}

// ============================================================
// FUSION
// ============================================================

/// Everything the decision list reads. `None` indicators mean insufficient
/// data and fail the BUY and SELL rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionInputs {
    pub rsi: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub sentiment: f64,
    pub signals: BTreeSet<String>,
}

/// Names of every detected pattern and every strategy that emitted at least
/// one event anywhere in the series.
pub fn signal_names(patterns: &[PatternSignal], events: &[SignalEvent]) -> BTreeSet<String> {
    patterns
        .iter()
        .filter(|s| s.detected)
        .map(|s| s.pattern.as_str())
        .chain(events.iter().map(|e| e.strategy.as_str()))
        .map(str::to_string)
        .collect()
}

/// Run the decision list. Always returns a recommendation.
pub fn recommend(rules: &FusionRules, inputs: FusionInputs) -> Recommendation {
    let rule = rules.select(&inputs);

    let others: Vec<&str> = inputs
        .signals
        .iter()
        .map(String::as_str)
        .filter(|s| Some(*s) != rule.trigger())
        .collect();
    let rationale = if others.is_empty() {
        rule.summary().to_string()
    } else {
        format!("{}; other signals: {}", rule.summary(), others.join(", "))
    };

    debug!(
        ?rule,
        action = %rule.action(),
        rsi = ?inputs.rsi,
        macd_histogram = ?inputs.macd_histogram,
        sentiment = inputs.sentiment,
        signals = inputs.signals.len(),
        "fusion decision"
    );

    Recommendation {
        action: rule.action(),
        rule,
        rationale,
        contributing_signals: inputs.signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(rsi: f64, hist: f64, sentiment: f64, signals: &[&str]) -> FusionInputs {
        FusionInputs {
            rsi: Some(rsi),
            macd_histogram: Some(hist),
            sentiment,
            signals: signals.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_buy_rule() {
        let rec = recommend(&FusionRules::default(), inputs(25.0, 0.5, 0.2, &["Breakout"]));
        assert_eq!(rec.action, Action::Buy);
        assert_eq!(rec.rule, DecisionRule::OversoldBreakout);
        assert_eq!(rec.rationale, "Low RSI, positive sentiment, breakout");
        assert_eq!(
            rec.to_string(),
            "BUY (Low RSI, positive sentiment, breakout)"
        );
    }

    #[test]
    fn test_sell_rule() {
        let rec = recommend(
            &FusionRules::default(),
            inputs(75.0, -0.3, -0.2, &["Head and Shoulders"]),
        );
        assert_eq!(rec.action, Action::Sell);
        assert_eq!(rec.rule, DecisionRule::OverboughtHeadAndShoulders);
    }

    #[test]
    fn test_neutral_hold() {
        let rec = recommend(&FusionRules::default(), inputs(50.0, 0.0, 0.0, &[]));
        assert_eq!(rec.action, Action::Hold);
        assert_eq!(rec.rule, DecisionRule::NeutralSentiment);
        assert!(rec.contributing_signals.is_empty());
    }

    #[test]
    fn test_risk_management_hold() {
        // strong sentiment but no breakout
        let rec = recommend(&FusionRules::default(), inputs(25.0, 0.5, 0.8, &["Bull Flag"]));
        assert_eq!(rec.action, Action::Hold);
        assert_eq!(rec.rule, DecisionRule::RiskManagement);
        assert_eq!(rec.rationale, "Risk management applied; other signals: Bull Flag");
    }

    #[test]
    fn test_thresholds_are_strict() {
        let rules = FusionRules::default();
        let at_threshold = recommend(&rules, inputs(25.0, 0.5, 0.1, &["Breakout"]));
        assert_eq!(at_threshold.action, Action::Hold);
        let at_rsi = recommend(&rules, inputs(30.0, 0.5, 0.2, &["Breakout"]));
        assert_eq!(at_rsi.action, Action::Hold);
        let at_tolerance = recommend(&rules, inputs(50.0, 0.0, -0.5, &[]));
        assert_eq!(at_tolerance.rule, DecisionRule::RiskManagement);
    }

    #[test]
    fn test_missing_indicators_fail_directional_rules() {
        let mut input = inputs(25.0, 0.5, 0.2, &["Breakout"]);
        input.macd_histogram = None;
        assert_eq!(recommend(&FusionRules::default(), input).action, Action::Hold);

        let mut input = inputs(75.0, -0.3, -0.2, &["Head and Shoulders"]);
        input.rsi = None;
        assert_eq!(recommend(&FusionRules::default(), input).action, Action::Hold);
    }

    #[test]
    fn test_other_signals_never_change_outcome() {
        let rec = recommend(
            &FusionRules::default(),
            inputs(25.0, 0.5, 0.2, &["Breakout", "Double Top", "VWAP Bounce"]),
        );
        assert_eq!(rec.action, Action::Buy);
        assert_eq!(
            rec.rationale,
            "Low RSI, positive sentiment, breakout; other signals: Double Top, VWAP Bounce"
        );
        assert_eq!(rec.contributing_signals.len(), 3);
    }

    #[test]
    fn test_signal_names() {
        let patterns = [
            PatternSignal {
                pattern: PatternId::BULL_FLAG,
                detected: true,
            },
            PatternSignal {
                pattern: PatternId::RECTANGLE,
                detected: false,
            },
        ];
        let events = [
            SignalEvent {
                timestamp: 1,
                index: 1,
                strategy: StrategyId::EMA_CROSSOVER,
                label: "Bullish EMA Crossover",
            },
            SignalEvent {
                timestamp: 2,
                index: 2,
                strategy: StrategyId::EMA_CROSSOVER,
                label: "Bullish EMA Crossover",
            },
        ];
        let names = signal_names(&patterns, &events);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["Bull Flag".to_string(), "EMA Crossover".to_string()]
        );
    }

    #[test]
    fn test_rules_validation() {
        assert!(FusionRules::default().validate().is_ok());
        let inverted = FusionRules {
            rsi_oversold: 80.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
        let out_of_range = FusionRules {
            rsi_overbought: 120.0,
            ..Default::default()
        };
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_action_serde() {
        assert_eq!(serde_json::to_string(&Action::Buy).unwrap(), "\"BUY\"");
        let action: Action = serde_json::from_str("\"HOLD\"").unwrap();
        assert_eq!(action, Action::Hold);
    }
}
