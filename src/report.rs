//! Analysis report
//!
//! Bundles one symbol's analysis with its input bars and headlines. The
//! `Display` impl renders the plain-text breakdown; the serde shape is what a
//! web client consumes.

use std::fmt;

use serde::Serialize;

use crate::{
    fusion::Recommendation, indicators::IndicatorSnapshot, Analysis, Bar, Direction,
    PatternSignal, SignalEvent, OHLCV,
};

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub symbol: String,
    /// Close of the last bar; `None` for an empty series
    pub current_price: Option<f64>,
    pub ohlcv: Vec<Bar>,
    pub indicators: IndicatorSnapshot,
    pub patterns: Vec<PatternSignal>,
    pub events: Vec<SignalEvent>,
    pub sentiment: f64,
    pub recommendation: Recommendation,
    pub headlines: Vec<String>,
}

impl AnalysisReport {
    pub fn new<T: OHLCV>(
        symbol: impl Into<String>,
        bars: &[T],
        analysis: Analysis,
        headlines: Vec<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            current_price: bars.last().map(|b| b.close()),
            ohlcv: bars.iter().map(Bar::from_ohlcv).collect(),
            indicators: analysis.indicators,
            patterns: analysis.patterns,
            events: analysis.events,
            sentiment: analysis.sentiment,
            recommendation: analysis.recommendation,
            headlines,
        }
    }
}

struct Fixed(Option<f64>);

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v:.2}"),
            None => f.write_str("n/a"),
        }
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analyzing {}", self.symbol)?;
        writeln!(f)?;
        match self.current_price {
            Some(p) => writeln!(f, "Current Price: ${p:.2}")?,
            None => writeln!(f, "Current Price: n/a")?,
        }
        writeln!(f, "RSI: {}", Fixed(self.indicators.rsi))?;
        writeln!(f, "MACD Histogram: {}", Fixed(self.indicators.macd_histogram))?;
        writeln!(f, "Sentiment Score: {:.2}", self.sentiment)?;

        let detected: Vec<String> = self
            .patterns
            .iter()
            .filter(|s| s.detected)
            .map(|s| {
                let bias = match s.pattern.typical_direction() {
                    Some(Direction::Bullish) => "bullish",
                    Some(Direction::Bearish) => "bearish",
                    Some(Direction::Neutral) => "neutral",
                    None => "unclassified",
                };
                format!("{} ({bias})", s.pattern)
            })
            .collect();
        if detected.is_empty() {
            writeln!(f, "Patterns: none")?;
        } else {
            writeln!(f, "Patterns: {}", detected.join(", "))?;
        }

        if let Some(last) = self.events.last() {
            writeln!(
                f,
                "Strategy Events: {} (latest: {} at {})",
                self.events.len(),
                last.label,
                last.timestamp
            )?;
        } else {
            writeln!(f, "Strategy Events: none")?;
        }

        writeln!(f)?;
        writeln!(f, "News Headlines:")?;
        for h in &self.headlines {
            writeln!(f, "- {h}")?;
        }

        writeln!(f)?;
        write!(
            f,
            "Conclusion: {} based on technical, sentiment, and risk analysis.",
            self.recommendation
        )
    }
}
