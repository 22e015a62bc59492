//! Integration tests for indicators, strategy scanners, fusion and the
//! end-to-end analysis pipeline.

use std::collections::HashMap;

use chartfuse::indicators::{rsi, vwap};
use chartfuse::prelude::*;
use chartfuse::window::ema;

fn bar(ts: i64, close: f64, volume: f64) -> Bar {
    Bar::new(ts, close, close + 0.5, close - 0.5, close, volume)
}

fn from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| bar(i as i64, c, 1_000.0))
        .collect()
}

/// Early breakout, long slide, then a small recovery: RSI stays low while
/// the MACD histogram turns positive.
fn oversold_with_early_breakout() -> Vec<Bar> {
    let mut bars = vec![bar(0, 100.0, 1_000.0), bar(1, 102.0, 2_000.0)];
    for i in 0..40 {
        bars.push(bar(2 + i, 101.0 - i as f64, 1_000.0));
    }
    for j in 0..4 {
        bars.push(bar(42 + j, 62.0 + 0.5 * (j + 1) as f64, 1_000.0));
    }
    bars
}

// ============================================================
// INDICATORS
// ============================================================

#[test]
fn test_ema_seeded_with_first_value() {
    let out = ema(&[10.0, 11.0, 12.0], 2);
    assert!((out[0] - 10.0).abs() < 1e-3);
    assert!((out[1] - 10.667).abs() < 1e-3);
    assert!((out[2] - 11.556).abs() < 1e-3);
}

#[test]
fn test_rsi_extremes() {
    let up: Vec<f64> = (0..15).map(|i| 50.0 + i as f64).collect();
    let down: Vec<f64> = up.iter().rev().copied().collect();
    assert!(rsi(&up, 14)[14].unwrap() > 99.9);
    assert!(rsi(&down, 14)[14].unwrap() < 0.1);
}

#[test]
fn test_vwap_depends_on_window_start() {
    let bars: Vec<Bar> = (0..10)
        .map(|i| bar(i, 20.0 + i as f64 * 3.0, 100.0 + i as f64 * 50.0))
        .collect();
    let full = vwap(&bars);
    let late = vwap(&bars[4..]);
    assert_ne!(full[9], late[5]);
}

#[test]
fn test_snapshot_on_oversold_series() {
    let bars = oversold_with_early_breakout();
    let snap = IndicatorSnapshot::compute(&bars, &IndicatorParams::default());
    let rsi = snap.rsi.unwrap();
    let hist = snap.macd_histogram.unwrap();
    assert!(rsi < 30.0, "rsi = {rsi}");
    assert!(hist > 0.0, "histogram = {hist}");
}

// ============================================================
// STRATEGIES
// ============================================================

#[test]
fn test_breakout_single_event_timestamp() {
    let engine = EngineBuilder::new()
        .add_strategy(BuiltinStrategy::Breakout(BreakoutScanner::default()))
        .build()
        .unwrap();
    let events = engine.scan_strategies(&oversold_with_early_breakout());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].timestamp, 1);
    assert_eq!(events[0].strategy, StrategyId::BREAKOUT);
}

#[test]
fn test_default_scanners_are_configured_from_params() {
    let mut config = EngineConfig::default();
    config.strategies.breakout_volume_multiplier = 2.5;
    let engine = EngineBuilder::new()
        .config(config)
        .with_default_strategies()
        .build()
        .unwrap();

    // 2000 vs 1000 is a 2x surge, below the configured 2.5x
    let events = engine.scan_strategies(&oversold_with_early_breakout());
    assert!(events.iter().all(|e| e.strategy != StrategyId::BREAKOUT));
}

// ============================================================
// FUSION
// ============================================================

fn fuse(rsi: f64, hist: f64, sentiment: f64, signals: &[&str]) -> Recommendation {
    chartfuse::fusion::recommend(
        &FusionRules::default(),
        FusionInputs {
            rsi: Some(rsi),
            macd_histogram: Some(hist),
            sentiment,
            signals: signals.iter().map(|s| s.to_string()).collect(),
        },
    )
}

#[test]
fn test_fusion_priority() {
    assert_eq!(fuse(25.0, 0.5, 0.2, &["Breakout"]).action, Action::Buy);
    assert_eq!(
        fuse(75.0, -0.3, -0.2, &["Head and Shoulders"]).action,
        Action::Sell
    );
    let hold = fuse(50.0, 0.0, 0.0, &[]);
    assert_eq!(hold.action, Action::Hold);
    assert_eq!(hold.rule, DecisionRule::NeutralSentiment);
}

#[test]
fn test_end_to_end_buy() {
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
    let analysis = engine
        .analyze(&oversold_with_early_breakout(), Some(0.3))
        .unwrap();
    assert_eq!(analysis.recommendation.action, Action::Buy);
    assert!(analysis
        .recommendation
        .contributing_signals
        .contains("Breakout"));
}

#[test]
fn test_end_to_end_buy_needs_sentiment() {
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
    let bars = oversold_with_early_breakout();

    let neutral = engine.analyze(&bars, None).unwrap();
    assert_eq!(neutral.recommendation.rule, DecisionRule::NeutralSentiment);

    let bearish = engine.analyze(&bars, Some(-0.9)).unwrap();
    assert_eq!(bearish.recommendation.rule, DecisionRule::RiskManagement);
}

#[test]
fn test_sentiment_from_headlines() {
    let scorer = |h: &str| if h.contains("record") { 0.6 } else { 0.0 };
    let headlines = ["ACME posts record quarter", "ACME schedules call"];
    let sentiment = mean_sentiment(&scorer, &headlines, 5);
    assert!((sentiment - 0.3).abs() < 1e-12);

    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
    let analysis = engine
        .analyze(&oversold_with_early_breakout(), Some(sentiment))
        .unwrap();
    assert_eq!(analysis.sentiment, sentiment);
    assert_eq!(analysis.recommendation.action, Action::Buy);
}

// ============================================================
// VALIDATION / CONFIG
// ============================================================

#[test]
fn test_malformed_series_rejected() {
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

    let mut duplicate = from_closes(&[10.0, 11.0, 12.0]);
    duplicate[2].timestamp = duplicate[1].timestamp;
    assert!(matches!(
        engine.analyze(&duplicate, None),
        Err(AnalysisError::NonAscendingTimestamp { index: 2, .. })
    ));

    let mut infinite = from_closes(&[10.0, 11.0, 12.0]);
    infinite[0].high = f64::INFINITY;
    assert!(matches!(
        engine.analyze(&infinite, None),
        Err(AnalysisError::InvalidBar { index: 0, .. })
    ));
}

#[test]
fn test_envelope_enforced_only_when_configured() {
    let mut bars = from_closes(&[10.0, 11.0, 12.0]);
    bars[1].high = 10.8; // close 11.0 above high

    let lenient = EngineBuilder::new().with_all_defaults().build().unwrap();
    assert!(lenient.analyze(&bars, None).is_ok());

    let config = EngineConfig {
        enforce_bar_envelope: true,
        ..Default::default()
    };
    let strict = EngineBuilder::new()
        .config(config)
        .with_all_defaults()
        .build()
        .unwrap();
    assert!(matches!(
        strict.analyze(&bars, None),
        Err(AnalysisError::InvalidBar { index: 1, .. })
    ));
}

#[test]
fn test_invalid_config_rejected_at_build() {
    let mut config = EngineConfig::default();
    config.indicators.macd_fast = Period::new(30).unwrap();
    assert!(EngineBuilder::new().config(config).build().is_err());
}

#[test]
fn test_out_of_range_period_rejected_at_build() {
    let config: EngineConfig =
        serde_json::from_str(r#"{"indicators":{"rsi_length":18446744073709551615}}"#).unwrap();
    let built = EngineBuilder::new().config(config).with_all_defaults().build();
    assert!(matches!(built, Err(AnalysisError::OutOfRange { .. })));
}

#[test]
fn test_config_from_params_and_json() {
    let mut params = HashMap::new();
    params.insert("unusual_volume_threshold", 3.0);
    let config = EngineConfig::with_params(&params).unwrap();

    let json = serde_json::to_string(&config).unwrap();
    let back: EngineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
    assert_eq!(back.strategies.unusual_volume_threshold, 3.0);
}

#[test]
fn test_legacy_rule_set_from_config() {
    let config: EngineConfig = serde_json::from_str(
        r#"{"rule_set":"legacy","price_match":{"mode":"relative","epsilon":0.005}}"#,
    )
    .unwrap();
    let engine = EngineBuilder::new()
        .config(config)
        .with_all_defaults()
        .build()
        .unwrap();
    assert!(engine
        .builtin_detectors()
        .iter()
        .all(|d| d.rule_set() == RuleSet::Legacy));
}

// ============================================================
// PARALLEL / REPORT
// ============================================================

#[test]
fn test_parallel_matches_sequential() {
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
    let a = oversold_with_early_breakout();
    let b: Vec<Bar> = (0..60)
        .map(|i| bar(i, 80.0 + (i as f64 * 0.5).cos() * 4.0, 900.0))
        .collect();

    let instruments: Vec<(&str, &[Bar], Option<f64>)> =
        vec![("AAA", a.as_slice(), Some(0.3)), ("BBB", b.as_slice(), None)];
    let (results, errors) = analyze_parallel(&engine, instruments);
    assert!(errors.is_empty());
    assert_eq!(results.len(), 2);

    for r in &results {
        let (bars, sentiment) = if r.symbol == "AAA" {
            (&a, Some(0.3))
        } else {
            (&b, None)
        };
        let sequential = engine.analyze(bars, sentiment).unwrap();
        assert_eq!(r.analysis.recommendation, sequential.recommendation);
        assert_eq!(r.analysis.patterns, sequential.patterns);
    }
}

#[test]
fn test_report_round_trip_fields() {
    let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
    let bars = oversold_with_early_breakout();
    let analysis = engine.analyze(&bars, Some(0.3)).unwrap();
    let report = AnalysisReport::new("ACME", &bars, analysis, vec!["headline".into()]);

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["symbol"], "ACME");
    assert_eq!(value["current_price"], 64.0);
    assert_eq!(value["recommendation"]["action"], "BUY");
    assert_eq!(value["events"][0]["label"], "Breakout");
    assert!(report.to_string().contains("Conclusion: BUY"));
}
