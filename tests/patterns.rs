//! Integration tests for the chart pattern catalog.
//!
//! These tests exercise both rule sets through the public API.

use chartfuse::prelude::*;
use chartfuse::window::PriceMatch;
use proptest::prelude::*;

fn series(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(i as i64 * 60, c, c + 0.5, c - 0.5, c, 1_000.0))
        .collect()
}

fn both_rule_sets() -> AnalysisEngine {
    EngineBuilder::new()
        .with_canonical_defaults()
        .with_legacy_defaults()
        .build()
        .unwrap()
}

fn detected(engine: &AnalysisEngine, closes: &[f64]) -> Vec<PatternId> {
    engine
        .detect_patterns(&series(closes))
        .into_iter()
        .filter(|s| s.detected)
        .map(|s| s.pattern)
        .collect()
}

/// Random walk of closes starting at 100, floored at 1.
fn random_walk(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-3.0f64..3.0, 0..max_len).prop_map(|steps| {
        let mut price: f64 = 100.0;
        steps
            .into_iter()
            .map(|step| {
                price = (price + step).max(1.0);
                price
            })
            .collect()
    })
}

// ============================================================
// CATALOG
// ============================================================

#[test]
fn test_catalog_sizes() {
    let engine = both_rule_sets();
    assert_eq!(engine.detector_count(), 34);

    let canonical = engine
        .builtin_detectors()
        .iter()
        .filter(|d| d.rule_set() == RuleSet::Canonical)
        .count();
    assert_eq!(canonical, 17);
}

#[test]
fn test_both_families_cover_every_pattern() {
    let engine = both_rule_sets();
    for rule_set in [RuleSet::Canonical, RuleSet::Legacy] {
        let ids: Vec<PatternId> = engine
            .builtin_detectors()
            .iter()
            .filter(|d| d.rule_set() == rule_set)
            .map(|d| d.id())
            .collect();
        assert_eq!(ids, PatternId::ALL.to_vec(), "{rule_set:?}");
    }
}

#[test]
fn test_tail_lengths() {
    let engine = both_rule_sets();
    let lengths: Vec<(RuleSet, PatternId, usize)> = engine
        .builtin_detectors()
        .iter()
        .map(|d| (d.rule_set(), d.id(), d.min_bars()))
        .collect();

    let canonical_len = |id: PatternId| {
        lengths
            .iter()
            .find(|(r, p, _)| *r == RuleSet::Canonical && *p == id)
            .map(|(_, _, n)| *n)
    };
    assert_eq!(canonical_len(PatternId::BULL_FLAG), Some(10));
    assert_eq!(canonical_len(PatternId::HEAD_AND_SHOULDERS), Some(15));
    assert_eq!(canonical_len(PatternId::CUP_AND_HANDLE), Some(20));
    assert_eq!(canonical_len(PatternId::ASCENDING_TRIANGLE), Some(11));

    for (rule_set, id, n) in &lengths {
        if *rule_set == RuleSet::Legacy {
            let expected = match *id {
                PatternId::BULL_FLAG | PatternId::BEAR_FLAG => 30,
                PatternId::TRIPLE_TOP | PatternId::TRIPLE_BOTTOM => 60,
                _ => 40,
            };
            assert_eq!(*n, expected, "{id}");
        }
    }
}

// ============================================================
// SCENARIOS
// ============================================================

#[test]
fn test_flat_series_detects_nothing() {
    let engine = EngineBuilder::new().with_canonical_defaults().build().unwrap();
    assert!(detected(&engine, &[100.0; 80]).is_empty());
}

#[test]
fn test_canonical_breakout_after_steady_rise() {
    let engine = EngineBuilder::new().with_canonical_defaults().build().unwrap();
    let closes: Vec<f64> = (0..11).map(|i| 100.0 + i as f64).collect();
    let found = detected(&engine, &closes);
    assert!(found.contains(&PatternId::ASCENDING_TRIANGLE));
    assert!(found.contains(&PatternId::RECTANGLE));
    assert!(!found.contains(&PatternId::RISING_WEDGE));
}

#[test]
fn test_canonical_rising_wedge_breakdown() {
    let engine = EngineBuilder::new().with_canonical_defaults().build().unwrap();
    let mut closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
    closes.push(104.0);
    let found = detected(&engine, &closes);
    assert!(found.contains(&PatternId::RISING_WEDGE));
    assert!(!found.contains(&PatternId::ASCENDING_TRIANGLE));
}

#[test]
fn test_legacy_double_top_touch_count() {
    let mut closes: Vec<f64> = (0..40).map(|i| 90.0 + (i % 5) as f64).collect();
    closes[8] = 130.0;

    let engine = EngineBuilder::new().with_legacy_defaults().build().unwrap();
    assert!(!detected(&engine, &closes).contains(&PatternId::DOUBLE_TOP));

    closes[27] = 130.0;
    assert!(detected(&engine, &closes).contains(&PatternId::DOUBLE_TOP));
}

#[test]
fn test_legacy_relative_price_match_from_config() {
    let mut closes: Vec<f64> = (0..40).map(|i| 90.0 + (i % 5) as f64).collect();
    closes[8] = 130.0;
    closes[27] = 129.95;

    let exact = EngineBuilder::new().with_legacy_defaults().build().unwrap();
    assert!(!detected(&exact, &closes).contains(&PatternId::DOUBLE_TOP));

    let config = EngineConfig {
        rule_set: RuleSet::Legacy,
        price_match: PriceMatch::Relative(0.001),
        ..Default::default()
    };
    let tolerant = EngineBuilder::new()
        .config(config)
        .with_default_patterns()
        .build()
        .unwrap();
    assert!(detected(&tolerant, &closes).contains(&PatternId::DOUBLE_TOP));
}

#[test]
fn test_custom_detector_runs_after_builtin() {
    struct LastCloseAbove(f64);

    impl PatternDetector for LastCloseAbove {
        fn id(&self) -> PatternId {
            PatternId("Last Close Above")
        }

        fn min_bars(&self) -> usize {
            1
        }

        fn evaluate<T: OHLCV>(&self, bars: &[T]) -> Option<bool> {
            Some(bars.last()?.close() > self.0)
        }
    }

    let engine = EngineBuilder::new()
        .add(BuiltinDetector::BullFlag(BullFlagDetector::with_defaults()))
        .add_custom(LastCloseAbove(150.0))
        .build()
        .unwrap();

    let signals = engine.detect_patterns(&series(&[100.0, 160.0]));
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[1].pattern, PatternId("Last Close Above"));
    assert!(signals[1].detected);
    assert!(!signals[0].detected);
}

// ============================================================
// PROPERTIES
// ============================================================

proptest! {
    #[test]
    fn prop_short_series_never_detected(closes in random_walk(70)) {
        let engine = both_rule_sets();
        let bars = series(&closes);
        for d in engine.builtin_detectors() {
            if bars.len() < d.min_bars() {
                prop_assert!(!d.detect(&bars).detected, "{} fired on {} bars", d.id(), bars.len());
            }
        }
    }

    #[test]
    fn prop_detectors_only_read_their_tail(closes in random_walk(90)) {
        let engine = both_rule_sets();
        let bars = series(&closes);
        for d in engine.builtin_detectors() {
            let n = d.min_bars();
            if bars.len() >= n {
                let tail = &bars[bars.len() - n..];
                prop_assert_eq!(d.detect(&bars), d.detect(tail));
            }
        }
    }

    #[test]
    fn prop_legacy_inverse_head_and_shoulders_never_fires(closes in random_walk(80)) {
        let d = LegacyInverseHeadAndShouldersDetector::default();
        prop_assert!(!PatternDetector::detect(&d, &series(&closes)).detected);
    }
}
