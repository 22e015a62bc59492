//! Strategy signal scanners
//!
//! Each scanner walks the whole series once and emits a [`SignalEvent`] for
//! every bar that satisfies its rule. Scanners keep no state between calls.

use crate::{
    indicators::{ema_pair, vwap},
    window::rolling_mean,
    AnalysisError, Period, Result, SignalEvent, StrategyId, StrategyScanner, OHLCV,
};

fn event<T: OHLCV>(bars: &[T], index: usize, strategy: StrategyId, label: &'static str) -> SignalEvent {
    SignalEvent {
        timestamp: bars[index].timestamp(),
        index,
        strategy,
        label,
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(AnalysisError::InvalidConfig(format!(
            "{name} must be > 0, got {value}"
        )));
    }
    Ok(())
}

// ============================================================
// BREAKOUT
// ============================================================

/// Close above every earlier high on a volume surge.
///
/// At bar `i >= 1`: `close[i] > max(high[0..i])` and
/// `volume[i] > volume_multiplier * volume[i - 1]`.
#[derive(Debug, Clone)]
pub struct BreakoutScanner {
    pub volume_multiplier: f64,
}

impl Default for BreakoutScanner {
    fn default() -> Self {
        Self {
            volume_multiplier: 1.5,
        }
    }
}

impl StrategyScanner for BreakoutScanner {
    fn id(&self) -> StrategyId {
        StrategyId::BREAKOUT
    }

    fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        let Some(first) = bars.first() else {
            return events;
        };

        let mut prior_high = first.high();
        for i in 1..bars.len() {
            let bar = &bars[i];
            if bar.close() > prior_high
                && bar.volume() > bars[i - 1].volume() * self.volume_multiplier
            {
                events.push(event(bars, i, StrategyId::BREAKOUT, "Breakout"));
            }
            prior_high = prior_high.max(bar.high());
        }
        events
    }

    fn validate_config(&self) -> Result<()> {
        check_positive("breakout volume multiplier", self.volume_multiplier)
    }
}

// ============================================================
// VWAP BOUNCE
// ============================================================

/// Close just above VWAP: `0 < close[i] - VWAP[i] < tolerance` at `i >= 1`.
///
/// The tolerance is an absolute price distance. VWAP accumulates from the
/// first bar passed in, so the events depend on where the series starts.
#[derive(Debug, Clone)]
pub struct VwapBounceScanner {
    pub tolerance: f64,
}

impl Default for VwapBounceScanner {
    fn default() -> Self {
        Self { tolerance: 0.2 }
    }
}

impl StrategyScanner for VwapBounceScanner {
    fn id(&self) -> StrategyId {
        StrategyId::VWAP_BOUNCE
    }

    fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<SignalEvent> {
        vwap(bars)
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, v)| {
                let v = (*v)?;
                let close = bars[i].close();
                ((close - v).abs() < self.tolerance && close > v)
                    .then(|| event(bars, i, StrategyId::VWAP_BOUNCE, "VWAP Bounce"))
            })
            .collect()
    }

    fn validate_config(&self) -> Result<()> {
        check_positive("VWAP bounce tolerance", self.tolerance)
    }
}

// ============================================================
// EMA CROSSOVER
// ============================================================

/// Short EMA crossing up through the long EMA.
#[derive(Debug, Clone)]
pub struct EmaCrossoverScanner {
    pub short: Period,
    pub long: Period,
}

impl Default for EmaCrossoverScanner {
    fn default() -> Self {
        Self {
            short: Period::new_const(9),
            long: Period::new_const(20),
        }
    }
}

impl StrategyScanner for EmaCrossoverScanner {
    fn id(&self) -> StrategyId {
        StrategyId::EMA_CROSSOVER
    }

    fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<SignalEvent> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
        ema_pair(&closes, self.short.get(), self.long.get())
            .bullish_crosses()
            .into_iter()
            .map(|i| event(bars, i, StrategyId::EMA_CROSSOVER, "Bullish EMA Crossover"))
            .collect()
    }

    fn validate_config(&self) -> Result<()> {
        if self.short >= self.long {
            return Err(AnalysisError::InvalidConfig(format!(
                "EMA short span {} must be below long span {}",
                self.short.get(),
                self.long.get()
            )));
        }
        Ok(())
    }
}

// ============================================================
// ABCD
// ============================================================

/// Four-bar ABCD swing: `A = low[i-3]`, `B = high[i-2]`, `C = low[i-1]`,
/// `D = close[i]`; fires when `A < C < B` and `D > B`.
#[derive(Debug, Clone, Default)]
pub struct AbcdScanner;

impl StrategyScanner for AbcdScanner {
    fn id(&self) -> StrategyId {
        StrategyId::ABCD
    }

    fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<SignalEvent> {
        (3..bars.len())
            .filter(|&i| {
                let a = bars[i - 3].low();
                let b = bars[i - 2].high();
                let c = bars[i - 1].low();
                let d = bars[i].close();
                a < c && c < b && d > b
            })
            .map(|i| event(bars, i, StrategyId::ABCD, "ABCD Pattern"))
            .collect()
    }
}

// ============================================================
// UNUSUAL VOLUME
// ============================================================

/// Volume spike: `volume[i] > threshold * mean(volume[i-window+1..=i])`
/// for `i >= window`.
#[derive(Debug, Clone)]
pub struct UnusualVolumeScanner {
    pub window: Period,
    pub threshold: f64,
}

impl Default for UnusualVolumeScanner {
    fn default() -> Self {
        Self {
            window: Period::new_const(10),
            threshold: 2.0,
        }
    }
}

impl StrategyScanner for UnusualVolumeScanner {
    fn id(&self) -> StrategyId {
        StrategyId::UNUSUAL_VOLUME
    }

    fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<SignalEvent> {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume()).collect();
        let average = rolling_mean(&volumes, self.window.get());
        (self.window.get()..bars.len())
            .filter(|&i| matches!(average[i], Some(avg) if volumes[i] > avg * self.threshold))
            .map(|i| event(bars, i, StrategyId::UNUSUAL_VOLUME, "Unusual Volume"))
            .collect()
    }

    fn validate_config(&self) -> Result<()> {
        check_positive("unusual volume threshold", self.threshold)
    }
}
