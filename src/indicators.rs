//! Indicator calculators
//!
//! RSI, MACD, EMA pair and VWAP computed from a series of bars. Every function
//! returns a series aligned bar-for-bar with its input; [`IndicatorSnapshot`]
//! collects the latest values for the fusion step.

use serde::{Deserialize, Serialize};

use crate::{params::IndicatorParams, window, OHLCV};

// ============================================================
// RSI
// ============================================================

/// Wilder's Relative Strength Index.
///
/// The first average gain/loss is the simple mean of the first `length`
/// close-to-close changes; later averages use Wilder smoothing
/// `(prev * (length - 1) + x) / length`. Bars before index `length` are `None`.
///
/// A zero average loss gives 100. Flat prices (both averages zero) give 50.
pub fn rsi(closes: &[f64], length: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if length == 0 || closes.len() <= length {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| c.max(0.0);
    let loss = |c: f64| (-c).max(0.0);

    let period = length as f64;
    let mut avg_gain = changes[..length].iter().copied().map(gain).sum::<f64>() / period;
    let mut avg_loss = changes[..length].iter().copied().map(loss).sum::<f64>() / period;
    out[length] = Some(rsi_value(avg_gain, avg_loss));

    for (offset, &c) in changes[length..].iter().enumerate() {
        avg_gain = (avg_gain * (period - 1.0) + gain(c)) / period;
        avg_loss = (avg_loss * (period - 1.0) + loss(c)) / period;
        out[length + 1 + offset] = Some(rsi_value(avg_gain, avg_loss));
    }

    out
}

#[inline]
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return 50.0;
        }
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

// ============================================================
// MACD
// ============================================================

/// MACD line, signal line and histogram, aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// `MACD = EMA_fast - EMA_slow`, `signal = EMA_signal(MACD)`,
/// `histogram = MACD - signal`. All EMAs are seeded with their first input.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = window::ema(closes, fast);
    let slow_ema = window::ema(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = window::ema(&line, signal);
    let histogram = line.iter().zip(&signal_line).map(|(m, s)| m - s).collect();

    Macd {
        macd: line,
        signal: signal_line,
        histogram,
    }
}

// ============================================================
// EMA PAIR
// ============================================================

/// Short and long EMAs of the closes.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaPair {
    pub short: Vec<f64>,
    pub long: Vec<f64>,
}

pub fn ema_pair(closes: &[f64], short: usize, long: usize) -> EmaPair {
    EmaPair {
        short: window::ema(closes, short),
        long: window::ema(closes, long),
    }
}

impl EmaPair {
    /// Indices where the short EMA crosses up through the long EMA:
    /// `short[i-1] < long[i-1]` and `short[i] >= long[i]`.
    pub fn bullish_crosses(&self) -> Vec<usize> {
        (1..self.short.len().min(self.long.len()))
            .filter(|&i| {
                self.short[i - 1] < self.long[i - 1] && self.short[i] >= self.long[i]
            })
            .collect()
    }
}

// ============================================================
// VWAP
// ============================================================

/// Cumulative volume-weighted average price, `Σ(close·volume) / Σ(volume)`.
///
/// The accumulation starts at the first bar of the slice passed in. VWAP is
/// therefore relative to the supplied window, not to a trading session:
/// passing a longer history changes every value, including earlier ones.
/// Positions where cumulative volume is still zero are `None`.
pub fn vwap<T: OHLCV>(bars: &[T]) -> Vec<Option<f64>> {
    let mut pv = 0.0;
    let mut vol = 0.0;
    bars.iter()
        .map(|bar| {
            pv += bar.close() * bar.volume();
            vol += bar.volume();
            (vol > 0.0).then(|| pv / vol)
        })
        .collect()
}

// ============================================================
// SNAPSHOT
// ============================================================

/// Latest value of each indicator. `None` means insufficient data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub vwap: Option<f64>,
}

impl IndicatorSnapshot {
    /// Compute all indicators over `bars` and keep the last value of each.
    ///
    /// The MACD histogram is only reported once `slow + signal - 1` bars exist,
    /// so the signal line has a full span of MACD values behind it.
    pub fn compute<T: OHLCV>(bars: &[T], params: &IndicatorParams) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();

        let rsi = rsi(&closes, params.rsi_length.get())
            .last()
            .copied()
            .flatten();

        let warmup = params.macd_slow.get().saturating_add(params.macd_signal.get()) - 1;
        let macd_histogram = if closes.len() >= warmup {
            macd(
                &closes,
                params.macd_fast.get(),
                params.macd_slow.get(),
                params.macd_signal.get(),
            )
            .histogram
            .last()
            .copied()
        } else {
            None
        };

        let emas = ema_pair(&closes, params.ema_short.get(), params.ema_long.get());

        Self {
            rsi,
            macd_histogram,
            ema_short: emas.short.last().copied(),
            ema_long: emas.long.last().copied(),
            vwap: vwap(bars).last().copied().flatten(),
        }
    }
}
