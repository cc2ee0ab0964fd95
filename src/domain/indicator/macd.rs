//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded with the mean of its first
//! `signal` defined values
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 + signal - 1 bars (i.e., slow - 1 + signal - 1 for defaults)

use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{series_from, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[PriceBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    if bars.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let macd_warmup = fast.max(slow) - 1;
    let mut signal_line: Vec<Option<f64>> = vec![None; bars.len()];
    let seed_end = macd_warmup + signal_period;

    if seed_end <= bars.len() {
        let k = 2.0 / (signal_period as f64 + 1.0);
        let seed: f64 = macd_line[macd_warmup..seed_end]
            .iter()
            .map(|v| v.unwrap_or(0.0))
            .sum::<f64>()
            / signal_period as f64;

        let mut signal_ema = seed;
        signal_line[seed_end - 1] = Some(signal_ema);

        for i in seed_end..bars.len() {
            if let Some(line) = macd_line[i] {
                signal_ema += k * (line - signal_ema);
                signal_line[i] = Some(signal_ema);
            }
        }
    }

    let values = macd_line.iter().zip(&signal_line).map(|(line, signal)| {
        let line = (*line)?;
        let signal = (*signal)?;
        Some(IndicatorValue::Macd {
            line,
            signal,
            histogram: line - signal,
        })
    });

    series_from(indicator_type, bars, values)
}

pub fn calculate_macd_default(bars: &[PriceBar]) -> IndicatorSeries {
    calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}
