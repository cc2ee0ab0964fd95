//! Indicator snapshot at the last bar of a series.
//!
//! Names follow the analysis report format: `sma_20`, `rsi_14`, `macd`, ...
//! A name maps to `None` while its indicator is still warming up.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::indicator::{
    calculate_bollinger, calculate_ema, calculate_macd, calculate_rsi, calculate_sma,
    calculate_stochastic, IndicatorValue,
};
use crate::domain::ohlcv::PriceBar;

pub const SMA_20: &str = "sma_20";
pub const SMA_50: &str = "sma_50";
pub const EMA_12: &str = "ema_12";
pub const EMA_26: &str = "ema_26";
pub const MACD: &str = "macd";
pub const MACD_SIGNAL: &str = "macd_signal";
pub const MACD_HISTOGRAM: &str = "macd_histogram";
pub const RSI_14: &str = "rsi_14";
pub const BB_UPPER: &str = "bb_upper";
pub const BB_MIDDLE: &str = "bb_middle";
pub const BB_LOWER: &str = "bb_lower";
pub const STOCH_K: &str = "stoch_k";
pub const STOCH_D: &str = "stoch_d";

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub current_price: f64,
    values: BTreeMap<String, Option<f64>>,
}

impl IndicatorSnapshot {
    /// Compute the standard indicator set at the last bar. `None` for an empty series.
    ///
    /// Ordering is not checked here; callers validate the series first.
    pub fn from_bars(bars: &[PriceBar]) -> Option<Self> {
        let last = bars.last()?;
        let mut values = BTreeMap::new();

        values.insert(SMA_20.to_string(), calculate_sma(bars, 20).last_simple());
        values.insert(SMA_50.to_string(), calculate_sma(bars, 50).last_simple());
        values.insert(EMA_12.to_string(), calculate_ema(bars, 12).last_simple());
        values.insert(EMA_26.to_string(), calculate_ema(bars, 26).last_simple());
        values.insert(RSI_14.to_string(), calculate_rsi(bars, 14).last_simple());

        let (line, signal, histogram) = match calculate_macd(bars, 12, 26, 9).last() {
            Some(IndicatorValue::Macd {
                line,
                signal,
                histogram,
            }) => (Some(line), Some(signal), Some(histogram)),
            _ => (None, None, None),
        };
        values.insert(MACD.to_string(), line);
        values.insert(MACD_SIGNAL.to_string(), signal);
        values.insert(MACD_HISTOGRAM.to_string(), histogram);

        let (upper, middle, lower) = match calculate_bollinger(bars, 20, 200).last() {
            Some(IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            }) => (Some(upper), Some(middle), Some(lower)),
            _ => (None, None, None),
        };
        values.insert(BB_UPPER.to_string(), upper);
        values.insert(BB_MIDDLE.to_string(), middle);
        values.insert(BB_LOWER.to_string(), lower);

        let (k, d) = match calculate_stochastic(bars, 14, 3).last() {
            Some(IndicatorValue::Stochastic { k, d }) => (Some(k), Some(d)),
            _ => (None, None),
        };
        values.insert(STOCH_K.to_string(), k);
        values.insert(STOCH_D.to_string(), d);

        Some(IndicatorSnapshot {
            timestamp: last.timestamp,
            current_price: last.close,
            values,
        })
    }

    /// Build a snapshot from explicit readings.
    pub fn from_values(
        timestamp: DateTime<Utc>,
        current_price: f64,
        readings: impl IntoIterator<Item = (String, Option<f64>)>,
    ) -> Self {
        IndicatorSnapshot {
            timestamp,
            current_price,
            values: readings.into_iter().collect(),
        }
    }

    /// Reading for `name`; `None` if undefined or unknown.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
