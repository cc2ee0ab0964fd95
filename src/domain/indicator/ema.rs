//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = EMA[i-1] + k*(C[i] - EMA[i-1]).
//! Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{series_from, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_ema(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = ema_values(&closes, period);
    series_from(
        IndicatorType::Ema(period),
        bars,
        values.into_iter().map(|v| v.map(IndicatorValue::Simple)),
    )
}

/// EMA over raw values, `None` during warm-up.
pub(crate) fn ema_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i < period - 1 {
            sum += value;
        } else if i == period - 1 {
            sum += value;
            ema = sum / period as f64;
            out[i] = Some(ema);
        } else {
            ema += k * (value - ema);
            out[i] = Some(ema);
        }
    }

    out
}
