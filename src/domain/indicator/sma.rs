//! Simple Moving Average indicator.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{
    rolling_mean, series_from, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_sma(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
    let means = rolling_mean(&closes, period);
    series_from(
        IndicatorType::Sma(period),
        bars,
        means.into_iter().map(|m| m.map(IndicatorValue::Simple)),
    )
}
