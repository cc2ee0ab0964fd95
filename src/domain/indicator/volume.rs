//! Volume moving average.
//!
//! VOLUME_SMA(n)[i] = mean(V[i-n+1..=i]). Used to spot volume spikes.

use crate::domain::indicator::{
    rolling_mean, series_from, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_volume_sma(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let volumes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.volume)).collect();
    let means = rolling_mean(&volumes, period);
    series_from(
        IndicatorType::VolumeSma(period),
        bars,
        means.into_iter().map(|m| m.map(IndicatorValue::Simple)),
    )
}
