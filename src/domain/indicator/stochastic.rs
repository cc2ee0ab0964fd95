//! Stochastic oscillator.
//!
//! %K(n)[i] = 100 × (C[i] - LL) / (HH - LL) over the last n bars' highs and lows.
//! %D(m)[i] = SMA(m) of %K.
//! %K is undefined when the window has no range (HH == LL), and any %D window
//! touching such a bar is undefined too.

use crate::domain::indicator::{
    rolling_mean, series_from, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_stochastic(bars: &[PriceBar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    let mut k_values: Vec<Option<f64>> = vec![None; bars.len()];

    if k_period > 0 {
        for i in (k_period - 1)..bars.len() {
            let window = &bars[i + 1 - k_period..=i];
            let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = highest - lowest;
            if range > 0.0 {
                k_values[i] = Some((bars[i].close - lowest) / range * 100.0);
            }
        }
    }

    let d_values = rolling_mean(&k_values, d_period);

    let values = k_values.into_iter().zip(d_values).map(|(k, d)| {
        Some(IndicatorValue::Stochastic { k: k?, d: d? })
    });

    series_from(indicator_type, bars, values)
}
