//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the sample standard deviation (divides by N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are undefined.

use crate::domain::indicator::stddev::stddev_values;
use crate::domain::indicator::{
    rolling_mean, series_from, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::PriceBar;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    bars: &[PriceBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let wrapped: Vec<Option<f64>> = closes.iter().copied().map(Some).collect();

    let middles = rolling_mean(&wrapped, period);
    let deviations = stddev_values(&closes, period);

    let values = middles.into_iter().zip(deviations).map(|(middle, sd)| {
        let middle = middle?;
        let sd = sd?;
        Some(IndicatorValue::Bollinger {
            upper: middle + mult * sd,
            middle,
            lower: middle - mult * sd,
        })
    });

    series_from(
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        bars,
        values,
    )
}
