//! Standard Deviation indicator.
//!
//! Sample standard deviation over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n) / (n - 1))
//! Warmup: first (n-1) bars are undefined. A period below 2 is always undefined.

use crate::domain::indicator::{series_from, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_stddev(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = stddev_values(&closes, period);
    series_from(
        IndicatorType::Stddev(period),
        bars,
        values.into_iter().map(|v| v.map(IndicatorValue::Simple)),
    )
}

pub(crate) fn stddev_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period < 2 {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / (period - 1) as f64;
        out[i] = Some(variance.sqrt());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn stddev_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_stddev(&bars, 3);

        assert!(series.values[0].value.is_none());
        assert!(series.values[1].value.is_none());
        assert!(series.values[2].value.is_some());
        assert!(series.values[4].value.is_some());
    }

    #[test]
    fn stddev_constant_values() {
        let bars = make_bars(&[100.0; 5]);
        let series = calculate_stddev(&bars, 3);
        assert_eq!(series.value_at(2), Some(IndicatorValue::Simple(0.0)));
    }

    #[test]
    fn stddev_basic_calculation() {
        // mean 20, squared deviations 100 + 0 + 100, divided by n-1 = 2
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let v = calculate_stddev(&bars, 3).last_simple().unwrap();
        assert!((v - 10.0).abs() < 1e-10);
    }

    #[test]
    fn stddev_known_values() {
        // Population std of this set is 2.0; sample std is sqrt(32/7).
        let bars = make_bars(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let v = calculate_stddev(&bars, 8).last_simple().unwrap();
        assert!((v - (32.0_f64 / 7.0).sqrt()).abs() < 1e-10);
    }

    #[test]
    fn stddev_period_one_is_undefined() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        assert_eq!(calculate_stddev(&bars, 1).defined_count(), 0);
    }

    #[test]
    fn stddev_indicator_type() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        assert_eq!(
            calculate_stddev(&bars, 5).indicator_type,
            IndicatorType::Stddev(5)
        );
    }
}
