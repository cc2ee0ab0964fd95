//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0 and avg_gain > 0: RSI = 100.
//! If both averages are 0 the window had no movement and RSI is undefined.
//!
//! Warmup: first n bars are undefined (need n price changes to compute initial average).

use crate::domain::indicator::{series_from, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = rsi_values(&closes, period);
    series_from(
        IndicatorType::Rsi(period),
        bars,
        values.into_iter().map(|v| v.map(IndicatorValue::Simple)),
    )
}

pub(crate) fn rsi_values(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;
    out[period] = rsi_from_averages(avg_gain, avg_loss);

    for i in (period + 1)..closes.len() {
        let change = changes[i - 1];
        avg_gain = (avg_gain * (period - 1) as f64 + gain(change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(change)) / period as f64;
        out[i] = rsi_from_averages(avg_gain, avg_loss);
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return None;
        }
        return Some(100.0);
    }
    let rsi = 100.0 - (100.0 / (1.0 + avg_gain / avg_loss));
    Some(rsi.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn rising(n: usize) -> Vec<PriceBar> {
        let prices: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        make_bars(&prices)
    }

    #[test]
    fn rsi_empty_bars() {
        let series = calculate_rsi(&[], 14);
        assert_eq!(series.values.len(), 0);
    }

    #[test]
    fn rsi_single_bar() {
        let bars = make_bars(&[100.0]);
        let series = calculate_rsi(&bars, 14);
        assert_eq!(series.values.len(), 1);
        assert!(series.values[0].value.is_none());
    }

    #[test]
    fn rsi_warmup_period() {
        let prices: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let bars = make_bars(&prices);
        let series = calculate_rsi(&bars, 14);

        assert_eq!(series.values.len(), 15);
        for i in 0..14 {
            assert!(series.values[i].value.is_none(), "Bar {} should be undefined", i);
        }
        assert!(series.values[14].value.is_some(), "Bar 14 should be defined");
    }

    #[test]
    fn rsi_all_gains_saturates_at_100() {
        let series = calculate_rsi(&rising(15), 14);
        let rsi = series.last_simple().unwrap();
        assert!((rsi - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 14);
        let rsi = series.last_simple().unwrap();
        assert!(rsi.abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_series_is_undefined() {
        let series = calculate_rsi(&make_bars(&[50.0; 30]), 14);
        assert_eq!(series.defined_count(), 0);
    }

    #[test]
    fn rsi_in_range() {
        let prices: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let series = calculate_rsi(&make_bars(&prices), 14);

        for point in &series.values {
            if let Some(IndicatorValue::Simple(rsi)) = point.value {
                assert!((0.0..=100.0).contains(&rsi), "RSI {} out of range", rsi);
                assert!(rsi.is_finite());
            }
        }
    }

    #[test]
    fn rsi_indicator_type() {
        let series = calculate_rsi(&make_bars(&[100.0]), 14);
        assert_eq!(series.indicator_type, IndicatorType::Rsi(14));
    }

    #[test]
    fn rsi_zero_period() {
        let series = calculate_rsi(&make_bars(&[100.0, 101.0]), 0);
        assert_eq!(series.values.len(), 2);
        assert_eq!(series.defined_count(), 0);
    }

    #[test]
    fn rsi_known_calculation() {
        // Seed: changes over first 3 bars are +2, -1, +1 -> avg_gain 1, avg_loss 1/3.
        let bars = make_bars(&[10.0, 12.0, 11.0, 12.0, 11.0]);
        let series = calculate_rsi(&bars, 3);

        let seed = series.value_at(3).and_then(|v| v.as_simple()).unwrap();
        assert!((seed - 75.0).abs() < 1e-9);

        // Next change -1: avg_gain = 2/3, avg_loss = (2/3 + 1)/3 = 5/9.
        let next = series.value_at(4).and_then(|v| v.as_simple()).unwrap();
        let expected = 100.0 - 100.0 / (1.0 + (2.0 / 3.0) / (5.0 / 9.0));
        assert!((next - expected).abs() < 1e-9);
    }
}
