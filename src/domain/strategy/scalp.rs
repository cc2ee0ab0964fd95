//! Scalp strategy: fast oscillators over short windows.
//!
//! | rule                         | weight |
//! |------------------------------|--------|
//! | RSI(10) > 80 SELL, < 20 BUY  | 0.3    |
//! | MACD(6,13,5) line vs signal  | 0.3    |
//! | SMA(5) vs SMA(10)            | 0.4    |
//!
//! The side with more votes wins.

use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::indicator::{calculate_macd, calculate_rsi, calculate_sma, IndicatorValue};
use crate::domain::ohlcv::PriceBar;
use crate::domain::signal::StrategySignal;
use crate::domain::strategy::{
    check_last_bar, compare_vote, oscillator_vote, resolve_signal, SignalStrategy,
    StrategyParameters, VoteTally, VoteThreshold,
};

pub const NAME: &str = "scalp";
const MIN_BARS: usize = 20;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScalpStrategy;

impl SignalStrategy for ScalpStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn parameters(&self) -> StrategyParameters {
        StrategyParameters {
            name: NAME.to_string(),
            display_name: "Scalp Trading".to_string(),
            min_bars: MIN_BARS,
            timeframe: "1m-5m".to_string(),
            hold_time: "minutes".to_string(),
            risk_level: "high".to_string(),
            indicators: vec!["RSI(10)".into(), "MACD(6,13,5)".into(), "MA(5,10)".into()],
            threshold: VoteThreshold::NetDifference,
            hold_damping: 0.5,
        }
    }

    fn generate_signal(&self, bars: &[PriceBar]) -> Result<StrategySignal, TraderError> {
        if bars.len() < MIN_BARS {
            return Ok(StrategySignal::insufficient_data(NAME, bars.len(), MIN_BARS));
        }
        check_last_bar(bars)?;

        let rsi = calculate_rsi(bars, 10).last_simple();
        let (macd, macd_signal) = match calculate_macd(bars, 6, 13, 5).last() {
            Some(IndicatorValue::Macd { line, signal, .. }) => (Some(line), Some(signal)),
            _ => (None, None),
        };
        let sma_5 = calculate_sma(bars, 5).last_simple();
        let sma_10 = calculate_sma(bars, 10).last_simple();

        let mut tally = VoteTally::default();
        tally.cast(oscillator_vote(rsi, 20.0, 80.0), 0.3);
        tally.cast(compare_vote(macd, macd_signal), 0.3);
        tally.cast(compare_vote(sma_5, sma_10), 0.4);

        let indicators = BTreeMap::from([
            ("rsi".to_string(), rsi),
            ("macd".to_string(), macd),
            ("macd_signal".to_string(), macd_signal),
            ("sma_5".to_string(), sma_5),
            ("sma_10".to_string(), sma_10),
        ]);

        Ok(resolve_signal(&self.parameters(), &tally, indicators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalDirection;
    use crate::domain::strategy::test_support::{accelerating_decline, flat, geometric};

    #[test]
    fn short_series_is_insufficient() {
        let signal = ScalpStrategy.generate_signal(&geometric(19, 1.01)).unwrap();
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert!(signal.insufficient_data);
    }

    #[test]
    fn uptrend_is_buy() {
        // RSI saturates (SELL 0.3) but MACD and SMA vote BUY (0.7).
        let signal = ScalpStrategy.generate_signal(&geometric(60, 1.01)).unwrap();
        assert_eq!(signal.direction, SignalDirection::Buy);
        assert!((signal.confidence - 0.7).abs() < 1e-9);
        assert_eq!(signal.rationale, "Scalp Trading signal: BUY (confidence 70.0%)");
    }

    #[test]
    fn downtrend_is_sell() {
        let signal = ScalpStrategy.generate_signal(&accelerating_decline(60)).unwrap();
        assert_eq!(signal.direction, SignalDirection::Sell);
        assert!((signal.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn flat_series_holds_with_zero_confidence() {
        let signal = ScalpStrategy.generate_signal(&flat(60)).unwrap();
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.indicators.get("rsi"), Some(&None));
    }

    #[test]
    fn parameters_metadata() {
        let p = ScalpStrategy.parameters();
        assert_eq!(p.min_bars, 20);
        assert_eq!(p.display_name, "Scalp Trading");
        assert_eq!(p.threshold, VoteThreshold::NetDifference);
    }
}
