//! Daily strategy: long-horizon confirmation from several families.
//!
//! | rule                                                 | weight |
//! |------------------------------------------------------|--------|
//! | RSI(21) > 65 SELL, < 35 BUY                          | 0.15   |
//! | MACD line crossing its signal on the last bar        | 0.25   |
//! | SMA(50) vs SMA(200)                                  | 0.3    |
//! | Stochastic(14,3) K,D < 20 with K > D BUY (mirror 80) | 0.15   |
//! | volume > 1.5 × SMA(20) of volume with a rising close | 0.15   |
//!
//! Needs at least three votes on one side.

use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::indicator::{
    calculate_macd, calculate_rsi, calculate_sma, calculate_stochastic, calculate_volume_sma,
    IndicatorValue,
};
use crate::domain::ohlcv::PriceBar;
use crate::domain::signal::StrategySignal;
use crate::domain::strategy::{
    check_last_bar, compare_vote, oscillator_vote, resolve_signal, SignalStrategy,
    StrategyParameters, Vote, VoteTally, VoteThreshold,
};

pub const NAME: &str = "daily";
const MIN_BARS: usize = 100;
const VOLUME_SPIKE: f64 = 1.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct DailyStrategy;

fn macd_pair(value: Option<IndicatorValue>) -> Option<(f64, f64)> {
    match value {
        Some(IndicatorValue::Macd { line, signal, .. }) => Some((line, signal)),
        _ => None,
    }
}

/// Bullish cross: line moves from at-or-below to above its signal.
fn cross_vote(previous: (f64, f64), current: (f64, f64)) -> Option<Vote> {
    let (prev_line, prev_signal) = previous;
    let (line, signal) = current;
    if line > signal && prev_line <= prev_signal {
        Some(Vote::Buy)
    } else if line < signal && prev_line >= prev_signal {
        Some(Vote::Sell)
    } else {
        None
    }
}

fn stochastic_vote(k: f64, d: f64) -> Option<Vote> {
    if k < 20.0 && d < 20.0 && k > d {
        Some(Vote::Buy)
    } else if k > 80.0 && d > 80.0 && k < d {
        Some(Vote::Sell)
    } else {
        None
    }
}

fn volume_vote(bars: &[PriceBar], average: Option<f64>) -> Option<Vote> {
    let average = average?;
    let [.., previous, last] = bars else {
        return None;
    };
    if last.volume > average * VOLUME_SPIKE && last.close > previous.close {
        Some(Vote::Buy)
    } else {
        None
    }
}

impl SignalStrategy for DailyStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn parameters(&self) -> StrategyParameters {
        StrategyParameters {
            name: NAME.to_string(),
            display_name: "Daily Trading".to_string(),
            min_bars: MIN_BARS,
            timeframe: "4h-1d".to_string(),
            hold_time: "weeks-months".to_string(),
            risk_level: "low".to_string(),
            indicators: vec![
                "RSI(21)".into(),
                "MACD(12,26,9)".into(),
                "MA(50,200)".into(),
                "Stochastic(14,3)".into(),
            ],
            threshold: VoteThreshold::AtLeast(3),
            hold_damping: 0.3,
        }
    }

    fn generate_signal(&self, bars: &[PriceBar]) -> Result<StrategySignal, TraderError> {
        if bars.len() < MIN_BARS {
            return Ok(StrategySignal::insufficient_data(NAME, bars.len(), MIN_BARS));
        }
        check_last_bar(bars)?;

        let rsi = calculate_rsi(bars, 21).last_simple();
        let macd_series = calculate_macd(bars, 12, 26, 9);
        let macd_now = macd_pair(macd_series.last());
        let macd_prev = macd_pair(macd_series.previous());
        let sma_50 = calculate_sma(bars, 50).last_simple();
        let sma_200 = calculate_sma(bars, 200).last_simple();
        let stoch = match calculate_stochastic(bars, 14, 3).last() {
            Some(IndicatorValue::Stochastic { k, d }) => Some((k, d)),
            _ => None,
        };
        let volume_avg = calculate_volume_sma(bars, 20).last_simple();

        let mut tally = VoteTally::default();
        tally.cast(oscillator_vote(rsi, 35.0, 65.0), 0.15);
        tally.cast(
            macd_prev.zip(macd_now).and_then(|(p, c)| cross_vote(p, c)),
            0.25,
        );
        tally.cast(compare_vote(sma_50, sma_200), 0.3);
        tally.cast(stoch.and_then(|(k, d)| stochastic_vote(k, d)), 0.15);
        tally.cast(volume_vote(bars, volume_avg), 0.15);

        let indicators = BTreeMap::from([
            ("rsi".to_string(), rsi),
            ("macd".to_string(), macd_now.map(|m| m.0)),
            ("sma_50".to_string(), sma_50),
            ("sma_200".to_string(), sma_200),
            ("stochastic_k".to_string(), stoch.map(|s| s.0)),
            ("stochastic_d".to_string(), stoch.map(|s| s.1)),
            ("volume_sma_20".to_string(), volume_avg),
        ]);

        Ok(resolve_signal(&self.parameters(), &tally, indicators))
    }
}
