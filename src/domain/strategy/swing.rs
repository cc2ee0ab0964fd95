//! Swing strategy: medium-term trend with band extremes.
//!
//! | rule                                                   | weight |
//! |--------------------------------------------------------|--------|
//! | RSI(14) > 70 SELL, < 30 BUY                            | 0.2    |
//! | MACD line > signal and histogram > 0 BUY (mirror SELL) | 0.3    |
//! | close <= lower band BUY, close >= upper band SELL      | 0.3    |
//! | SMA(20) > SMA(50) and close > SMA(20) BUY (mirror SELL)| 0.2    |
//!
//! Needs at least two votes and a strict majority.

use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::indicator::{
    calculate_bollinger, calculate_macd, calculate_rsi, calculate_sma, IndicatorValue,
};
use crate::domain::ohlcv::PriceBar;
use crate::domain::signal::StrategySignal;
use crate::domain::strategy::{
    check_last_bar, oscillator_vote, resolve_signal, SignalStrategy, StrategyParameters, Vote,
    VoteTally, VoteThreshold,
};

pub const NAME: &str = "swing";
const MIN_BARS: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct SwingStrategy;

fn macd_vote(line: f64, signal: f64, histogram: f64) -> Option<Vote> {
    if line > signal && histogram > 0.0 {
        Some(Vote::Buy)
    } else if line < signal && histogram < 0.0 {
        Some(Vote::Sell)
    } else {
        None
    }
}

/// Zero-width bands abstain.
fn band_vote(close: f64, upper: f64, lower: f64) -> Option<Vote> {
    if upper <= lower {
        return None;
    }
    if close <= lower {
        Some(Vote::Buy)
    } else if close >= upper {
        Some(Vote::Sell)
    } else {
        None
    }
}

fn trend_vote(close: f64, sma_20: f64, sma_50: f64) -> Option<Vote> {
    if sma_20 > sma_50 && close > sma_20 {
        Some(Vote::Buy)
    } else if sma_20 < sma_50 && close < sma_20 {
        Some(Vote::Sell)
    } else {
        None
    }
}

impl SignalStrategy for SwingStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn parameters(&self) -> StrategyParameters {
        StrategyParameters {
            name: NAME.to_string(),
            display_name: "Swing Trading".to_string(),
            min_bars: MIN_BARS,
            timeframe: "1h-4h".to_string(),
            hold_time: "days-weeks".to_string(),
            risk_level: "medium".to_string(),
            indicators: vec![
                "RSI(14)".into(),
                "MACD(12,26,9)".into(),
                "Bollinger Bands(20,2)".into(),
                "MA(20,50)".into(),
            ],
            threshold: VoteThreshold::MajorityOf(2),
            hold_damping: 0.5,
        }
    }

    fn generate_signal(&self, bars: &[PriceBar]) -> Result<StrategySignal, TraderError> {
        if bars.len() < MIN_BARS {
            return Ok(StrategySignal::insufficient_data(NAME, bars.len(), MIN_BARS));
        }
        let close = check_last_bar(bars)?.close;

        let rsi = calculate_rsi(bars, 14).last_simple();
        let macd = match calculate_macd(bars, 12, 26, 9).last() {
            Some(IndicatorValue::Macd {
                line,
                signal,
                histogram,
            }) => Some((line, signal, histogram)),
            _ => None,
        };
        let bands = match calculate_bollinger(bars, 20, 200).last() {
            Some(IndicatorValue::Bollinger { upper, lower, .. }) => Some((upper, lower)),
            _ => None,
        };
        let sma_20 = calculate_sma(bars, 20).last_simple();
        let sma_50 = calculate_sma(bars, 50).last_simple();

        let mut tally = VoteTally::default();
        tally.cast(oscillator_vote(rsi, 30.0, 70.0), 0.2);
        tally.cast(macd.and_then(|(l, s, h)| macd_vote(l, s, h)), 0.3);
        tally.cast(bands.and_then(|(u, l)| band_vote(close, u, l)), 0.3);
        tally.cast(
            sma_20.zip(sma_50).and_then(|(s20, s50)| trend_vote(close, s20, s50)),
            0.2,
        );

        let indicators = BTreeMap::from([
            ("rsi".to_string(), rsi),
            ("macd".to_string(), macd.map(|m| m.0)),
            ("bollinger_upper".to_string(), bands.map(|b| b.0)),
            ("bollinger_lower".to_string(), bands.map(|b| b.1)),
            ("sma_20".to_string(), sma_20),
            ("sma_50".to_string(), sma_50),
        ]);

        Ok(resolve_signal(&self.parameters(), &tally, indicators))
    }
}
