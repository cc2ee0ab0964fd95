//! Top-level trading decision used by the live loop and the default backtest.
//!
//! Three independent votes on one indicator snapshot:
//! - RSI(14) < 35 BUY, > 65 SELL
//! - MACD line vs its signal
//! - SMA(20) vs SMA(50)
//!
//! Two votes on one side decide; otherwise no action. Undefined readings and
//! exact ties abstain.

use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::{validate_series, PriceBar};
use crate::domain::position::Side;
use crate::domain::risk::RiskManager;
use crate::domain::snapshot::{IndicatorSnapshot, MACD, MACD_SIGNAL, RSI_14, SMA_20, SMA_50};
use crate::domain::strategy::{compare_vote, oscillator_vote, Vote};

const RSI_OVERSOLD: f64 = 35.0;
const RSI_OVERBOUGHT: f64 = 65.0;
const VOTES_NEEDED: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
    None,
}

impl TradeAction {
    pub fn side(self) -> Option<Side> {
        match self {
            TradeAction::Buy => Some(Side::Buy),
            TradeAction::Sell => Some(Side::Sell),
            TradeAction::None => None,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => f.write_str("BUY"),
            TradeAction::Sell => f.write_str("SELL"),
            TradeAction::None => f.write_str("NONE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeDecision {
    pub symbol: String,
    pub action: TradeAction,
    pub reference_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub buy_votes: usize,
    pub sell_votes: usize,
}

/// Turn a snapshot into a decision, pricing stops with `risk`.
pub fn decide(symbol: &str, snapshot: &IndicatorSnapshot, risk: &RiskManager) -> TradeDecision {
    let votes = [
        oscillator_vote(snapshot.get(RSI_14), RSI_OVERSOLD, RSI_OVERBOUGHT),
        compare_vote(snapshot.get(MACD), snapshot.get(MACD_SIGNAL)),
        compare_vote(snapshot.get(SMA_20), snapshot.get(SMA_50)),
    ];
    let buy_votes = votes.iter().filter(|v| **v == Some(Vote::Buy)).count();
    let sell_votes = votes.iter().filter(|v| **v == Some(Vote::Sell)).count();

    let action = if buy_votes >= VOTES_NEEDED {
        TradeAction::Buy
    } else if sell_votes >= VOTES_NEEDED {
        TradeAction::Sell
    } else {
        TradeAction::None
    };

    let price = snapshot.current_price;
    let (stop_loss, take_profit) = match action.side() {
        Some(side) => (
            Some(risk.stop_loss(price, side)),
            Some(risk.take_profit(price, side)),
        ),
        None => (None, None),
    };

    TradeDecision {
        symbol: symbol.to_string(),
        action,
        reference_price: price,
        stop_loss,
        take_profit,
        buy_votes,
        sell_votes,
    }
}

/// Validate the series, snapshot its last bar and decide.
pub fn decide_from_bars(
    symbol: &str,
    bars: &[PriceBar],
    risk: &RiskManager,
) -> Result<TradeDecision, TraderError> {
    validate_series(bars)?;
    let snapshot = IndicatorSnapshot::from_bars(bars).ok_or_else(|| TraderError::InsufficientData {
        symbol: symbol.to_string(),
        bars: 0,
        minimum: 1,
    })?;
    Ok(decide(symbol, &snapshot, risk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::position::test_support::ts;

    fn snapshot(rsi: Option<f64>, macd: (Option<f64>, Option<f64>), sma: (Option<f64>, Option<f64>)) -> IndicatorSnapshot {
        IndicatorSnapshot::from_values(
            ts(0),
            100.0,
            vec![
                (RSI_14.to_string(), rsi),
                (MACD.to_string(), macd.0),
                (MACD_SIGNAL.to_string(), macd.1),
                (SMA_20.to_string(), sma.0),
                (SMA_50.to_string(), sma.1),
            ],
        )
    }

    #[test]
    fn two_buy_votes_buy_with_stops() {
        let snap = snapshot(Some(50.0), (Some(1.0), Some(0.5)), (Some(101.0), Some(100.0)));
        let d = decide("BTC/USDT", &snap, &RiskManager::default());
        assert_eq!(d.action, TradeAction::Buy);
        assert_eq!(d.buy_votes, 2);
        assert!((d.stop_loss.unwrap() - 98.0).abs() < 1e-9);
        assert!((d.take_profit.unwrap() - 105.0).abs() < 1e-9);
    }

    #[test]
    fn two_sell_votes_sell_with_mirrored_stops() {
        let snap = snapshot(Some(70.0), (Some(0.2), Some(0.5)), (Some(101.0), Some(100.0)));
        let d = decide("BTC/USDT", &snap, &RiskManager::default());
        assert_eq!(d.action, TradeAction::Sell);
        assert!((d.stop_loss.unwrap() - 102.0).abs() < 1e-9);
        assert!((d.take_profit.unwrap() - 95.0).abs() < 1e-9);
    }

    #[test]
    fn split_votes_take_no_action() {
        let snap = snapshot(Some(50.0), (Some(1.0), Some(0.5)), (Some(99.0), Some(100.0)));
        let d = decide("BTC/USDT", &snap, &RiskManager::default());
        assert_eq!(d.action, TradeAction::None);
        assert!(d.stop_loss.is_none());
        assert!(d.take_profit.is_none());
    }

    #[test]
    fn undefined_and_tied_readings_abstain() {
        let snap = snapshot(None, (Some(0.0), Some(0.0)), (Some(101.0), Some(100.0)));
        let d = decide("BTC/USDT", &snap, &RiskManager::default());
        assert_eq!(d.buy_votes + d.sell_votes, 1);
        assert_eq!(d.action, TradeAction::None);
    }

    #[test]
    fn flat_series_takes_no_action() {
        let d = decide_from_bars("BTC/USDT", &make_bars(&[100.0; 80]), &RiskManager::default()).unwrap();
        assert_eq!(d.action, TradeAction::None);
        assert_eq!(d.buy_votes + d.sell_votes, 0);
    }

    #[test]
    fn uptrend_buys() {
        let prices: Vec<f64> = (0..80).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let d = decide_from_bars("BTC/USDT", &make_bars(&prices), &RiskManager::default()).unwrap();
        assert_eq!(d.action, TradeAction::Buy);
    }

    #[test]
    fn unordered_series_is_rejected() {
        let mut bars = make_bars(&[1.0, 2.0, 3.0]);
        bars.swap(0, 2);
        let err = decide_from_bars("BTC/USDT", &bars, &RiskManager::default()).unwrap_err();
        assert!(matches!(err, TraderError::UnorderedSeries { .. }));
    }

    #[test]
    fn empty_series_is_insufficient() {
        let err = decide_from_bars("BTC/USDT", &[], &RiskManager::default()).unwrap_err();
        assert!(matches!(err, TraderError::InsufficientData { .. }));
    }
}
