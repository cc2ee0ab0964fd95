//! Trade ledger: the authoritative, append-only record of positions.
//!
//! Positions are created OPEN, may have their stop tightened and their mark
//! updated while open, and are closed exactly once. Nothing is ever removed.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::error::TraderError;
use crate::domain::position::{ExitReason, Position, Side};
use crate::domain::risk::{RiskManager, RiskValidation};

/// Entry details for a position about to be opened.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPosition {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
}

/// One price observation for an open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub price: f64,
    pub time: DateTime<Utc>,
    /// A strategy signal points the other way.
    pub opposing_signal: bool,
    /// Last bar of a replay.
    pub end_of_data: bool,
}

impl Tick {
    pub fn at(price: f64, time: DateTime<Utc>) -> Self {
        Tick {
            price,
            time,
            opposing_signal: false,
            end_of_data: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeLedger {
    positions: Vec<Position>,
    next_id: u64,
}

impl Default for TradeLedger {
    fn default() -> Self {
        TradeLedger {
            positions: Vec::new(),
            next_id: 1,
        }
    }
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored positions; new ids continue after the highest one.
    pub fn restore(positions: Vec<Position>) -> Self {
        let next_id = positions.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let mut positions = positions;
        positions.sort_by_key(|p| p.id);
        TradeLedger { positions, next_id }
    }

    /// Open a position approved by `validation`, taking its stop and target.
    pub fn open(
        &mut self,
        entry: NewPosition,
        validation: &RiskValidation,
    ) -> Result<&Position, TraderError> {
        if !validation.is_valid {
            return Err(TraderError::ValidationRejected {
                reasons: validation.reasons.clone(),
            });
        }
        if !(entry.quantity > 0.0 && entry.entry_price > 0.0) {
            return Err(TraderError::ComputationDegenerate {
                context: format!(
                    "opening {} with quantity {} at {}",
                    entry.symbol, entry.quantity, entry.entry_price
                ),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        let position = Position {
            id,
            symbol: entry.symbol,
            side: entry.side,
            quantity: entry.quantity,
            entry_price: entry.entry_price,
            entry_time: entry.entry_time,
            stop_loss: validation.stop_loss,
            take_profit: validation.take_profit,
            last_price: entry.entry_price,
            exit: None,
        };
        info!(
            id,
            symbol = %position.symbol,
            side = %position.side,
            quantity = position.quantity,
            price = position.entry_price,
            "position opened"
        );
        self.positions.push(position);
        Ok(&self.positions[self.positions.len() - 1])
    }

    /// Close an open position. Closing twice is rejected.
    pub fn close(
        &mut self,
        id: u64,
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<&Position, TraderError> {
        let position = self.open_mut(id)?;
        let exit = position.exit_record(price, time, reason);
        position.last_price = price;
        info!(
            id,
            symbol = %position.symbol,
            %reason,
            price,
            pnl = exit.realized_pnl,
            "position closed"
        );
        position.exit = Some(exit);
        Ok(position)
    }

    /// Record the latest price of an open position.
    pub fn mark(&mut self, id: u64, price: f64) -> Result<(), TraderError> {
        self.open_mut(id)?.last_price = price;
        Ok(())
    }

    /// Move the stop if the risk manager says so; returns the new stop.
    pub fn apply_trailing_stop(
        &mut self,
        id: u64,
        risk: &RiskManager,
        price: f64,
    ) -> Result<Option<f64>, TraderError> {
        let position = self.open_mut(id)?;
        let moved = risk.update_trailing_stop(position, price);
        if let Some(stop) = moved {
            position.stop_loss = stop;
        }
        Ok(moved)
    }

    /// Mark the position and close it if an exit condition holds, checked in
    /// order: stop-loss, take-profit, opposing signal, end of data.
    pub fn on_tick(&mut self, id: u64, tick: &Tick) -> Result<Option<ExitReason>, TraderError> {
        let position = self.open_mut(id)?;
        position.last_price = tick.price;

        let reason = position.exit_trigger(tick.price).or(if tick.opposing_signal {
            Some(ExitReason::Signal)
        } else if tick.end_of_data {
            Some(ExitReason::EndOfPeriod)
        } else {
            None
        });

        if let Some(reason) = reason {
            self.close(id, tick.price, tick.time, reason)?;
        }
        Ok(reason)
    }

    pub fn get(&self, id: u64) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn open_positions(&self) -> Vec<&Position> {
        self.positions.iter().filter(|p| p.is_open()).collect()
    }

    pub fn open_for_symbol(&self, symbol: &str) -> Vec<&Position> {
        self.positions
            .iter()
            .filter(|p| p.is_open() && p.symbol == symbol)
            .collect()
    }

    pub fn closed_positions(&self) -> Vec<&Position> {
        self.positions.iter().filter(|p| !p.is_open()).collect()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.positions.iter().filter_map(|p| p.realized_pnl()).sum()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Run `f` against a draft copy and keep its changes only if it succeeds.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T, TraderError>
    where
        F: FnOnce(&mut TradeLedger) -> Result<T, TraderError>,
    {
        let mut draft = self.clone();
        let out = f(&mut draft)?;
        *self = draft;
        Ok(out)
    }

    fn open_mut(&mut self, id: u64) -> Result<&mut Position, TraderError> {
        let position = self
            .positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(TraderError::PositionNotFound { id })?;
        if !position.is_open() {
            return Err(TraderError::PositionClosed { id });
        }
        Ok(position)
    }
}

/// A ledger shared between per-symbol cycles; one writer at a time.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<TradeLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: TradeLedger) -> Self {
        SharedLedger {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Run `f` under the lock as a ledger transaction.
    pub fn transact<T, F>(&self, f: F) -> Result<T, TraderError>
    where
        F: FnOnce(&mut TradeLedger) -> Result<T, TraderError>,
    {
        let mut guard = self.inner.lock().map_err(|_| TraderError::LedgerPoisoned)?;
        guard.transaction(f)
    }

    /// Run `f` under the lock against the ledger itself. Changes made before
    /// `f` returns stay in place whatever it returns.
    pub fn update<T, F>(&self, f: F) -> Result<T, TraderError>
    where
        F: FnOnce(&mut TradeLedger) -> T,
    {
        let mut guard = self.inner.lock().map_err(|_| TraderError::LedgerPoisoned)?;
        Ok(f(&mut guard))
    }

    /// Copy of the current ledger state.
    pub fn snapshot(&self) -> Result<TradeLedger, TraderError> {
        let guard = self.inner.lock().map_err(|_| TraderError::LedgerPoisoned)?;
        Ok(guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::test_support::ts;
    use crate::domain::position::PositionStatus;
    use crate::domain::risk::RejectionReason;

    fn approved(side: Side, price: f64) -> RiskValidation {
        let rm = RiskManager::default();
        RiskValidation {
            is_valid: true,
            stop_loss: rm.stop_loss(price, side),
            take_profit: rm.take_profit(price, side),
            reasons: Vec::new(),
        }
    }

    fn entry(symbol: &str, side: Side, price: f64) -> NewPosition {
        NewPosition {
            symbol: symbol.to_string(),
            side,
            quantity: 2.0,
            entry_price: price,
            entry_time: ts(0),
        }
    }

    fn ledger_with_long() -> (TradeLedger, u64) {
        let mut ledger = TradeLedger::new();
        let id = ledger
            .open(entry("BTC/USDT", Side::Buy, 100.0), &approved(Side::Buy, 100.0))
            .unwrap()
            .id;
        (ledger, id)
    }

    #[test]
    fn open_assigns_ascending_ids_and_risk_levels() {
        let mut ledger = TradeLedger::new();
        let a = ledger
            .open(entry("BTC/USDT", Side::Buy, 100.0), &approved(Side::Buy, 100.0))
            .unwrap()
            .clone();
        let b = ledger
            .open(entry("ETH/USDT", Side::Sell, 50.0), &approved(Side::Sell, 50.0))
            .unwrap()
            .clone();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.status(), PositionStatus::Open);
        assert!((a.stop_loss - 98.0).abs() < 1e-9);
        assert!((b.stop_loss - 51.0).abs() < 1e-9);
        assert_eq!(ledger.open_positions().len(), 2);
    }

    #[test]
    fn open_requires_valid_validation() {
        let mut ledger = TradeLedger::new();
        let rejected = RiskValidation {
            is_valid: false,
            stop_loss: 98.0,
            take_profit: 105.0,
            reasons: vec![RejectionReason::PositionSizeExceeded {
                notional: 2000.0,
                limit: 1000.0,
            }],
        };
        let err = ledger
            .open(entry("BTC/USDT", Side::Buy, 100.0), &rejected)
            .unwrap_err();
        assert!(matches!(err, TraderError::ValidationRejected { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn close_computes_pnl() {
        let (mut ledger, id) = ledger_with_long();
        let closed = ledger.close(id, 110.0, ts(5), ExitReason::Signal).unwrap();
        let exit = closed.exit.as_ref().unwrap();
        assert!((exit.realized_pnl - 20.0).abs() < 1e-9);
        assert!((exit.realized_pnl_pct - 10.0).abs() < 1e-9);
        assert_eq!(exit.reason, ExitReason::Signal);
        assert_eq!(ledger.closed_positions().len(), 1);
    }

    #[test]
    fn short_close_pnl_is_mirrored() {
        let mut ledger = TradeLedger::new();
        let id = ledger
            .open(entry("ETH/USDT", Side::Sell, 100.0), &approved(Side::Sell, 100.0))
            .unwrap()
            .id;
        let closed = ledger.close(id, 96.0, ts(2), ExitReason::Signal).unwrap();
        assert!((closed.realized_pnl().unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn second_close_is_rejected_without_double_credit() {
        let (mut ledger, id) = ledger_with_long();
        ledger.close(id, 110.0, ts(5), ExitReason::Signal).unwrap();
        let before = ledger.realized_pnl();
        let err = ledger.close(id, 120.0, ts(6), ExitReason::Signal).unwrap_err();
        assert!(matches!(err, TraderError::PositionClosed { id: 1 }));
        assert_eq!(ledger.realized_pnl(), before);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut ledger = TradeLedger::new();
        assert!(matches!(
            ledger.mark(7, 1.0),
            Err(TraderError::PositionNotFound { id: 7 })
        ));
    }

    #[test]
    fn on_tick_priority_stop_before_signal() {
        let (mut ledger, id) = ledger_with_long();
        let tick = Tick {
            opposing_signal: true,
            ..Tick::at(97.0, ts(1))
        };
        assert_eq!(ledger.on_tick(id, &tick).unwrap(), Some(ExitReason::StopLoss));
    }

    #[test]
    fn on_tick_take_profit_at_boundary() {
        let (mut ledger, id) = ledger_with_long();
        let target = ledger.get(id).unwrap().take_profit;
        let reason = ledger.on_tick(id, &Tick::at(target, ts(1))).unwrap();
        assert_eq!(reason, Some(ExitReason::TakeProfit));
    }

    #[test]
    fn on_tick_signal_then_end_of_data() {
        let (mut ledger, id) = ledger_with_long();
        let tick = Tick {
            opposing_signal: true,
            end_of_data: true,
            ..Tick::at(101.0, ts(1))
        };
        assert_eq!(ledger.on_tick(id, &tick).unwrap(), Some(ExitReason::Signal));

        let (mut ledger, id) = ledger_with_long();
        let tick = Tick {
            end_of_data: true,
            ..Tick::at(101.0, ts(1))
        };
        assert_eq!(
            ledger.on_tick(id, &tick).unwrap(),
            Some(ExitReason::EndOfPeriod)
        );
    }

    #[test]
    fn on_tick_without_exit_marks_only() {
        let (mut ledger, id) = ledger_with_long();
        assert_eq!(ledger.on_tick(id, &Tick::at(101.0, ts(1))).unwrap(), None);
        let pos = ledger.get(id).unwrap();
        assert!(pos.is_open());
        assert_eq!(pos.last_price, 101.0);
    }

    #[test]
    fn trailing_stop_never_loosens() {
        let (mut ledger, id) = ledger_with_long();
        let rm = RiskManager::default();
        let moved = ledger.apply_trailing_stop(id, &rm, 110.0).unwrap();
        assert!(moved.is_some());
        assert_eq!(ledger.apply_trailing_stop(id, &rm, 100.0).unwrap(), None);
        assert!((ledger.get(id).unwrap().stop_loss - 107.8).abs() < 1e-9);
    }

    #[test]
    fn closed_position_is_frozen() {
        let (mut ledger, id) = ledger_with_long();
        ledger.close(id, 101.0, ts(1), ExitReason::Signal).unwrap();
        let rm = RiskManager::default();
        assert!(ledger.mark(id, 200.0).is_err());
        assert!(ledger.apply_trailing_stop(id, &rm, 200.0).is_err());
        assert!(ledger.on_tick(id, &Tick::at(50.0, ts(2))).is_err());
        assert_eq!(ledger.get(id).unwrap().last_price, 101.0);
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let (mut ledger, id) = ledger_with_long();
        let before = ledger.clone();
        let result: Result<(), TraderError> = ledger.transaction(|draft| {
            draft.close(id, 120.0, ts(3), ExitReason::Signal)?;
            Err(TraderError::ExecutionFailed {
                symbol: "BTC/USDT".into(),
                reason: "exchange down".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(ledger, before);
    }

    #[test]
    fn shared_update_keeps_changes_made_before_an_error() {
        let (ledger, id) = ledger_with_long();
        let shared = SharedLedger::new(ledger);
        let result: Result<Result<(), TraderError>, TraderError> = shared.update(|ledger| {
            ledger.close(id, 120.0, ts(3), ExitReason::Signal)?;
            Err(TraderError::Persistence {
                reason: "disk full".into(),
            })
        });
        assert!(matches!(result, Ok(Err(TraderError::Persistence { .. }))));
        assert!(!shared.snapshot().unwrap().get(id).unwrap().is_open());
    }

    #[test]
    fn restore_continues_ids() {
        let (mut ledger, id) = ledger_with_long();
        ledger.close(id, 101.0, ts(1), ExitReason::Signal).unwrap();
        let mut restored = TradeLedger::restore(ledger.positions().to_vec());
        let next = restored
            .open(entry("BTC/USDT", Side::Buy, 100.0), &approved(Side::Buy, 100.0))
            .unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn shared_ledger_serializes_writers() {
        let shared = SharedLedger::new(TradeLedger::new());
        let handles: Vec<_> = ["BTC/USDT", "ETH/USDT", "ADA/USDT"]
            .into_iter()
            .map(|symbol| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    shared.transact(|ledger| {
                        ledger
                            .open(entry(symbol, Side::Buy, 100.0), &approved(Side::Buy, 100.0))
                            .map(|p| p.id)
                    })
                })
            })
            .collect();
        let mut ids: Vec<u64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(shared.snapshot().unwrap().open_positions().len(), 3);
    }
}
