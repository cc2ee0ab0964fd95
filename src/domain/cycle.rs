//! One trading cycle for one symbol: exits, decision, order, persistence.
//!
//! The cycle holds the ledger lock throughout. Every filled order is
//! recorded in the ledger at once and is never rolled back; failed orders
//! and store errors are reported in the outcome.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::domain::decision::{decide, TradeDecision};
use crate::domain::error::TraderError;
use crate::domain::execution::{DecisionOutcome, ExecutionConfig, OrderExecutor};
use crate::domain::ledger::{SharedLedger, TradeLedger};
use crate::domain::ohlcv::{validate_series, PriceBar};
use crate::domain::position::{Position, PositionUpdate};
use crate::domain::risk::RiskManager;
use crate::domain::snapshot::IndicatorSnapshot;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::position_store::PositionStore;

#[derive(Debug)]
pub struct CycleOutcome {
    pub symbol: String,
    pub decision: TradeDecision,
    /// Positions closed by the stop-loss / take-profit sweep.
    pub exits: Vec<Position>,
    /// Positions whose exit could not be completed; they stay open.
    pub exit_failures: Vec<(u64, TraderError)>,
    pub action: Result<DecisionOutcome, TraderError>,
    /// Whether the ledger changes reached the position store.
    pub persisted: Result<(), TraderError>,
}

pub struct TradingCycle<'a> {
    risk: &'a RiskManager,
    execution: &'a dyn ExecutionPort,
    store: &'a dyn PositionStore,
    config: ExecutionConfig,
}

impl<'a> TradingCycle<'a> {
    pub fn new(
        risk: &'a RiskManager,
        execution: &'a dyn ExecutionPort,
        store: &'a dyn PositionStore,
        config: ExecutionConfig,
    ) -> Self {
        TradingCycle {
            risk,
            execution,
            store,
            config,
        }
    }

    /// Errors only when the series is unusable or the ledger lock is
    /// poisoned; everything after the first order is part of the outcome.
    pub fn run(
        &self,
        ledger: &SharedLedger,
        symbol: &str,
        bars: &[PriceBar],
    ) -> Result<CycleOutcome, TraderError> {
        validate_series(bars)?;
        let snapshot =
            IndicatorSnapshot::from_bars(bars).ok_or_else(|| TraderError::InsufficientData {
                symbol: symbol.to_string(),
                bars: 0,
                minimum: 1,
            })?;
        let decision = decide(symbol, &snapshot, self.risk);
        let executor = OrderExecutor::new(self.risk, self.execution, self.config.clone());

        let outcome = ledger.update(|ledger| {
            let before = ledger.positions().to_vec();

            let sweep = executor.check_exits(
                ledger,
                symbol,
                snapshot.current_price,
                snapshot.timestamp,
            );

            let action = executor.process_decision(ledger, &decision, snapshot.timestamp);
            if let Err(e) = &action {
                warn!(symbol, error = %e, "decision not carried out");
            }

            let persisted = persist_changes(self.store, &before, ledger);
            if let Err(e) = &persisted {
                warn!(symbol, error = %e, "ledger changes not persisted");
            }

            CycleOutcome {
                symbol: symbol.to_string(),
                decision: decision.clone(),
                exits: sweep.closed,
                exit_failures: sweep.failed,
                action,
                persisted,
            }
        })?;

        info!(
            symbol,
            action = %outcome.decision.action,
            exits = outcome.exits.len(),
            exit_failures = outcome.exit_failures.len(),
            price = snapshot.current_price,
            "cycle complete"
        );
        Ok(outcome)
    }
}

/// Write new positions and changed fields of existing ones to the store.
/// Every row is attempted; the first failure is returned.
fn persist_changes(
    store: &dyn PositionStore,
    before: &[Position],
    ledger: &TradeLedger,
) -> Result<(), TraderError> {
    let previous: HashMap<u64, &Position> = before.iter().map(|p| (p.id, p)).collect();
    let mut first_error = None;
    for position in ledger.positions() {
        let written = match previous.get(&position.id) {
            None => store.persist_position(position),
            Some(old) => {
                let update = PositionUpdate::between(old, position);
                if update.is_empty() {
                    Ok(())
                } else {
                    store.update_position(position.id, &update)
                }
            }
        };
        if let Err(e) = written {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Ledger rebuilt from every stored position so new ids never reuse old ones.
pub fn restore_ledger(store: &dyn PositionStore) -> Result<SharedLedger, TraderError> {
    let positions = store.load_all_positions()?;
    let open = positions.iter().filter(|p| p.is_open()).count();
    info!(positions = positions.len(), open, "ledger restored");
    Ok(SharedLedger::new(TradeLedger::restore(positions)))
}
