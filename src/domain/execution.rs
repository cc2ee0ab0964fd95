//! Order handling on top of the ledger.
//!
//! Every entry is sized, validated and filled before the ledger is touched;
//! a failed fill leaves the ledger as it was.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::decision::{TradeAction, TradeDecision};
use crate::domain::error::TraderError;
use crate::domain::ledger::{NewPosition, TradeLedger};
use crate::domain::position::{ExitReason, Position, Side};
use crate::domain::risk::{RiskManager, RiskValidation};
use crate::ports::config_port::ConfigPort;
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Value the risk limits are measured against.
    pub portfolio_value: f64,
    pub allow_shorting: bool,
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            portfolio_value: 10_000.0,
            allow_shorting: false,
            slippage_pct: 0.0,
        }
    }
}

impl ExecutionConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = ExecutionConfig::default();
        ExecutionConfig {
            portfolio_value: config.get_double("execution", "portfolio_value", d.portfolio_value),
            allow_shorting: config.get_bool("execution", "allow_shorting", d.allow_shorting),
            slippage_pct: config.get_double("execution", "slippage_pct", d.slippage_pct),
        }
    }
}

/// What a decision did to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Opened(Position),
    Closed(Vec<Position>),
    NoAction,
}

/// Result of one stop-loss / take-profit sweep.
#[derive(Debug, Default)]
pub struct ExitSweep {
    pub closed: Vec<Position>,
    /// Positions left open because their exit could not be completed.
    pub failed: Vec<(u64, TraderError)>,
}

pub struct OrderExecutor<'a> {
    risk: &'a RiskManager,
    execution: &'a dyn ExecutionPort,
    config: ExecutionConfig,
}

impl<'a> OrderExecutor<'a> {
    pub fn new(risk: &'a RiskManager, execution: &'a dyn ExecutionPort, config: ExecutionConfig) -> Self {
        OrderExecutor {
            risk,
            execution,
            config,
        }
    }

    /// Size, validate, fill and record a new position.
    pub fn open_position(
        &self,
        ledger: &mut TradeLedger,
        symbol: &str,
        side: Side,
        price: f64,
        time: DateTime<Utc>,
    ) -> Result<Position, TraderError> {
        let size = self.risk.position_size(self.config.portfolio_value);
        let quantity = if price > 0.0 { size / price } else { 0.0 };

        let validation = self
            .risk
            .validate(
                symbol,
                side,
                quantity,
                price,
                self.config.portfolio_value,
                &ledger.open_positions(),
            )
            .into_result()?;

        let report = self.execution.execute_order(symbol, side, quantity, price);
        if !report.success {
            let reason = report.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(symbol, %side, quantity, price, %reason, "entry order failed");
            return Err(TraderError::ExecutionFailed {
                symbol: symbol.to_string(),
                reason,
            });
        }

        let filled = report.filled_price;
        let validation = RiskValidation {
            stop_loss: self.risk.stop_loss(filled, side),
            take_profit: self.risk.take_profit(filled, side),
            ..validation
        };
        let entry = NewPosition {
            symbol: symbol.to_string(),
            side,
            quantity,
            entry_price: filled,
            entry_time: time,
        };
        ledger.open(entry, &validation).cloned()
    }

    /// Fill the opposite side and close the ledger entry at the fill price.
    pub fn close_position(
        &self,
        ledger: &mut TradeLedger,
        id: u64,
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<Position, TraderError> {
        let position = ledger.get(id).ok_or(TraderError::PositionNotFound { id })?;
        if !position.is_open() {
            return Err(TraderError::PositionClosed { id });
        }
        let symbol = position.symbol.clone();
        let side = position.side.opposite();
        let quantity = position.quantity;

        let report = self.execution.execute_order(&symbol, side, quantity, price);
        if !report.success {
            let reason = report.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(id, symbol = %symbol, %reason, "exit order failed");
            return Err(TraderError::ExecutionFailed { symbol, reason });
        }

        ledger
            .close(id, report.filled_price, time, reason)
            .cloned()
    }

    /// Close positions of `symbol` whose stop or target is hit at `price`;
    /// the rest get their trailing stop and mark updated.
    ///
    /// Each exit is committed to the ledger as soon as its order fills. A
    /// failed exit is recorded in the sweep and the remaining positions are
    /// still checked.
    pub fn check_exits(
        &self,
        ledger: &mut TradeLedger,
        symbol: &str,
        price: f64,
        time: DateTime<Utc>,
    ) -> ExitSweep {
        let candidates: Vec<(u64, Option<ExitReason>)> = ledger
            .open_for_symbol(symbol)
            .iter()
            .map(|p| (p.id, p.exit_trigger(price)))
            .collect();

        let mut sweep = ExitSweep::default();
        for (id, trigger) in candidates {
            let result = match trigger {
                Some(reason) => self.close_position(ledger, id, price, time, reason).map(Some),
                None => ledger
                    .apply_trailing_stop(id, self.risk, price)
                    .and_then(|_| ledger.mark(id, price))
                    .map(|_| None),
            };
            match result {
                Ok(Some(position)) => sweep.closed.push(position),
                Ok(None) => {}
                Err(e) => {
                    warn!(id, symbol, error = %e, "exit check failed");
                    sweep.failed.push((id, e));
                }
            }
        }
        sweep
    }

    /// BUY opens a long (after covering any shorts); SELL closes longs with
    /// reason `signal`, or opens a short when allowed and nothing is long.
    pub fn process_decision(
        &self,
        ledger: &mut TradeLedger,
        decision: &TradeDecision,
        time: DateTime<Utc>,
    ) -> Result<DecisionOutcome, TraderError> {
        let symbol = decision.symbol.as_str();
        let price = decision.reference_price;

        let side = match decision.action {
            TradeAction::None => return Ok(DecisionOutcome::NoAction),
            TradeAction::Buy => Side::Buy,
            TradeAction::Sell => Side::Sell,
        };

        let opposing: Vec<u64> = ledger
            .open_for_symbol(symbol)
            .iter()
            .filter(|p| p.side == side.opposite())
            .map(|p| p.id)
            .collect();

        if !opposing.is_empty() {
            let mut closed = Vec::with_capacity(opposing.len());
            for id in opposing {
                closed.push(self.close_position(ledger, id, price, time, ExitReason::Signal)?);
            }
            return Ok(DecisionOutcome::Closed(closed));
        }

        if side == Side::Sell && !self.config.allow_shorting {
            return Ok(DecisionOutcome::NoAction);
        }

        self.open_position(ledger, symbol, side, price, time)
            .map(DecisionOutcome::Opened)
    }
}
