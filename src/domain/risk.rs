//! Risk limits: stop/target placement, position sizing, trade validation and
//! trailing stops.

use tracing::{info, warn};

use crate::domain::error::TraderError;
use crate::domain::position::{Position, Side};
use crate::ports::config_port::ConfigPort;

/// Notional checks allow this much relative float error above the limit.
const NOTIONAL_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    /// Largest single position as a fraction of portfolio value.
    pub max_position_size: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing_stop: bool,
    /// Fraction of portfolio value the open book may lose before new trades are refused.
    pub max_daily_loss: f64,
    pub max_open_positions_per_symbol: usize,
    pub risk_per_trade: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            max_position_size: 0.1,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.05,
            trailing_stop: true,
            max_daily_loss: 0.05,
            max_open_positions_per_symbol: 3,
            risk_per_trade: 0.02,
        }
    }
}

impl RiskConfig {
    /// Read `[risk]` overrides on top of the defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let d = RiskConfig::default();
        let max_open = config.get_int(
            "risk",
            "max_open_positions_per_symbol",
            d.max_open_positions_per_symbol as i64,
        );
        let max_open_positions_per_symbol =
            usize::try_from(max_open).map_err(|_| TraderError::ConfigInvalid {
                section: "risk".to_string(),
                key: "max_open_positions_per_symbol".to_string(),
                reason: format!("must be a non-negative count, got {}", max_open),
            })?;

        Ok(RiskConfig {
            max_position_size: config.get_double("risk", "max_position_size", d.max_position_size),
            stop_loss_pct: config.get_double("risk", "stop_loss_pct", d.stop_loss_pct),
            take_profit_pct: config.get_double("risk", "take_profit_pct", d.take_profit_pct),
            trailing_stop: config.get_bool("risk", "trailing_stop", d.trailing_stop),
            max_daily_loss: config.get_double("risk", "max_daily_loss", d.max_daily_loss),
            max_open_positions_per_symbol,
            risk_per_trade: config.get_double("risk", "risk_per_trade", d.risk_per_trade),
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectionReason {
    #[error("invalid order: quantity {quantity} at price {price}")]
    InvalidOrder { quantity: f64, price: f64 },

    #[error("position size {notional:.2} exceeds limit {limit:.2}")]
    PositionSizeExceeded { notional: f64, limit: f64 },

    #[error("open loss {pnl:.2} is beyond the daily limit {limit:.2}")]
    DailyLossExceeded { pnl: f64, limit: f64 },

    #[error("{symbol} already has {open} open positions (max {max})")]
    TooManyOpenPositions {
        symbol: String,
        open: usize,
        max: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskValidation {
    pub is_valid: bool,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reasons: Vec<RejectionReason>,
}

impl RiskValidation {
    /// `Err(ValidationRejected)` unless valid.
    pub fn into_result(self) -> Result<RiskValidation, TraderError> {
        if self.is_valid {
            Ok(self)
        } else {
            Err(TraderError::ValidationRejected {
                reasons: self.reasons,
            })
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        RiskManager { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Capital to commit: the smaller of the size cap and the per-trade risk budget.
    pub fn position_size(&self, portfolio_value: f64) -> f64 {
        self.position_size_with(portfolio_value, self.config.risk_per_trade)
    }

    pub fn position_size_with(&self, portfolio_value: f64, risk_fraction: f64) -> f64 {
        (portfolio_value * self.config.max_position_size).min(portfolio_value * risk_fraction)
    }

    pub fn stop_loss(&self, entry_price: f64, side: Side) -> f64 {
        match side {
            Side::Buy => entry_price * (1.0 - self.config.stop_loss_pct),
            Side::Sell => entry_price * (1.0 + self.config.stop_loss_pct),
        }
    }

    pub fn take_profit(&self, entry_price: f64, side: Side) -> f64 {
        match side {
            Side::Buy => entry_price * (1.0 + self.config.take_profit_pct),
            Side::Sell => entry_price * (1.0 - self.config.take_profit_pct),
        }
    }

    /// Check a proposed trade against every limit. All checks run; the
    /// reasons come back in check order.
    ///
    /// `open_positions` is the current open book (every symbol).
    pub fn validate(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
        portfolio_value: f64,
        open_positions: &[&Position],
    ) -> RiskValidation {
        let mut reasons = Vec::new();

        if !(quantity > 0.0 && quantity.is_finite() && price > 0.0 && price.is_finite()) {
            reasons.push(RejectionReason::InvalidOrder { quantity, price });
        }

        let notional = quantity * price;
        let limit = portfolio_value * self.config.max_position_size;
        if notional > limit * (1.0 + NOTIONAL_TOLERANCE) {
            reasons.push(RejectionReason::PositionSizeExceeded { notional, limit });
        }

        let open_pnl: f64 = open_positions
            .iter()
            .filter(|p| p.is_open())
            .map(|p| p.unrealized_pnl())
            .sum();
        let loss_limit = -self.config.max_daily_loss * portfolio_value;
        if open_pnl < loss_limit {
            reasons.push(RejectionReason::DailyLossExceeded {
                pnl: open_pnl,
                limit: loss_limit,
            });
        }

        let open_for_symbol = open_positions
            .iter()
            .filter(|p| p.is_open() && p.symbol == symbol)
            .count();
        if open_for_symbol >= self.config.max_open_positions_per_symbol {
            reasons.push(RejectionReason::TooManyOpenPositions {
                symbol: symbol.to_string(),
                open: open_for_symbol,
                max: self.config.max_open_positions_per_symbol,
            });
        }

        for reason in &reasons {
            warn!(symbol, %side, quantity, price, %reason, "trade rejected");
        }

        RiskValidation {
            is_valid: reasons.is_empty(),
            stop_loss: self.stop_loss(price, side),
            take_profit: self.take_profit(price, side),
            reasons,
        }
    }

    /// New stop if the trailing stop should move; it only ever tightens.
    pub fn update_trailing_stop(&self, position: &Position, current_price: f64) -> Option<f64> {
        if !self.config.trailing_stop || !position.is_open() {
            return None;
        }
        let moved = match position.side {
            Side::Buy => {
                let candidate = current_price * (1.0 - self.config.stop_loss_pct);
                (candidate > position.stop_loss).then_some(candidate)
            }
            Side::Sell => {
                let candidate = current_price * (1.0 + self.config.stop_loss_pct);
                (candidate < position.stop_loss).then_some(candidate)
            }
        };
        if let Some(stop) = moved {
            info!(
                id = position.id,
                symbol = %position.symbol,
                from = position.stop_loss,
                to = stop,
                "trailing stop moved"
            );
        }
        moved
    }
}
