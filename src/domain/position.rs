//! Position records and their exit state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for long, -1 for short.
    pub fn direction(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Open => f.write_str("OPEN"),
            PositionStatus::Closed => f.write_str("CLOSED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfPeriod,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EndOfPeriod => "end_of_period",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signal" => Ok(ExitReason::Signal),
            "stop_loss" => Ok(ExitReason::StopLoss),
            "take_profit" => Ok(ExitReason::TakeProfit),
            "end_of_period" => Ok(ExitReason::EndOfPeriod),
            other => Err(format!("unknown exit reason '{}'", other)),
        }
    }
}

/// Exit fields, present together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionExit {
    pub price: f64,
    pub time: DateTime<Utc>,
    pub reason: ExitReason,
    pub realized_pnl: f64,
    pub realized_pnl_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Latest mark; equals `entry_price` until the first tick.
    pub last_price: f64,
    pub exit: Option<PositionExit>,
}

impl Position {
    pub fn status(&self) -> PositionStatus {
        match self.exit {
            Some(_) => PositionStatus::Closed,
            None => PositionStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    pub fn notional(&self) -> f64 {
        self.entry_price * self.quantity
    }

    /// PnL if closed at `price`: (exit - entry) × qty for BUY, mirrored for SELL.
    pub fn pnl_at(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity * self.side.direction()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        if self.is_open() {
            self.pnl_at(self.last_price)
        } else {
            0.0
        }
    }

    pub fn realized_pnl(&self) -> Option<f64> {
        self.exit.as_ref().map(|e| e.realized_pnl)
    }

    /// Stop breached at `price`; the boundary counts as a breach.
    pub fn should_stop_loss(&self, price: f64) -> bool {
        match self.side {
            Side::Buy => price <= self.stop_loss,
            Side::Sell => price >= self.stop_loss,
        }
    }

    /// Target reached at `price`; the boundary counts.
    pub fn should_take_profit(&self, price: f64) -> bool {
        match self.side {
            Side::Buy => price >= self.take_profit,
            Side::Sell => price <= self.take_profit,
        }
    }

    /// Risk exit triggered at `price`, stop-loss first.
    pub fn exit_trigger(&self, price: f64) -> Option<ExitReason> {
        if self.should_stop_loss(price) {
            Some(ExitReason::StopLoss)
        } else if self.should_take_profit(price) {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }

    pub(crate) fn exit_record(
        &self,
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> PositionExit {
        let realized_pnl = self.pnl_at(price);
        let notional = self.notional();
        let realized_pnl_pct = if notional > 0.0 {
            realized_pnl / notional * 100.0
        } else {
            0.0
        };
        PositionExit {
            price,
            time,
            reason,
            realized_pnl,
            realized_pnl_pct,
        }
    }
}

/// Fields a store may change on an existing position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionUpdate {
    pub stop_loss: Option<f64>,
    pub last_price: Option<f64>,
    pub exit: Option<PositionExit>,
}

impl PositionUpdate {
    /// Everything that can differ between two versions of the same position.
    pub fn between(before: &Position, after: &Position) -> Self {
        PositionUpdate {
            stop_loss: (before.stop_loss != after.stop_loss).then_some(after.stop_loss),
            last_price: (before.last_price != after.last_price).then_some(after.last_price),
            exit: if before.exit != after.exit {
                after.exit.clone()
            } else {
                None
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stop_loss.is_none() && self.last_price.is_none() && self.exit.is_none()
    }

    pub fn apply(&self, position: &mut Position) {
        if let Some(stop) = self.stop_loss {
            position.stop_loss = stop;
        }
        if let Some(price) = self.last_price {
            position.last_price = price;
        }
        if let Some(exit) = &self.exit {
            position.exit = Some(exit.clone());
        }
    }
}
