//! Paper execution: every order fills immediately at the reference price,
//! moved against the trader by the configured slippage.

use tracing::debug;

use crate::domain::position::Side;
use crate::ports::execution_port::{ExecutionPort, ExecutionReport};

/// Buying pays `price × (1 + slippage)`.
pub fn apply_slippage_buy(price: f64, slippage_pct: f64) -> f64 {
    price * (1.0 + slippage_pct)
}

/// Selling receives `price × (1 - slippage)`.
pub fn apply_slippage_sell(price: f64, slippage_pct: f64) -> f64 {
    price * (1.0 - slippage_pct)
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedExecution {
    /// Fraction of the price, e.g. 0.001 for 0.1%.
    slippage_pct: f64,
}

impl SimulatedExecution {
    pub fn new(slippage_pct: f64) -> Self {
        SimulatedExecution { slippage_pct }
    }
}

impl ExecutionPort for SimulatedExecution {
    fn execute_order(&self, symbol: &str, side: Side, quantity: f64, price: f64) -> ExecutionReport {
        if !(quantity > 0.0 && quantity.is_finite()) {
            return ExecutionReport::failed(format!("invalid quantity {}", quantity));
        }
        if !(price > 0.0 && price.is_finite()) {
            return ExecutionReport::failed(format!("invalid price {}", price));
        }

        let filled = match side {
            Side::Buy => apply_slippage_buy(price, self.slippage_pct),
            Side::Sell => apply_slippage_sell(price, self.slippage_pct),
        };
        debug!(symbol, %side, quantity, price, filled, "simulated fill");
        ExecutionReport::filled(filled)
    }
}
