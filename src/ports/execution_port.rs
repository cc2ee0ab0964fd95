//! Order execution port trait.

use crate::domain::position::Side;

/// Outcome of one order, simulated or live.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub success: bool,
    pub filled_price: f64,
    pub error: Option<String>,
}

impl ExecutionReport {
    pub fn filled(price: f64) -> Self {
        ExecutionReport {
            success: true,
            filled_price: price,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        ExecutionReport {
            success: false,
            filled_price: 0.0,
            error: Some(reason.into()),
        }
    }
}

pub trait ExecutionPort {
    /// Place an order at reference `price`. Failures come back in the report.
    fn execute_order(&self, symbol: &str, side: Side, quantity: f64, price: f64) -> ExecutionReport;
}
