//! Core domain types and logic: indicators, strategies, risk and the ledger.

pub mod aggregator;
pub mod backtest;
pub mod config_validation;
pub mod cycle;
pub mod decision;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod ledger;
pub mod metrics;
pub mod ohlcv;
pub mod position;
pub mod risk;
pub mod signal;
pub mod snapshot;
pub mod strategy;
