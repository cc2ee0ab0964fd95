//! Concrete adapter implementations for ports.

pub mod consensus_advisor;
pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod memory_store;
pub mod simulated_execution;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
