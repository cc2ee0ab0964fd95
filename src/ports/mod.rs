//! Port traits: the collaborators the decision core talks to.

pub mod advisory_port;
pub mod config_port;
pub mod data_port;
pub mod execution_port;
pub mod position_store;
pub mod report_port;
