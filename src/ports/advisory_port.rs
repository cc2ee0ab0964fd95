//! Advisory ranking port trait.
//!
//! Advice is for presentation only; the ledger and risk checks never read it.

use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::signal::{SignalDirection, StrategySignal};

#[derive(Debug, Clone, PartialEq)]
pub struct Advice {
    pub recommendation: SignalDirection,
    pub confidence: f64,
    pub rationale: String,
}

pub trait AdvisoryPort {
    fn rank_decision(
        &self,
        strategy_results: &BTreeMap<String, StrategySignal>,
        current_price: f64,
    ) -> Result<Advice, TraderError>;
}
