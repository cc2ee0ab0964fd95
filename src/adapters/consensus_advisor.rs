//! Offline advisory ranking: a confidence-weighted vote across strategy
//! results.

use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::signal::{SignalDirection, StrategySignal};
use crate::ports::advisory_port::{Advice, AdvisoryPort};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusAdvisor;

impl ConsensusAdvisor {
    pub fn new() -> Self {
        ConsensusAdvisor
    }
}

impl AdvisoryPort for ConsensusAdvisor {
    fn rank_decision(
        &self,
        strategy_results: &BTreeMap<String, StrategySignal>,
        current_price: f64,
    ) -> Result<Advice, TraderError> {
        if !(current_price > 0.0 && current_price.is_finite()) {
            return Err(TraderError::ComputationDegenerate {
                context: format!("advisory ranking at price {}", current_price),
            });
        }

        let usable: Vec<(&String, &StrategySignal)> = strategy_results
            .iter()
            .filter(|(_, s)| s.direction != SignalDirection::Error && !s.insufficient_data)
            .collect();
        if usable.is_empty() {
            return Ok(Advice {
                recommendation: SignalDirection::Hold,
                confidence: 0.0,
                rationale: "no usable strategy results".to_string(),
            });
        }

        let score = |direction: SignalDirection| -> f64 {
            usable
                .iter()
                .filter(|(_, s)| s.direction == direction)
                .map(|(_, s)| s.confidence)
                .sum()
        };
        let buy = score(SignalDirection::Buy);
        let sell = score(SignalDirection::Sell);

        let recommendation = if buy > sell {
            SignalDirection::Buy
        } else if sell > buy {
            SignalDirection::Sell
        } else {
            SignalDirection::Hold
        };
        let confidence = ((buy - sell).abs() / usable.len() as f64).clamp(0.0, 1.0);

        let backers: Vec<String> = usable
            .iter()
            .filter(|(_, s)| s.direction == recommendation)
            .map(|(name, s)| format!("{} {:.0}%", name, s.confidence * 100.0))
            .collect();
        let rationale = format!(
            "{} from {} of {} strategies ({}) at {:.2}",
            recommendation,
            backers.len(),
            usable.len(),
            backers.join(", "),
            current_price
        );

        Ok(Advice {
            recommendation,
            confidence,
            rationale,
        })
    }
}
