//! Strategy signal types.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
    /// The evaluator failed; only produced by the aggregator.
    Error,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalDirection::Buy => "BUY",
            SignalDirection::Sell => "SELL",
            SignalDirection::Hold => "HOLD",
            SignalDirection::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// One strategy's verdict on a price series.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySignal {
    pub strategy_name: String,
    pub direction: SignalDirection,
    /// In [0, 1].
    pub confidence: f64,
    /// Readings that fed the votes, `None` when undefined.
    pub indicators: BTreeMap<String, Option<f64>>,
    pub rationale: String,
    pub insufficient_data: bool,
}

impl StrategySignal {
    pub fn new(
        strategy_name: &str,
        display_name: &str,
        direction: SignalDirection,
        confidence: f64,
        indicators: BTreeMap<String, Option<f64>>,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        StrategySignal {
            strategy_name: strategy_name.to_string(),
            direction,
            confidence,
            indicators,
            rationale: format!(
                "{} signal: {} (confidence {:.1}%)",
                display_name,
                direction,
                confidence * 100.0
            ),
            insufficient_data: false,
        }
    }

    pub fn insufficient_data(strategy_name: &str, bars: usize, minimum: usize) -> Self {
        StrategySignal {
            strategy_name: strategy_name.to_string(),
            direction: SignalDirection::Hold,
            confidence: 0.0,
            indicators: BTreeMap::new(),
            rationale: format!("insufficient data: have {} bars, need {}", bars, minimum),
            insufficient_data: true,
        }
    }

    pub fn error(strategy_name: &str, message: &str) -> Self {
        StrategySignal {
            strategy_name: strategy_name.to_string(),
            direction: SignalDirection::Error,
            confidence: 0.0,
            indicators: BTreeMap::new(),
            rationale: format!("error: {}", message),
            insufficient_data: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rationale_format() {
        let signal = StrategySignal::new(
            "swing",
            "Swing Trading",
            SignalDirection::Buy,
            0.45,
            BTreeMap::new(),
        );
        assert_eq!(signal.rationale, "Swing Trading signal: BUY (confidence 45.0%)");
        assert!(!signal.insufficient_data);
    }

    #[test]
    fn confidence_is_clamped() {
        let signal = StrategySignal::new("x", "X", SignalDirection::Sell, 1.3, BTreeMap::new());
        assert_eq!(signal.confidence, 1.0);
        let signal = StrategySignal::new("x", "X", SignalDirection::Sell, -0.1, BTreeMap::new());
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn insufficient_data_is_zero_confidence_hold() {
        let signal = StrategySignal::insufficient_data("daily", 40, 100);
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert_eq!(signal.confidence, 0.0);
        assert!(signal.insufficient_data);
        assert!(signal.rationale.contains("insufficient data"));
    }

    #[test]
    fn error_signal() {
        let signal = StrategySignal::error("scalp", "boom");
        assert_eq!(signal.direction, SignalDirection::Error);
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.direction.to_string(), "ERROR");
    }
}
