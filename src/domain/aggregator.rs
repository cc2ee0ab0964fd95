//! Run every registered strategy against one series.

use std::collections::BTreeMap;

use tracing::warn;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::{validate_series, PriceBar};
use crate::domain::signal::{SignalDirection, StrategySignal};
use crate::domain::strategy::StrategyRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolAnalysis {
    pub symbol: String,
    pub current_price: Option<f64>,
    pub signals: BTreeMap<String, StrategySignal>,
}

/// Evaluate all strategies. An out-of-order series is rejected outright; a
/// failing strategy becomes an ERROR signal and the rest still run.
pub fn analyze_symbol(
    registry: &StrategyRegistry,
    symbol: &str,
    bars: &[PriceBar],
) -> Result<SymbolAnalysis, TraderError> {
    validate_series(bars)?;

    let mut signals = BTreeMap::new();
    for strategy in registry.iter() {
        let name = strategy.name().to_string();
        let signal = match strategy.generate_signal(bars) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(symbol, strategy = %name, error = %e, "strategy evaluation failed");
                StrategySignal::error(&name, &e.to_string())
            }
        };
        signals.insert(name, signal);
    }

    Ok(SymbolAnalysis {
        symbol: symbol.to_string(),
        current_price: bars.last().map(|b| b.close),
        signals,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    pub buy: usize,
    pub sell: usize,
    pub hold: usize,
    pub error: usize,
    pub average_confidence: f64,
}

impl Consensus {
    /// The direction most strategies agree on; HOLD on a tie.
    pub fn leading_direction(&self) -> SignalDirection {
        if self.buy > self.sell && self.buy >= self.hold {
            SignalDirection::Buy
        } else if self.sell > self.buy && self.sell >= self.hold {
            SignalDirection::Sell
        } else {
            SignalDirection::Hold
        }
    }
}

pub fn consensus<'a>(signals: impl IntoIterator<Item = &'a StrategySignal>) -> Consensus {
    let mut result = Consensus {
        buy: 0,
        sell: 0,
        hold: 0,
        error: 0,
        average_confidence: 0.0,
    };
    let mut total_confidence = 0.0;
    let mut count = 0usize;
    for signal in signals {
        match signal.direction {
            SignalDirection::Buy => result.buy += 1,
            SignalDirection::Sell => result.sell += 1,
            SignalDirection::Hold => result.hold += 1,
            SignalDirection::Error => result.error += 1,
        }
        total_confidence += signal.confidence;
        count += 1;
    }
    if count > 0 {
        result.average_confidence = total_confidence / count as f64;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::test_support::{flat, geometric};
    use crate::domain::strategy::{SignalStrategy, StrategyParameters, VoteThreshold};
    use std::sync::Arc;

    struct Broken;

    impl SignalStrategy for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn parameters(&self) -> StrategyParameters {
            StrategyParameters {
                name: "broken".into(),
                display_name: "Broken".into(),
                min_bars: 1,
                timeframe: String::new(),
                hold_time: String::new(),
                risk_level: String::new(),
                indicators: Vec::new(),
                threshold: VoteThreshold::NetDifference,
                hold_damping: 0.5,
            }
        }

        fn generate_signal(&self, _bars: &[PriceBar]) -> Result<StrategySignal, TraderError> {
            Err(TraderError::ComputationDegenerate {
                context: "always fails".into(),
            })
        }
    }

    #[test]
    fn all_strategies_report() {
        let registry = StrategyRegistry::with_defaults();
        let analysis = analyze_symbol(&registry, "BTC/USDT", &geometric(120, 1.01)).unwrap();
        assert_eq!(analysis.signals.len(), 3);
        assert_eq!(analysis.signals["scalp"].direction, SignalDirection::Buy);
        assert_eq!(analysis.signals["swing"].direction, SignalDirection::Buy);
        assert!(analysis.current_price.is_some());
    }

    #[test]
    fn failing_strategy_is_isolated() {
        let mut registry = StrategyRegistry::with_defaults();
        registry.register(Arc::new(Broken));
        let analysis = analyze_symbol(&registry, "BTC/USDT", &geometric(60, 1.01)).unwrap();

        let broken = &analysis.signals["broken"];
        assert_eq!(broken.direction, SignalDirection::Error);
        assert_eq!(broken.confidence, 0.0);
        assert!(broken.rationale.contains("always fails"));
        assert_eq!(analysis.signals["scalp"].direction, SignalDirection::Buy);
    }

    #[test]
    fn short_series_is_all_insufficient() {
        let registry = StrategyRegistry::with_defaults();
        let analysis = analyze_symbol(&registry, "BTC/USDT", &geometric(5, 1.01)).unwrap();
        assert!(analysis.signals.values().all(|s| s.insufficient_data));
        assert!(analysis.signals.values().all(|s| s.confidence == 0.0));
    }

    #[test]
    fn empty_series_does_not_fail() {
        let registry = StrategyRegistry::with_defaults();
        let analysis = analyze_symbol(&registry, "BTC/USDT", &[]).unwrap();
        assert!(analysis.current_price.is_none());
        assert!(analysis.signals.values().all(|s| s.direction == SignalDirection::Hold));
    }

    #[test]
    fn unordered_series_is_fatal() {
        let mut bars = flat(10);
        bars.swap(3, 4);
        let registry = StrategyRegistry::with_defaults();
        assert!(matches!(
            analyze_symbol(&registry, "BTC/USDT", &bars),
            Err(TraderError::UnorderedSeries { index: 4, .. })
        ));
    }

    #[test]
    fn consensus_counts() {
        let registry = StrategyRegistry::with_defaults();
        let analysis = analyze_symbol(&registry, "BTC/USDT", &flat(250)).unwrap();
        let c = consensus(analysis.signals.values());
        assert_eq!(c.hold, 3);
        assert_eq!(c.average_confidence, 0.0);
        assert_eq!(c.leading_direction(), SignalDirection::Hold);
    }
}
