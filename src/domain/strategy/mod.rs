//! Signal strategies and their registry.
//!
//! Each strategy reads indicator values at the last bar, casts weighted
//! BUY/SELL votes and resolves them against its own threshold. Undefined
//! readings and exact ties abstain.

pub mod daily;
pub mod scalp;
pub mod swing;

pub use daily::DailyStrategy;
pub use scalp::ScalpStrategy;
pub use swing::SwingStrategy;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::signal::{SignalDirection, StrategySignal};

/// Common contract of the signal strategies.
pub trait SignalStrategy: Send + Sync {
    /// Registry key, e.g. `"swing"`.
    fn name(&self) -> &str;

    fn parameters(&self) -> StrategyParameters;

    /// Evaluate the series as of its last bar.
    ///
    /// Series shorter than `parameters().min_bars` yield an
    /// insufficient-data HOLD before any indicator is computed.
    fn generate_signal(&self, bars: &[PriceBar]) -> Result<StrategySignal, TraderError>;
}

/// Descriptive and numeric parameters of a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParameters {
    pub name: String,
    pub display_name: String,
    pub min_bars: usize,
    pub timeframe: String,
    pub hold_time: String,
    pub risk_level: String,
    pub indicators: Vec<String>,
    pub threshold: VoteThreshold,
    pub hold_damping: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Buy,
    Sell,
}

/// How a tally turns into a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteThreshold {
    /// Whichever side has more votes wins.
    NetDifference,
    /// At least `n` votes and strictly more than the other side.
    MajorityOf(usize),
    /// At least `n` votes; BUY is checked first.
    AtLeast(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteTally {
    pub buys: usize,
    pub sells: usize,
    pub buy_weight: f64,
    pub sell_weight: f64,
}

impl VoteTally {
    pub fn cast(&mut self, vote: Option<Vote>, weight: f64) {
        match vote {
            Some(Vote::Buy) => {
                self.buys += 1;
                self.buy_weight += weight;
            }
            Some(Vote::Sell) => {
                self.sells += 1;
                self.sell_weight += weight;
            }
            None => {}
        }
    }

    /// Direction and confidence. A HOLD keeps the damped weight of every cast vote.
    pub fn resolve(&self, threshold: VoteThreshold, hold_damping: f64) -> (SignalDirection, f64) {
        let winner = match threshold {
            VoteThreshold::NetDifference => {
                if self.buys > self.sells {
                    Some(Vote::Buy)
                } else if self.sells > self.buys {
                    Some(Vote::Sell)
                } else {
                    None
                }
            }
            VoteThreshold::MajorityOf(n) => {
                if self.buys >= n && self.buys > self.sells {
                    Some(Vote::Buy)
                } else if self.sells >= n && self.sells > self.buys {
                    Some(Vote::Sell)
                } else {
                    None
                }
            }
            VoteThreshold::AtLeast(n) => {
                if self.buys >= n {
                    Some(Vote::Buy)
                } else if self.sells >= n {
                    Some(Vote::Sell)
                } else {
                    None
                }
            }
        };

        match winner {
            Some(Vote::Buy) => (SignalDirection::Buy, self.buy_weight.clamp(0.0, 1.0)),
            Some(Vote::Sell) => (SignalDirection::Sell, self.sell_weight.clamp(0.0, 1.0)),
            None => {
                let cast = self.buy_weight + self.sell_weight;
                (SignalDirection::Hold, (cast * hold_damping).clamp(0.0, 1.0))
            }
        }
    }
}

/// `a > b` BUY, `a < b` SELL; equal or undefined abstains.
pub fn compare_vote(a: Option<f64>, b: Option<f64>) -> Option<Vote> {
    let (a, b) = (a?, b?);
    if a > b {
        Some(Vote::Buy)
    } else if a < b {
        Some(Vote::Sell)
    } else {
        None
    }
}

/// Oscillator rule: above `overbought` SELL, below `oversold` BUY.
pub fn oscillator_vote(value: Option<f64>, oversold: f64, overbought: f64) -> Option<Vote> {
    let value = value?;
    if value > overbought {
        Some(Vote::Sell)
    } else if value < oversold {
        Some(Vote::Buy)
    } else {
        None
    }
}

/// Assemble the final signal once every rule has voted.
pub(crate) fn resolve_signal(
    params: &StrategyParameters,
    tally: &VoteTally,
    indicators: BTreeMap<String, Option<f64>>,
) -> StrategySignal {
    let (direction, confidence) = tally.resolve(params.threshold, params.hold_damping);
    StrategySignal::new(
        &params.name,
        &params.display_name,
        direction,
        confidence,
        indicators,
    )
}

/// Fails when the bar being evaluated carries a non-finite price.
pub(crate) fn check_last_bar(bars: &[PriceBar]) -> Result<&PriceBar, TraderError> {
    match bars.last() {
        Some(bar) if bar.close.is_finite() && bar.volume.is_finite() => Ok(bar),
        Some(bar) => Err(TraderError::ComputationDegenerate {
            context: format!("non-finite bar at {}", bar.timestamp),
        }),
        None => Err(TraderError::ComputationDegenerate {
            context: "empty series".to_string(),
        }),
    }
}

/// Strategies keyed by name, in registration order.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn SignalStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scalp, swing and daily.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ScalpStrategy));
        registry.register(Arc::new(SwingStrategy));
        registry.register(Arc::new(DailyStrategy));
        registry
    }

    /// Add a strategy, replacing any registered under the same name.
    pub fn register(&mut self, strategy: Arc<dyn SignalStrategy>) {
        match self
            .strategies
            .iter()
            .position(|s| s.name() == strategy.name())
        {
            Some(i) => self.strategies[i] = strategy,
            None => self.strategies.push(strategy),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SignalStrategy>> {
        self.strategies.iter().find(|s| s.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SignalStrategy>> {
        self.strategies.iter()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Parameters of every registered strategy.
    pub fn describe(&self) -> Vec<StrategyParameters> {
        self.strategies.iter().map(|s| s.parameters()).collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}
