//! Bar-by-bar replay of a price series through the decision path and ledger.
//!
//! Each step sees only the bars up to and including the current one. One
//! position per symbol is held at a time, sized as a fraction of the
//! symbol's running balance.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::decision::decide;
use crate::domain::error::TraderError;
use crate::domain::ledger::{NewPosition, Tick, TradeLedger};
use crate::domain::metrics::{EquityPoint, Metrics};
use crate::domain::ohlcv::{validate_series, PriceBar};
use crate::domain::position::{Position, Side};
use crate::domain::risk::{RiskConfig, RiskManager};
use crate::domain::signal::SignalDirection;
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::strategy::{SignalStrategy, StrategyRegistry};
use crate::ports::config_port::ConfigPort;

/// Where the per-bar trade signal comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SignalSource {
    /// The three-vote decision policy.
    #[default]
    Policy,
    /// A registered strategy, by name.
    Strategy(String),
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSource::Policy => f.write_str("policy"),
            SignalSource::Strategy(name) => f.write_str(name),
        }
    }
}

impl FromStr for SignalSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "" => Err("signal source must not be empty".to_string()),
            "policy" => Ok(SignalSource::Policy),
            _ => Ok(SignalSource::Strategy(s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    pub warmup_bars: usize,
    pub risk: RiskConfig,
    pub signal_source: SignalSource,
    pub allow_shorting: bool,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_balance: 10_000.0,
            warmup_bars: 50,
            risk: RiskConfig::default(),
            signal_source: SignalSource::Policy,
            allow_shorting: false,
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    /// Read `[backtest]` and `[risk]` overrides on top of the defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let d = BacktestConfig::default();

        let warmup = config.get_int("backtest", "warmup_bars", d.warmup_bars as i64);
        let warmup_bars = usize::try_from(warmup).map_err(|_| TraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "warmup_bars".to_string(),
            reason: format!("must be a non-negative bar count, got {}", warmup),
        })?;

        let signal_source = match config.get_string("backtest", "signal_source") {
            Some(raw) => raw.parse().map_err(|reason| TraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "signal_source".to_string(),
                reason,
            })?,
            None => d.signal_source,
        };

        Ok(BacktestConfig {
            initial_balance: config.get_double("backtest", "initial_balance", d.initial_balance),
            warmup_bars,
            risk: RiskConfig::from_config(config)?,
            signal_source,
            allow_shorting: config.get_bool("backtest", "allow_shorting", d.allow_shorting),
            risk_free_rate: config.get_double("backtest", "risk_free_rate", d.risk_free_rate),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestStats {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return_pct: f64,
    pub total_trades: usize,
    /// Trades with pnl > 0.
    pub winning_trades: usize,
    /// Trades with pnl <= 0.
    pub losing_trades: usize,
    pub win_rate: f64,
}

impl BacktestStats {
    fn from_counts(initial_balance: f64, final_balance: f64, winning: usize, losing: usize) -> Self {
        let total = winning + losing;
        BacktestStats {
            initial_balance,
            final_balance,
            total_return_pct: if initial_balance > 0.0 {
                (final_balance - initial_balance) / initial_balance * 100.0
            } else {
                0.0
            },
            total_trades: total,
            winning_trades: winning,
            losing_trades: losing,
            win_rate: if total > 0 {
                winning as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    pub fn from_positions<'a>(
        initial_balance: f64,
        final_balance: f64,
        closed: impl IntoIterator<Item = &'a Position>,
    ) -> Self {
        let (winning, losing) = closed
            .into_iter()
            .filter_map(|p| p.realized_pnl())
            .fold((0, 0), |(w, l), pnl| if pnl > 0.0 { (w + 1, l) } else { (w, l + 1) });
        Self::from_counts(initial_balance, final_balance, winning, losing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolResult {
    pub symbol: String,
    pub stats: BacktestStats,
    pub positions: Vec<Position>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub symbols: Vec<SymbolResult>,
    pub portfolio: BacktestStats,
    pub portfolio_metrics: Metrics,
}

impl BacktestReport {
    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> {
        self.symbols
            .iter()
            .flat_map(|r| r.positions.iter())
            .filter(|p| !p.is_open())
    }
}

enum Signaller {
    Policy(RiskManager),
    Strategy(Arc<dyn SignalStrategy>),
}

impl Signaller {
    fn resolve(config: &BacktestConfig, registry: &StrategyRegistry) -> Result<Self, TraderError> {
        match &config.signal_source {
            SignalSource::Policy => Ok(Signaller::Policy(RiskManager::new(config.risk.clone()))),
            SignalSource::Strategy(name) => registry
                .get(name)
                .map(Signaller::Strategy)
                .ok_or_else(|| TraderError::ConfigInvalid {
                    section: "backtest".to_string(),
                    key: "signal_source".to_string(),
                    reason: format!("unknown strategy '{}'", name),
                }),
        }
    }

    /// Side the signal points to at the last bar of `prefix`, if any.
    fn side_at(&self, symbol: &str, prefix: &[PriceBar]) -> Result<Option<Side>, TraderError> {
        match self {
            Signaller::Policy(risk) => Ok(IndicatorSnapshot::from_bars(prefix)
                .and_then(|snapshot| decide(symbol, &snapshot, risk).action.side())),
            Signaller::Strategy(strategy) => {
                let signal = strategy.generate_signal(prefix)?;
                Ok(match signal.direction {
                    SignalDirection::Buy => Some(Side::Buy),
                    SignalDirection::Sell => Some(Side::Sell),
                    SignalDirection::Hold | SignalDirection::Error => None,
                })
            }
        }
    }
}

/// Cash returned when a position is settled: the committed notional plus pnl.
fn settlement(position: &Position, pnl: f64) -> f64 {
    position.quantity * position.entry_price + pnl
}

pub fn run_backtest(
    symbol: &str,
    bars: &[PriceBar],
    config: &BacktestConfig,
    registry: &StrategyRegistry,
) -> Result<SymbolResult, TraderError> {
    validate_series(bars)?;
    let signaller = Signaller::resolve(config, registry)?;
    let risk = RiskManager::new(config.risk.clone());

    let mut ledger = TradeLedger::new();
    let mut balance = config.initial_balance;
    let mut held: Option<u64> = None;
    let mut equity_curve = Vec::with_capacity(bars.len().saturating_sub(config.warmup_bars));
    let last = bars.len().saturating_sub(1);

    for i in config.warmup_bars..bars.len() {
        let bar = &bars[i];
        let price = bar.close;
        let signal = signaller.side_at(symbol, &bars[..=i])?;

        if let Some(id) = held {
            let side = ledger
                .get(id)
                .map(|p| p.side)
                .ok_or(TraderError::PositionNotFound { id })?;
            let tick = Tick {
                opposing_signal: signal == Some(side.opposite()),
                end_of_data: i == last,
                ..Tick::at(price, bar.timestamp)
            };
            if ledger.on_tick(id, &tick)?.is_some() {
                let closed = ledger.get(id).ok_or(TraderError::PositionNotFound { id })?;
                balance += settlement(closed, closed.realized_pnl().unwrap_or(0.0));
                held = None;
                equity_curve.push(EquityPoint {
                    timestamp: bar.timestamp,
                    equity: balance,
                });
                continue;
            }
            ledger.apply_trailing_stop(id, &risk, price)?;
        } else if i < last {
            let entry = signal.filter(|side| *side == Side::Buy || config.allow_shorting);
            if let Some(side) = entry {
                let size = balance * config.risk.max_position_size;
                let quantity = if price > 0.0 { size / price } else { 0.0 };
                let validation =
                    risk.validate(symbol, side, quantity, price, balance, &ledger.open_positions());
                if validation.is_valid {
                    let position = ledger.open(
                        NewPosition {
                            symbol: symbol.to_string(),
                            side,
                            quantity,
                            entry_price: price,
                            entry_time: bar.timestamp,
                        },
                        &validation,
                    )?;
                    balance -= position.quantity * position.entry_price;
                    held = Some(position.id);
                }
            }
        }

        let open_value: f64 = ledger
            .open_positions()
            .iter()
            .map(|p| settlement(p, p.unrealized_pnl()))
            .sum();
        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: balance + open_value,
        });
    }

    let positions = ledger.positions().to_vec();
    let stats = BacktestStats::from_positions(config.initial_balance, balance, &positions);
    let metrics = Metrics::compute(
        &equity_curve,
        ledger.closed_positions(),
        config.initial_balance,
        config.risk_free_rate,
    );
    debug!(
        symbol,
        bars = bars.len(),
        trades = stats.total_trades,
        final_balance = stats.final_balance,
        "symbol backtest finished"
    );

    Ok(SymbolResult {
        symbol: symbol.to_string(),
        stats,
        positions,
        equity_curve,
        metrics,
    })
}

/// Run every symbol with its own starting balance and combine the results.
pub fn run_portfolio(
    series: &[(String, Vec<PriceBar>)],
    config: &BacktestConfig,
    registry: &StrategyRegistry,
) -> Result<BacktestReport, TraderError> {
    let symbols = series
        .iter()
        .map(|(symbol, bars)| run_backtest(symbol, bars, config, registry))
        .collect::<Result<Vec<_>, _>>()?;

    let initial = config.initial_balance * symbols.len() as f64;
    let final_balance: f64 = symbols.iter().map(|r| r.stats.final_balance).sum();
    let winning = symbols.iter().map(|r| r.stats.winning_trades).sum();
    let losing = symbols.iter().map(|r| r.stats.losing_trades).sum();
    let portfolio = BacktestStats::from_counts(initial, final_balance, winning, losing);

    let curve = combined_curve(&symbols, config.initial_balance);
    let closed: Vec<&Position> = symbols
        .iter()
        .flat_map(|r| r.positions.iter())
        .filter(|p| !p.is_open())
        .collect();
    let portfolio_metrics = Metrics::compute(&curve, closed, initial, config.risk_free_rate);

    info!(
        symbols = symbols.len(),
        trades = portfolio.total_trades,
        return_pct = portfolio.total_return_pct,
        "backtest finished"
    );

    Ok(BacktestReport {
        symbols,
        portfolio,
        portfolio_metrics,
    })
}

/// Sum of per-symbol equity at every timestamp, carrying each symbol's
/// last value forward (its starting balance before its first point).
fn combined_curve(results: &[SymbolResult], initial_balance: f64) -> Vec<EquityPoint> {
    let mut timeline: BTreeMap<DateTime<Utc>, Vec<(usize, f64)>> = BTreeMap::new();
    for (idx, result) in results.iter().enumerate() {
        for point in &result.equity_curve {
            timeline
                .entry(point.timestamp)
                .or_default()
                .push((idx, point.equity));
        }
    }

    let mut latest = vec![initial_balance; results.len()];
    timeline
        .into_iter()
        .map(|(timestamp, updates)| {
            for (idx, equity) in updates {
                latest[idx] = equity;
            }
            EquityPoint {
                timestamp,
                equity: latest.iter().sum(),
            }
        })
        .collect()
}
