//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::consensus_advisor::ConsensusAdvisor;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_store::MemoryPositionStore;
use crate::adapters::simulated_execution::SimulatedExecution;
use crate::domain::aggregator::{analyze_symbol, consensus};
use crate::domain::backtest::{run_portfolio, BacktestConfig, BacktestReport};
use crate::domain::config_validation::validate_all;
use crate::domain::cycle::{restore_ledger, TradingCycle};
use crate::domain::decision::decide_from_bars;
use crate::domain::error::TraderError;
use crate::domain::execution::{DecisionOutcome, ExecutionConfig};
use crate::domain::ohlcv::PriceBar;
use crate::domain::risk::{RiskConfig, RiskManager};
use crate::domain::strategy::StrategyRegistry;
use crate::ports::advisory_port::AdvisoryPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::position_store::PositionStore;
use crate::ports::report_port::ReportPort;

const DEFAULT_SYMBOLS: [&str; 3] = ["BTC/USDT", "ETH/USDT", "ADA/USDT"];

#[derive(Parser, Debug)]
#[command(name = "cryptotrader", about = "Crypto signal generation, risk checks and backtesting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay stored price series and report performance
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Symbols to run; defaults to `[data] symbols`
        #[arg(short, long)]
        symbol: Vec<String>,
        /// Write the closed trades as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate every strategy on the latest bars of a symbol
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        symbol: String,
    },
    /// Trading decision for the latest bar of a symbol
    Decide {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        symbol: String,
    },
    /// Run one simulated trading cycle and persist the result
    Cycle {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        symbol: String,
    },
    /// List the registered strategies
    Strategies,
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            symbol,
            output,
        } => run_backtest(&config, &symbol, output.as_deref()),
        Command::Signals { config, symbol } => run_signals(&config, &symbol),
        Command::Decide { config, symbol } => run_decide(&config, &symbol),
        Command::Cycle { config, symbol } => run_cycle(&config, &symbol),
        Command::Strategies => {
            run_strategies();
            Ok(())
        }
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_all(&adapter, &StrategyRegistry::with_defaults())?;
    Ok(adapter)
}

/// `[data]` settings with their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub dir: PathBuf,
    pub timeframe: String,
    pub limit: usize,
    pub symbols: Vec<String>,
}

impl DataSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        DataSettings {
            dir: PathBuf::from(config.get_string("data", "dir").unwrap_or_else(|| "data".to_string())),
            timeframe: config
                .get_string("data", "timeframe")
                .unwrap_or_else(|| "1h".to_string()),
            limit: usize::try_from(config.get_int("data", "limit", 500)).unwrap_or(500),
            symbols: config
                .get_list("data", "symbols")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn fetch(&self, data: &dyn DataPort, symbol: &str) -> Result<Vec<PriceBar>, TraderError> {
        data.fetch_price_series(symbol, &self.timeframe, self.limit)
    }

    /// Like `fetch`, but an empty series is an error.
    pub fn fetch_required(&self, data: &dyn DataPort, symbol: &str) -> Result<Vec<PriceBar>, TraderError> {
        let bars = self.fetch(data, symbol)?;
        if bars.is_empty() {
            return Err(TraderError::NoData {
                symbol: symbol.to_string(),
                timeframe: self.timeframe.clone(),
            });
        }
        Ok(bars)
    }
}

fn run_backtest(config_path: &Path, symbols: &[String], output: Option<&Path>) -> Result<(), TraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let settings = DataSettings::from_config(&config);
    let bt_config = BacktestConfig::from_config(&config)?;
    let registry = StrategyRegistry::with_defaults();
    let data = CsvAdapter::new(settings.dir.clone());

    let symbols = if symbols.is_empty() {
        settings.symbols.clone()
    } else {
        symbols.to_vec()
    };

    let mut series = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let bars = settings.fetch(&data, &symbol)?;
        if bars.len() <= bt_config.warmup_bars {
            eprintln!(
                "warning: {} has {} bars, needs more than {} to trade",
                symbol,
                bars.len(),
                bt_config.warmup_bars
            );
        }
        series.push((symbol, bars));
    }

    eprintln!(
        "Running backtest: {} symbols, {} timeframe, signals from {}",
        series.len(),
        settings.timeframe,
        bt_config.signal_source
    );
    let report = run_portfolio(&series, &bt_config, &registry)?;
    print_backtest_summary(&report);

    if let Some(path) = output {
        CsvReportAdapter::new().write(&report, &path.display().to_string())?;
        eprintln!("\nTrades written to: {}", path.display());
    }
    Ok(())
}

fn print_backtest_summary(report: &BacktestReport) {
    let p = &report.portfolio;
    let m = &report.portfolio_metrics;
    println!("=== Portfolio ===");
    println!("Initial Balance:  {:.2}", p.initial_balance);
    println!("Final Balance:    {:.2}", p.final_balance);
    println!("Total Return:     {:.2}%", p.total_return_pct);
    println!("Total Trades:     {}", p.total_trades);
    println!("Win Rate:         {:.1}%", p.win_rate);
    println!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    println!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    println!("Profit Factor:    {:.2}", m.profit_factor);

    if !report.symbols.is_empty() {
        println!("\n=== Per-Symbol Summary ===");
        for r in &report.symbols {
            let pnl = r.stats.final_balance - r.stats.initial_balance;
            let pnl_sign = if pnl >= 0.0 { "+" } else { "" };
            println!(
                "  {}:  {} trades, {:.1}% win rate, {}{:.2} ({:.2}%)",
                r.symbol,
                r.stats.total_trades,
                r.stats.win_rate,
                pnl_sign,
                pnl,
                r.stats.total_return_pct,
            );
        }
    }
}

fn run_signals(config_path: &Path, symbol: &str) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let settings = DataSettings::from_config(&config);
    let data = CsvAdapter::new(settings.dir.clone());
    let bars = settings.fetch_required(&data, symbol)?;

    let registry = StrategyRegistry::with_defaults();
    let analysis = analyze_symbol(&registry, symbol, &bars)?;

    println!("=== {} ({} bars) ===", analysis.symbol, bars.len());
    for (name, signal) in &analysis.signals {
        println!(
            "  {:<6} {:<5} {:>5.1}%  {}",
            name,
            signal.direction.to_string(),
            signal.confidence * 100.0,
            signal.rationale
        );
    }

    let summary = consensus(analysis.signals.values());
    println!(
        "\nConsensus: {} (buy {}, sell {}, hold {}, error {}; avg confidence {:.1}%)",
        summary.leading_direction(),
        summary.buy,
        summary.sell,
        summary.hold,
        summary.error,
        summary.average_confidence * 100.0
    );

    if let Some(price) = analysis.current_price {
        let advice = ConsensusAdvisor::new().rank_decision(&analysis.signals, price)?;
        println!(
            "Advice:    {} ({:.1}%): {}",
            advice.recommendation,
            advice.confidence * 100.0,
            advice.rationale
        );
    }
    Ok(())
}

fn run_decide(config_path: &Path, symbol: &str) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let settings = DataSettings::from_config(&config);
    let data = CsvAdapter::new(settings.dir.clone());
    let bars = settings.fetch_required(&data, symbol)?;
    let risk = RiskManager::new(RiskConfig::from_config(&config)?);

    let decision = decide_from_bars(symbol, &bars, &risk)?;
    println!(
        "{}: {} at {:.8} (buy votes {}, sell votes {})",
        decision.symbol, decision.action, decision.reference_price, decision.buy_votes, decision.sell_votes
    );
    if let (Some(sl), Some(tp)) = (decision.stop_loss, decision.take_profit) {
        println!("  stop loss {:.8}, take profit {:.8}", sl, tp);
    }
    Ok(())
}

fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn PositionStore>, TraderError> {
    if config.get_string("sqlite", "path").is_some() {
        return open_sqlite_store(config);
    }
    Ok(Box::new(MemoryPositionStore::new()))
}

#[cfg(feature = "sqlite")]
fn open_sqlite_store(config: &dyn ConfigPort) -> Result<Box<dyn PositionStore>, TraderError> {
    let store = crate::adapters::sqlite_adapter::SqlitePositionStore::from_config(config)?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite_store(_config: &dyn ConfigPort) -> Result<Box<dyn PositionStore>, TraderError> {
    eprintln!("warning: built without sqlite support, positions are kept in memory");
    Ok(Box::new(MemoryPositionStore::new()))
}

fn run_cycle(config_path: &Path, symbol: &str) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let settings = DataSettings::from_config(&config);
    let data = CsvAdapter::new(settings.dir.clone());
    let bars = settings.fetch_required(&data, symbol)?;

    let risk = RiskManager::new(RiskConfig::from_config(&config)?);
    let exec_config = ExecutionConfig::from_config(&config);
    let execution = SimulatedExecution::new(exec_config.slippage_pct);
    let store = open_store(&config)?;
    let ledger = restore_ledger(store.as_ref())?;

    let cycle = TradingCycle::new(&risk, &execution, store.as_ref(), exec_config);
    let outcome = cycle.run(&ledger, symbol, &bars)?;

    println!(
        "{}: decision {} at {:.8}",
        outcome.symbol, outcome.decision.action, outcome.decision.reference_price
    );
    for exit in &outcome.exits {
        if let Some(e) = &exit.exit {
            println!(
                "  closed #{} ({}) at {:.8}: pnl {:.2} ({:.2}%)",
                exit.id, e.reason, e.price, e.realized_pnl, e.realized_pnl_pct
            );
        }
    }
    for (id, e) in &outcome.exit_failures {
        println!("  exit of #{} failed, still open: {e}", id);
    }
    match &outcome.action {
        Ok(DecisionOutcome::Opened(p)) => println!(
            "  opened #{} {} {:.8} @ {:.8} (sl {:.8}, tp {:.8})",
            p.id, p.side, p.quantity, p.entry_price, p.stop_loss, p.take_profit
        ),
        Ok(DecisionOutcome::Closed(closed)) => {
            for p in closed {
                println!("  closed #{} on signal, pnl {:.2}", p.id, p.realized_pnl().unwrap_or(0.0));
            }
        }
        Ok(DecisionOutcome::NoAction) => println!("  no action"),
        Err(e) => println!("  decision not carried out: {e}"),
    }

    let snapshot = ledger.snapshot()?;
    println!(
        "Open positions: {}, realized pnl {:.2}",
        snapshot.open_positions().len(),
        snapshot.realized_pnl()
    );
    outcome.persisted
}

fn run_strategies() {
    let registry = StrategyRegistry::with_defaults();
    for params in registry.describe() {
        println!("{} ({})", params.display_name, params.name);
        println!("  timeframe:  {}", params.timeframe);
        println!("  hold time:  {}", params.hold_time);
        println!("  risk:       {}", params.risk_level);
        println!("  min bars:   {}", params.min_bars);
        println!("  indicators: {}", params.indicators.join(", "));
    }
}

fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    eprintln!("Validating config: {}", config_path.display());
    load_config(config_path)?;
    println!("Configuration is valid.");
    Ok(())
}
