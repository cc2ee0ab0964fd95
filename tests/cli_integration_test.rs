//! CLI integration tests against INI files and CSV data on disk.

mod common;

use clap::Parser;
use common::*;
use cryptotrader::adapters::csv_adapter::CsvAdapter;
use cryptotrader::cli::{self, Cli, DataSettings};
use cryptotrader::domain::error::TraderError;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn ini_for(data_dir: &Path, extra: &str) -> String {
    format!(
        "[data]\ndir = {}\ntimeframe = 1h\nlimit = 500\nsymbols = BTC/USDT\n\n[risk]\nmax_position_size = 0.1\nstop_loss_pct = 0.02\ntake_profit_pct = 0.05\n\n{}",
        data_dir.display(),
        extra
    )
}

fn run_args(args: &[&str]) -> ExitCode {
    let mut argv = vec!["cryptotrader"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap())
}

fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{:?}", a) == format!("{:?}", b)
}

mod config_loading {
    use super::*;

    #[test]
    fn valid_config_loads() {
        let dir = tempfile::tempdir().unwrap();
        let ini = write_temp_ini(&ini_for(dir.path(), ""));
        let config = cli::load_config(ini.path()).unwrap();
        let settings = DataSettings::from_config(&config);
        assert_eq!(settings.symbols, vec!["BTC/USDT"]);
        assert_eq!(settings.dir, dir.path());
    }

    #[test]
    fn invalid_risk_value_is_rejected() {
        let ini = write_temp_ini("[risk]\nstop_loss_pct = 1.5\n");
        let err = cli::load_config(ini.path()).err().unwrap();
        assert!(matches!(err, TraderError::ConfigInvalid { ref key, .. } if key == "stop_loss_pct"));
    }

    #[test]
    fn unknown_signal_source_is_rejected() {
        let ini = write_temp_ini("[backtest]\nsignal_source = momentum\n");
        let err = cli::load_config(ini.path()).err().unwrap();
        assert!(matches!(err, TraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(cli::load_config(Path::new("/nonexistent/cryptotrader.ini")).is_err());
    }

    #[test]
    fn validate_command_exit_codes() {
        let good = write_temp_ini("[risk]\nmax_position_size = 0.2\n");
        let good_path = good.path().to_str().unwrap();
        assert!(same_code(run_args(&["validate", "--config", good_path]), ExitCode::SUCCESS));

        let bad = write_temp_ini("[execution]\nmode = live\n");
        let bad_path = bad.path().to_str().unwrap();
        assert!(same_code(run_args(&["validate", "--config", bad_path]), ExitCode::from(2)));
    }
}

mod commands {
    use super::*;

    #[test]
    fn backtest_writes_trade_report() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        write_csv(&adapter.csv_path("BTC/USDT", "1h"), &uptrend(250, 1.01));
        let ini = write_temp_ini(&ini_for(dir.path(), ""));
        let out = dir.path().join("trades.csv");

        let code = run_args(&[
            "backtest",
            "--config",
            ini.path().to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ]);
        assert!(same_code(code, ExitCode::SUCCESS));

        let content = std::fs::read_to_string(&out).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("symbol,side,quantity"));
        assert!(lines.count() > 0);
    }

    #[test]
    fn signals_and_decide_run_on_csv_data() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        write_csv(&adapter.csv_path("ETH/USDT", "1h"), &uptrend(120, 1.01));
        let ini = write_temp_ini(&ini_for(dir.path(), ""));
        let config = ini.path().to_str().unwrap();

        for command in ["signals", "decide", "cycle"] {
            let code = run_args(&[command, "--config", config, "--symbol", "ETH/USDT"]);
            assert!(same_code(code, ExitCode::SUCCESS), "{command} failed");
        }
    }

    #[test]
    fn missing_symbol_data_reports_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let ini = write_temp_ini(&ini_for(dir.path(), ""));
        let code = run_args(&[
            "decide",
            "--config",
            ini.path().to_str().unwrap(),
            "--symbol",
            "DOGE/USDT",
        ]);
        assert!(same_code(code, ExitCode::from(5)));
    }

    #[test]
    fn cycle_persists_to_sqlite_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        write_csv(&adapter.csv_path("BTC/USDT", "1h"), &uptrend(120, 1.01));
        let db = dir.path().join("positions.db");
        let ini = write_temp_ini(&ini_for(
            dir.path(),
            &format!("[sqlite]\npath = {}\n", db.display()),
        ));
        let config = ini.path().to_str().unwrap();

        for _ in 0..2 {
            let code = run_args(&["cycle", "--config", config, "--symbol", "BTC/USDT"]);
            assert!(same_code(code, ExitCode::SUCCESS));
        }
        #[cfg(feature = "sqlite")]
        assert!(db.exists());
    }

    #[test]
    fn strategies_lists_registry() {
        assert!(same_code(run_args(&["strategies"]), ExitCode::SUCCESS));
    }
}
