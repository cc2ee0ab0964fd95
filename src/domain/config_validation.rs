//! Configuration validation.
//!
//! Checks every recognized key before anything runs and stops at the first
//! problem. Absent keys fall back to their defaults and are not errors.

use crate::domain::backtest::SignalSource;
use crate::domain::error::TraderError;
use crate::domain::strategy::StrategyRegistry;
use crate::ports::config_port::ConfigPort;

pub fn validate_all(config: &dyn ConfigPort, registry: &StrategyRegistry) -> Result<(), TraderError> {
    validate_risk_config(config)?;
    validate_backtest_config(config, registry)?;
    validate_data_config(config)?;
    validate_execution_config(config)?;
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for key in [
        "max_position_size",
        "stop_loss_pct",
        "take_profit_pct",
        "max_daily_loss",
        "risk_per_trade",
    ] {
        validate_fraction(config, "risk", key)?;
    }
    validate_bool(config, "risk", "trailing_stop")?;
    validate_count(config, "risk", "max_open_positions_per_symbol")?;
    Ok(())
}

pub fn validate_backtest_config(
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
) -> Result<(), TraderError> {
    if let Some(balance) = number(config, "backtest", "initial_balance")? {
        if balance <= 0.0 {
            return Err(invalid("backtest", "initial_balance", "initial_balance must be positive"));
        }
    }
    validate_count(config, "backtest", "warmup_bars")?;
    validate_risk_free_rate(config)?;
    validate_bool(config, "backtest", "allow_shorting")?;
    validate_signal_source(config, registry)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_count(config, "data", "limit")?;
    if let Some(timeframe) = config.get_string("data", "timeframe") {
        if timeframe.trim().is_empty() {
            return Err(invalid("data", "timeframe", "timeframe must not be empty"));
        }
    }
    if let Some(symbols) = config.get_list("data", "symbols") {
        if symbols.is_empty() {
            return Err(invalid("data", "symbols", "at least one symbol is required"));
        }
    }
    Ok(())
}

pub fn validate_execution_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(mode) = config.get_string("execution", "mode") {
        if mode.trim() != "simulated" {
            return Err(invalid(
                "execution",
                "mode",
                &format!("unsupported execution mode '{}'", mode.trim()),
            ));
        }
    }
    if let Some(slippage) = number(config, "execution", "slippage_pct")? {
        if !(0.0..1.0).contains(&slippage) {
            return Err(invalid("execution", "slippage_pct", "slippage_pct must be in [0, 1)"));
        }
    }
    if let Some(value) = number(config, "execution", "portfolio_value")? {
        if value <= 0.0 {
            return Err(invalid("execution", "portfolio_value", "portfolio_value must be positive"));
        }
    }
    validate_bool(config, "execution", "allow_shorting")?;
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if let Some(rate) = number(config, "backtest", "risk_free_rate")? {
        if !(0.0..1.0).contains(&rate) {
            return Err(invalid("backtest", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
        }
    }
    Ok(())
}

fn validate_signal_source(config: &dyn ConfigPort, registry: &StrategyRegistry) -> Result<(), TraderError> {
    let Some(raw) = config.get_string("backtest", "signal_source") else {
        return Ok(());
    };
    match raw.parse::<SignalSource>() {
        Ok(SignalSource::Policy) => Ok(()),
        Ok(SignalSource::Strategy(name)) if registry.get(&name).is_some() => Ok(()),
        Ok(SignalSource::Strategy(name)) => Err(invalid(
            "backtest",
            "signal_source",
            &format!(
                "unknown signal source '{}', expected policy or one of: {}",
                name,
                registry.names().join(", ")
            ),
        )),
        Err(reason) => Err(invalid("backtest", "signal_source", &reason)),
    }
}

/// Fractions live in (0, 1].
fn validate_fraction(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TraderError> {
    if let Some(value) = number(config, section, key)? {
        if !(value > 0.0 && value <= 1.0) {
            return Err(invalid(section, key, &format!("{} must be in (0, 1], got {}", key, value)));
        }
    }
    Ok(())
}

fn validate_count(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(());
    };
    match raw.trim().parse::<i64>() {
        Ok(n) if n >= 1 => Ok(()),
        Ok(_) => Err(invalid(section, key, &format!("{} must be at least 1", key))),
        Err(_) => Err(invalid(section, key, &format!("'{}' is not a whole number", raw.trim()))),
    }
}

fn validate_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(());
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "false" | "no" | "0" => Ok(()),
        other => Err(invalid(section, key, &format!("'{}' is not a boolean", other))),
    }
}

/// Present numeric value, or `None` when the key is absent.
fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, TraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| invalid(section, key, &format!("'{}' is not a number", raw.trim())))
}

fn invalid(section: &str, key: &str, reason: &str) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn check(content: &str) -> Result<(), TraderError> {
        validate_all(&make_config(content), &StrategyRegistry::with_defaults())
    }

    fn invalid_key(result: Result<(), TraderError>) -> String {
        match result {
            Err(TraderError::ConfigInvalid { key, .. }) => key,
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn full_config_passes() {
        let content = r#"
[risk]
max_position_size = 0.1
stop_loss_pct = 0.02
take_profit_pct = 0.05
trailing_stop = true
max_daily_loss = 0.05
max_open_positions_per_symbol = 3
risk_per_trade = 0.02

[backtest]
initial_balance = 10000
warmup_bars = 50
signal_source = swing
allow_shorting = false
risk_free_rate = 0.02

[data]
dir = ./data
timeframe = 1h
limit = 500
symbols = BTC/USDT, ETH/USDT

[execution]
mode = simulated
slippage_pct = 0.001
portfolio_value = 10000
"#;
        assert!(check(content).is_ok());
    }

    #[test]
    fn empty_config_passes() {
        assert!(check("").is_ok());
    }

    #[test]
    fn fraction_out_of_range_fails() {
        assert_eq!(invalid_key(check("[risk]\nmax_position_size = 1.5\n")), "max_position_size");
        assert_eq!(invalid_key(check("[risk]\nstop_loss_pct = 0\n")), "stop_loss_pct");
        assert_eq!(invalid_key(check("[risk]\nrisk_per_trade = -0.1\n")), "risk_per_trade");
    }

    #[test]
    fn unparsable_number_fails() {
        assert_eq!(invalid_key(check("[risk]\ntake_profit_pct = lots\n")), "take_profit_pct");
    }

    #[test]
    fn counts_must_be_positive_integers() {
        assert_eq!(
            invalid_key(check("[risk]\nmax_open_positions_per_symbol = 0\n")),
            "max_open_positions_per_symbol"
        );
        assert_eq!(invalid_key(check("[backtest]\nwarmup_bars = 2.5\n")), "warmup_bars");
        assert_eq!(invalid_key(check("[data]\nlimit = -1\n")), "limit");
    }

    #[test]
    fn initial_balance_must_be_positive() {
        assert_eq!(invalid_key(check("[backtest]\ninitial_balance = 0\n")), "initial_balance");
    }

    #[test]
    fn risk_free_rate_range() {
        assert_eq!(invalid_key(check("[backtest]\nrisk_free_rate = 1.5\n")), "risk_free_rate");
        assert!(check("[backtest]\nrisk_free_rate = 0\n").is_ok());
    }

    #[test]
    fn unknown_signal_source_fails() {
        let err = check("[backtest]\nsignal_source = momentum\n").unwrap_err();
        match err {
            TraderError::ConfigInvalid { key, reason, .. } => {
                assert_eq!(key, "signal_source");
                assert!(reason.contains("scalp"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(check("[backtest]\nsignal_source = Daily\n").is_ok());
    }

    #[test]
    fn bad_boolean_fails() {
        assert_eq!(invalid_key(check("[risk]\ntrailing_stop = maybe\n")), "trailing_stop");
    }

    #[test]
    fn empty_symbol_list_fails() {
        assert_eq!(invalid_key(check("[data]\nsymbols = , ,\n")), "symbols");
    }

    #[test]
    fn live_execution_mode_is_rejected() {
        assert_eq!(invalid_key(check("[execution]\nmode = live\n")), "mode");
        assert_eq!(invalid_key(check("[execution]\nportfolio_value = -5\n")), "portfolio_value");
    }
}
