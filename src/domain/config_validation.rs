//! Configuration validation.
//!
//! Every key is optional; a missing key validates as its default.

use crate::domain::backtest::{DEFAULT_COMMISSION, DEFAULT_INITIAL_CAPITAL, DEFAULT_RISK_FREE_RATE};
use crate::domain::data_fetcher::{DEFAULT_CACHE_HOURS, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS};
use crate::domain::error::StonksError;
use crate::domain::period::Period;
use crate::domain::strategy::{StrategyParams, DEFAULT_LONG_WINDOW, DEFAULT_SHORT_WINDOW};
use crate::ports::config_port::ConfigPort;

pub const PROVIDERS: [&str; 2] = ["yahoo", "csv"];
pub const DEFAULT_TIMEOUT_SECS: i64 = 30;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> StonksError {
    StonksError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    validate_data_config(config)?;
    validate_strategy_config(config)?;
    validate_backtest_config(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    validate_provider(config)?;
    validate_non_negative(config, "cache_hours", DEFAULT_CACHE_HOURS as i64)?;
    validate_non_negative(config, "max_retries", DEFAULT_MAX_RETRIES as i64)?;
    validate_non_negative(config, "retry_delay_ms", DEFAULT_RETRY_DELAY_MS as i64)?;
    validate_timeout(config)?;
    validate_default_period(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    let short = config.get_int("strategy", "short_window", DEFAULT_SHORT_WINDOW as i64);
    let long = config.get_int("strategy", "long_window", DEFAULT_LONG_WINDOW as i64);

    let short = usize::try_from(short)
        .map_err(|_| invalid("strategy", "short_window", "short_window must be positive"))?;
    let long = usize::try_from(long)
        .map_err(|_| invalid("strategy", "long_window", "long_window must be positive"))?;

    StrategyParams::new(short, long).map_err(|e| match e {
        StonksError::InvalidParameters { reason } => invalid("strategy", "short_window", reason),
        other => other,
    })?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    let capital = config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL);
    if capital <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let commission = config.get_double("backtest", "commission", DEFAULT_COMMISSION);
    if !(0.0..1.0).contains(&commission) {
        return Err(invalid(
            "backtest",
            "commission",
            "commission must be a fraction between 0 and 1",
        ));
    }

    let rate = config.get_double("backtest", "risk_free_rate", DEFAULT_RISK_FREE_RATE);
    if !(0.0..1.0).contains(&rate) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_provider(config: &dyn ConfigPort) -> Result<(), StonksError> {
    match config.get_string("data", "provider") {
        None => Ok(()),
        Some(p) if PROVIDERS.contains(&p.trim().to_lowercase().as_str()) => Ok(()),
        Some(p) => Err(invalid(
            "data",
            "provider",
            format!("unknown provider '{}', expected one of {}", p, PROVIDERS.join(", ")),
        )),
    }
}

fn validate_non_negative(config: &dyn ConfigPort, key: &str, default: i64) -> Result<(), StonksError> {
    if config.get_int("data", key, default) < 0 {
        return Err(invalid("data", key, format!("{} must be non-negative", key)));
    }
    Ok(())
}

fn validate_timeout(config: &dyn ConfigPort) -> Result<(), StonksError> {
    if config.get_int("data", "timeout_secs", DEFAULT_TIMEOUT_SECS) <= 0 {
        return Err(invalid("data", "timeout_secs", "timeout_secs must be positive"));
    }
    Ok(())
}

fn validate_default_period(config: &dyn ConfigPort) -> Result<(), StonksError> {
    if let Some(value) = config.get_string("data", "default_period") {
        Period::parse(&value).map_err(|e| invalid("data", "default_period", e.to_string()))?;
    }
    Ok(())
}
