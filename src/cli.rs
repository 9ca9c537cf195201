//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_cache_adapter::FileCacheAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::yahoo_adapter::{YahooAdapter, DEFAULT_BASE_URL};
use crate::domain::backtest::{
    BacktestConfig, BacktestResult, DEFAULT_COMMISSION, DEFAULT_INITIAL_CAPITAL,
    DEFAULT_RISK_FREE_RATE,
};
use crate::domain::config_validation::{validate_config, DEFAULT_TIMEOUT_SECS, PROVIDERS};
use crate::domain::data_fetcher::{
    DataFetcher, FetcherSettings, DEFAULT_CACHE_HOURS, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS,
};
use crate::domain::error::StonksError;
use crate::domain::period::Period;
use crate::domain::price_series::normalize_symbol;
use crate::domain::strategy::{
    MovingAverageCrossover, Strategy, StrategyParams, DEFAULT_LONG_WINDOW, DEFAULT_SHORT_WINDOW,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_CSV_DIR: &str = "data/csv";
pub const DEFAULT_CACHE_DIR: &str = "data/cache";

#[derive(Parser, Debug)]
#[command(name = "stonks", about = "Moving-average crossover backtester")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `stonks=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StrategyArgs {
    /// Named period (1mo, 2y, max, ...) or START:END dates
    #[arg(short, long)]
    pub period: Option<String>,
    /// Short moving-average window
    #[arg(long)]
    pub short: Option<usize>,
    /// Long moving-average window
    #[arg(long)]
    pub long: Option<usize>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one symbol
    Backtest {
        #[arg(short, long)]
        symbol: String,
        #[command(flatten)]
        strategy: StrategyArgs,
        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
        /// Write the per-day report to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Backtest several symbols side by side
    Compare {
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
        #[command(flatten)]
        strategy: StrategyArgs,
    },
    /// Fetch price history into the cache
    Fetch {
        #[arg(short, long)]
        symbol: String,
        #[arg(short, long)]
        period: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        refresh: bool,
    },
    /// Remove cached price files
    ClearCache {
        #[arg(short, long)]
        symbol: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Single-symbol backtest request.
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub symbol: String,
    pub period: Period,
    pub force_refresh: bool,
    pub output_path: Option<PathBuf>,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            symbol,
            strategy,
            refresh,
            output,
        } => run_backtest(&symbol, &strategy, refresh, output),
        Command::Compare { symbols, strategy } => run_compare(&symbols, &strategy),
        Command::Fetch {
            symbol,
            period,
            config,
            refresh,
        } => run_fetch(&symbol, period.as_deref(), config.as_deref(), refresh),
        Command::ClearCache { symbol, config } => run_clear_cache(symbol.as_deref(), config.as_deref()),
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

/// Loads the INI file at `path`, or an empty configuration when there is
/// none so every default applies.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, StonksError> {
    match path {
        Some(p) => {
            info!(path = %p.display(), "loading config");
            FileConfigAdapter::from_file(p)
        }
        None => FileConfigAdapter::from_string(""),
    }
}

pub fn build_fetcher_settings(config: &dyn ConfigPort) -> FetcherSettings {
    let cache_hours = config
        .get_int("data", "cache_hours", DEFAULT_CACHE_HOURS as i64)
        .max(0) as u64;
    let max_retries = config
        .get_int("data", "max_retries", DEFAULT_MAX_RETRIES as i64)
        .clamp(0, u32::MAX as i64) as u32;
    let retry_delay_ms = config
        .get_int("data", "retry_delay_ms", DEFAULT_RETRY_DELAY_MS as i64)
        .max(0) as u64;

    FetcherSettings {
        cache_ttl: Duration::from_secs(cache_hours.saturating_mul(3600)),
        max_retries,
        retry_delay: Duration::from_millis(retry_delay_ms),
        stale_fallback: config.get_bool("data", "stale_fallback", true),
    }
}

/// Command-line windows win over the config file.
pub fn build_strategy_params(
    config: &dyn ConfigPort,
    short_override: Option<usize>,
    long_override: Option<usize>,
) -> Result<StrategyParams, StonksError> {
    let window = |key: &str, default: usize| -> Result<usize, StonksError> {
        let value = config.get_int("strategy", key, default as i64);
        usize::try_from(value).map_err(|_| StonksError::InvalidParameters {
            reason: format!("{} must be positive, got {}", key, value),
        })
    };

    let short = match short_override {
        Some(s) => s,
        None => window("short_window", DEFAULT_SHORT_WINDOW)?,
    };
    let long = match long_override {
        Some(l) => l,
        None => window("long_window", DEFAULT_LONG_WINDOW)?,
    };
    StrategyParams::new(short, long)
}

pub fn build_strategy(config: &dyn ConfigPort, params: StrategyParams) -> MovingAverageCrossover {
    let strategy = MovingAverageCrossover::new(params);
    match config.get_string("strategy", "name") {
        Some(name) => strategy.with_name(name),
        None => strategy,
    }
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> BacktestConfig {
    BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        commission: config.get_double("backtest", "commission", DEFAULT_COMMISSION),
        risk_free_rate: config.get_double("backtest", "risk_free_rate", DEFAULT_RISK_FREE_RATE),
    }
}

pub fn resolve_period(arg: Option<&str>, config: &dyn ConfigPort) -> Result<Period, StonksError> {
    match arg {
        Some(p) => Period::parse(p),
        None => match config.get_string("data", "default_period") {
            Some(p) => Period::parse(&p),
            None => Ok(Period::default()),
        },
    }
}

/// Normalises symbols, drops blanks and repeats, keeps first-seen order.
pub fn resolve_symbols(symbols: &[String]) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();
    for symbol in symbols.iter().flat_map(|s| s.split(',')) {
        let symbol = normalize_symbol(symbol);
        if !symbol.is_empty() && !resolved.contains(&symbol) {
            resolved.push(symbol);
        }
    }
    resolved
}

pub fn build_provider(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, StonksError> {
    let provider = config
        .get_string_or("data", "provider", PROVIDERS[0])
        .trim()
        .to_lowercase();

    match provider.as_str() {
        "yahoo" => {
            let base_url = config.get_string_or("data", "base_url", DEFAULT_BASE_URL);
            let timeout = config
                .get_int("data", "timeout_secs", DEFAULT_TIMEOUT_SECS)
                .max(1) as u64;
            Ok(Box::new(YahooAdapter::new(
                &base_url,
                Duration::from_secs(timeout),
            )?))
        }
        "csv" => {
            let dir = config.get_string_or("data", "csv_dir", DEFAULT_CSV_DIR);
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        other => Err(StonksError::ConfigInvalid {
            section: "data".into(),
            key: "provider".into(),
            reason: format!("unknown provider '{}'", other),
        }),
    }
}

pub fn build_cache(config: &dyn ConfigPort) -> Result<FileCacheAdapter, StonksError> {
    let dir = config.get_string_or("data", "cache_dir", DEFAULT_CACHE_DIR);
    FileCacheAdapter::new(PathBuf::from(dir))
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Metrics table for one backtest, ending with a verdict against
/// buy-and-hold.
pub fn format_summary(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let mut out = format!("=== {} on {} ===\n", result.strategy_name, result.symbol);

    if let (Some(first), Some(last)) = (result.equity_curve.first(), result.equity_curve.last()) {
        out.push_str(&format!(
            "Period:            {} to {} ({} bars)\n",
            first.date,
            last.date,
            result.equity_curve.len()
        ));
    }
    out.push_str(&format!("Strategy Return:   {}\n", percent(m.total_return)));
    out.push_str(&format!("Buy & Hold Return: {}\n", percent(m.buy_hold_return)));
    out.push_str(&format!("Excess Return:     {}\n", percent(m.excess_return)));
    out.push_str(&format!("Annualized Return: {}\n", percent(m.annualized_return)));
    out.push_str(&format!("Volatility:        {}\n", percent(m.volatility)));
    out.push_str(&format!("Sharpe Ratio:      {:.2}\n", m.sharpe_ratio));
    out.push_str(&format!("Max Drawdown:      -{:.2}%\n", m.max_drawdown * 100.0));
    out.push_str(&format!("Win Rate:          {:.1}%\n", m.win_rate * 100.0));
    out.push_str(&format!("Total Trades:      {}\n", m.total_trades));

    let spread = m.excess_return.abs() * 100.0;
    let verdict = if m.excess_return > 0.0 {
        format!("strategy beat buy & hold by {:.2} points", spread)
    } else if m.excess_return < 0.0 {
        format!("strategy trailed buy & hold by {:.2} points", spread)
    } else {
        "strategy matched buy & hold".to_string()
    };
    out.push_str(&format!("Verdict:           {}\n", verdict));
    out
}

pub fn format_comparison(results: &[BacktestResult]) -> String {
    let mut out = format!(
        "{:<8} {:>10} {:>10} {:>10} {:>8} {:>9} {:>7}\n",
        "Symbol", "Strategy", "Buy&Hold", "Excess", "Sharpe", "MaxDD", "Trades"
    );
    for r in results {
        let m = &r.metrics;
        out.push_str(&format!(
            "{:<8} {:>10} {:>10} {:>10} {:>8.2} {:>9} {:>7}\n",
            r.symbol,
            percent(m.total_return),
            percent(m.buy_hold_return),
            percent(m.excess_return),
            m.sharpe_ratio,
            format!("-{:.2}%", m.max_drawdown * 100.0),
            m.total_trades
        ));
    }
    out
}

/// Fetch, backtest and optionally export one symbol.
pub fn run_backtest_pipeline(
    fetcher: &DataFetcher,
    strategy: &dyn Strategy,
    bt_config: &BacktestConfig,
    request: &BacktestRequest,
    report: &dyn ReportPort,
) -> Result<BacktestResult, StonksError> {
    let series = fetcher.get_price_series(&request.symbol, &request.period, request.force_refresh)?;
    info!(symbol = series.symbol(), bars = series.len(), "loaded price series");

    let result = strategy.backtest(&series, bt_config)?;

    if let Some(path) = &request.output_path {
        report.write(&result, path)?;
        info!(path = %path.display(), "report written");
    }
    Ok(result)
}

/// Backtests every symbol that can be fetched; the rest are skipped with a
/// warning.
pub fn run_compare_pipeline(
    fetcher: &DataFetcher,
    strategy: &dyn Strategy,
    bt_config: &BacktestConfig,
    symbols: &[String],
    period: &Period,
) -> Result<Vec<BacktestResult>, StonksError> {
    let series_by_symbol = fetcher.get_multiple(symbols, period);

    let mut results = Vec::with_capacity(series_by_symbol.len());
    for (symbol, series) in &series_by_symbol {
        match strategy.backtest(series, bt_config) {
            Ok(result) => results.push(result),
            Err(e) => warn!(symbol = %symbol, error = %e, "skipping symbol"),
        }
    }

    if results.is_empty() {
        return Err(StonksError::DataUnavailable {
            symbol: symbols.join(","),
            reason: "no symbol could be backtested".into(),
        });
    }
    Ok(results)
}

struct Session {
    config: FileConfigAdapter,
    provider: Box<dyn DataPort>,
    cache: FileCacheAdapter,
    settings: FetcherSettings,
}

impl Session {
    fn open(config_path: Option<&Path>) -> Result<Self, StonksError> {
        let config = load_config(config_path)?;
        validate_config(&config)?;
        let provider = build_provider(&config)?;
        let cache = build_cache(&config)?;
        let settings = build_fetcher_settings(&config);
        Ok(Self {
            config,
            provider,
            cache,
            settings,
        })
    }

    fn fetcher(&self) -> DataFetcher<'_> {
        DataFetcher::new(self.provider.as_ref(), &self.cache, self.settings.clone())
    }
}

fn run_backtest(
    symbol: &str,
    args: &StrategyArgs,
    refresh: bool,
    output: Option<PathBuf>,
) -> Result<(), StonksError> {
    let session = Session::open(args.config.as_deref())?;
    let params = build_strategy_params(&session.config, args.short, args.long)?;
    let strategy = build_strategy(&session.config, params);
    let bt_config = build_backtest_config(&session.config);
    let request = BacktestRequest {
        symbol: symbol.to_string(),
        period: resolve_period(args.period.as_deref(), &session.config)?,
        force_refresh: refresh,
        output_path: output,
    };

    let fetcher = session.fetcher();
    let result = run_backtest_pipeline(
        &fetcher,
        &strategy,
        &bt_config,
        &request,
        &CsvReportAdapter::new(),
    )?;

    print!("{}", format_summary(&result));
    if let Some(path) = &request.output_path {
        println!("Report written to: {}", path.display());
    }
    Ok(())
}

fn run_compare(symbols: &[String], args: &StrategyArgs) -> Result<(), StonksError> {
    let symbols = resolve_symbols(symbols);
    if symbols.is_empty() {
        return Err(StonksError::InvalidParameters {
            reason: "no symbols given".into(),
        });
    }

    let session = Session::open(args.config.as_deref())?;
    let params = build_strategy_params(&session.config, args.short, args.long)?;
    let strategy = build_strategy(&session.config, params);
    let bt_config = build_backtest_config(&session.config);
    let period = resolve_period(args.period.as_deref(), &session.config)?;

    let fetcher = session.fetcher();
    let results = run_compare_pipeline(&fetcher, &strategy, &bt_config, &symbols, &period)?;

    for result in &results {
        println!("{}", format_summary(result));
    }
    print!("{}", format_comparison(&results));
    Ok(())
}

fn run_fetch(
    symbol: &str,
    period: Option<&str>,
    config_path: Option<&Path>,
    refresh: bool,
) -> Result<(), StonksError> {
    let session = Session::open(config_path)?;
    let period = resolve_period(period, &session.config)?;

    let series = session.fetcher().get_price_series(symbol, &period, refresh)?;
    match (series.bars().first(), series.bars().last()) {
        (Some(first), Some(last)) => println!(
            "{}: {} bars from {} to {} (last close {:.2})",
            series.symbol(),
            series.len(),
            first.date,
            last.date,
            last.close
        ),
        _ => println!("{}: no bars", series.symbol()),
    }
    Ok(())
}

fn run_clear_cache(symbol: Option<&str>, config_path: Option<&Path>) -> Result<(), StonksError> {
    let session = Session::open(config_path)?;
    let removed = session.fetcher().clear_cache(symbol)?;
    println!("Removed {} cached file(s)", removed);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), StonksError> {
    let config = load_config(Some(config_path))?;
    validate_config(&config)?;

    let params = build_strategy_params(&config, None, None)?;
    let bt_config = build_backtest_config(&config);
    let period = resolve_period(None, &config)?;
    let provider = config.get_string_or("data", "provider", PROVIDERS[0]);

    println!("Configuration is valid: {}", config_path.display());
    println!("  provider:        {}", provider);
    println!("  default period:  {}", period);
    println!(
        "  windows:         {}/{}",
        params.short_window(),
        params.long_window()
    );
    println!("  initial capital: {:.2}", bt_config.initial_capital);
    println!("  commission:      {}", bt_config.commission);
    Ok(())
}
