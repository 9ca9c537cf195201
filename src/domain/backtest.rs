//! Backtest engine: applies a signal series to its price series and tallies
//! strategy versus buy-and-hold performance.

use crate::domain::error::StonksError;
use crate::domain::metrics::{Metrics, Trade};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::{Position, SignalSeries};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;
pub const DEFAULT_COMMISSION: f64 = 0.001;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fraction of equity charged whenever the held position changes.
    pub commission: f64,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            commission: DEFAULT_COMMISSION,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub strategy_value: f64,
    pub buy_hold_value: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub symbol: String,
    pub signals: SignalSeries,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub metrics: Metrics,
}

impl BacktestResult {
    pub fn metrics_map(&self) -> BTreeMap<&'static str, f64> {
        self.metrics.to_map()
    }
}

/// `eval_start` is the first index whose position is backed by valid
/// indicators; earlier observations contribute no strategy returns.
pub fn run_backtest(
    strategy_name: &str,
    series: &PriceSeries,
    signals: &SignalSeries,
    eval_start: usize,
    config: &BacktestConfig,
) -> Result<BacktestResult, StonksError> {
    if signals.len() != series.len() {
        return Err(StonksError::MalformedData {
            reason: format!(
                "signal series has {} points, price series has {}",
                signals.len(),
                series.len()
            ),
        });
    }
    if series.is_empty() || eval_start >= series.len() {
        return Err(StonksError::InsufficientData {
            symbol: series.symbol().to_string(),
            bars: series.len(),
            minimum: eval_start + 1,
        });
    }

    let bars = series.bars();
    let points = signals.points();
    let first_close = bars[0].close;
    let last_close = bars[bars.len() - 1].close;

    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut daily_returns = Vec::with_capacity(bars.len() - eval_start);
    let mut equity_values = Vec::with_capacity(bars.len() - eval_start);
    let mut trades = Vec::new();

    let mut equity = config.initial_capital;
    let mut held = Position::Flat;
    let mut open_trade: Option<(usize, f64)> = None;

    for (i, bar) in bars.iter().enumerate() {
        if i > eval_start {
            let prev = &bars[i - 1];
            let market_return = bar.return_from(prev.close);
            let lagged = points[i - 1].position;

            let mut net = match lagged {
                Position::Long => market_return,
                Position::Flat => 0.0,
            };
            if lagged != held {
                net -= config.commission;
            }

            match (held, lagged) {
                (Position::Flat, Position::Long) => open_trade = Some((i - 1, 1.0)),
                (Position::Long, Position::Flat) => {
                    if let Some((entry, growth)) = open_trade.take() {
                        trades.push(close_trade(bars, entry, i - 1, growth * (1.0 + net), false));
                    }
                }
                _ => {}
            }
            if lagged == Position::Long {
                if let Some((_, growth)) = open_trade.as_mut() {
                    *growth *= 1.0 + net;
                }
            }

            held = lagged;
            equity *= 1.0 + net;
            daily_returns.push(net);
        }

        if i >= eval_start {
            equity_values.push(equity);
        }

        equity_curve.push(EquityPoint {
            date: bar.date,
            strategy_value: equity,
            buy_hold_value: config.initial_capital * bar.close / first_close,
        });
    }

    if let Some((entry, growth)) = open_trade {
        trades.push(close_trade(bars, entry, bars.len() - 1, growth, true));
    }

    let buy_hold_return = last_close / first_close - 1.0;
    let metrics = Metrics::compute(
        &daily_returns,
        &equity_values,
        &trades,
        buy_hold_return,
        config.risk_free_rate,
    );

    Ok(BacktestResult {
        strategy_name: strategy_name.to_string(),
        symbol: series.symbol().to_string(),
        signals: signals.clone(),
        equity_curve,
        trades,
        metrics,
    })
}

fn close_trade(
    bars: &[OhlcvBar],
    entry: usize,
    exit: usize,
    growth: f64,
    open: bool,
) -> Trade {
    Trade {
        entry_date: bars[entry].date,
        exit_date: bars[exit].date,
        entry_price: bars[entry].close,
        exit_price: bars[exit].close,
        return_pct: growth - 1.0,
        open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::sma::calculate_sma;
    use approx::assert_relative_eq;

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 10,
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    fn run(prices: &[f64], short: usize, long: usize, commission: f64) -> BacktestResult {
        let s = series(prices);
        let signals = SignalSeries::from_moving_averages(
            &s,
            &calculate_sma(s.bars(), short),
            &calculate_sma(s.bars(), long),
        );
        let config = BacktestConfig {
            commission,
            ..BacktestConfig::default()
        };
        run_backtest("test", &s, &signals, long - 1, &config).unwrap()
    }

    #[test]
    fn config_defaults() {
        let c = BacktestConfig::default();
        assert_relative_eq!(c.initial_capital, 10_000.0);
        assert_relative_eq!(c.commission, 0.001);
        assert_relative_eq!(c.risk_free_rate, 0.02);
    }

    #[test]
    fn constant_prices_return_nothing() {
        let result = run(&[100.0; 12], 2, 4, 0.001);
        assert_eq!(result.metrics.total_return, 0.0);
        assert_eq!(result.metrics.buy_hold_return, 0.0);
        assert!(result.trades.is_empty());
        assert!(result
            .equity_curve
            .iter()
            .all(|p| p.strategy_value == 10_000.0));
    }

    #[test]
    fn rising_prices_are_captured_after_entry() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let result = run(&prices, 2, 4, 0.0);

        // Long from index 3 onward; held (lagged) from index 4.
        let expected = prices[9] / prices[3] - 1.0;
        assert_relative_eq!(result.metrics.total_return, expected, epsilon = 1e-12);
        assert_eq!(result.trades.len(), 1);
        assert!(result.trades[0].open);
        assert_relative_eq!(result.trades[0].return_pct, expected, epsilon = 1e-12);
    }

    #[test]
    fn commission_charged_on_entry() {
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let free = run(&prices, 2, 4, 0.0);
        let costly = run(&prices, 2, 4, 0.01);
        assert!(costly.metrics.total_return < free.metrics.total_return);
    }

    #[test]
    fn round_trip_is_closed() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0, 4.0, 2.0, 1.0, 1.0];
        let result = run(&prices, 2, 4, 0.0);
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert!(!trade.open);
        assert_eq!(trade.entry_date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(trade.exit_date, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        // Held for days 5, 6, 7: 4 → 5 → 4 → 2
        assert_relative_eq!(trade.return_pct, 2.0 / 4.0 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.metrics.total_return, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn buy_hold_uses_whole_series() {
        let prices = [50.0, 40.0, 60.0, 80.0, 75.0];
        let result = run(&prices, 2, 3, 0.0);
        assert_eq!(result.metrics.buy_hold_return, 75.0 / 50.0 - 1.0);
        let last = result.equity_curve.last().unwrap();
        assert_relative_eq!(last.buy_hold_value, 10_000.0 * 1.5, epsilon = 1e-9);
    }

    #[test]
    fn equity_curve_aligned_with_series() {
        let prices: Vec<f64> = (0..15).map(|i| 10.0 + (i % 4) as f64).collect();
        let result = run(&prices, 2, 5, 0.001);
        assert_eq!(result.equity_curve.len(), prices.len());
        assert_eq!(result.signals.len(), prices.len());
    }

    #[test]
    fn rejects_mismatched_signal_length() {
        let long = series(&[1.0, 2.0, 3.0]);
        let short = series(&[1.0, 2.0]);
        let signals = SignalSeries::from_moving_averages(
            &short,
            &calculate_sma(short.bars(), 1),
            &calculate_sma(short.bars(), 2),
        );
        let err = run_backtest("t", &long, &signals, 1, &BacktestConfig::default()).unwrap_err();
        assert!(matches!(err, StonksError::MalformedData { .. }));
    }
}
