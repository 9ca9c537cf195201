//! Trading strategies.
//!
//! A [`Strategy`] turns a price series into a [`SignalSeries`]; the provided
//! [`Strategy::backtest`] runs that signal series through the backtest
//! engine.

use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult};
use crate::domain::error::StonksError;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::price_series::PriceSeries;
use crate::domain::signal::SignalSeries;
use tracing::{debug, info};

pub const DEFAULT_SHORT_WINDOW: usize = 50;
pub const DEFAULT_LONG_WINDOW: usize = 200;
pub const MIN_SHORT_WINDOW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyParams {
    short_window: usize,
    long_window: usize,
}

impl StrategyParams {
    pub fn new(short_window: usize, long_window: usize) -> Result<Self, StonksError> {
        if short_window >= long_window {
            return Err(StonksError::InvalidParameters {
                reason: format!(
                    "short window ({}) must be less than long window ({})",
                    short_window, long_window
                ),
            });
        }
        if short_window < MIN_SHORT_WINDOW {
            return Err(StonksError::InvalidParameters {
                reason: format!("short window must be at least {}", MIN_SHORT_WINDOW),
            });
        }
        Ok(Self {
            short_window,
            long_window,
        })
    }

    pub fn short_window(&self) -> usize {
        self.short_window
    }

    pub fn long_window(&self) -> usize {
        self.long_window
    }
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window: DEFAULT_LONG_WINDOW,
        }
    }
}

pub trait Strategy {
    fn name(&self) -> &str;

    /// Bars needed before the strategy has a valid position.
    fn min_bars(&self) -> usize;

    /// Index of the first bar whose position comes from valid indicators.
    /// Strategy returns are counted from the bar after it.
    fn eval_start(&self) -> usize {
        self.min_bars().saturating_sub(1)
    }

    fn generate_signals(&self, series: &PriceSeries) -> Result<SignalSeries, StonksError>;

    fn backtest(
        &self,
        series: &PriceSeries,
        config: &BacktestConfig,
    ) -> Result<BacktestResult, StonksError> {
        info!(
            strategy = self.name(),
            symbol = series.symbol(),
            capital = config.initial_capital,
            "running backtest"
        );
        let signals = self.generate_signals(series)?;
        let result = run_backtest(self.name(), series, &signals, self.eval_start(), config)?;
        info!(
            strategy = self.name(),
            total_return = result.metrics.total_return,
            "backtest complete"
        );
        Ok(result)
    }
}

/// Long while the short simple moving average is above the long one.
#[derive(Debug, Clone)]
pub struct MovingAverageCrossover {
    name: String,
    params: StrategyParams,
}

impl MovingAverageCrossover {
    pub fn new(params: StrategyParams) -> Self {
        let name = format!(
            "MA Crossover ({}/{})",
            params.short_window(),
            params.long_window()
        );
        Self { name, params }
    }

    pub fn from_windows(short_window: usize, long_window: usize) -> Result<Self, StonksError> {
        Ok(Self::new(StrategyParams::new(short_window, long_window)?))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn params(&self) -> StrategyParams {
        self.params
    }
}

impl Default for MovingAverageCrossover {
    fn default() -> Self {
        Self::new(StrategyParams::default())
    }
}

impl Strategy for MovingAverageCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_bars(&self) -> usize {
        self.params.long_window()
    }

    // The long SMA is the last indicator to warm up.
    fn eval_start(&self) -> usize {
        self.params.long_window() - 1
    }

    fn generate_signals(&self, series: &PriceSeries) -> Result<SignalSeries, StonksError> {
        if series.len() < self.params.long_window() {
            return Err(StonksError::InsufficientData {
                symbol: series.symbol().to_string(),
                bars: series.len(),
                minimum: self.params.long_window(),
            });
        }

        let short = calculate_sma(series.bars(), self.params.short_window());
        let long = calculate_sma(series.bars(), self.params.long_window());
        let signals = SignalSeries::from_moving_averages(series, &short, &long);

        debug!(
            symbol = series.symbol(),
            buys = signals.buy_count(),
            sells = signals.sell_count(),
            "generated crossover signals"
        );
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::DEFAULT_COMMISSION;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::signal::Position;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000,
            })
            .collect();
        PriceSeries::new("SPY", bars).unwrap()
    }

    #[test]
    fn params_reject_equal_windows() {
        let err = StrategyParams::new(20, 20).unwrap_err();
        assert!(matches!(err, StonksError::InvalidParameters { .. }));
    }

    #[test]
    fn params_reject_inverted_windows() {
        assert!(StrategyParams::new(50, 20).is_err());
    }

    #[test]
    fn params_reject_tiny_short_window() {
        assert!(StrategyParams::new(1, 20).is_err());
        assert!(StrategyParams::new(0, 20).is_err());
    }

    #[test]
    fn params_defaults() {
        let p = StrategyParams::default();
        assert_eq!(p.short_window(), 50);
        assert_eq!(p.long_window(), 200);
    }

    #[test]
    fn default_name_includes_windows() {
        let s = MovingAverageCrossover::from_windows(5, 20).unwrap();
        assert_eq!(s.name(), "MA Crossover (5/20)");
        assert_eq!(s.with_name("Golden Cross").name(), "Golden Cross");
    }

    #[test]
    fn evaluation_starts_when_long_average_is_valid() {
        let s = MovingAverageCrossover::from_windows(3, 10).unwrap();
        assert_eq!(s.eval_start(), 9);
        let signals = s.generate_signals(&series(&[5.0; 12])).unwrap();
        assert!(signals.points()[s.eval_start()].short_ma.is_some());
        assert!(signals.points()[s.eval_start()].long_ma.is_some());
        assert!(signals.points()[s.eval_start() - 1].long_ma.is_none());
    }

    #[test]
    fn insufficient_data_is_rejected() {
        let s = MovingAverageCrossover::from_windows(2, 10).unwrap();
        let err = s.generate_signals(&series(&[1.0; 9])).unwrap_err();
        assert!(matches!(
            err,
            StonksError::InsufficientData { bars: 9, minimum: 10, .. }
        ));
        assert!(s.backtest(&series(&[1.0; 9]), &BacktestConfig::default()).is_err());
    }

    #[test]
    fn exactly_long_window_bars_is_enough() {
        let s = MovingAverageCrossover::from_windows(2, 5).unwrap();
        let result = s
            .backtest(&series(&[10.0, 11.0, 12.0, 13.0, 14.0]), &BacktestConfig::default())
            .unwrap();
        assert_eq!(result.metrics.total_return, 0.0);
        assert_relative_eq!(result.metrics.buy_hold_return, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn constant_series_has_zero_returns() {
        let s = MovingAverageCrossover::from_windows(3, 8).unwrap();
        let result = s
            .backtest(&series(&[100.0; 40]), &BacktestConfig::default())
            .unwrap();
        assert_eq!(result.metrics.total_return, 0.0);
        assert_eq!(result.metrics.buy_hold_return, 0.0);
    }

    #[test]
    fn entry_fee_can_outweigh_a_shallow_uptrend() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + 0.001 * i as f64).collect();
        let s = MovingAverageCrossover::from_windows(3, 10).unwrap();
        let result = s.backtest(&series(&prices), &BacktestConfig::default()).unwrap();
        assert!(result.metrics.buy_hold_return > 0.0);
        assert!(result.metrics.total_return < 0.0);
        assert!(result.metrics.total_return >= -DEFAULT_COMMISSION);
    }

    fn rising(start: f64, steps: &[f64]) -> Vec<f64> {
        steps
            .iter()
            .scan(start, |price, step| {
                *price += step;
                Some(*price)
            })
            .collect()
    }

    proptest! {
        #[test]
        fn increasing_series_never_loses_without_commission(
            start in 1.0f64..200.0,
            steps in prop::collection::vec(0.001f64..5.0, 12..120),
            short in 2usize..5,
            extra in 1usize..8,
        ) {
            let prices = rising(start, &steps);
            let s = MovingAverageCrossover::from_windows(short, short + extra).unwrap();
            let config = BacktestConfig {
                commission: 0.0,
                ..BacktestConfig::default()
            };
            let result = s.backtest(&series(&prices), &config).unwrap();
            prop_assert!(result.metrics.total_return >= 0.0);
            prop_assert!(result.metrics.buy_hold_return > 0.0);
        }

        #[test]
        fn increasing_series_loses_at_most_one_fee(
            start in 1.0f64..200.0,
            steps in prop::collection::vec(0.001f64..5.0, 12..120),
            commission in 0.0f64..0.05,
        ) {
            let prices = rising(start, &steps);
            let s = MovingAverageCrossover::from_windows(2, 6).unwrap();
            let config = BacktestConfig {
                commission,
                ..BacktestConfig::default()
            };
            let result = s.backtest(&series(&prices), &config).unwrap();
            prop_assert!(result.trades.len() <= 1);
            prop_assert!(result.metrics.total_return >= -commission - 1e-12);
        }

        #[test]
        fn signal_series_aligned_with_prices(
            prices in prop::collection::vec(1.0f64..500.0, 20..120),
            short in 2usize..6,
            extra in 1usize..10,
        ) {
            let long = short + extra;
            let s = MovingAverageCrossover::from_windows(short, long).unwrap();
            let series = series(&prices);
            let signals = s.generate_signals(&series).unwrap();

            prop_assert_eq!(signals.len(), series.len());
            for (i, position) in signals.positions().enumerate() {
                prop_assert!(matches!(position, Position::Long | Position::Flat));
                if i + 1 < long {
                    prop_assert_eq!(position, Position::Flat);
                }
            }
        }

        #[test]
        fn buy_hold_is_last_over_first(
            prices in prop::collection::vec(1.0f64..500.0, 20..80),
        ) {
            let s = MovingAverageCrossover::from_windows(2, 5).unwrap();
            let series = series(&prices);
            let result = s.backtest(&series, &BacktestConfig::default()).unwrap();
            let expected = prices[prices.len() - 1] / prices[0] - 1.0;
            prop_assert_eq!(result.metrics.buy_hold_return, expected);
        }
    }
}
