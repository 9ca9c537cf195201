//! Performance metrics and statistics.

use std::collections::BTreeMap;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// A completed (or marked-to-market) long round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_date: chrono::NaiveDate,
    pub exit_date: chrono::NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Compounded net return over the holding days, commissions included.
    pub return_pct: f64,
    /// Still held at the last bar.
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub buy_hold_return: f64,
    pub excess_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
}

impl Metrics {
    /// `daily_returns` are the strategy's net returns over the evaluation
    /// window; `equity` is the matching equity curve, starting at capital.
    pub fn compute(
        daily_returns: &[f64],
        equity: &[f64],
        trades: &[Trade],
        buy_hold_return: f64,
        risk_free_rate: f64,
    ) -> Self {
        let total_return = daily_returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;

        let years = daily_returns.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let volatility = sample_stddev(daily_returns) * TRADING_DAYS_PER_YEAR.sqrt();
        let sharpe_ratio = compute_sharpe(daily_returns, volatility, risk_free_rate);
        let max_drawdown = compute_drawdown(equity);

        let trades_won = trades.iter().filter(|t| t.return_pct > 0.0).count();
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            trades_won as f64 / trades.len() as f64
        };

        Metrics {
            total_return,
            buy_hold_return,
            excess_return: total_return - buy_hold_return,
            annualized_return,
            volatility,
            sharpe_ratio,
            max_drawdown,
            win_rate,
            total_trades: trades.len(),
        }
    }

    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("total_return", self.total_return),
            ("buy_hold_return", self.buy_hold_return),
            ("excess_return", self.excess_return),
            ("annualized_return", self.annualized_return),
            ("volatility", self.volatility),
            ("sharpe_ratio", self.sharpe_ratio),
            ("max_drawdown", self.max_drawdown),
            ("win_rate", self.win_rate),
            ("total_trades", self.total_trades as f64),
        ])
    }
}

fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

fn compute_sharpe(daily_returns: &[f64], volatility: f64, risk_free_rate: f64) -> f64 {
    if daily_returns.is_empty() || volatility <= 0.0 {
        return 0.0;
    }
    let mean = daily_returns.iter().sum::<f64>() / daily_returns.len() as f64;
    (mean * TRADING_DAYS_PER_YEAR - risk_free_rate) / volatility
}

/// Largest peak-to-trough decline as a positive fraction of the peak.
fn compute_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &value in equity {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
