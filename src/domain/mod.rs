//! Core domain types and logic.

pub mod ohlcv;
pub mod period;
pub mod price_series;
pub mod indicator;
pub mod signal;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod data_fetcher;
pub mod config_validation;
pub mod error;
