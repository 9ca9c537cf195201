#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::Cell;
use std::collections::HashMap;
use stonks::domain::error::StonksError;
pub use stonks::domain::ohlcv::OhlcvBar;
use stonks::domain::period::Period;
use stonks::domain::price_series::PriceSeries;
use stonks::ports::data_port::DataPort;

/// In-memory provider that counts how often it is asked for data.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_unreachable(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl DataPort for MockDataPort {
    fn fetch_history(&self, symbol: &str, _period: &Period) -> Result<Vec<OhlcvBar>, StonksError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(StonksError::ProviderUnreachable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) => Ok(bars.clone()),
            None => Err(StonksError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "unknown symbol".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date_str: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap(),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 10_000,
    }
}

/// One bar per calendar day starting at `start`, closes taken from `closes`.
pub fn bars_from_closes(start: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 10_000 + i as i64,
        })
        .collect()
}

/// Rises for `count / 2` bars, then falls back, giving exactly one crossover
/// each way for short windows.
pub fn rise_and_fall(count: usize, base: f64) -> Vec<f64> {
    let half = count / 2;
    (0..count)
        .map(|i| {
            let step = if i < half { i } else { 2 * half - i };
            base + step as f64
        })
        .collect()
}

pub fn linear_closes(count: usize, start: f64, step: f64) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

pub fn make_series(symbol: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::new(symbol, bars_from_closes("2023-01-02", closes)).unwrap()
}
