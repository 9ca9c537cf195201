//! Immutable, date-ordered price history for one ticker.

use crate::domain::error::StonksError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<OhlcvBar>,
}

/// Upper-cases and trims a ticker the way every lookup key expects it.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Symbols double as file names in the cache and CSV directories.
fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty() && !symbol.contains(['/', '\\', '\0']) && !symbol.contains("..")
}

/// Normalises `symbol`, rejecting one that is empty or could name a path
/// outside a data directory.
pub fn validate_symbol(symbol: &str) -> Result<String, StonksError> {
    let normalized = normalize_symbol(symbol);
    if is_valid_symbol(&normalized) {
        Ok(normalized)
    } else {
        Err(StonksError::DataUnavailable {
            reason: if normalized.is_empty() {
                "symbol is empty".into()
            } else {
                "symbol contains path characters".into()
            },
            symbol: normalized,
        })
    }
}

impl PriceSeries {
    /// Builds a series, sorting bars by date.
    ///
    /// Rejects an empty or path-like symbol, duplicate dates, and closes that
    /// are not finite and positive.
    pub fn new(symbol: &str, mut bars: Vec<OhlcvBar>) -> Result<Self, StonksError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(StonksError::MalformedData {
                reason: "symbol is empty".into(),
            });
        }
        if !is_valid_symbol(&symbol) {
            return Err(StonksError::MalformedData {
                reason: format!("invalid symbol {:?}", symbol),
            });
        }

        if let Some(bad) = bars.iter().find(|b| !b.has_valid_close()) {
            return Err(StonksError::MalformedData {
                reason: format!("{}: invalid close {} on {}", symbol, bad.close, bad.date),
            });
        }

        bars.sort_by_key(|b| b.date);
        if let Some(pair) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(StonksError::MalformedData {
                reason: format!("{}: duplicate bar for {}", symbol, pair[0].date),
            });
        }

        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}
