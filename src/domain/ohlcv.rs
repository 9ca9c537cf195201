//! Daily OHLCV bar.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// Close-to-close simple return against the previous session.
    pub fn return_from(&self, prev_close: f64) -> f64 {
        self.close / prev_close - 1.0
    }

    /// Finite and strictly positive; anything else cannot anchor a return.
    pub fn has_valid_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}
