//! Price series cache port trait.

use crate::domain::error::StonksError;
use crate::domain::period::Period;
use crate::domain::price_series::PriceSeries;
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct CachedSeries {
    pub series: PriceSeries,
    pub stored_at: SystemTime,
}

pub trait CachePort {
    /// `Ok(None)` when nothing is stored for (symbol, period).
    fn load(&self, symbol: &str, period: &Period) -> Result<Option<CachedSeries>, StonksError>;

    fn store(&self, series: &PriceSeries, period: &Period) -> Result<(), StonksError>;

    /// Removes entries for one symbol, or everything when `symbol` is `None`.
    /// Returns the number of entries removed.
    fn clear(&self, symbol: Option<&str>) -> Result<usize, StonksError>;
}
