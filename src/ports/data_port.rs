//! Market data provider port trait.

use crate::domain::error::StonksError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::period::Period;

pub trait DataPort {
    /// Daily bars for `symbol` over `period`.
    ///
    /// Transient failures (connection refused, timeouts, 5xx) are reported
    /// as `ProviderUnreachable`; an unknown ticker or an empty answer as
    /// `DataUnavailable`.
    fn fetch_history(&self, symbol: &str, period: &Period) -> Result<Vec<OhlcvBar>, StonksError>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}
