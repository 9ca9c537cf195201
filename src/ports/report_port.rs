//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::StonksError;
use std::path::Path;

/// Port for writing backtest results for downstream consumers.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), StonksError>;
}
