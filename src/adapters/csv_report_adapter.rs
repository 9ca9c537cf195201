//! CSV backtest report adapter.
//!
//! One row per trading day with the moving averages, signal, position and
//! both equity curves, ready for charting elsewhere.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::StonksError;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;

pub const REPORT_HEADER: [&str; 8] = [
    "date",
    "close",
    "short_ma",
    "long_ma",
    "signal",
    "position",
    "strategy_value",
    "buy_hold_value",
];

fn report_error(path: &Path, e: impl std::fmt::Display) -> StonksError {
    StonksError::Report {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), StonksError> {
        let points = result.signals.points();
        if points.len() != result.equity_curve.len() {
            return Err(StonksError::Report {
                reason: format!(
                    "signal series has {} points, equity curve has {}",
                    points.len(),
                    result.equity_curve.len()
                ),
            });
        }

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| report_error(output_path, e))?;
        }

        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| report_error(output_path, e))?;
        wtr.write_record(REPORT_HEADER)
            .map_err(|e| report_error(output_path, e))?;

        for (point, equity) in points.iter().zip(&result.equity_curve) {
            wtr.write_record([
                point.date.format("%Y-%m-%d").to_string(),
                format!("{:.2}", point.close),
                optional(point.short_ma),
                optional(point.long_ma),
                point.signal.to_string(),
                point.position.to_string(),
                format!("{:.2}", equity.strategy_value),
                format!("{:.2}", equity.buy_hold_value),
            ])
            .map_err(|e| report_error(output_path, e))?;
        }

        wtr.flush().map_err(|e| report_error(output_path, e))?;
        Ok(())
    }
}
