//! CSV file data adapter.
//!
//! Serves daily bars from `{base_path}/{SYMBOL}.csv` files for offline use,
//! and owns the OHLCV CSV layout shared with the file cache.

use crate::domain::error::StonksError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::period::Period;
use crate::domain::price_series::{normalize_symbol, validate_symbol};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

pub const OHLCV_HEADER: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

fn field<'r>(record: &'r csv::StringRecord, index: usize) -> Result<&'r str, StonksError> {
    record.get(index).ok_or_else(|| StonksError::MalformedData {
        reason: format!("missing {} column", OHLCV_HEADER[index]),
    })
}

fn parse_price(record: &csv::StringRecord, index: usize) -> Result<f64, StonksError> {
    field(record, index)?
        .trim()
        .parse()
        .map_err(|e| StonksError::MalformedData {
            reason: format!("invalid {} value: {}", OHLCV_HEADER[index], e),
        })
}

/// Reads `date,open,high,low,close,volume` rows with a header line.
pub fn parse_ohlcv_csv<R: Read>(reader: R) -> Result<Vec<OhlcvBar>, StonksError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| StonksError::MalformedData {
            reason: format!("CSV parse error: {}", e),
        })?;

        let date = NaiveDate::parse_from_str(field(&record, 0)?.trim(), "%Y-%m-%d").map_err(
            |e| StonksError::MalformedData {
                reason: format!("invalid date format: {}", e),
            },
        )?;

        let volume: i64 = field(&record, 5)?
            .trim()
            .parse()
            .map_err(|e| StonksError::MalformedData {
                reason: format!("invalid volume value: {}", e),
            })?;

        bars.push(OhlcvBar {
            date,
            open: parse_price(&record, 1)?,
            high: parse_price(&record, 2)?,
            low: parse_price(&record, 3)?,
            close: parse_price(&record, 4)?,
            volume,
        });
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

pub fn write_ohlcv_csv<W: Write>(writer: W, bars: &[OhlcvBar]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(OHLCV_HEADER)?;
    for bar in bars {
        wtr.write_record([
            bar.date.format("%Y-%m-%d").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> Result<PathBuf, StonksError> {
        let symbol = validate_symbol(symbol)?;
        Ok(self.base_path.join(format!("{}.csv", symbol)))
    }
}

impl DataPort for CsvAdapter {
    /// Named periods are anchored at the last date in the file, so a
    /// snapshot behaves the same whenever it is read.
    fn fetch_history(&self, symbol: &str, period: &Period) -> Result<Vec<OhlcvBar>, StonksError> {
        let path = self.csv_path(symbol)?;
        let file = fs::File::open(&path).map_err(|e| StonksError::DataUnavailable {
            symbol: normalize_symbol(symbol),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let bars = parse_ohlcv_csv(file)?;
        let Some(anchor) = bars.last().map(|b| b.date) else {
            return Ok(bars);
        };

        Ok(bars
            .into_iter()
            .filter(|b| period.contains(b.date, anchor))
            .collect())
    }

    fn name(&self) -> &str {
        "csv"
    }
}
