//! On-disk price series cache.
//!
//! One CSV file per (symbol, period) at `{dir}/{SYMBOL}_{period_key}.csv`;
//! the file's modification time is the entry's storage time.

use crate::adapters::csv_adapter::{parse_ohlcv_csv, write_ohlcv_csv};
use crate::domain::error::StonksError;
use crate::domain::period::Period;
use crate::domain::price_series::{normalize_symbol, validate_symbol, PriceSeries};
use crate::ports::cache_port::{CachePort, CachedSeries};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const CACHE_EXTENSION: &str = "csv";

pub struct FileCacheAdapter {
    dir: PathBuf,
}

impl FileCacheAdapter {
    /// Creates the cache directory if needed.
    pub fn new(dir: PathBuf) -> Result<Self, StonksError> {
        fs::create_dir_all(&dir).map_err(|e| StonksError::Cache {
            reason: format!("failed to create {}: {}", dir.display(), e),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes to a temporary file in the cache directory and renames it over
    /// `path`. A failed write leaves the previous entry in place.
    fn replace_entry<F>(&self, path: &Path, write: F) -> Result<(), StonksError>
    where
        F: FnOnce(&mut fs::File) -> Result<(), csv::Error>,
    {
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StonksError::Cache {
            reason: format!("failed to create temp file in {}: {}", self.dir.display(), e),
        })?;
        write(tmp.as_file_mut()).map_err(|e| StonksError::Cache {
            reason: format!("failed to write {}: {}", path.display(), e),
        })?;
        tmp.persist(path).map_err(|e| StonksError::Cache {
            reason: format!("failed to replace {}: {}", path.display(), e.error),
        })?;
        Ok(())
    }

    fn entry_path(&self, symbol: &str, period: &Period) -> Result<PathBuf, StonksError> {
        let symbol = validate_symbol(symbol)?;
        Ok(self.dir.join(format!(
            "{}_{}.{}",
            symbol,
            period.cache_key(),
            CACHE_EXTENSION
        )))
    }
}

impl CachePort for FileCacheAdapter {
    fn load(&self, symbol: &str, period: &Period) -> Result<Option<CachedSeries>, StonksError> {
        let path = self.entry_path(symbol, period)?;
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StonksError::Cache {
                    reason: format!("failed to open {}: {}", path.display(), e),
                });
            }
        };

        let stored_at = file
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| StonksError::Cache {
                reason: format!("failed to stat {}: {}", path.display(), e),
            })?;

        let bars = parse_ohlcv_csv(file).map_err(|e| StonksError::Cache {
            reason: format!("corrupt entry {}: {}", path.display(), e),
        })?;
        let series = PriceSeries::new(symbol, bars)?;

        Ok(Some(CachedSeries { series, stored_at }))
    }

    fn store(&self, series: &PriceSeries, period: &Period) -> Result<(), StonksError> {
        let path = self.entry_path(series.symbol(), period)?;
        self.replace_entry(&path, |file| write_ohlcv_csv(file, series.bars()))?;
        debug!(path = %path.display(), "cached data");
        Ok(())
    }

    fn clear(&self, symbol: Option<&str>) -> Result<usize, StonksError> {
        let prefix = symbol.map(|s| format!("{}_", normalize_symbol(s)));
        let mut removed = 0;

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CACHE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if prefix.as_deref().is_none_or(|p| name.starts_with(p)) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::NaiveDate;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn sample_series(symbol: &str) -> PriceSeries {
        let bars = (0..3)
            .map(|i| OhlcvBar {
                date: NaiveDate::from_ymd_opt(2024, 4, 1 + i).unwrap(),
                open: 10.0 + i as f64,
                high: 11.0 + i as f64,
                low: 9.0 + i as f64,
                close: 10.5 + i as f64,
                volume: 1_000 * (i as i64 + 1),
            })
            .collect();
        PriceSeries::new(symbol, bars).unwrap()
    }

    #[test]
    fn new_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("data").join("cache");
        let cache = FileCacheAdapter::new(nested.clone()).unwrap();
        assert!(nested.is_dir());
        assert_eq!(cache.dir(), nested.as_path());
    }

    #[test]
    fn load_missing_entry_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path().to_path_buf()).unwrap();
        assert!(cache.load("AAPL", &Period::default()).unwrap().is_none());
    }

    #[test]
    fn store_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path().to_path_buf()).unwrap();
        let series = sample_series("AAPL");
        let period = Period::parse("6mo").unwrap();

        cache.store(&series, &period).unwrap();
        assert!(dir.path().join("AAPL_6mo.csv").is_file());

        let entry = cache.load("aapl", &period).unwrap().unwrap();
        assert_eq!(entry.series, series);
        let age = SystemTime::now()
            .duration_since(entry.stored_at)
            .unwrap_or(Duration::ZERO);
        assert!(age < Duration::from_secs(60));
    }

    #[test]
    fn periods_are_separate_entries() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path().to_path_buf()).unwrap();
        cache
            .store(&sample_series("AAPL"), &Period::parse("1y").unwrap())
            .unwrap();
        assert!(cache
            .load("AAPL", &Period::parse("2y").unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_entry_is_cache_error() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("AAPL_2y.csv"), "date,open\nnot-a-date,1\n").unwrap();

        let err = cache.load("AAPL", &Period::default()).unwrap_err();
        assert!(matches!(err, StonksError::Cache { .. }));
    }

    #[test]
    fn store_overwrites_without_leftover_files() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path().to_path_buf()).unwrap();
        let period = Period::default();
        cache.store(&sample_series("AAPL"), &period).unwrap();

        let newer = PriceSeries::new("AAPL", sample_series("AAPL").bars()[..2].to_vec()).unwrap();
        cache.store(&newer, &period).unwrap();

        assert_eq!(cache.load("AAPL", &period).unwrap().unwrap().series, newer);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_write_keeps_previous_entry() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path().to_path_buf()).unwrap();
        let period = Period::default();
        let series = sample_series("AAPL");
        cache.store(&series, &period).unwrap();

        let path = cache.entry_path("AAPL", &period).unwrap();
        let err = cache
            .replace_entry(&path, |file| {
                use std::io::Write;
                file.write_all(b"date,open,high\n2024-")?;
                Err(csv::Error::from(std::io::Error::other("disk full")))
            })
            .unwrap_err();

        assert!(matches!(err, StonksError::Cache { .. }));
        assert_eq!(cache.load("AAPL", &period).unwrap().unwrap().series, series);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn path_like_symbols_are_rejected() {
        let root = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(root.path().join("cache")).unwrap();
        let period = Period::default();

        assert!(cache.load("../AAPL", &period).is_err());
        assert!(cache.entry_path("..\\AAPL", &period).is_err());
        assert!(cache.entry_path("a/b", &period).is_err());
        assert!(PriceSeries::new("../AAPL", vec![]).is_err());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn clear_by_symbol_and_all() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path().to_path_buf()).unwrap();
        let period = Period::default();
        cache.store(&sample_series("AAPL"), &period).unwrap();
        cache
            .store(&sample_series("AAPL"), &Period::parse("1y").unwrap())
            .unwrap();
        cache.store(&sample_series("AA"), &period).unwrap();
        fs::write(dir.path().join("README"), "keep me").unwrap();

        assert_eq!(cache.clear(Some("aapl")).unwrap(), 2);
        assert!(cache.load("AA", &period).unwrap().is_some());
        assert_eq!(cache.clear(None).unwrap(), 1);
        assert!(dir.path().join("README").exists());
    }
}
