//! Cached price-history fetching.
//!
//! [`DataFetcher`] sits between callers and a [`DataPort`]: it serves fresh
//! cache entries without touching the provider, retries transient provider
//! failures, persists what it fetched, and falls back to a stale cache entry
//! when the provider cannot deliver.

use crate::domain::error::StonksError;
use crate::domain::period::Period;
use crate::domain::price_series::{normalize_symbol, validate_symbol, PriceSeries};
use crate::ports::cache_port::{CachePort, CachedSeries};
use crate::ports::data_port::DataPort;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

pub const DEFAULT_CACHE_HOURS: u64 = 1;
pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct FetcherSettings {
    /// Entries older than this are stale. Zero disables cache hits.
    pub cache_ttl: Duration,
    /// Extra provider attempts after the first transient failure.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Serve a stale entry when the provider fails.
    pub stale_fallback: bool,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_HOURS * 3600),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            stale_fallback: true,
        }
    }
}

pub struct DataFetcher<'a> {
    provider: &'a dyn DataPort,
    cache: &'a dyn CachePort,
    settings: FetcherSettings,
}

impl<'a> DataFetcher<'a> {
    pub fn new(provider: &'a dyn DataPort, cache: &'a dyn CachePort, settings: FetcherSettings) -> Self {
        info!(
            provider = provider.name(),
            cache_ttl_secs = settings.cache_ttl.as_secs(),
            "data fetcher initialized"
        );
        Self {
            provider,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &FetcherSettings {
        &self.settings
    }

    pub fn get_price_series(
        &self,
        symbol: &str,
        period: &Period,
        force_refresh: bool,
    ) -> Result<PriceSeries, StonksError> {
        let symbol = validate_symbol(symbol)?;

        let cached = self.load_cached(&symbol, period);
        if !force_refresh {
            if let Some(entry) = cached.as_ref().filter(|e| self.is_fresh(e)) {
                info!(symbol = %symbol, period = %period, "loading cached data");
                return Ok(entry.series.clone());
            }
        }

        info!(symbol = %symbol, period = %period, "fetching fresh data");
        match self.fetch_with_retry(&symbol, period) {
            Ok(series) => {
                if let Err(e) = self.cache.store(&series, period) {
                    warn!(symbol = %symbol, error = %e, "failed to cache data");
                }
                Ok(series)
            }
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "failed to fetch data");
                match cached {
                    Some(entry) if self.settings.stale_fallback => {
                        warn!(symbol = %symbol, "returning stale cache");
                        Ok(entry.series)
                    }
                    _ => Err(err),
                }
            }
        }
    }

    /// Fetches every symbol it can; failures are logged and skipped.
    pub fn get_multiple(&self, symbols: &[String], period: &Period) -> BTreeMap<String, PriceSeries> {
        let mut results = BTreeMap::new();
        for symbol in symbols {
            match self.get_price_series(symbol, period, false) {
                Ok(series) => {
                    results.insert(series.symbol().to_string(), series);
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "skipping symbol"),
            }
        }
        results
    }

    pub fn clear_cache(&self, symbol: Option<&str>) -> Result<usize, StonksError> {
        let normalized = symbol.map(normalize_symbol);
        let removed = self.cache.clear(normalized.as_deref())?;
        info!(removed, "cleared cached files");
        Ok(removed)
    }

    fn load_cached(&self, symbol: &str, period: &Period) -> Option<CachedSeries> {
        match self.cache.load(symbol, period) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(symbol, error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    fn is_fresh(&self, entry: &CachedSeries) -> bool {
        if self.settings.cache_ttl.is_zero() {
            return false;
        }
        match SystemTime::now().duration_since(entry.stored_at) {
            Ok(age) => age < self.settings.cache_ttl,
            // Stored "in the future" (clock skew): treat as just written.
            Err(_) => true,
        }
    }

    fn fetch_with_retry(&self, symbol: &str, period: &Period) -> Result<PriceSeries, StonksError> {
        let attempts = self.settings.max_retries.saturating_add(1);
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            match self.provider.fetch_history(symbol, period) {
                Ok(bars) => {
                    if bars.is_empty() {
                        return Err(StonksError::DataUnavailable {
                            symbol: symbol.to_string(),
                            reason: format!("no data found for period {}", period),
                        });
                    }
                    let series = PriceSeries::new(symbol, bars)?;
                    info!(symbol, rows = series.len(), "fetched rows");
                    return Ok(series);
                }
                Err(StonksError::ProviderUnreachable { reason, .. }) => {
                    debug!(symbol, attempt, attempts, reason = %reason, "provider unreachable");
                    last_reason = reason;
                    if attempt < attempts && !self.settings.retry_delay.is_zero() {
                        std::thread::sleep(self.settings.retry_delay);
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Err(StonksError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!(
                "provider unreachable after {} attempt(s): {}",
                attempts, last_reason
            ),
        })
    }
}
