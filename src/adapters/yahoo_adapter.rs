//! Yahoo Finance chart API adapter.
//!
//! Daily bars from `{base_url}/v8/finance/chart/{symbol}`. No API key is
//! required.

use crate::domain::error::StonksError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::period::Period;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Days, NaiveTime};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn unavailable(symbol: &str, reason: impl Into<String>) -> StonksError {
    StonksError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

/// Decodes a chart API body into daily bars.
///
/// Rows with any missing field are dropped, prices are rounded to cents, and
/// a repeated date keeps the later row.
pub fn parse_chart_response(symbol: &str, body: &str) -> Result<Vec<OhlcvBar>, StonksError> {
    let response: ChartResponse = serde_json::from_str(body).map_err(|e| {
        unavailable(symbol, format!("failed to decode provider response: {}", e))
    })?;

    if let Some(error) = response.chart.error {
        return Err(unavailable(
            symbol,
            format!("{}: {}", error.code, error.description),
        ));
    }

    let data = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| unavailable(symbol, "no data in response"))?;
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| unavailable(symbol, "no quote data"))?;
    let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

    let mut bars: Vec<OhlcvBar> = Vec::with_capacity(data.timestamp.len());
    for (i, &ts) in data.timestamp.iter().enumerate() {
        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();

        let (Some(o), Some(h), Some(l), Some(c), Some(v)) = (open, high, low, close, volume) else {
            continue;
        };
        let Some(date) = DateTime::from_timestamp(ts + offset, 0).map(|dt| dt.date_naive()) else {
            continue;
        };

        let bar = OhlcvBar {
            date,
            open: round2(o),
            high: round2(h),
            low: round2(l),
            close: round2(c),
            volume: v,
        };
        match bars.last_mut() {
            Some(last) if last.date == date => *last = bar,
            _ => bars.push(bar),
        }
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

pub struct YahooAdapter {
    base_url: String,
    client: Client,
}

impl YahooAdapter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StonksError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(timeout)
            .build()
            .map_err(|e| StonksError::ProviderUnreachable {
                symbol: String::new(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn query_params(period: &Period) -> Vec<(&'static str, String)> {
        let mut params = vec![("interval", "1d".to_string())];
        match period {
            Period::Named(p) => params.push(("range", p.as_str().to_string())),
            Period::Range { start, end } => {
                let from = start.and_time(NaiveTime::MIN).and_utc().timestamp();
                // period2 is exclusive
                let to = end
                    .checked_add_days(Days::new(1))
                    .unwrap_or(*end)
                    .and_time(NaiveTime::MIN)
                    .and_utc()
                    .timestamp();
                params.push(("period1", from.to_string()));
                params.push(("period2", to.to_string()));
            }
        }
        params
    }
}

impl DataPort for YahooAdapter {
    fn fetch_history(&self, symbol: &str, period: &Period) -> Result<Vec<OhlcvBar>, StonksError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        debug!(url = %url, period = %period, "requesting chart");

        let response = self
            .client
            .get(&url)
            .query(&Self::query_params(period))
            .send()
            .map_err(|e| StonksError::ProviderUnreachable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StonksError::ProviderUnreachable {
                symbol: symbol.to_string(),
                reason: format!("provider returned {}", status),
            });
        }

        let body = response.text().map_err(|e| StonksError::ProviderUnreachable {
            symbol: symbol.to_string(),
            reason: format!("failed to read response: {}", e),
        })?;

        if !status.is_success() {
            // Unknown tickers come back as 404 with a chart error object.
            return match parse_chart_response(symbol, &body) {
                Err(e) => Err(e),
                Ok(_) => Err(unavailable(symbol, format!("provider returned {}", status))),
            };
        }

        let bars = parse_chart_response(symbol, &body)?;
        info!(symbol, rows = bars.len(), "fetched chart data");
        Ok(bars)
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}
