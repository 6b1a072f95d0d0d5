use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::{parse_interval_ms, SourceConfig};
use crate::error::FetchError;
use crate::model::Candle;

use super::SourceAdapter;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Alpaca US-equity market-data adapter.
///
/// Alpaca splits its API across a trading plane (asset listing) and a data
/// plane (bars); the adapter holds both base URLs. Credentials ride as
/// default headers; without them every call fails with an Authentication
/// skip, which the engine treats as expected.
pub struct AlpacaSource {
    http: reqwest::Client,
    trading_base_url: String,
    data_base_url: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlpacaAsset {
    symbol: String,
    tradable: bool,
}

impl AlpacaSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if !cfg.api_key.is_empty() {
            headers.insert("APCA-API-KEY-ID", HeaderValue::from_str(&cfg.api_key)?);
            headers.insert(
                "APCA-API-SECRET-KEY",
                HeaderValue::from_str(&cfg.api_secret)?,
            );
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build Alpaca HTTP client")?;
        Ok(Self {
            http,
            trading_base_url: cfg.rest_base_url.trim_end_matches('/').to_string(),
            data_base_url: cfg.data_base_url().trim_end_matches('/').to_string(),
            name: cfg.name.clone(),
        })
    }

    async fn get_value(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SourceAdapter for AlpacaSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_instruments(&self) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/v2/assets", self.trading_base_url);
        let root = self
            .get_value(&url, &[("status", "active"), ("asset_class", "us_equity")])
            .await?;

        let assets: Vec<AlpacaAsset> = serde_json::from_value(root)?;
        Ok(assets
            .into_iter()
            .filter(|a| a.tradable)
            .map(|a| a.symbol)
            .collect())
    }

    async fn fetch_ohlcv(
        &self,
        instrument: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        let timeframe = timeframe_for(interval)?;
        let interval_ms = parse_interval_ms(interval)
            .map_err(|e| FetchError::Unsupported(e.to_string()))?;
        let symbol = instrument.trim().to_ascii_uppercase();
        let limit = limit.clamp(1, 10_000).to_string();

        let url = format!("{}/v2/stocks/bars", self.data_base_url);
        let root = self
            .get_value(
                &url,
                &[
                    ("symbols", symbol.as_str()),
                    ("timeframe", timeframe),
                    ("limit", limit.as_str()),
                    // Request the latest N bars, re-sorted ascending below.
                    ("sort", "desc"),
                    ("feed", "iex"),
                ],
            )
            .await?;

        let bars = root
            .get("bars")
            .and_then(|b| b.get(symbol.as_str()))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut candles = Vec::with_capacity(bars.len());
        for bar in &bars {
            candles.push(bar_to_candle(bar, interval_ms)?);
        }
        candles.sort_by_key(|c| c.close_time_ms);
        Ok(candles)
    }
}

fn timeframe_for(interval: &str) -> Result<&'static str, FetchError> {
    match interval {
        "1m" => Ok("1Min"),
        "1h" => Ok("1Hour"),
        "1d" => Ok("1Day"),
        other => Err(FetchError::Unsupported(format!(
            "alpaca has no timeframe for interval '{}'",
            other
        ))),
    }
}

/// One bar object: {"t": rfc3339 open time, "o","h","l","c","v", ...}.
/// Alpaca reports a single share-volume field; there is no base/quote split
/// to disambiguate.
fn bar_to_candle(bar: &Value, interval_ms: u64) -> Result<Candle, FetchError> {
    let open_time_str = bar
        .get("t")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Source("bar missing open time".to_string()))?;
    let open_time = parse_rfc3339_ms(open_time_str)?;
    let open = bar_f64(bar, "o")?;
    Ok(Candle {
        close_time_ms: open_time.saturating_add(interval_ms),
        open,
        high: bar_f64(bar, "h").unwrap_or(open),
        low: bar_f64(bar, "l").unwrap_or(open),
        close: bar_f64(bar, "c").unwrap_or(open),
        volume: bar_f64(bar, "v").unwrap_or(0.0),
    })
}

fn bar_f64(bar: &Value, field: &str) -> Result<f64, FetchError> {
    bar.get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| FetchError::Source(format!("bar field '{}' is not numeric", field)))
}

fn parse_rfc3339_ms(s: &str) -> Result<u64, FetchError> {
    let dt = DateTime::parse_from_rfc3339(s)
        .map_err(|e| FetchError::Source(format!("invalid timestamp '{}': {}", s, e)))?;
    Ok(dt.timestamp_millis().max(0) as u64)
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> FetchError {
    let detail = super::compact_error_body(body);
    match status.as_u16() {
        401 | 403 => FetchError::Authentication(detail),
        429 => FetchError::RateLimited(detail),
        // Unknown symbol or malformed query parameters for this source.
        404 | 422 => FetchError::Unsupported(detail),
        500 | 502 | 503 | 504 => FetchError::Unavailable(detail),
        _ => FetchError::Source(detail),
    }
}
