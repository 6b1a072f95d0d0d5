use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::{parse_interval_ms, SourceConfig};
use crate::error::FetchError;
use crate::model::Candle;

use super::SourceAdapter;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Binance spot market-data adapter. Only public endpoints are used, so the
/// client carries no credentials.
pub struct BinanceSource {
    http: reqwest::Client,
    base_url: String,
    name: String,
}

/// Binance API error body, e.g. {"code":-1121,"msg":"Invalid symbol."}.
#[derive(Debug, Deserialize)]
struct BinanceApiError {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeSymbol {
    status: String,
    base_asset: String,
    quote_asset: String,
}

impl BinanceSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build Binance HTTP client")?;
        Ok(Self {
            http,
            base_url: cfg.rest_base_url.trim_end_matches('/').to_string(),
            name: cfg.name.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_failure(status, &body));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SourceAdapter for BinanceSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_instruments(&self) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let info: ExchangeInfo = self.get_json(&url, &[]).await?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| format!("{}/{}", s.base_asset, s.quote_asset))
            .collect())
    }

    async fn fetch_ohlcv(
        &self,
        instrument: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        let interval_ms = parse_interval_ms(interval)
            .map_err(|e| FetchError::Unsupported(e.to_string()))?;
        let symbol = native_symbol(instrument);
        let limit = limit.clamp(1, 1_000).to_string();

        let url = format!("{}/api/v3/klines", self.base_url);
        let rows: Vec<Vec<Value>> = self
            .get_json(
                &url,
                &[
                    ("symbol", symbol.as_str()),
                    ("interval", interval),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;

        rows.iter().map(|r| kline_to_candle(r, interval_ms)).collect()
    }
}

/// "BTC/USDT" -> "BTCUSDT".
fn native_symbol(instrument: &str) -> String {
    instrument.replace('/', "").trim().to_ascii_uppercase()
}

/// One kline row: [open_time, open, high, low, close, base_volume,
/// close_time, quote_volume, trades, ...]. Prices arrive string-encoded.
/// Base volume (index 5) is discarded in favor of quote volume (index 7);
/// rows that carry only the base volume fall back to it.
fn kline_to_candle(row: &[Value], interval_ms: u64) -> Result<Candle, FetchError> {
    let open_time = row
        .first()
        .and_then(Value::as_u64)
        .ok_or_else(|| FetchError::Source("kline row missing open time".to_string()))?;
    Ok(Candle {
        close_time_ms: open_time.saturating_add(interval_ms),
        open: field_f64(row, 1)?,
        high: field_f64(row, 2)?,
        low: field_f64(row, 3)?,
        close: field_f64(row, 4)?,
        volume: field_f64(row, 7).or_else(|_| field_f64(row, 5))?,
    })
}

fn field_f64(row: &[Value], idx: usize) -> Result<f64, FetchError> {
    let value = row
        .get(idx)
        .ok_or_else(|| FetchError::Source(format!("kline row missing field {}", idx)))?;
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| FetchError::Source(format!("kline field {} is not numeric: {}", idx, s))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FetchError::Source(format!("kline field {} is not numeric", idx))),
        _ => Err(FetchError::Source(format!(
            "kline field {} has unexpected type",
            idx
        ))),
    }
}

fn classify_api_failure(status: reqwest::StatusCode, body: &str) -> FetchError {
    let api: Option<BinanceApiError> = serde_json::from_str(body).ok();
    let code = api.as_ref().map(|e| e.code);
    let detail = match &api {
        Some(e) => format!("code {}: {}", e.code, e.msg),
        None => super::compact_error_body(body),
    };
    match status.as_u16() {
        401 | 403 => FetchError::Authentication(detail),
        418 | 429 => FetchError::RateLimited(detail),
        500 | 502 | 503 | 504 => FetchError::Unavailable(detail),
        // -1121 unknown symbol, -1120 unsupported interval
        _ if matches!(code, Some(-1121) | Some(-1120)) => FetchError::Unsupported(detail),
        _ => FetchError::Source(detail),
    }
}
