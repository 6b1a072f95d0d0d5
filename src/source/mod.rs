use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::model::Candle;

pub mod alpaca;
pub mod binance;

pub use alpaca::AlpacaSource;
pub use binance::BinanceSource;

/// A market-data backend the ingestion engine can pull closed OHLCV buckets
/// from.
///
/// Implementations own the wire format, the volume-field policy (when a
/// source reports both base and quote volume, the adapter decides which one
/// survives), and the mapping of transport/API failures into the
/// [`FetchError`] taxonomy.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Configured source name; used in series keys and log fields.
    fn name(&self) -> &str;

    /// Every instrument the source currently offers, in the canonical form
    /// the adapter accepts back in `fetch_ohlcv`. Drives the fan-out default
    /// when a source has no explicit instrument whitelist.
    async fn load_instruments(&self) -> Result<Vec<String>, FetchError>;

    /// The most recent closed buckets for one instrument, at most `limit`
    /// of them. Order is not guaranteed; the store filters and SQLite keys
    /// by timestamp.
    async fn fetch_ohlcv(
        &self,
        instrument: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError>;
}

/// An adapter paired with its configured whitelist slice. An empty
/// `instruments` list means "ingest everything the source offers".
pub struct SourceEntry {
    pub adapter: Box<dyn SourceAdapter>,
    pub instruments: Vec<String>,
}

impl std::fmt::Debug for SourceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceEntry")
            .field("adapter", &self.adapter.name())
            .field("instruments", &self.instruments)
            .finish()
    }
}

/// Resolve configured sources to concrete adapters. An unknown source name
/// is a configuration error and fails the run before any pair is processed.
pub fn build_entries(sources: &[SourceConfig]) -> Result<Vec<SourceEntry>> {
    let mut entries = Vec::with_capacity(sources.len());
    for cfg in sources {
        let adapter: Box<dyn SourceAdapter> = match cfg.name.as_str() {
            "binance" => Box::new(BinanceSource::new(cfg)?),
            "alpaca" => Box::new(AlpacaSource::new(cfg)?),
            other => bail!("unknown source '{}': expected one of binance/alpaca", other),
        };
        entries.push(SourceEntry {
            adapter,
            instruments: cfg.instruments.clone(),
        });
    }
    Ok(entries)
}

/// Squash an HTTP error body onto one bounded line for log fields.
pub(crate) fn compact_error_body(body: &str) -> String {
    let mut normalized = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.len() > 180 {
        let mut cut = 180;
        while !normalized.is_char_boundary(cut) {
            cut -= 1;
        }
        normalized.truncate(cut);
        normalized.push_str("...");
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_config(name: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            rest_base_url: "https://example.invalid".to_string(),
            data_base_url: None,
            instruments: vec!["BTC/USDT".to_string()],
            api_key: String::new(),
            api_secret: String::new(),
        }
    }

    #[test]
    fn build_entries_resolves_known_adapters() {
        let entries = build_entries(&[source_config("binance"), source_config("alpaca")]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].adapter.name(), "binance");
        assert_eq!(entries[1].adapter.name(), "alpaca");
        assert_eq!(entries[0].instruments, vec!["BTC/USDT".to_string()]);
    }

    #[test]
    fn build_entries_rejects_unknown_source() {
        let err = build_entries(&[source_config("kraken")]).unwrap_err();
        assert!(err.to_string().contains("unknown source 'kraken'"));
    }
}
