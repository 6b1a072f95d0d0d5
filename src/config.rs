use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    /// Bucket period, e.g. "1m". Also the expected spacing used by the
    /// consistency checker.
    pub interval: String,
    /// How many recent buckets to request per fetch.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

fn default_fetch_limit() -> usize {
    500
}

/// One whitelist entry: a source to ingest from and which of its
/// instruments to track. An empty instrument list means "every instrument
/// the source currently offers".
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Adapter selector and series-key component, e.g. "binance".
    pub name: String,
    pub rest_base_url: String,
    /// Market-data base URL for sources that split trading and data planes;
    /// defaults to `rest_base_url`.
    #[serde(default)]
    pub data_base_url: Option<String>,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(skip)]
    pub api_key: String,
    #[serde(skip)]
    pub api_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Parse an interval string (e.g. "1s", "1m", "1h", "1d", "1w", "1M") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 7 * 86_400_000,
        "M" => 30 * 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w/M",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl IngestionConfig {
    pub fn interval_ms(&self) -> Result<u64> {
        parse_interval_ms(&self.interval)
    }
}

impl SourceConfig {
    pub fn data_base_url(&self) -> &str {
        self.data_base_url.as_deref().unwrap_or(&self.rest_base_url)
    }

    /// Environment variable prefix for this source's credentials, e.g.
    /// "coinbase-pro" looks up COINBASE_PRO_API_KEY / COINBASE_PRO_API_SECRET.
    fn env_prefix(&self) -> String {
        self.name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config/default.toml"))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        if config.sources.is_empty() {
            bail!("no [[sources]] configured in {}", config_path.display());
        }

        // Credentials are optional: keyless sources still serve public
        // market data, and a rejected key surfaces as an expected
        // Authentication skip at fetch time.
        for source in &mut config.sources {
            let prefix = source.env_prefix();
            source.api_key = std::env::var(format!("{}_API_KEY", prefix)).unwrap_or_default();
            source.api_secret = std::env::var(format!("{}_API_SECRET", prefix)).unwrap_or_default();
        }

        config
            .ingestion
            .interval_ms()
            .context("ingestion.interval is invalid")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_toml() {
        let toml_str = r#"
[store]
db_path = "data/ohlcv.db"

[ingestion]
interval = "1m"
fetch_limit = 200

[[sources]]
name = "binance"
rest_base_url = "https://api.binance.com"
instruments = ["BTC/USDT", "ETH/USDT"]

[[sources]]
name = "alpaca"
rest_base_url = "https://paper-api.alpaca.markets"
data_base_url = "https://data.alpaca.markets"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("data/ohlcv.db"));
        assert_eq!(config.ingestion.interval, "1m");
        assert_eq!(config.ingestion.fetch_limit, 200);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "binance");
        assert_eq!(config.sources[0].instruments.len(), 2);
        assert!(config.sources[1].instruments.is_empty());
        assert_eq!(
            config.sources[1].data_base_url(),
            "https://data.alpaca.markets"
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn fetch_limit_defaults_when_omitted() {
        let toml_str = r#"
[store]
db_path = "data/ohlcv.db"

[ingestion]
interval = "1h"

[logging]
level = "info"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.ingestion.fetch_limit, 500);
        assert_eq!(config.ingestion.interval_ms().unwrap(), 3_600_000);
    }

    #[test]
    fn data_base_url_falls_back_to_rest() {
        let source = SourceConfig {
            name: "binance".to_string(),
            rest_base_url: "https://api.binance.com".to_string(),
            data_base_url: None,
            instruments: vec![],
            api_key: String::new(),
            api_secret: String::new(),
        };
        assert_eq!(source.data_base_url(), "https://api.binance.com");
    }

    #[test]
    fn env_prefix_uppercases_and_replaces_separators() {
        let source = SourceConfig {
            name: "coinbase-pro".to_string(),
            rest_base_url: String::new(),
            data_base_url: None,
            instruments: vec![],
            api_key: String::new(),
            api_secret: String::new(),
        };
        assert_eq!(source.env_prefix(), "COINBASE_PRO");
    }

    #[test]
    fn parse_interval_valid() {
        assert_eq!(parse_interval_ms("1m").unwrap(), 60_000);
        assert_eq!(parse_interval_ms("2h").unwrap(), 7_200_000);
        assert_eq!(parse_interval_ms("1M").unwrap(), 2_592_000_000);
    }

    #[test]
    fn parse_interval_rejects_invalid_inputs() {
        assert!(parse_interval_ms("").is_err());
        assert!(parse_interval_ms("m").is_err());
        assert!(parse_interval_ms("0m").is_err());
        assert!(parse_interval_ms("1x").is_err());
    }
}
