use std::fmt;

/// Storage identifier for one (instrument, source) series.
///
/// Instrument symbols and source names carry characters that are unsafe in
/// SQL identifiers ("BTC/USDT", "coinbase-pro"). Construction sanitizes both
/// parts, so a `SeriesKey` is always a bare `[A-Za-z0-9_]` string and can be
/// interpolated into table DDL without quoting tricks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey(String);

impl SeriesKey {
    pub fn new(instrument: &str, source: &str) -> Self {
        Self(format!("{}_{}", sanitize(instrument), sanitize(source)))
    }

    /// Wrap a table name read back from the store. Stored names were written
    /// through `new`, so sanitizing again is a no-op on well-formed input and
    /// a safety net on anything else.
    pub fn from_stored(name: &str) -> Self {
        Self(sanitize(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_and_source_are_sanitized() {
        let key = SeriesKey::new("BTC/USDT", "coinbase-pro");
        assert_eq!(key.as_str(), "BTC_USDT_coinbase_pro");
    }

    #[test]
    fn plain_parts_pass_through() {
        let key = SeriesKey::new("AAPL", "alpaca");
        assert_eq!(key.as_str(), "AAPL_alpaca");
    }

    #[test]
    fn from_stored_is_idempotent_on_valid_names() {
        let key = SeriesKey::new("ETH/BTC", "binance");
        let reread = SeriesKey::from_stored(key.as_str());
        assert_eq!(key, reread);
    }

    #[test]
    fn non_ascii_collapses_to_separator() {
        let key = SeriesKey::new("BTC/USDT:perp", "ex change");
        assert_eq!(key.as_str(), "BTC_USDT_perp_ex_change");
    }
}
