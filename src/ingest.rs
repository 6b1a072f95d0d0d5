use anyhow::Result;

use crate::error::FetchError;
use crate::source::SourceEntry;
use crate::store::{SeriesKey, SeriesStore};

/// Totals for one ingestion pass, for the end-of-run log line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Sources whose instrument discovery failed (their pairs were skipped
    /// wholesale this run).
    pub sources_failed: usize,
    pub pairs_ok: usize,
    pub pairs_failed: usize,
    pub records_appended: usize,
}

/// One ingestion pass over every configured (source, instrument) pair.
///
/// Pairs are processed strictly in sequence: fetch, then persist, then the
/// next pair. Source failures are classified, logged, and absorbed at the
/// pair boundary; one bad pair never stops the rest of the whitelist.
/// Nothing is retried within a run; the next scheduled invocation picks up
/// whatever was skipped. Store errors are fatal and propagate.
///
/// Running the same pass twice over the same data window is a no-op the
/// second time: the store's watermark filter drops everything already
/// persisted.
pub async fn run(
    store: &mut SeriesStore,
    sources: &[SourceEntry],
    interval: &str,
    fetch_limit: usize,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for entry in sources {
        let source = entry.adapter.name();

        let instruments = if entry.instruments.is_empty() {
            // Fan-out default: no whitelist means every instrument the
            // source currently offers.
            match entry.adapter.load_instruments().await {
                Ok(all) => {
                    tracing::info!(
                        source,
                        instruments = all.len(),
                        "no instrument whitelist; ingesting everything the source offers"
                    );
                    all
                }
                Err(e) => {
                    log_fetch_failure(source, None, &e);
                    summary.sources_failed += 1;
                    continue;
                }
            }
        } else {
            entry.instruments.clone()
        };

        for instrument in &instruments {
            match entry.adapter.fetch_ohlcv(instrument, interval, fetch_limit).await {
                Ok(candles) => {
                    let key = SeriesKey::new(instrument, source);
                    store.ensure_series(&key)?;
                    let appended = store.append_batch(&key, &candles)?;
                    summary.pairs_ok += 1;
                    summary.records_appended += appended;
                    tracing::debug!(
                        source,
                        instrument = %instrument,
                        series = %key,
                        fetched = candles.len(),
                        appended,
                        "pair updated"
                    );
                }
                Err(e) => {
                    log_fetch_failure(source, Some(instrument.as_str()), &e);
                    summary.pairs_failed += 1;
                }
            }
        }
    }

    Ok(summary)
}

fn log_fetch_failure(source: &str, instrument: Option<&str>, err: &FetchError) {
    let instrument = instrument.unwrap_or("*");
    if err.is_expected() {
        tracing::info!(source, instrument, error = %err, "pair skipped");
    } else if err.is_transient() {
        tracing::warn!(
            source,
            instrument,
            error = %err,
            "transient source failure; pair skipped until next run"
        );
    } else {
        tracing::error!(source, instrument, error = %err, "source error; pair skipped");
    }
}
