use anyhow::Result;

use ohlcv_archiver::config::Config;
use ohlcv_archiver::ingest;
use ohlcv_archiver::source;
use ohlcv_archiver::store::SeriesStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        db = %config.store.db_path.display(),
        interval = %config.ingestion.interval,
        sources = config.sources.len(),
        "starting ingestion pass"
    );

    // A store that fails to open is fatal before any pair is touched.
    let mut store = SeriesStore::open(&config.store.db_path)?;
    let sources = source::build_entries(&config.sources)?;

    let summary = ingest::run(
        &mut store,
        &sources,
        &config.ingestion.interval,
        config.ingestion.fetch_limit,
    )
    .await?;

    tracing::info!(
        sources_failed = summary.sources_failed,
        pairs_ok = summary.pairs_ok,
        pairs_failed = summary.pairs_failed,
        records_appended = summary.records_appended,
        "ingestion pass finished"
    );
    Ok(())
}
