use anyhow::{bail, Result};

use ohlcv_archiver::config::Config;
use ohlcv_archiver::consistency;
use ohlcv_archiver::store::SeriesStore;

/// Walks every stored series and reports adjacent records whose spacing
/// deviates from the configured period. Exits non-zero when anomalies are
/// found so a scheduler can alert on it.
fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    let store = SeriesStore::open(&config.store.db_path)?;
    let period_ms = config.ingestion.interval_ms()?;

    println!(
        "consistency check over {} (period {} ms)",
        config.store.db_path.display(),
        period_ms
    );
    println!("==========================================");

    let series = store.list_series();
    let mut total_anomalies = 0;
    for key in &series {
        let anomalies = consistency::check_series(&store, key, period_ms)?;
        for anomaly in &anomalies {
            println!(
                "- {:<40} at {} actual gap {} ms",
                anomaly.series_key, anomaly.at_timestamp_ms, anomaly.actual_gap_ms
            );
        }
        total_anomalies += anomalies.len();
    }

    println!(
        "checked {} series, {} anomalies",
        series.len(),
        total_anomalies
    );

    if total_anomalies > 0 {
        bail!("{} period anomalies found", total_anomalies);
    }
    Ok(())
}
