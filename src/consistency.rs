use anyhow::Result;

use crate::store::{SeriesKey, SeriesStore};

/// Spacing deviation between two adjacent stored records.
///
/// `actual_gap_ms` is the raw signed delta `current - previous`: a positive
/// multiple of the period means missing buckets, zero or negative means a
/// duplicate or out-of-order record. The checker reports the delta and
/// leaves interpretation to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub series_key: SeriesKey,
    pub at_timestamp_ms: u64,
    pub actual_gap_ms: i64,
}

/// Scan ascending timestamps for adjacent pairs that are not exactly one
/// period apart.
///
/// The first record is compared against a synthetic predecessor one period
/// earlier, so a series is never flagged merely for having a beginning. An
/// empty series yields no anomalies.
pub fn check_timestamps(
    series_key: &SeriesKey,
    timestamps: &[u64],
    expected_period_ms: u64,
) -> Vec<Anomaly> {
    let Some(&first) = timestamps.first() else {
        return Vec::new();
    };
    let period = expected_period_ms as i64;

    let mut anomalies = Vec::new();
    let mut prev = first as i64 - period;
    for &ts in timestamps {
        let gap = ts as i64 - prev;
        if gap != period {
            anomalies.push(Anomaly {
                series_key: series_key.clone(),
                at_timestamp_ms: ts,
                actual_gap_ms: gap,
            });
        }
        prev = ts as i64;
    }
    anomalies
}

/// Check one stored series. Read-only.
pub fn check_series(
    store: &SeriesStore,
    key: &SeriesKey,
    expected_period_ms: u64,
) -> Result<Vec<Anomaly>> {
    let timestamps = store.read_ordered(key)?;
    Ok(check_timestamps(key, &timestamps, expected_period_ms))
}

/// Check every known series, anomalies concatenated in series order.
pub fn check_all(store: &SeriesStore, expected_period_ms: u64) -> Result<Vec<Anomaly>> {
    let mut anomalies = Vec::new();
    for key in store.list_series() {
        anomalies.extend(check_series(store, &key, expected_period_ms)?);
    }
    Ok(anomalies)
}
