use ohlcv_archiver::consistency::{check_all, check_series, check_timestamps};
use ohlcv_archiver::model::Candle;
use ohlcv_archiver::store::{SeriesKey, SeriesStore};

const PERIOD: u64 = 60_000;

fn key() -> SeriesKey {
    SeriesKey::new("BTC/USDT", "binance")
}

fn candle(close_time_ms: u64) -> Candle {
    Candle {
        close_time_ms,
        open: 1.0,
        high: 2.0,
        low: 0.5,
        close: 1.5,
        volume: 10.0,
    }
}

#[test]
fn evenly_spaced_series_has_no_anomalies() {
    let anomalies = check_timestamps(&key(), &[1_000, 61_000, 121_000], PERIOD);
    assert!(anomalies.is_empty());
}

#[test]
fn empty_series_yields_no_anomalies() {
    assert!(check_timestamps(&key(), &[], PERIOD).is_empty());
}

#[test]
fn single_record_is_never_flagged() {
    // The synthetic predecessor sits exactly one period earlier.
    assert!(check_timestamps(&key(), &[1_000], PERIOD).is_empty());
}

#[test]
fn missing_interval_reports_one_anomaly_with_doubled_gap() {
    let anomalies = check_timestamps(&key(), &[1_000, 121_000], PERIOD);
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].at_timestamp_ms, 121_000);
    assert_eq!(anomalies[0].actual_gap_ms, 120_000);
    assert_eq!(anomalies[0].series_key, key());
}

#[test]
fn duplicate_timestamp_reports_zero_gap() {
    let anomalies = check_timestamps(&key(), &[1_000, 1_000, 61_000], PERIOD);
    // Only the duplicate pair is flagged; 1_000 -> 61_000 measures a clean
    // period again.
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].at_timestamp_ms, 1_000);
    assert_eq!(anomalies[0].actual_gap_ms, 0);
}

#[test]
fn out_of_order_pair_reports_negative_gap() {
    let anomalies = check_timestamps(&key(), &[61_000, 1_000], PERIOD);
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].at_timestamp_ms, 1_000);
    assert_eq!(anomalies[0].actual_gap_ms, -60_000);
}

#[test]
fn check_series_on_absent_series_is_empty() {
    let store = SeriesStore::open_in_memory().unwrap();
    let anomalies = check_series(&store, &key(), PERIOD).unwrap();
    assert!(anomalies.is_empty());
}

#[test]
fn check_series_reads_stored_timestamps() {
    let mut store = SeriesStore::open_in_memory().unwrap();
    let k = key();
    store.ensure_series(&k).unwrap();
    store
        .append_batch(&k, &[candle(60_000), candle(120_000), candle(240_000)])
        .unwrap();

    let anomalies = check_series(&store, &k, PERIOD).unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].at_timestamp_ms, 240_000);
    assert_eq!(anomalies[0].actual_gap_ms, 120_000);
}

#[test]
fn check_all_covers_every_series() {
    let mut store = SeriesStore::open_in_memory().unwrap();
    let clean = SeriesKey::new("ETH/USDT", "binance");
    let gapped = SeriesKey::new("BTC/USDT", "binance");

    store.ensure_series(&clean).unwrap();
    store
        .append_batch(&clean, &[candle(60_000), candle(120_000)])
        .unwrap();

    store.ensure_series(&gapped).unwrap();
    store
        .append_batch(&gapped, &[candle(60_000), candle(180_000)])
        .unwrap();

    let anomalies = check_all(&store, PERIOD).unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].series_key, gapped);
    assert_eq!(anomalies[0].at_timestamp_ms, 180_000);
}
