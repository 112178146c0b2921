use chrono::{NaiveDate, NaiveDateTime};
use sync_latency_store::{HistoryEntry, ResultStore, RoundedLatency};
use tempfile::TempDir;

fn at(hour: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(hour, min, 0)
        .unwrap()
}

fn latency(base: u64) -> RoundedLatency {
    RoundedLatency {
        p50: base,
        p95: base + 10,
        p99: base + 20,
    }
}

#[test]
fn test_record_creates_data_dir_and_both_files() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("nested").join("data");
    let store = ResultStore::new(&data_dir, 1440);

    let len = store.record(latency(100), at(9, 30)).unwrap();
    assert_eq!(len, 1);
    assert!(store.latest_path().exists());
    assert!(store.history_path().exists());

    let latest = store.load_latest().unwrap().unwrap();
    assert_eq!(latest.p50, 100);
    assert_eq!(latest.p95, 110);
    assert_eq!(latest.p99, 120);
    assert_eq!(latest.updated, at(9, 30));

    let history = store.load_history().unwrap();
    assert_eq!(
        history,
        vec![HistoryEntry {
            time: "09:30".to_string(),
            p50: 100,
            p95: 110,
            p99: 120,
        }]
    );
}

#[test]
fn test_latest_is_overwritten_not_merged() {
    let temp_dir = TempDir::new().unwrap();
    let store = ResultStore::new(temp_dir.path(), 1440);

    store.record(latency(100), at(1, 0)).unwrap();
    store.record(latency(7), at(2, 0)).unwrap();

    let latest = store.load_latest().unwrap().unwrap();
    assert_eq!(latest.p50, 7);
    assert_eq!(latest.updated, at(2, 0));

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.latest_path()).unwrap()).unwrap();
    let keys: Vec<&String> = raw.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 4);
}

#[test]
fn test_history_length_is_capped_and_drops_oldest() {
    let temp_dir = TempDir::new().unwrap();
    let cap = 5;
    let store = ResultStore::new(temp_dir.path(), cap);

    // Prior history of length 3.
    for i in 0..3 {
        store.record(latency(i), at(0, i as u32)).unwrap();
    }
    assert_eq!(store.load_history().unwrap().len(), 3);

    // M = 4 further runs: min(3 + 4, 5) = 5.
    for i in 3..7 {
        let len = store.record(latency(i), at(0, i as u32)).unwrap();
        assert_eq!(len, (i as usize + 1).min(cap));
    }

    let history = store.load_history().unwrap();
    let p50s: Vec<u64> = history.iter().map(|e| e.p50).collect();
    assert_eq!(p50s, vec![2, 3, 4, 5, 6]);
}

#[test]
fn test_missing_history_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let store = ResultStore::new(temp_dir.path(), 1440);

    assert!(store.load_history().unwrap().is_empty());
    assert!(store.load_latest().unwrap().is_none());
}

#[test]
fn test_corrupted_history_is_backed_up_and_restarted() {
    let temp_dir = TempDir::new().unwrap();
    let store = ResultStore::new(temp_dir.path(), 1440);
    std::fs::write(store.history_path(), "{ not json").unwrap();

    let len = store.record(latency(42), at(3, 15)).unwrap();
    assert_eq!(len, 1);

    let backup = temp_dir.path().join("history.json.backup");
    assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
    assert_eq!(store.load_history().unwrap()[0].p50, 42);
}

#[test]
fn test_history_reads_existing_file_format() {
    let temp_dir = TempDir::new().unwrap();
    let store = ResultStore::new(temp_dir.path(), 1440);
    std::fs::write(
        store.history_path(),
        r#"[{"time": "23:59", "p50": 250, "p95": 410, "p99": 415}]"#,
    )
    .unwrap();

    store.record(latency(1), at(0, 1)).unwrap();

    let history = store.load_history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].time, "23:59");
    assert_eq!(history[0].p99, 415);
    assert_eq!(history[1].time, "00:01");
}

#[test]
fn test_non_utf8_history_is_backed_up_and_restarted() {
    let temp_dir = TempDir::new().unwrap();
    let store = ResultStore::new(temp_dir.path(), 1440);
    std::fs::write(store.history_path(), [0xff, 0xfe, 0x00]).unwrap();

    let len = store.record(latency(9), at(4, 0)).unwrap();
    assert_eq!(len, 1);

    let backup = temp_dir.path().join("history.json.backup");
    assert_eq!(std::fs::read(backup).unwrap(), vec![0xff, 0xfe, 0x00]);
    assert_eq!(store.load_latest().unwrap().unwrap().p50, 9);
    assert_eq!(store.load_history().unwrap()[0].p50, 9);
}

#[test]
fn test_repeated_corruption_keeps_every_backup() {
    let temp_dir = TempDir::new().unwrap();
    let store = ResultStore::new(temp_dir.path(), 1440);

    std::fs::write(store.history_path(), "first").unwrap();
    store.record(latency(1), at(1, 0)).unwrap();
    std::fs::write(store.history_path(), "second").unwrap();
    store.record(latency(2), at(2, 0)).unwrap();

    let dir = temp_dir.path();
    assert_eq!(
        std::fs::read_to_string(dir.join("history.json.backup")).unwrap(),
        "first"
    );
    assert_eq!(
        std::fs::read_to_string(dir.join("history.json.backup.1")).unwrap(),
        "second"
    );
}


#[test]
fn test_unreadable_history_leaves_latest_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let store = ResultStore::new(temp_dir.path(), 1440);
    // a directory where the history file should be cannot be read
    std::fs::create_dir(store.history_path()).unwrap();

    assert!(store.record(latency(5), at(6, 0)).is_err());
    assert!(!store.latest_path().exists());
}
