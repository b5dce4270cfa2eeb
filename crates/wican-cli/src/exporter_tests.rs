use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{NaiveDate, TimeZone, Utc};

use crate::exporter::{log_file_date, prune_old_log_files};

fn make_temp_dir(name: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let uniq = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("unix epoch")
        .as_nanos();
    path.push(format!("wican-tests-{name}-{uniq}"));
    fs::create_dir_all(&path).expect("create temp dir");
    path
}

#[test]
fn log_file_dates_parse_only_rotated_logs() {
    assert_eq!(
        log_file_date("wican-2026-08-01.jsonl"),
        NaiveDate::from_ymd_opt(2026, 8, 1)
    );
    assert_eq!(log_file_date("latest.json"), None);
    assert_eq!(log_file_date("wican-notadate.jsonl"), None);
    assert_eq!(log_file_date("nobody-2026-08-01.jsonl"), None);
}

#[test]
fn prune_removes_only_expired_log_files() {
    // Arrange
    let dir = make_temp_dir("old-vs-fresh");
    let old_log = dir.join("wican-2026-04-01.jsonl");
    let fresh_log = dir.join("wican-2026-08-01.jsonl");
    let unrelated = dir.join("latest.json");
    fs::write(&old_log, "old").expect("write old log");
    fs::write(&fresh_log, "fresh").expect("write fresh log");
    fs::write(&unrelated, "keep").expect("write unrelated");

    let now: SystemTime = Utc
        .with_ymd_and_hms(2026, 8, 1, 0, 0, 0)
        .single()
        .expect("valid date")
        .into();

    // Act
    prune_old_log_files(&dir, 90, now).expect("prune");

    // Assert
    assert!(!old_log.exists(), "expired log should be pruned");
    assert!(fresh_log.exists(), "fresh log should be kept");
    assert!(unrelated.exists(), "non-log file should never be pruned");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn prune_keeps_log_file_on_the_retention_boundary() {
    // Arrange
    let dir = make_temp_dir("boundary");
    let boundary_log = dir.join("wican-2026-05-03.jsonl");
    fs::write(&boundary_log, "boundary").expect("write boundary log");

    let now: SystemTime = Utc
        .with_ymd_and_hms(2026, 8, 1, 0, 0, 0)
        .single()
        .expect("valid date")
        .into();

    // Act
    prune_old_log_files(&dir, 90, now).expect("prune");

    // Assert
    assert!(
        boundary_log.exists(),
        "log exactly on the retention boundary should be kept"
    );

    let _ = fs::remove_dir_all(dir);
}
