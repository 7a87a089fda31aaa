use chrono::NaiveDate;
use cortisol_tracker::pipeline::{ExportStore, IntradaySource};
use cortisol_tracker::scanner::{ExportScanner, ScanOptions};
use cortisol_tracker::types::{IntradayPoint, SignalCategory, SkipReason, SleepDay};
use cortisol_tracker::ComputeError;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_json(dir: &Path, rel: &str, value: &serde_json::Value) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Export folder laid out like a Google Takeout Fitbit archive
fn fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write_json(
        root,
        "Global Export Data/heart_rate-2025-08-13.json",
        &json!([
            { "dateTime": "08/13/25 06:31:05", "value": { "bpm": 70, "confidence": 2 } },
            { "dateTime": "08/13/25 06:31:45", "value": { "bpm": 75, "confidence": 3 } },
            { "dateTime": "08/12/25 23:59:00", "value": { "bpm": 55, "confidence": 3 } }
        ]),
    );
    write_json(
        root,
        "Global Export Data/steps-2025-08-13.json",
        &json!([
            { "dateTime": "08/13/25 07:00:00", "value": "12" },
            { "dateTime": "08/13/25 07:01:00", "value": "30" }
        ]),
    );
    write_json(
        root,
        "api/intraday steps.json",
        &json!({
            "activities-steps": [{ "dateTime": "2025-08-13", "value": "5000" }],
            "activities-steps-intraday": {
                "dataset": [
                    { "time": "07:01:00", "value": 31 },
                    { "time": "07:02:00", "value": 8 }
                ],
                "datasetInterval": 1
            }
        }),
    );
    write_json(
        root,
        "Global Export Data/sleep-2025-08-13.json",
        &json!([
            { "dateOfSleep": "2025-08-13", "minutesAsleep": 400, "efficiency": 90 },
            { "dateOfSleep": "2025-08-13", "minutesAsleep": 20, "efficiency": 81 },
            { "dateOfSleep": "2025-08-12", "minutesAsleep": 380, "efficiency": 88 }
        ]),
    );
    fs::write(root.join("Global Export Data/notes.txt"), "not json").unwrap();
    tmp
}

#[test]
fn intraday_merges_all_exports_for_date() {
    let tmp = fixture();
    let store = ExportStore::new(ExportScanner::new(tmp.path()));
    let report = store.intraday(date(2025, 8, 13)).unwrap();

    assert_eq!(report.date, "2025-08-13");
    assert_eq!(report.heart_rate, vec![IntradayPoint::new("06:31", 75.0)]);
    // Traversal order is name order: "Global Export Data" before "api", so the
    // Web API document wins the shared minute.
    assert_eq!(
        report.steps,
        vec![
            IntradayPoint::new("07:00", 12.0),
            IntradayPoint::new("07:01", 31.0),
            IntradayPoint::new("07:02", 8.0),
        ]
    );
    assert_eq!(
        report.sleep_summary,
        Some(SleepDay {
            date: "2025-08-13".to_string(),
            minutes_asleep: 420,
            efficiency: 86,
        })
    );
    assert_eq!(report.debug.steps_files, 2);
    assert_eq!(report.debug.hr_files, 1);
    let sample = report.debug.hr_debug_sample.unwrap();
    assert_eq!(sample.file, "heart_rate-2025-08-13.json");
    assert_eq!(sample.kind, "array");
    assert!(report.debug.skipped.is_empty());
}

#[test]
fn intraday_for_date_without_data_is_empty() {
    let tmp = fixture();
    let store = ExportStore::new(ExportScanner::new(tmp.path()));
    let report = store.intraday(date(2024, 1, 1)).unwrap();
    assert!(report.heart_rate.is_empty());
    // Object datasets carry no date and contribute to every requested day.
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.sleep_summary, None);
}

#[test]
fn sleep_overview_counts_files_entries_and_days() {
    let tmp = fixture();
    let store = ExportStore::new(ExportScanner::new(tmp.path()));
    let overview = store.sleep_overview().unwrap();

    assert_eq!(overview.sleep_file_count, 1);
    assert_eq!(overview.sleep_entry_count, 3);
    assert_eq!(overview.sleep_day_count, 2);
    let dates: Vec<_> = overview.sleep_days.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(dates, vec!["2025-08-12", "2025-08-13"]);

    let json = serde_json::to_value(&overview).unwrap();
    assert_eq!(json["sleepDays"][1]["minutesAsleep"], 420);
}

#[test]
fn invalid_json_is_skipped_not_fatal() {
    let tmp = fixture();
    fs::write(tmp.path().join("broken_steps.json"), "{ not json").unwrap();

    let store = ExportStore::new(ExportScanner::new(tmp.path()));
    let report = store.intraday(date(2025, 8, 13)).unwrap();

    assert_eq!(report.debug.steps_files, 3);
    assert_eq!(report.steps.len(), 3);
    assert_eq!(report.debug.skipped.len(), 1);
    assert_eq!(report.debug.skipped[0].file, "broken_steps.json");
    assert!(matches!(
        report.debug.skipped[0].reason,
        SkipReason::InvalidJson(_)
    ));
}

#[test]
fn scan_visits_entries_in_name_order() {
    let tmp = fixture();
    let exports = ExportScanner::new(tmp.path()).scan().unwrap();
    let names: Vec<_> = exports.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "heart_rate-2025-08-13.json",
            "notes.txt",
            "sleep-2025-08-13.json",
            "steps-2025-08-13.json",
            "intraday steps.json",
        ]
    );
    assert_eq!(exports.count(SignalCategory::Sleep), 1);
    assert_eq!(exports.count(SignalCategory::Unknown), 0);
}

#[test]
fn max_depth_bounds_traversal() {
    let tmp = TempDir::new().unwrap();
    write_json(tmp.path(), "steps_top.json", &json!([]));
    write_json(tmp.path(), "a/b/c/steps_deep.json", &json!([]));

    let shallow = ExportScanner::with_options(
        tmp.path(),
        ScanOptions {
            max_depth: 1,
            ..ScanOptions::default()
        },
    );
    let names: Vec<_> = shallow
        .scan()
        .unwrap()
        .files
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["steps_top.json"]);

    let deep = ExportScanner::new(tmp.path()).scan().unwrap();
    assert_eq!(deep.files.len(), 2);
}

#[cfg(unix)]
#[test]
fn symlink_cycle_terminates() {
    let tmp = TempDir::new().unwrap();
    write_json(tmp.path(), "inner/hr.json", &json!([]));
    std::os::unix::fs::symlink(tmp.path(), tmp.path().join("inner/loop")).unwrap();

    let exports = ExportScanner::new(tmp.path()).scan().unwrap();
    let names: Vec<_> = exports.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["hr.json"]);

    let unfollowed = ExportScanner::with_options(
        tmp.path(),
        ScanOptions {
            follow_symlinks: false,
            ..ScanOptions::default()
        },
    );
    assert_eq!(unfollowed.scan().unwrap().files.len(), 1);
}

#[cfg(unix)]
#[test]
fn symlink_does_not_hide_real_directory() {
    let tmp = TempDir::new().unwrap();
    write_json(tmp.path(), "z/sub/steps.json", &json!([]));
    fs::create_dir_all(tmp.path().join("a/b")).unwrap();
    std::os::unix::fs::symlink(tmp.path().join("z"), tmp.path().join("a/b/link")).unwrap();

    let scanner = ExportScanner::with_options(
        tmp.path(),
        ScanOptions {
            max_depth: 3,
            ..ScanOptions::default()
        },
    );
    let exports = scanner.scan().unwrap();
    let paths: Vec<_> = exports
        .files
        .iter()
        .map(|f| exports.relative_name(f))
        .collect();
    // The copy behind the link sits too deep; the real one is still found.
    assert_eq!(paths, vec!["z/sub/steps.json"]);
}

#[test]
fn skipped_files_keep_their_folder() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("a")).unwrap();
    fs::create_dir_all(tmp.path().join("b")).unwrap();
    fs::write(tmp.path().join("a/steps.json"), "{ not json").unwrap();
    fs::write(tmp.path().join("b/steps.json"), "{ not json").unwrap();

    let store = ExportStore::new(ExportScanner::new(tmp.path()));
    let report = store.intraday(date(2025, 8, 13)).unwrap();
    let files: Vec<_> = report.debug.skipped.iter().map(|s| s.file.as_str()).collect();
    let expected: Vec<_> = ["a", "b"]
        .iter()
        .map(|dir| Path::new(dir).join("steps.json").display().to_string())
        .collect();
    assert_eq!(files, expected);
}

#[test]
fn missing_root_is_reported() {
    let tmp = TempDir::new().unwrap();
    let store = ExportStore::new(ExportScanner::new(tmp.path().join("Fitbit")));
    assert!(matches!(
        store.sleep_overview(),
        Err(ComputeError::MissingRoot(_))
    ));
    assert!(matches!(
        store.intraday(date(2025, 8, 13)),
        Err(ComputeError::MissingRoot(_))
    ));
}
