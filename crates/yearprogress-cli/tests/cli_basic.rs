//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::path::Path;
use std::process::Command;

/// Run a CLI command with `home` as data directory and return output.
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_yearprogress"))
        .args(args)
        .env("YEARPROGRESS_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (code, stdout, stderr) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

/// Create an event and return its id.
fn add_event(home: &Path, title: &str, extra: &[&str]) -> i64 {
    let mut args = vec![
        "event",
        "add",
        title,
        "--start",
        "2025-09-01T00:00:00Z",
        "--end",
        "2025-12-20T00:00:00Z",
    ];
    args.extend_from_slice(extra);
    let stdout = run_ok(home, &args);
    let first = stdout.lines().next().unwrap();
    first
        .strip_prefix("Event created: ")
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

#[test]
fn test_progress_lists_all_periods() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["progress"]);
    for period in ["day", "week", "month", "year"] {
        assert!(stdout.contains(period), "missing {period} in {stdout}");
    }
}

#[test]
fn test_progress_json_single_period() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["progress", "--period", "year", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let snapshots = parsed.as_array().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0]["subject_id"], "year");
    assert_eq!(snapshots[0]["title"], snapshots[0]["current_value"].to_string());
    let fraction = snapshots[0]["elapsed_fraction"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&fraction));
}

#[test]
fn test_progress_rejects_unknown_period() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(home.path(), &["progress", "--period", "decade"]);
    assert_ne!(code, 0);
}

#[test]
fn test_event_lifecycle() {
    let home = tempfile::tempdir().unwrap();
    let id = add_event(home.path(), "Semester", &["--description", "fall term"]);

    let stdout = run_ok(home.path(), &["event", "list", "--json"]);
    let events: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["title"], "Semester");

    let id_arg = id.to_string();
    run_ok(home.path(), &["event", "update", &id_arg, "--title", "Winter term"]);
    let stdout = run_ok(home.path(), &["event", "get", &id_arg]);
    let event: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(event["title"], "Winter term");

    run_ok(home.path(), &["event", "delete", &id_arg]);
    let (code, _, stderr) = run_cli(home.path(), &["event", "get", &id_arg]);
    assert_eq!(code, 1);
    assert!(stderr.contains(&format!("Event {id} not found")), "{stderr}");
}

#[test]
fn test_event_filter_is_case_sensitive() {
    let home = tempfile::tempdir().unwrap();
    add_event(home.path(), "Gym", &["--repeat", "mon,wed"]);
    add_event(home.path(), "Exam", &[]);

    let stdout = run_ok(home.path(), &["event", "filter", "Gym", "--json"]);
    let events: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["recurrence"]["type"], "weekly");

    let stdout = run_ok(home.path(), &["event", "filter", "gym", "--json"]);
    let events: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(events.as_array().unwrap().is_empty());
}

#[test]
fn test_event_with_end_before_start_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(
        home.path(),
        &[
            "event",
            "add",
            "Backwards",
            "--start",
            "2025-09-02T00:00:00Z",
            "--end",
            "2025-09-01T00:00:00Z",
        ],
    );
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"), "{stderr}");
}

#[test]
fn test_event_progress_of_past_event_is_complete() {
    let home = tempfile::tempdir().unwrap();
    let id = add_event(home.path(), "Semester", &[]).to_string();
    let stdout = run_ok(home.path(), &["event", "progress", &id, "--json"]);
    let snapshot: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(snapshot["elapsed_fraction"].as_f64().unwrap(), 1.0);
    assert_eq!(snapshot["elapsed_label"], "100.00%");
}

#[test]
fn test_export_then_import_into_fresh_home() {
    let source = tempfile::tempdir().unwrap();
    add_event(source.path(), "Exam", &[]);
    add_event(source.path(), "Rent", &["--repeat", "monthly"]);
    let file = source.path().join("events.json");
    run_ok(
        source.path(),
        &["event", "export", "--output", file.to_str().unwrap()],
    );

    let target = tempfile::tempdir().unwrap();
    let stdout = run_ok(target.path(), &["event", "import", file.to_str().unwrap()]);
    assert!(stdout.contains("imported 2 events"));

    run_ok(target.path(), &["event", "clear"]);
    let stdout = run_ok(target.path(), &["event", "list", "--json"]);
    let events: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(events.as_array().unwrap().is_empty());
}

#[test]
fn test_config_set_get_and_reset() {
    let home = tempfile::tempdir().unwrap();
    assert_eq!(
        run_ok(home.path(), &["config", "get", "progress.decimal_digits"]).trim(),
        "2"
    );

    run_ok(home.path(), &["config", "set", "progress.week_start_day", "1"]);
    assert_eq!(
        run_ok(home.path(), &["config", "get", "progress.week_start_day"]).trim(),
        "1"
    );

    let (code, _, _) = run_cli(home.path(), &["config", "set", "progress.week_start_day", "9"]);
    assert_eq!(code, 1);
    let (code, _, stderr) = run_cli(home.path(), &["config", "get", "nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));

    run_ok(home.path(), &["config", "reset"]);
    assert_eq!(
        run_ok(home.path(), &["config", "get", "progress.week_start_day"]).trim(),
        "0"
    );
    let listing = run_ok(home.path(), &["config", "list"]);
    assert!(listing.contains("widgets.year_cadence_secs = 3600"), "{listing}");
}

#[test]
fn test_widget_place_remove_and_list() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["widget", "place", "year"]);
    run_ok(home.path(), &["widget", "place", "year", "--cadence", "30"]);

    let stdout = run_ok(home.path(), &["widget", "list", "--json"]);
    let placements: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(placements["year"]["instances"], 2);
    assert_eq!(placements["year"]["cadence_secs"], 30);

    run_ok(home.path(), &["widget", "remove", "year"]);
    run_ok(home.path(), &["widget", "remove", "year"]);
    let (code, _, stderr) = run_cli(home.path(), &["widget", "remove", "year"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not placed"));
}

#[test]
fn test_widget_place_rejects_unknown_event_and_short_cadence() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["widget", "place", "event:42"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Event 42 not found"), "{stderr}");

    let (code, _, _) = run_cli(home.path(), &["widget", "place", "day", "--cadence", "1"]);
    assert_eq!(code, 1);
}

#[test]
fn test_widget_run_renders_json_lines() {
    let home = tempfile::tempdir().unwrap();
    let id = add_event(home.path(), "Semester", &[]);
    run_ok(home.path(), &["widget", "place", "year"]);
    run_ok(home.path(), &["widget", "place", &format!("event:{id}")]);

    let stdout = run_ok(home.path(), &["widget", "run", "--max-fires", "2"]);
    let mut widgets: Vec<String> = stdout
        .lines()
        .map(|line| {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            parsed["widget"].as_str().unwrap().to_string()
        })
        .collect();
    widgets.sort();
    assert_eq!(widgets, vec![format!("event:{id}"), "year".to_string()]);
}

#[test]
fn test_widget_run_without_placements_fails() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["widget", "run", "--max-fires", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no widgets placed"));
}
