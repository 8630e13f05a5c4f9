//! End-to-end tests for the dl-core binary.

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use common::{Fixture, DAY, PROJECT, TABLE};
use predicates::prelude::*;
use serde_json::Value;
use std::time::Duration;

fn dl_core() -> Command {
    let mut cmd = cargo_bin_cmd!("dl-core");
    cmd.timeout(Duration::from_secs(60));
    cmd.env_remove("DATALOGGER_LOG");
    cmd
}

fn dl_core_in(fixture: &Fixture) -> Command {
    let mut cmd = dl_core();
    cmd.arg("--basedir").arg(fixture.basedir());
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn lists_projects_and_tables() {
    let fixture = Fixture::new();
    let output = dl_core_in(&fixture).arg("projects").output().unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output), serde_json::json!([PROJECT]));

    let output = dl_core_in(&fixture)
        .args(["tables", PROJECT])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output), serde_json::json!([TABLE]));
}

#[test]
fn unknown_project_is_a_config_error() {
    let fixture = Fixture::new();
    dl_core_in(&fixture)
        .args(["tables", "nope"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn meta_shows_table_definition() {
    let fixture = Fixture::new();
    let output = dl_core_in(&fixture)
        .args(["meta", PROJECT, TABLE])
        .output()
        .unwrap();
    assert!(output.status.success());
    let meta = stdout_json(&output);
    assert_eq!(meta["index_keynames"], serde_json::json!(["hostname", "ifDescr"]));
}

#[test]
fn meta_schema_needs_no_basedir() {
    dl_core()
        .arg("meta-schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("index_keynames"));
}

#[test]
fn load_total_stats_folds_every_key() {
    let fixture = Fixture::with_day();
    let output = dl_core_in(&fixture)
        .args(["load", PROJECT, TABLE, DAY, "total-stats"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["day"], DAY);
    assert_eq!(report["tier"], "total_stats");
    let inbound = &report["data"]["columns"]["ifInOctets"];
    assert_eq!(inbound["total_count"], 4);
    assert_eq!(inbound["stats"]["max"].as_f64(), Some(2110.0));
    assert!(fixture.cache_dir(DAY).join("total_stats.json").exists());
}

#[test]
fn load_series_array_with_filter() {
    let fixture = Fixture::with_day();
    let output = dl_core_in(&fixture)
        .args(["load", PROJECT, TABLE, DAY, "series-array", "--filter", "hostname=srv2"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let keys = stdout_json(&output)["data"]["keys"].as_array().unwrap().clone();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| k["samples"] == 12));
}

#[test]
fn bad_filter_is_rejected() {
    let fixture = Fixture::with_day();
    dl_core_in(&fixture)
        .args(["load", PROJECT, TABLE, DAY, "series-stats", "--filter", "hostname"])
        .assert()
        .code(10);
}

#[test]
fn live_day_exits_with_live_data() {
    let fixture = Fixture::new();
    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    dl_core_in(&fixture)
        .args(["load", PROJECT, TABLE, &today, "series-array"])
        .assert()
        .code(11);
    assert!(!fixture.cache_dir(&today).exists());
}

#[test]
fn missing_raw_file_exits_with_raw_missing() {
    let fixture = Fixture::new();
    dl_core_in(&fixture)
        .args(["load", PROJECT, TABLE, DAY, "series-stats"])
        .assert()
        .code(12)
        .stderr(predicate::str::contains(DAY));
}

#[test]
fn invalid_day_is_a_config_error() {
    let fixture = Fixture::new();
    dl_core_in(&fixture)
        .args(["load", PROJECT, TABLE, "2024-13-01", "series-array"])
        .assert()
        .code(10);
}

#[test]
fn quantile_head_and_tail() {
    let fixture = Fixture::with_day();
    let output = dl_core_in(&fixture)
        .args(["quantile", PROJECT, TABLE, DAY, "ifInOctets", "--head", "1", "--tail", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["keys"], 4);
    assert_eq!(report["head"].as_array().unwrap().len(), 1);
    assert_eq!(report["tail"].as_array().unwrap().len(), 2);
    assert_eq!(report["head"][0]["key"][0], "srv2");
    assert_eq!(report["tail"][0]["key"], serde_json::json!(["srv1", "eth0"]));
}

#[test]
fn quantile_unknown_column() {
    let fixture = Fixture::with_day();
    dl_core_in(&fixture)
        .args(["quantile", PROJECT, TABLE, DAY, "ifSpeed"])
        .assert()
        .code(10);
}

#[test]
fn caches_then_purge() {
    let fixture = Fixture::with_day();
    dl_core_in(&fixture)
        .args(["load", PROJECT, TABLE, DAY, "series-stats"])
        .assert()
        .success();

    let output = dl_core_in(&fixture)
        .args(["caches", PROJECT, TABLE, DAY])
        .output()
        .unwrap();
    assert!(output.status.success());
    let inventory = &stdout_json(&output)["inventory"];
    assert_eq!(inventory["series"].as_array().unwrap().len(), 4);
    assert_eq!(inventory["quantile"], false);
    assert_eq!(inventory["series_stats"].as_array().unwrap().len(), 1);

    let output = dl_core_in(&fixture)
        .args(["purge", PROJECT, TABLE, DAY])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["removed"], 6);
    assert!(fixture.cache_dir(DAY).read_dir().unwrap().all(|e| {
        let name = e.unwrap().file_name();
        name.to_string_lossy().starts_with('.')
    }));
}

#[test]
fn raw_rows_respect_limit() {
    let fixture = Fixture::with_day();
    let output = dl_core_in(&fixture)
        .args(["raw", PROJECT, TABLE, DAY, "--limit", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let rows = stdout_json(&output);
    assert_eq!(rows.as_array().unwrap().len(), 3);
    assert_eq!(rows[0]["fields"]["hostname"], "srv1");
}

#[test]
fn walk_a_leap_month() {
    let output = dl_core().args(["walk", "--month", "2024-02"]).output().unwrap();
    assert!(output.status.success());
    let days = stdout_json(&output);
    let days = days.as_array().unwrap();
    assert_eq!(days.len(), 29);
    assert_eq!(days[0], "2024-02-01");
    assert_eq!(days[28], "2024-02-29");
}

#[test]
fn walk_a_range_includes_stop() {
    let output = dl_core()
        .args(["walk", "--start", "2024-03-01", "--stop", "2024-03-04"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        serde_json::json!(["2024-03-01", "2024-03-02", "2024-03-03", "2024-03-04"])
    );

    let output = dl_core()
        .args(["walk", "--start", DAY, "--stop", DAY])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output), serde_json::json!([DAY]));
}

#[test]
fn longtime_collects_daily_values() {
    let fixture = Fixture::with_day();
    fixture.write_standard_day("2024-03-06");
    let output = dl_core_in(&fixture)
        .args(["longtime", PROJECT, TABLE, "2024-03", "ifInOctets", "--key", "srv1", "--key", "eth0"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let max = &stdout_json(&output)["stats"]["max"];
    assert_eq!(
        max,
        &serde_json::json!([["2024-03-05", 1100.0], ["2024-03-06", 1100.0]])
    );
}

#[test]
fn completions_for_bash() {
    dl_core()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dl-core"));
}

#[test]
fn help_lists_commands() {
    dl_core()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("quantile"))
        .stdout(predicate::str::contains("longtime"));
}
