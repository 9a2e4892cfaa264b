//! Smoke tests -- verify the binary runs end to end in simulated mode.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

/// Command isolated from any local config or Sentinel credentials.
fn landwatch(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("landwatch").unwrap();
    cmd.current_dir(config_dir)
        .env("LANDWATCH_CONFIG", config_dir.join("landwatch.toml"))
        .env_remove("SENTINEL_CLIENT_ID")
        .env_remove("SENTINEL_CLIENT_SECRET")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("landwatch")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Land-cover classification"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("landwatch")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("landwatch"));
}

#[test]
fn test_regions_lists_all() {
    let dir = tempfile::TempDir::new().unwrap();
    landwatch(dir.path())
        .arg("regions")
        .assert()
        .success()
        .stdout(predicate::str::contains("Amazon Basin"))
        .stdout(predicate::str::contains("Great Barrier Reef"));
}

#[test]
fn test_analyze_requires_path() {
    let dir = tempfile::TempDir::new().unwrap();
    landwatch(dir.path()).arg("analyze").assert().failure();
}

#[test]
fn test_analyze_png_json() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("field.png");
    image::RgbImage::from_pixel(16, 16, image::Rgb([40, 160, 50]))
        .save(&path)
        .unwrap();

    let output = landwatch(dir.path())
        .args(["analyze", "--json"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let report = &reports[0];
    assert_eq!(report["predicted_class"], "Forest");
    assert_eq!(report["metadata"]["file_type"], "RGB");
    assert_eq!(report["metadata"]["image_dimensions"], "16x16");

    let total: f64 = report["probabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["value"].as_f64().unwrap())
        .sum();
    assert!((total - 100.0).abs() <= 0.2);
}

#[test]
fn test_analyze_missing_file_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    landwatch(dir.path())
        .args(["analyze", "does-not-exist.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read image"));
}

#[test]
fn test_analyze_continues_past_bad_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let good = dir.path().join("field.png");
    image::RgbImage::from_pixel(16, 16, image::Rgb([40, 160, 50]))
        .save(&good)
        .unwrap();
    let bad = dir.path().join("missing.png");

    let output = landwatch(dir.path())
        .args(["analyze", "--json"])
        .arg(&bad)
        .arg(&good)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["predicted_class"], "Forest");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.png"));
    assert!(stderr.contains("1 of 2 image(s) could not be analyzed"));
}

#[test]
fn test_monitor_simulated_cycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = landwatch(dir.path()).args(["monitor", "--json"]).output().unwrap();
    assert!(output.status.success());

    let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let summaries = summaries.as_array().unwrap();
    assert_eq!(summaries.len(), 6);
    assert_eq!(summaries[0]["region_name"], "Amazon Basin");
    assert!(summaries.iter().all(|s| s["mode"] == "simulated"));
}

#[test]
fn test_monitor_writes_alert_log() {
    let dir = tempfile::TempDir::new().unwrap();
    let log = dir.path().join("alerts.jsonl");
    std::fs::write(
        dir.path().join("landwatch.toml"),
        format!(
            "[thresholds]\nndvi_alert_threshold = 2.0\n\n[logging]\nalert_log_path = {:?}\n",
            log.display().to_string()
        ),
    )
    .unwrap();

    landwatch(dir.path()).arg("monitor").assert().success();

    // Every region is below an NDVI threshold of 2.0.
    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.lines().count() >= 6);
    assert!(content.contains("Vegetation stress in Lake Chad"));
}
