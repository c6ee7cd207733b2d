use std::process::Command;

use serde::Deserialize;
use tempfile::tempdir;

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct SummaryDto {
    frame_count: usize,
    generations_simulated: u64,
    final_generation: u64,
    final_total: usize,
    total_births: usize,
    total_deaths: usize,
    total_cooperations: usize,
}

#[derive(Debug, Deserialize)]
struct InitialDto {
    generation: u64,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct ReportDto {
    initial: InitialDto,
    frames: Vec<serde_json::Value>,
    summary: SummaryDto,
}

fn ethnosim() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ethnosim"));
    cmd.env("RUST_LOG", "off")
        .env_remove("ETHNOSIM_CONFIG")
        .env_remove("ETHNOSIM_SEED");
    cmd
}

#[test]
fn headless_run_writes_a_report() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("reports/headless.json");
    let status = ethnosim()
        .args(["headless", "--ticks", "90", "--sample-every", "30"])
        .args(["--width", "16", "--height", "16", "--seed", "7"])
        .args(["--preset", "equal-mix", "--fill", "0.5"])
        .arg("--report")
        .arg(&path)
        .status()
        .expect("failed to run ethnosim binary");
    assert!(status.success(), "headless run failed");

    let raw = std::fs::read_to_string(&path).expect("report written");
    let report: ReportDto = serde_json::from_str(&raw).expect("report parses");
    assert_eq!(report.frames.len(), 3);
    assert_eq!(report.summary.final_generation, 90);
    assert_eq!(report.summary.generations_simulated, 90);
    assert!(report.summary.final_total <= 256);
}

#[test]
fn validate_prints_a_verdict() {
    let output = ethnosim()
        .args(["validate", "--runs", "2", "--ticks", "40", "--window", "10"])
        .args(["--width", "10", "--height", "10", "--seed", "3"])
        .output()
        .expect("failed to run ethnosim binary");
    assert!(output.status.success(), "validate exits cleanly without --strict");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run  1:"));
    assert!(stdout.contains("Run  2:"));
    assert!(stdout.contains("PASS") || stdout.contains("FAIL"));
}

#[test]
fn strict_validation_fails_below_threshold() {
    let status = ethnosim()
        .args(["validate", "--runs", "1", "--ticks", "5", "--threshold", "1.5", "--strict"])
        .args(["--width", "6", "--height", "6", "--seed", "1"])
        .status()
        .expect("failed to run ethnosim binary");
    assert!(!status.success());
}

#[test]
fn invalid_dimensions_are_rejected() {
    let status = ethnosim()
        .args(["headless", "--ticks", "1", "--width", "0"])
        .status()
        .expect("failed to run ethnosim binary");
    assert!(!status.success());
}

#[test]
fn short_real_time_run_completes() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("run.json");
    let status = ethnosim()
        .args(["run", "--seconds", "0.2", "--speed-index", "9"])
        .args(["--width", "12", "--height", "12", "--seed", "11"])
        .arg("--report")
        .arg(&path)
        .status()
        .expect("failed to run ethnosim binary");
    assert!(status.success(), "real-time run failed");
    let report: ReportDto =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("report")).expect("parse");
    assert!(report.summary.final_generation > 0);
}

#[test]
fn real_time_report_starts_from_the_seeded_grid() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("seeded.json");
    let status = ethnosim()
        .args(["run", "--seconds", "0.2", "--speed-index", "5"])
        .args(["--width", "10", "--height", "10", "--seed", "3"])
        .args(["--preset", "equal-mix"])
        .arg("--report")
        .arg(&path)
        .status()
        .expect("failed to run ethnosim binary");
    assert!(status.success(), "seeded real-time run failed");
    let report: ReportDto =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("report")).expect("parse");
    assert_eq!(report.initial.generation, 0);
    assert_eq!(report.initial.total, 100);
    assert!(report.summary.final_generation > 0);
    assert!(report.summary.total_cooperations > 0);
}
