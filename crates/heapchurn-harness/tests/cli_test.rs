//! Integration test: heapchurn CLI
//!
//! Validates that:
//! 1. `run --format json` prints a parseable report whose metrics follow the cadence.
//! 2. Plain output prints one line per record, the run time, then the stats section.
//! 3. `--log` writes a JSONL log that validates, plus a SHA-256 artifact index.
//! 4. `compare` runs each backend in a child process with the same seed.
//! 5. Invalid configuration and bad logs exit non-zero.
//!
//! Run: cargo test -p heapchurn-harness --test cli_test

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use heapchurn_harness::RunReport;
use sha2::Digest;

fn unique_tmp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after UNIX_EPOCH")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn sha256_hex(path: &Path) -> String {
    let bytes = std::fs::read(path).expect("read artifact for sha");
    let digest = sha2::Sha256::digest(&bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn heapchurn() -> Command {
    Command::new(env!("CARGO_BIN_EXE_heapchurn"))
}

const SMALL: &[&str] = &[
    "--iterations",
    "3000",
    "--report-interval",
    "1000",
    "--max-allocations",
    "200",
    "--seed",
    "0xC0FFEE",
];

#[test]
fn run_json_report_parses() {
    let output = heapchurn()
        .args(["run", "--format", "json"])
        .args(SMALL)
        .output()
        .expect("spawn heapchurn");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report = RunReport::from_json(&output.stdout).expect("stdout is a JSON report");
    assert_eq!(report.allocator, "system");
    assert_eq!(report.seed, 0xC0FFEE);
    let steps: Vec<u64> = report.metrics.iter().map(|m| m.step).collect();
    assert_eq!(steps, [0, 1000, 2000]);
    for m in &report.metrics {
        assert!(m.live_allocations <= 200);
        assert!(
            m.largest_free_block == 0
                || (1024..=10 * 1024 * 1024).contains(&m.largest_free_block)
        );
    }
    let c = &report.summary.counters;
    assert_eq!(c.steps, 3000);
    assert_eq!(c.allocations, c.frees + c.drained);
}

#[test]
fn run_plain_prints_metrics_then_footer() {
    let output = heapchurn()
        .args(["run", "--no-stats"])
        .args(SMALL)
        .output()
        .expect("spawn heapchurn");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[0].starts_with("step 0 | live allocations: "));
    assert!(lines[1].starts_with("step 1000 |"));
    assert!(lines[2].starts_with("step 2000 |"));
    assert!(lines[3].starts_with("Total run time: "));
    assert!(lines[3].ends_with(" ms"));
    assert!(stdout.contains("=== Final system stats ==="));
    assert!(stdout.contains("statistics unavailable."));
}

#[test]
fn run_log_is_indexed_and_valid() {
    let dir = unique_tmp_dir("heapchurn-cli");
    let log = dir.join("run.jsonl");

    let output = heapchurn()
        .args(["run", "--format", "json"])
        .args(SMALL)
        .arg("--log")
        .arg(&log)
        .output()
        .expect("spawn heapchurn");
    assert!(output.status.success());
    let report = RunReport::from_json(&output.stdout).unwrap();

    let index: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("run.index.json")).unwrap())
            .unwrap();
    assert_eq!(index["run_id"], "system-0000000000c0ffee");
    assert_eq!(index["artifacts"][0]["kind"], "structured_log");
    assert_eq!(index["artifacts"][0]["sha256"], sha256_hex(&log));

    let content = std::fs::read_to_string(&log).unwrap();
    let metrics_events = content
        .lines()
        .filter(|l| l.contains("\"event\":\"metrics\""))
        .count();
    assert_eq!(metrics_events, report.metrics.len());

    let validated = heapchurn()
        .args(["validate-log", "--log"])
        .arg(&log)
        .output()
        .unwrap();
    assert!(
        validated.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&validated.stderr)
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn run_markdown_format() {
    let output = heapchurn()
        .args(["run", "--format", "markdown", "--no-stats"])
        .args(SMALL)
        .output()
        .unwrap();
    assert!(output.status.success());
    let md = String::from_utf8_lossy(&output.stdout);
    assert!(md.starts_with("# heapchurn run: system"));
    assert!(md.contains("| 2000 |"));
    assert!(!md.contains("## Allocator statistics"));
}

#[test]
fn same_seed_gives_same_workload() {
    let run = || {
        let output = heapchurn()
            .args(["run", "--format", "json"])
            .args(SMALL)
            .output()
            .unwrap();
        RunReport::from_json(&output.stdout).unwrap()
    };
    let (a, b) = (run(), run());
    let shape = |r: &RunReport| {
        r.metrics
            .iter()
            .map(|m| (m.live_allocations, m.tracked_bytes))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&a), shape(&b));
    assert_eq!(a.summary.counters.frees, b.summary.counters.frees);
}

#[test]
fn compare_renders_one_row_per_backend() {
    let output = heapchurn()
        .args(["compare", "--allocators", "system"])
        .args(SMALL)
        .output()
        .expect("spawn heapchurn");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let md = String::from_utf8_lossy(&output.stdout);
    assert!(md.starts_with("# heapchurn allocator comparison"));
    assert!(md.contains("seed=0x0000000000C0FFEE"));
    assert_eq!(md.lines().filter(|l| l.starts_with("| system |")).count(), 1);
}

#[test]
fn probe_prints_outcome() {
    let output = heapchurn()
        .args(["probe", "--format", "json", "--probe-low", "1024", "--probe-high", "65536"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["largest_block"], 65536);
    assert!(outcome["attempts"].as_u64().unwrap() >= 1);
}

#[test]
fn invalid_configuration_is_rejected() {
    for args in [
        &["--min-size", "300", "--max-size", "200"][..],
        &["--min-size", "0"][..],
        &["--report-interval", "0"][..],
        &["--probe-low", "4096", "--probe-high", "1024"][..],
        &["--seed", "0xNOPE"][..],
    ] {
        let output = heapchurn()
            .args(["run", "--iterations", "10"])
            .args(args)
            .output()
            .unwrap();
        assert!(!output.status.success(), "args {args:?} should be rejected");
        assert!(output.stdout.is_empty(), "args {args:?} must not start the run");
    }

    let output = heapchurn()
        .args(["run", "--allocator", "hoard", "--iterations", "10"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn validate_log_rejects_bad_file() {
    let dir = unique_tmp_dir("heapchurn-cli-bad");
    let log = dir.join("bad.jsonl");
    std::fs::write(&log, "{\"event\":\"metrics\"}\n").unwrap();
    let output = heapchurn()
        .args(["validate-log", "--log"])
        .arg(&log)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("trace_id"));
    std::fs::remove_dir_all(&dir).ok();
}
