use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn metrix() -> Command {
    Command::cargo_bin("metrix").unwrap()
}

fn temp_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("metrix-cli-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_presets_lists_every_preset() {
    metrix()
        .arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("default"))
        .stdout(predicate::str::contains("precise"))
        .stdout(predicate::str::contains("custom"))
        .stdout(predicate::str::contains("disabled"));
}

#[test]
fn test_presets_show_prints_yaml() {
    metrix()
        .args(["presets", "--show", "precise"])
        .assert()
        .success()
        .stdout(predicate::str::contains("error: 0.001"))
        .stdout(predicate::str::contains("gauge: precise"));
}

#[test]
fn test_presets_show_rejects_unknown_name() {
    metrix()
        .args(["presets", "--show", "fancy"])
        .assert()
        .failure();
}

#[test]
fn test_validate_accepts_valid_config() {
    let path = temp_config(
        "valid.yaml",
        "recorder:\n  separator: \".\"\naggregator:\n  timer:\n    reducer: histogram\n    max: 10m\n",
    );

    metrix()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"))
        .stdout(predicate::str::contains("max 600000"));

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_validate_rejects_invalid_config() {
    let path = temp_config(
        "invalid.json",
        r#"{"aggregator": {"histogram": {"reducer": "histogram", "error": 0}}}"#,
    );

    metrix()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Config is invalid"));

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_bench_json_output() {
    let output = metrix()
        .args([
            "--quiet",
            "bench",
            "--iterations",
            "20",
            "--warm-up",
            "0",
            "--tries",
            "1",
            "--metrics",
            "2",
            "--points",
            "5",
            "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["unit"], "µs");
    let names: Vec<&str> = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert!(names.contains(&"start/stop timer (bucket)"));
    assert!(names.contains(&"aggregator report (streaming histo)"));
}
