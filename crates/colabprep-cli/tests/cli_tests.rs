//! Integration tests for the `prepare_notebooks_for_colab` binary
//!
//! Each test runs the real binary against temp directories with `HOME`
//! pointed at an empty directory so no user config leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const NOTEBOOK: &str = r#"{
 "cells": [
  {
   "cell_type": "code",
   "execution_count": 4,
   "metadata": {},
   "outputs": [{"name": "stdout", "output_type": "stream", "text": ["ok\n"]}],
   "source": ["from PIL import Image\n", "img = Image.open('./images/image_1.jpg')"]
  }
 ],
 "metadata": {"kernelspec": {"display_name": "Python 3", "language": "python", "name": "python3"}},
 "nbformat": 4,
 "nbformat_minor": 4
}"#;

/// Helper to create a CLI command isolated from the caller's config files
fn cli(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_prepare_notebooks_for_colab"));
    cmd.env("HOME", home).env_remove("RUST_LOG").current_dir(home);
    cmd
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    cli(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--input-dir"))
        .stdout(predicate::str::contains("--output-dir"));
}

#[test]
fn test_missing_required_args() {
    let home = TempDir::new().unwrap();
    cli(home.path())
        .arg("--input-dir")
        .arg("notebooks")
        .assert()
        .code(2);
}

#[test]
fn test_basic_run() {
    let home = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write(input.path(), "migrating/torchvision.ipynb", NOTEBOOK);

    cli(home.path())
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .arg("--base-url")
        .arg("https://example.org/repo")
        .assert()
        .success()
        .stderr(predicate::str::contains("Created:"))
        .stderr(predicate::str::contains("torchvision.ipynb"));

    let out = fs::read_to_string(output.path().join("migrating/torchvision.ipynb")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let cells = value["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 2);
    assert_eq!(
        cells[0]["source"][1],
        "!pip install -q -U albumentations"
    );
    assert_eq!(
        cells[1]["source"][1],
        "img = Image.open('https://example.org/repo/images/image_1.jpg')"
    );
    // Outputs kept unless asked otherwise
    assert_eq!(cells[1]["execution_count"], 4);
}

#[test]
fn test_rerun_reports_unchanged() {
    let home = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write(input.path(), "a.ipynb", NOTEBOOK);

    for _ in 0..2 {
        cli(home.path())
            .arg("--input-dir")
            .arg(input.path())
            .arg("--output-dir")
            .arg(output.path())
            .assert()
            .success();
    }
    let first = fs::read(output.path().join("a.ipynb")).unwrap();

    cli(home.path())
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .arg("--check")
        .assert()
        .success()
        .stderr(predicate::str::contains("Unchanged:"));

    assert_eq!(fs::read(output.path().join("a.ipynb")).unwrap(), first);
}

#[test]
fn test_check_fails_on_stale_output() {
    let home = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write(input.path(), "a.ipynb", NOTEBOOK);

    cli(home.path())
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .arg("--check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("out of date"));

    assert!(!output.path().join("a.ipynb").exists());
}

#[test]
fn test_parse_error_names_file_and_fails() {
    let home = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write(input.path(), "good.ipynb", NOTEBOOK);
    write(input.path(), "broken.ipynb", "{ \"cells\": ");

    cli(home.path())
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("broken.ipynb"))
        .stderr(predicate::str::contains("Failed to parse notebook"));

    assert!(output.path().join("good.ipynb").exists());
    assert!(!output.path().join("broken.ipynb").exists());
}

#[test]
fn test_missing_input_dir_exit_code() {
    let home = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    cli(home.path())
        .arg("--input-dir")
        .arg(home.path().join("does-not-exist"))
        .arg("--output-dir")
        .arg(output.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Input directory not found"));
}

#[test]
fn test_invalid_package_exit_code() {
    let home = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    cli(home.path())
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .arg("--package")
        .arg("numpy && curl evil")
        .assert()
        .code(2);
}

#[test]
fn test_project_config_is_used() {
    let home = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write(input.path(), "a.ipynb", NOTEBOOK);
    write(
        home.path(),
        ".colabprep.toml",
        "[setup]\npackages = [\"timm\"]\n\n[output]\nclear_outputs = true\n",
    );

    cli(home.path())
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .arg("--quiet")
        .assert()
        .success()
        .stderr(predicate::str::is_empty());

    let out = fs::read_to_string(output.path().join("a.ipynb")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["cells"][0]["source"][1], "!pip install -q -U timm");
    assert_eq!(value["cells"][1]["outputs"], serde_json::json!([]));
    assert!(value["cells"][1]["execution_count"].is_null());
}

#[test]
fn test_explicit_config_must_parse() {
    let home = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let config = home.path().join("custom.toml");
    fs::write(&config, "[setup\n").unwrap();

    cli(home.path())
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let home = TempDir::new().unwrap();
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write(input.path(), "sub/a.ipynb", NOTEBOOK);

    cli(home.path())
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stderr(predicate::str::contains("would be created"));

    assert!(!output.path().join("sub").exists());
}

#[test]
fn test_output_inside_current_input_dir() {
    let home = TempDir::new().unwrap();
    write(home.path(), "a.ipynb", NOTEBOOK);

    for _ in 0..2 {
        cli(home.path())
            .arg("--input-dir")
            .arg(".")
            .arg("--output-dir")
            .arg("colab")
            .assert()
            .success();
    }

    assert!(home.path().join("colab/a.ipynb").exists());
    assert!(!home.path().join("colab/colab").exists());
}
