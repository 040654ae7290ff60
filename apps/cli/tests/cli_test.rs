//! Integration tests for the `polyglot` command.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A command running in an empty directory, isolated from stray config.
fn polyglot(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("polyglot").unwrap();
    cmd.current_dir(dir.path()).env_remove("POLYGLOT_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    polyglot(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("translate"))
        .stdout(predicate::str::contains("route"));
}

#[test]
fn test_languages() {
    let dir = TempDir::new().unwrap();
    polyglot(&dir)
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Supported Languages (5)"))
        .stdout(predicate::str::contains("Sinhala"))
        .stdout(predicate::str::contains("Mandarin"));
}

#[test]
fn test_languages_json() {
    let dir = TempDir::new().unwrap();
    let output = polyglot(&dir).args(["languages", "--json"]).output().unwrap();
    assert!(output.status.success());

    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let codes: Vec<&str> =
        body["languages"].as_array().unwrap().iter().map(|l| l["code"].as_str().unwrap()).collect();
    assert_eq!(codes, ["en", "ja", "zh", "hi", "si"]);
}

#[test]
fn test_route_specialized_fallback_and_pass_through() {
    let dir = TempDir::new().unwrap();
    polyglot(&dir)
        .args(["route", "en", "ja"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Helsinki-NLP/opus-mt-en-jap"))
        .stdout(predicate::str::contains("specialized"));

    polyglot(&dir)
        .args(["route", "en", "si"])
        .assert()
        .success()
        .stdout(predicate::str::contains("facebook/nllb-200-1.3B"))
        .stdout(predicate::str::contains("fallback"));

    polyglot(&dir)
        .args(["route", "hi", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pass-through"));
}

#[test]
fn test_route_invalid_language() {
    let dir = TempDir::new().unwrap();
    polyglot(&dir)
        .args(["route", "en", "fr"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported target language: fr"));
}

#[test]
fn test_translate_with_mock_backend() {
    let dir = TempDir::new().unwrap();
    polyglot(&dir)
        .args(["translate", "Hello, world!", "--from", "en", "--to", "ja"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ja] Hello, world!"))
        .stderr(predicate::str::contains("Helsinki-NLP/opus-mt-en-jap"));
}

#[test]
fn test_translate_json() {
    let dir = TempDir::new().unwrap();
    let output = polyglot(&dir)
        .args(["translate", "Hello", "--from", "en", "--to", "si", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["translated_text"], "[si] Hello");
    assert_eq!(body["model_used"], "facebook/nllb-200-1.3B");
    assert_eq!(body["source_lang"], "en");
    assert_eq!(body["target_lang"], "si");
}

#[test]
fn test_translate_empty_text_fails() {
    let dir = TempDir::new().unwrap();
    polyglot(&dir)
        .args(["translate", "   ", "--from", "en", "--to", "ja"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Text cannot be empty"));
}

#[test]
fn test_config_file_registry_override() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("custom.toml");
    std::fs::write(
        &config_path,
        r#"
[registry]
fallback_model = "facebook/nllb-200-distilled-600M"
specialized = [{ source = "ja", target = "en", model = "Helsinki-NLP/opus-mt-ja-en" }]
"#,
    )
    .unwrap();

    polyglot(&dir)
        .arg("--config")
        .arg(&config_path)
        .args(["route", "en", "ja"])
        .assert()
        .success()
        .stdout(predicate::str::contains("facebook/nllb-200-distilled-600M"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("polyglot.toml"), "[limits]\nmax_text_length = 0\n").unwrap();

    polyglot(&dir)
        .arg("languages")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_text_length"));
}

#[test]
fn test_configured_log_filter_is_used() {
    let dir = TempDir::new().unwrap();
    let args = ["translate", "Hello", "--from", "en", "--to", "ja"];

    polyglot(&dir)
        .args(args)
        .assert()
        .success()
        .stderr(predicate::str::contains("Loading model").not());

    std::fs::write(
        dir.path().join("polyglot.toml"),
        "[logging]\nfilter = \"polyglot_models=info\"\n",
    )
    .unwrap();
    polyglot(&dir).args(args).assert().success().stderr(predicate::str::contains("Loading model"));

    // The flag still wins over the file.
    polyglot(&dir)
        .args(["--log-level", "error"])
        .args(args)
        .assert()
        .success()
        .stderr(predicate::str::contains("Loading model").not());
}
