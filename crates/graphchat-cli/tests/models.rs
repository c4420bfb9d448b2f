use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_models_lists_providers_and_marks_default() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("graphchat")
        .env("GRAPHCHAT_HOME", dir.path())
        .env_remove("GRAPHCHAT_MODEL")
        .arg("models")
        .assert()
        .success()
        .stdout(predicate::str::contains("* openai"))
        .stdout(predicate::str::contains("llama-3.3-70b-versatile"))
        .stdout(predicate::str::contains("gpt-oss:120b"));
}

#[test]
fn test_models_use_saves_choice() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "base_url = \"http://graph.local:8000\"\n").unwrap();

    cargo_bin_cmd!("graphchat")
        .env("GRAPHCHAT_HOME", dir.path())
        .args(["models", "use", "Anthropic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default model set to anthropic"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("model = \"anthropic\""));
    assert!(contents.contains("base_url = \"http://graph.local:8000\""));

    cargo_bin_cmd!("graphchat")
        .env("GRAPHCHAT_HOME", dir.path())
        .env_remove("GRAPHCHAT_MODEL")
        .args(["models", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* anthropic"));
}

#[test]
fn test_models_use_rejects_unknown_id() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("graphchat")
        .env("GRAPHCHAT_HOME", dir.path())
        .args(["models", "use", "gemini"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown model 'gemini'"));

    assert!(!dir.path().join("config.toml").exists());
}
