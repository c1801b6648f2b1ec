use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn srrctl() -> Command {
    let mut cmd = Command::cargo_bin("srrctl").unwrap();
    cmd.env_remove("SRRCTL_ROOT").env("RUST_LOG", "warn");
    cmd
}

/// A project whose runtimes do not exist, so checks fail fast.
fn project_without_runtimes() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("srrctl.toml"),
        r#"
[runtime]
python = "srrctl-test-no-python"
node = "srrctl-test-no-node"
"#,
    )
    .unwrap();
    dir
}

#[test]
fn help_exits_zero() {
    srrctl()
        .arg("help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cleanup"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn uppercase_help_is_accepted() {
    srrctl().arg("HELP").assert().success();
}

#[test]
fn unknown_command_exits_one() {
    srrctl().arg("bogus").assert().code(1);
}

#[test]
fn check_lists_every_missing_item() {
    let project = project_without_runtimes();
    srrctl()
        .args(["-C", project.path().to_str().unwrap(), "CHECK"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[!!] fastapi"))
        .stdout(predicate::str::contains("[!!] Node.js"))
        .stdout(predicate::str::contains("[!!] ai_models/training_data.pkl missing"))
        .stdout(predicate::str::contains("[!!] metadata.json missing"))
        .stderr(predicate::str::contains("environment check failed"));
}

#[test]
fn check_reports_present_model_files() {
    let project = project_without_runtimes();
    let models = project.path().join("models");
    std::fs::create_dir_all(models.join("config")).unwrap();
    std::fs::write(models.join("metadata.json"), "{}").unwrap();
    std::fs::write(models.join("config/srr_rules.json"), "{}").unwrap();

    srrctl()
        .args(["-C", project.path().to_str().unwrap(), "check"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[ok] metadata.json"))
        .stdout(predicate::str::contains("[ok] config/srr_rules.json"))
        .stdout(predicate::str::contains("[!!] config/keyword_rules.json missing"));
}

#[test]
fn missing_config_file_exits_one() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    srrctl()
        .args(["-f", missing.to_str().unwrap(), "check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn invalid_duration_exits_one() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("srrctl.toml"), "[timing]\ngrace = \"soon\"\n").unwrap();
    srrctl()
        .args(["-C", dir.path().to_str().unwrap(), "check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config file"));
}
