use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn logdeck(home: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("logdeck");
    cmd.env("LOGDECK_HOME", home)
        .env_remove("LOGDECK_CONFIG")
        .arg("--no-color");
    cmd
}

#[test]
fn test_eval_prints_result() {
    let dir = tempdir().unwrap();

    logdeck(dir.path())
        .args(["eval", "1 + 1"])
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn test_eval_prints_console_output_before_result() {
    let dir = tempdir().unwrap();

    logdeck(dir.path())
        .args(["eval", "console.log('side'); 5"])
        .assert()
        .success()
        .stdout("side\n5\n");
}

#[test]
fn test_eval_thrown_error_exits_nonzero() {
    let dir = tempdir().unwrap();

    logdeck(dir.path())
        .args(["eval", "throw new Error('boom')"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Uncaught Error: boom"));
}

#[test]
fn test_run_requires_a_terminal() {
    let dir = tempdir().unwrap();

    logdeck(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("interactive terminal"));
}
