use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("logdeck")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("eval"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("--no-color"));
}

#[test]
fn test_run_help_shows_demo_flag() {
    cargo_bin_cmd!("logdeck")
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--demo"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("logdeck")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_verbosity_is_rejected() {
    cargo_bin_cmd!("logdeck")
        .args(["--verbosity", "loud", "eval", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown verbosity"));
}
