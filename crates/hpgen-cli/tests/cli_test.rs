use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const GUILD_YML: &str = "\
noisy:
  flags:
    noise: 0.1
    x: 1.0
";

fn hpgen() -> Command {
    Command::cargo_bin("hpgen").unwrap()
}

fn workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("guild.yml"), GUILD_YML).unwrap();
    tmp
}

#[test]
fn test_help_lists_scenarios() {
    hpgen()
        .arg("help")
        .assert()
        .success()
        .stdout(predicate::str::contains("default scenario"))
        .stdout(predicate::str::contains("latent-metrics-3"));
}

#[test]
fn test_invalid_scenario_exits_2() {
    hpgen()
        .arg("bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid scenario 'bogus'"))
        .stderr(predicate::str::contains("hpgen help"));
}

#[test]
fn test_missing_scenario_is_usage_error() {
    hpgen().assert().failure();
}

#[test]
fn test_default_scenario_writes_event_file() {
    let tmp = workspace();
    let logdir = tmp.path().join("logs");
    hpgen()
        .current_dir(tmp.path())
        .arg("default")
        .arg(&logdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote summaries to"));

    let files: Vec<_> = fs::read_dir(&logdir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("events.out.tfevents."));
}

#[test]
fn test_show_prints_record_table() {
    let tmp = workspace();
    hpgen()
        .current_dir(tmp.path())
        .args(["no-experiment", "logs", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("session_start"))
        .stdout(predicate::str::contains("\"noise\":0.1"));
}

#[test]
fn test_runs_honours_run_count() {
    let tmp = workspace();
    let logdir = tmp.path().join("logs");
    hpgen()
        .current_dir(tmp.path())
        .arg("runs")
        .arg(&logdir)
        .args(["--runs", "2", "--seed", "3"])
        .assert()
        .success();
    assert_eq!(fs::read_dir(&logdir).unwrap().count(), 2);
}

#[test]
fn test_missing_guild_file_fails() {
    let tmp = TempDir::new().unwrap();
    hpgen()
        .current_dir(tmp.path())
        .args(["default", "logs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("guild file not found"));
}

#[test]
fn test_unknown_operation_fails() {
    let tmp = workspace();
    hpgen()
        .current_dir(tmp.path())
        .args(["default", "logs", "--operation", "train"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("train"));
}

#[test]
fn test_list_flag_value_fails() {
    let tmp = workspace();
    fs::write(tmp.path().join("flags.yml"), "x: [1, 2]\n").unwrap();
    hpgen()
        .current_dir(tmp.path())
        .args(["default", "logs", "--flags", "flags.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported value"));
}

#[test]
fn test_label_is_shown_in_group_name() {
    let tmp = workspace();
    hpgen()
        .current_dir(tmp.path())
        .args(["default", "logs", "--label", "baseline", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("noisy baseline"));
}

#[test]
fn test_explicit_guild_file_path() {
    let tmp = workspace();
    let conf = tmp.path().join("conf");
    fs::create_dir(&conf).unwrap();
    fs::rename(tmp.path().join("guild.yml"), conf.join("ops.yml")).unwrap();
    hpgen()
        .current_dir(tmp.path())
        .args(["no-experiment", "logs", "--guildfile", "conf/ops.yml"])
        .assert()
        .success();
}

#[test]
fn test_grid_scenario_runs() {
    let tmp = workspace();
    let logdir = tmp.path().join("logs");
    hpgen()
        .current_dir(tmp.path())
        .arg("grid")
        .arg(&logdir)
        .args(["--seed", "5"])
        .assert()
        .success();
    assert_eq!(fs::read_dir(&logdir).unwrap().count(), 18);
}
