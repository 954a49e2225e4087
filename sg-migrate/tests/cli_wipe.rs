use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use ruleset_core::{load_snapshot, save_snapshot, Environment, Rule, RuleSet, Target};
use tempfile::{tempdir, TempDir};

fn path_as_str(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

fn setup(dry_run: bool) -> TempDir {
    let dir = tempdir().expect("tempdir");
    let mut web = RuleSet::new("sg-50", "web", "vpc-dst");
    web.inbound.push(Rule::tcp(80, vec![Target::cidr("0.0.0.0/0")]));
    let mut other = RuleSet::new("sg-60", "other", "vpc-other");
    other
        .inbound
        .push(Rule::tcp(22, vec![Target::cidr("10.0.0.0/8")]));
    let env = Environment::new(100)
        .with_network("vpc-dst")
        .with_network("vpc-other")
        .with_rule_set(web)
        .with_rule_set(other);
    save_snapshot(&env, &dir.path().join("destination.json")).expect("write snapshot");
    save_snapshot(&Environment::default(), &dir.path().join("source.json"))
        .expect("write source");

    fs::write(
        dir.path().join("config.toml"),
        format!(
            r#"DryRun = {dry_run}
[Source]
Region = "us-east-1"
Snapshot = "source.json"
[Destination]
AccessKey = "AKIADST"
Region = "eu-west-1"
NetworkID = "vpc-dst"
Snapshot = "destination.json"
"#
        ),
    )
    .expect("write config");
    dir
}

fn wipe(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sg-migrate"));
    cmd.env("NO_COLOR", "1")
        .arg("--config")
        .arg(path_as_str(&dir.path().join("config.toml")))
        .arg("wipe");
    cmd
}

fn destination(dir: &TempDir) -> Environment {
    load_snapshot(&dir.path().join("destination.json")).expect("read snapshot")
}

#[test]
fn wipe_revokes_rules_in_destination_network_after_two_confirmations() {
    let dir = setup(false);

    wipe(&dir)
        .write_stdin("y\nyes\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("AKIADST"))
        .stdout(predicate::str::contains("rule_sets=2 revoked_rules=3"))
        .stdout(predicate::str::contains("- web sg-50 rules=1"));

    let env = destination(&dir);
    assert_eq!(env.rule_set("sg-50").expect("web").rule_count(), 0);
    assert_eq!(env.rule_set("sg-60").expect("other").rule_count(), 1);
}

#[test]
fn all_networks_flag_widens_the_wipe() {
    let dir = setup(false);

    wipe(&dir)
        .arg("--all-networks")
        .write_stdin("y\ny\n")
        .assert()
        .success();

    let env = destination(&dir);
    assert!(env.rule_sets.iter().all(|rs| rs.rule_count() == 0));
}

#[test]
fn refusing_second_confirmation_aborts() {
    let dir = setup(false);
    let before = fs::read(dir.path().join("destination.json")).expect("read");

    wipe(&dir)
        .write_stdin("y\nn\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("wipe was not confirmed"));

    assert_eq!(
        before,
        fs::read(dir.path().join("destination.json")).expect("read")
    );
}

#[test]
fn dry_run_wipe_only_plans() {
    let dir = setup(true);
    let before = fs::read(dir.path().join("destination.json")).expect("read");

    wipe(&dir)
        .write_stdin("y\ny\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("- planned revoke 1 inbound rules from sg-50"))
        .stdout(predicate::str::contains("dry_run=true"));

    assert_eq!(
        before,
        fs::read(dir.path().join("destination.json")).expect("read")
    );
}
