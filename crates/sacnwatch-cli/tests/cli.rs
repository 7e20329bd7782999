use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("sacnwatch"))
}

#[test]
fn help_lists_listen_only() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("listen").and(contains("replay").not()));
    cmd().arg("listen").arg("--help").assert().success();
}

#[test]
fn offline_capture_mode_is_not_offered() {
    cmd()
        .arg("replay")
        .arg("show.pcap")
        .assert()
        .failure()
        .stderr(contains("unrecognized subcommand"));
}

#[test]
fn listen_rejects_reversed_universe_range() {
    cmd()
        .arg("listen")
        .arg("--universes")
        .arg("9-3")
        .assert()
        .failure()
        .stderr(contains("empty universe range"));
}

#[test]
fn include_channels_requires_json() {
    cmd()
        .arg("listen")
        .arg("--include-channels")
        .assert()
        .failure()
        .stderr(contains("--json"));
}

#[test]
fn busy_port_shows_error_and_hint() {
    // bound without SO_REUSEADDR, so the listener cannot share it
    let blocker = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).expect("bind blocker");
    let port = blocker.local_addr().expect("local addr").port();

    cmd()
        .arg("listen")
        .arg("--port")
        .arg(port.to_string())
        .arg("--universes")
        .arg("1")
        .arg("--duration-secs")
        .arg("1")
        .timeout(Duration::from_secs(10))
        .assert()
        .code(2)
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn listen_emits_json_lines_until_duration_elapses() {
    let assert = cmd()
        .arg("listen")
        .arg("--port")
        .arg("0")
        .arg("--universes")
        .arg("1")
        .arg("--interval-ms")
        .arg("100")
        .arg("--duration-secs")
        .arg("1")
        .arg("--json")
        .timeout(Duration::from_secs(10))
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(!lines.is_empty());
    for line in lines {
        let json: Value = serde_json::from_str(line).expect("valid json line");
        assert_eq!(json["tool"]["name"], "sacnwatch");
        assert_eq!(json["dropped_packets"], 0);
        assert!(json["universes"].as_array().expect("universes").is_empty());
    }
}

#[test]
fn listen_prints_table_by_default() {
    cmd()
        .arg("listen")
        .arg("--port")
        .arg("0")
        .arg("--universes")
        .arg("1")
        .arg("--interval-ms")
        .arg("100")
        .arg("--duration-secs")
        .arg("1")
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(contains("UNIV").and(contains("no universes seen yet")));
}
