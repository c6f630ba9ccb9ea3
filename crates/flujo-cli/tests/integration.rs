//! Integration tests for flujo-cli.
//!
//! Cover binary invocation of the non-interactive subcommands and patch
//! validation end to end through the `check` command.

use std::io::Write;
use std::process::Command;

/// Helper to get the path to the `flujo` binary built by cargo.
fn flujo_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_flujo"))
}

fn write_patch(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("failed to create temp patch");
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn cli_policies_lists_all_policies() {
    let output = flujo_bin()
        .arg("policies")
        .output()
        .expect("failed to run flujo policies");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for policy in ["dynamic", "static-bfs", "static-fixed", "static-topo"] {
        assert!(stdout.contains(policy), "missing policy '{policy}'");
    }
}

#[test]
fn cli_check_accepts_a_valid_patch() {
    let patch = write_patch(
        r#"
[settings]
scheduling = "static-topo"

[[nodes]]
id = "lfo"
kind = "sequence"
values = [1.0, 2.0]
loop = true

[[nodes]]
id = "out"
kind = "relay"

[[cables]]
source = "lfo:0"
sink = "out:0"
kind = "immediate-strict"
"#,
    );

    let output = flujo_bin()
        .arg("check")
        .arg(patch.path())
        .output()
        .expect("failed to run flujo check");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ok: 2 nodes, 1 cables"));
    assert!(stdout.contains("order:"));
}

#[test]
fn cli_check_rejects_an_undelayed_cycle() {
    let patch = write_patch(
        r#"
[[nodes]]
id = "a"
kind = "sum"

[[nodes]]
id = "b"
kind = "sum"

[[cables]]
source = "a:0"
sink = "b:0"
kind = "immediate-strict"

[[cables]]
source = "b:0"
sink = "a:0"
kind = "immediate-glutton"
"#,
    );

    let output = flujo_bin()
        .arg("check")
        .arg(patch.path())
        .output()
        .expect("failed to run flujo check");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not schedulable"));
}

#[test]
fn cli_check_accepts_a_delayed_feedback_loop() {
    let patch = write_patch(
        r#"
[settings]
scheduling = "static-topo"

[[nodes]]
id = "a"
kind = "sum"

[[nodes]]
id = "b"
kind = "sum"

[[cables]]
source = "a:0"
sink = "b:0"
kind = "immediate-strict"

[[cables]]
source = "b:0"
sink = "a:0"
kind = "delayed-strict"
"#,
    );

    let output = flujo_bin()
        .arg("check")
        .arg(patch.path())
        .output()
        .expect("failed to run flujo check");
    assert!(output.status.success());
}

#[test]
fn cli_check_reports_parse_errors() {
    let patch = write_patch("this is not a patch");
    let output = flujo_bin()
        .arg("check")
        .arg(patch.path())
        .output()
        .expect("failed to run flujo check");
    assert!(!output.status.success());
}
