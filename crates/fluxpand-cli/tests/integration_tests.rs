//! Integration tests for the fluxpand binary

use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Run fluxpand with the given args and stdin
fn fluxpand(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_fluxpand"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute fluxpand");
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

const PLAIN_INPUT: &str = concat!(
    "apiVersion: v1\n",
    "kind: ConfigMap\n",
    "metadata:\n",
    "  namespace: testns\n",
    "  name: plain\n",
    "data:\n",
    "  foo: bar\n",
);

#[test]
fn test_passthrough_from_stdin() {
    let output = fluxpand(&[], PLAIN_INPUT);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, PLAIN_INPUT);
}

#[test]
fn test_explicit_expand_subcommand() {
    let output = fluxpand(&["expand", "-"], PLAIN_INPUT);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), PLAIN_INPUT);
}

#[test]
fn test_file_inputs_are_concatenated() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.yaml");
    let second = dir.path().join("second.yaml");
    std::fs::write(&first, "kind: ConfigMap\nmetadata:\n  name: a\n  namespace: ns\n").unwrap();
    std::fs::write(&second, "kind: ConfigMap\nmetadata:\n  name: b\n  namespace: ns\n").unwrap();

    let output = fluxpand(
        &[first.to_str().unwrap(), second.to_str().unwrap()],
        "",
    );
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let documents: Vec<serde_yaml::Value> = stdout
        .split("---\n")
        .filter(|s| !s.trim().is_empty())
        .map(|s| serde_yaml::from_str(s).unwrap())
        .collect();
    assert_eq!(documents.len(), 2);
}

#[test]
fn test_missing_repository_fails() {
    let input = concat!(
        "apiVersion: helm.toolkit.fluxcd.io/v2beta2\n",
        "kind: HelmRelease\n",
        "metadata:\n",
        "  namespace: testns\n",
        "  name: test\n",
        "spec:\n",
        "  chart:\n",
        "    spec:\n",
        "      chart: test-chart\n",
        "      sourceRef:\n",
        "        kind: HelmRepository\n",
        "        name: nonexistent\n",
    );
    let output = fluxpand(&[], input);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing chart repository for Helm release testns/test"));
}

#[test]
fn test_invalid_log_level_fails() {
    let output = fluxpand(&["--log-level", "loud"], "");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--log-level"));
}

#[test]
fn test_invalid_kube_version_fails() {
    let output = fluxpand(&["--kube-version", "abc"], PLAIN_INPUT);
    assert!(!output.status.success());
}

#[test]
fn test_missing_input_file_fails() {
    let output = fluxpand(&["/definitely/not/here.yaml"], "");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unable to open input file"));
}
