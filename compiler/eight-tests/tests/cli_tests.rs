//! End-to-end tests for the `eightc` binary.
//!
//! Every test runs the compiler as a child process and writes its artifacts into a directory of
//! its own below `CARGO_TARGET_TMPDIR`.

use eight_macros::{assert_contains, assert_ok, assert_some};
use eight_mir::min_function::{build_min_module, DEFAULT_TARGET_TRIPLE};
use eight_mir::{deserialize, verify, MirInterpreter, MirTargetLayout};
use insta_cmd::get_cargo_bin;
use std::path::PathBuf;
use std::process::{Command, Output};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("cli_tests").join(name);
    assert_ok!(std::fs::create_dir_all(&dir));
    dir
}

fn eightc(args: &[&str]) -> Output {
    let mut cmd = Command::new(get_cargo_bin("eightc"));
    cmd.env_remove("EIGHT_TARGET_LAYOUT");
    assert_ok!(cmd.args(args).output())
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_build_writes_a_decodable_module() {
    let path = scratch_dir("build").join("min.mir");
    let output = eightc(&["build", assert_some!(path.to_str())]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let bytes = assert_ok!(std::fs::read(&path));
    assert_eq!(&bytes[..4], b"8MIR");
    let module = assert_ok!(deserialize(&bytes));
    let expected = assert_ok!(build_min_module(
        MirTargetLayout::default(),
        DEFAULT_TARGET_TRIPLE
    ));
    assert_eq!(module, expected);
    assert!(verify(&module).is_valid());

    let interpreter = MirInterpreter::new(&module);
    assert_eq!(assert_ok!(interpreter.call("min", &[3, 7])), Some(3));
    assert_eq!(assert_ok!(interpreter.call("min", &[9, 2])), Some(2));
}

#[test]
fn test_inspect_prints_what_build_emitted() {
    let path = scratch_dir("inspect").join("min.mir");
    let path = assert_some!(path.to_str()).to_owned();
    let built = eightc(&["build", &path, "--emit-mir"]);
    assert!(built.status.success(), "stderr: {}", stderr(&built));
    assert_contains!(stdout(&built), "fn @min(%a: i32, %b: i32) -> i32");

    let inspected = eightc(&["inspect", &path]);
    assert!(inspected.status.success(), "stderr: {}", stderr(&inspected));
    assert_eq!(stdout(&inspected), stdout(&built));
}

#[test]
fn test_emit_query_selects_a_single_function() {
    let path = scratch_dir("query").join("min.mir");
    let path = assert_some!(path.to_str()).to_owned();
    let output = eightc(&["build", &path, "--emit-mir", "--emit-query", "mir.fn.min"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("fn @min("));
    assert!(!text.contains("; module"));

    let output = eightc(&["inspect", &path, "--emit-query", "mir.fn.max"]);
    assert!(!output.status.success());
    assert_contains!(stderr(&output), "driver::unknown_function");
}

#[test]
fn test_emit_ron_dumps_the_module() {
    let path = scratch_dir("ron").join("min.mir");
    let output = eightc(&["build", assert_some!(path.to_str()), "--emit-ron"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert_contains!(text, "\"min.c\"");
    assert_contains!(text, "\"wchar_size\"");
}

#[test]
fn test_target_layout_from_the_environment() {
    let path = scratch_dir("layout_env").join("min.mir");
    let mut cmd = Command::new(get_cargo_bin("eightc"));
    cmd.env("EIGHT_TARGET_LAYOUT", "E-p:32:32-S64");
    let output = assert_ok!(cmd.args(["build", assert_some!(path.to_str())]).output());
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let bytes = assert_ok!(std::fs::read(&path));
    assert_eq!(bytes[4], 1);
    let module = assert_ok!(deserialize(&bytes));
    assert_eq!(module.layout().to_string(), "E-p:32:32-S64");
}

#[test]
fn test_invalid_target_layout_writes_nothing() {
    let path = scratch_dir("layout_invalid").join("min.mir");
    let _ = std::fs::remove_file(&path);
    let output = eightc(&[
        "build",
        assert_some!(path.to_str()),
        "--target-layout",
        "e-p:12:12-S128",
    ]);
    assert!(!output.status.success());
    assert_contains!(stderr(&output), "mir::invalid_target_layout");
    assert!(!path.exists());
}

#[test]
fn test_inspect_rejects_malformed_input() {
    let path = scratch_dir("malformed").join("garbage.mir");
    assert_ok!(std::fs::write(&path, b"8MIR\x00\x02\x00\x00\x00"));
    let output = eightc(&["inspect", assert_some!(path.to_str())]);
    assert!(!output.status.success());
    assert_contains!(stderr(&output), "mir::malformed_module");
    assert!(stdout(&output).is_empty());
}
