//! Integration tests for pcdtool.
//!
//! These tests invoke the pcdtool binary as a subprocess against a minimal
//! fixture project. Generated output goes to a per-test temporary directory
//! so the fixture stays pristine.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Path to the minimal fixture project.
fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/minimal")
}

/// A scratch directory unique to this test process and `name`.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pcdtool-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("failed to create scratch directory");
    dir
}

/// Run pcdtool in `dir` with `args`.
fn pcdtool(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pcdtool"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to execute pcdtool")
}

fn assert_success(output: &Output, what: &str) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "pcdtool {what} failed (exit={:?}):\nstdout:\n{stdout}\nstderr:\n{stderr}",
        output.status.code(),
    );
    stdout
}

/// Write a copy of the fixture platform with `from` replaced by `to`.
fn broken_platform(scratch: &Path, edits: &[(&str, &str)]) -> PathBuf {
    let mut text = std::fs::read_to_string(fixture_dir().join("platform.toml")).unwrap();
    for (from, to) in edits {
        assert!(text.contains(from), "fixture does not contain {from:?}");
        text = text.replacen(from, to, 1);
    }
    let path = scratch.join("platform.toml");
    std::fs::write(&path, text).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn check_exits_zero() {
    let output = pcdtool(&fixture_dir(), &["check"]);
    let stdout = assert_success(&output, "check");
    assert!(
        stdout.contains("PCD check passed: 4 token(s) from 2 module(s)"),
        "unexpected output:\n{stdout}"
    );
    assert!(stdout.contains("1 DYNAMIC_EX PCD(s) declared without any module reference"));
}

#[test]
fn modules_lists_fixture_modules() {
    let output = pcdtool(&fixture_dir(), &["-q", "modules"]);
    let stdout = assert_success(&output, "modules");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, ["MinimalDxe (3 PCD(s))", "MinimalPei (2 PCD(s))"]);
}

#[test]
fn partition_splits_pei_and_dxe() {
    let output = pcdtool(&fixture_dir(), &["-q", "partition"]);
    let stdout = assert_success(&output, "partition");

    let (pei, dxe) = stdout.split_once("DXE PCD database").expect("no DXE section");
    assert!(pei.contains("PEI PCD database (1 token(s))"), "unexpected output:\n{stdout}");
    assert!(pei.contains("[  1] PcdMinimalBootMode"), "unexpected output:\n{stdout}");
    assert!(dxe.contains("[  2] PcdMinimalBoardRevision"), "unexpected output:\n{stdout}");
}

#[test]
fn dump_writes_text_file() {
    let scratch = scratch_dir("dump");
    let path = scratch.join("db.txt");
    let output = pcdtool(&fixture_dir(), &["dump", "-o", path.to_str().unwrap()]);
    assert_success(&output, "dump");

    let text = std::fs::read_to_string(&path).expect("dump file was not written");
    assert!(text.starts_with("PCD memory database: 4 token(s)"));
    assert!(text.contains("module MinimalPei (IA32), package MinimalPkg"));

    let _ = std::fs::remove_dir_all(&scratch);
}

#[test]
fn dump_json_is_valid() {
    let output = pcdtool(&fixture_dir(), &["-q", "dump", "--json"]);
    let stdout = assert_success(&output, "dump --json");

    let value: serde_json::Value = serde_json::from_str(&stdout).expect("dump --json is not JSON");
    let tokens = value.as_array().expect("expected a token array");
    assert_eq!(tokens.len(), 4);
    let boot_mode = tokens
        .iter()
        .find(|t| t["cname"] == "PcdMinimalBootMode")
        .expect("PcdMinimalBootMode missing");
    assert_eq!(boot_mode["sku_data"].as_array().unwrap().len(), 2);
    assert_eq!(boot_mode["producers"][0]["module_name"], "MinimalPei");
}

#[test]
fn dump_json_stdout_is_json_at_every_verbosity() {
    for flags in [&[][..], &["-v"][..]] {
        let mut args = flags.to_vec();
        args.extend(["dump", "--json"]);
        let output = pcdtool(&fixture_dir(), &args);
        let stdout = assert_success(&output, "dump --json");

        let value: serde_json::Value = serde_json::from_str(&stdout)
            .unwrap_or_else(|e| panic!("stdout with {flags:?} is not JSON ({e}):\n{stdout}"));
        assert_eq!(value.as_array().map(Vec::len), Some(4));

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Preprocessing PCDs of 2 module(s)"), "stderr:\n{stderr}");
    }
}

#[test]
fn autogen_all_writes_module_files() {
    let scratch = scratch_dir("autogen");
    let output = pcdtool(
        &fixture_dir(),
        &["autogen", "--all", "--out-dir", scratch.to_str().unwrap()],
    );
    assert_success(&output, "autogen --all");

    for module in ["MinimalPei", "MinimalDxe"] {
        let header = scratch.join(module).join("AutoGen.h");
        let text = std::fs::read_to_string(&header)
            .unwrap_or_else(|e| panic!("{} not written: {e}", header.display()));
        assert!(text.contains("_PCD_TOKEN_PcdMinimalBootMode"), "{module} header:\n{text}");
        assert!(scratch.join(module).join("AutoGen.c").is_file());
    }
    let dxe_source = std::fs::read_to_string(scratch.join("MinimalDxe/AutoGen.c")).unwrap();
    assert!(dxe_source.contains("_gPcd_FixedAtBuild_PcdMinimalBanner[16]"), "source:\n{dxe_source}");

    let _ = std::fs::remove_dir_all(&scratch);
}

#[test]
fn autogen_unknown_module_fails() {
    let scratch = scratch_dir("autogen-unknown");
    let output = pcdtool(
        &fixture_dir(),
        &["autogen", "--module", "NoSuchModule", "--out-dir", scratch.to_str().unwrap()],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NoSuchModule"), "stderr:\n{stderr}");

    let _ = std::fs::remove_dir_all(&scratch);
}

#[test]
fn check_reports_mismatch_by_pcd_and_module() {
    let scratch = scratch_dir("mismatch");
    // MinimalDxe's copy of the feature flag gets a different token number.
    let platform = broken_platform(&scratch, &[("token = 1\nvalue = \"FALSE\"\n\n[[module.pcd]]\ncname = \"PcdMinimalBootMode\"\ntoken-space = \"gMinimalTokenSpaceGuid\"\nitem-type = \"DYNAMIC\"\ndatum-type = \"UINT8\"\ntoken = 2\nvalue", "token = 9\nvalue = \"FALSE\"\n\n[[module.pcd]]\ncname = \"PcdMinimalBootMode\"\ntoken-space = \"gMinimalTokenSpaceGuid\"\nitem-type = \"DYNAMIC\"\ndatum-type = \"UINT8\"\ntoken = 2\nvalue")]);

    let output = pcdtool(&fixture_dir(), &["--platform", platform.to_str().unwrap(), "check"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("PcdMinimalDebug"), "stderr:\n{stderr}");
    assert!(stderr.contains("MinimalDxe"), "stderr:\n{stderr}");

    let _ = std::fs::remove_dir_all(&scratch);
}

#[test]
fn collect_reports_all_errors_and_fail_fast_stops() {
    let scratch = scratch_dir("collect");
    let platform = broken_platform(
        &scratch,
        &[
            // FEATURE_FLAG with a non-BOOLEAN type in MinimalPei.
            ("datum-type = \"BOOLEAN\"", "datum-type = \"UINT8\""),
            // The unreferenced DYNAMIC_EX declaration becomes plain DYNAMIC.
            ("item-type = \"DYNAMIC_EX\"", "item-type = \"DYNAMIC\""),
        ],
    );
    let platform = platform.to_str().unwrap();

    let output = pcdtool(&fixture_dir(), &["--platform", platform, "check"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2 error(s)"), "stderr:\n{stderr}");
    assert!(stderr.contains("PcdMinimalBoardRevision"), "stderr:\n{stderr}");

    let output = pcdtool(&fixture_dir(), &["--platform", platform, "--fail-fast", "check"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("error(s) found"), "stderr:\n{stderr}");
    assert!(stderr.contains("FEATURE_FLAG"), "stderr:\n{stderr}");

    let _ = std::fs::remove_dir_all(&scratch);
}
