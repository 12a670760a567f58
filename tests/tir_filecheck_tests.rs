//! FileCheck-style tests for TIR files
//!
//! Every `.tir` file under `tests/filetest` carries its own RUN and CHECK
//! directives; this suite runs the analysis each RUN line asks for and
//! validates the report against the checks.

use inputdep::test_ir::{CheckDirective, TestRunner, TestSpec};
use std::fs;
use std::path::{Path, PathBuf};

fn filetest_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("filetest")
}

/// Discovers all .tir files in a directory recursively
fn discover_tir_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(discover_tir_files(&path));
            } else if path.extension().and_then(|s| s.to_str()) == Some("tir") {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

fn check_file(path: &Path) -> Result<(), String> {
    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let spec = TestSpec::parse(&contents)?;
    TestRunner::new(false).run_test(&spec)
}

/// Test helper that runs a TIR file through FileCheck validation
fn run_filecheck_test(tir_file: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = filetest_dir().join(tir_file);
    check_file(&path).unwrap_or_else(|e| panic!("Test {} failed: {}", tir_file, e));
}

#[test]
fn test_print_ir_filecheck() {
    run_filecheck_test("print_ir.tir");
}

#[test]
fn test_rpo_filecheck() {
    run_filecheck_test("rpo.tir");
}

#[test]
fn test_branch_filecheck() {
    run_filecheck_test("branch.tir");
}

#[test]
fn test_loop_filecheck() {
    run_filecheck_test("loop.tir");
}

#[test]
fn test_effects_filecheck() {
    run_filecheck_test("effects.tir");
}

#[test]
fn test_input_function_filecheck() {
    run_filecheck_test("input_function.tir");
}

#[test]
fn test_input_global_filecheck() {
    run_filecheck_test("input_global.tir");
}

#[test]
fn test_cut_vertices_filecheck() {
    run_filecheck_test("cut_vertices.tir");
}

#[test]
fn test_failure_filecheck() {
    run_filecheck_test("failure.tir");
}

/// Every file in the directory, including ones without a dedicated test.
#[test]
fn run_all_tir_files() {
    let _ = env_logger::builder().is_test(true).try_init();
    let files = discover_tir_files(&filetest_dir());
    assert!(!files.is_empty(), "no .tir files found");

    let failures: Vec<_> = files
        .iter()
        .filter_map(|file| check_file(file).err().map(|e| (file.clone(), e)))
        .collect();

    if !failures.is_empty() {
        for (file, error) in &failures {
            eprintln!("  {}: {}", file.display(), error);
        }
        panic!("{} tests failed", failures.len());
    }
}

#[test]
fn test_wrong_expectation_fails() {
    let contents = r#"; RUN: %inputdep --print-deps %s
; CHECK: %y = add: independent
main(%x) {
entry:
  %y = add %x, %x
  ret %y
}
"#;
    let spec = TestSpec::parse(contents).unwrap();
    let err = TestRunner::new(false).run_test(&spec).unwrap_err();
    assert!(err.contains("not found"), "unexpected error: {}", err);
}

#[test]
fn test_spec_requires_run_line() {
    assert!(TestSpec::parse("main() {\nentry:\n  ret\n}\n").is_err());
    let spec = TestSpec::parse("; RUN: %inputdep %s\n; CHECK-EMPTY\nf() {\nentry:\n  ret\n}\n").unwrap();
    assert_eq!(spec.check_directives, vec![CheckDirective::CheckEmpty]);
}

#[test]
fn test_unknown_entry_fails_run() {
    let contents = r#"; RUN: %inputdep --print-deps --entry=nosuch %s
; CHECK: Dependencies for main
main(%x) {
entry:
  ret %x
}
"#;
    let spec = TestSpec::parse(contents).unwrap();
    let err = TestRunner::new(false).run_test(&spec).unwrap_err();
    assert!(err.contains("function not found: nosuch"), "unexpected error: {}", err);
}
