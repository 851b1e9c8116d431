//! Batch driver tests against the file system.

use std::path::{Path, PathBuf};

use horizon_meta::MetaArtifact;
use horizon_moc::{CompilerOptions, Driver, OutputFormat};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn read_artifact(path: &Path) -> MetaArtifact {
    MetaArtifact::from_json(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_single_input_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(&dir, "widget.h", "class Widget { H_OBJECT signals: void shown(); };");
    let output = dir.path().join("out.json");

    let driver = Driver::new(CompilerOptions::new().with_output(&output));
    let report = driver.run(&[input], &mut std::io::sink());

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.outcomes[0].output.as_deref(), Some(output.as_path()));
    let artifact = read_artifact(&output);
    assert_eq!(artifact.source, "widget.h");
    assert_eq!(artifact.guard, "WIDGET");
}

#[test]
fn test_multiple_inputs_write_into_directory() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(&dir, "a.h", "class A { H_OBJECT };");
    let b = write(&dir, "b.h", "class B : public A { H_OBJECT };");
    let out = dir.path().join("generated");

    let driver = Driver::new(
        CompilerOptions::new()
            .with_output(&out)
            .with_include_guard("APP"),
    );
    let report = driver.run(&[a, b], &mut std::io::sink());

    assert_eq!(report.exit_code(), 0);
    let b_artifact = read_artifact(&out.join("moc_b.json"));
    assert_eq!(b_artifact.guard, "APP_B");
    assert_eq!(b_artifact.classes[0].super_class_name(), Some("A"));
    assert!(out.join("moc_a.json").exists());
}

#[test]
fn test_compile_error_in_one_file_still_emits_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(&dir, "bad.h", "class Bad {\n  H_OBJECT\nsignals:\n  bool oops();\n};");
    let good = write(&dir, "good.h", "class Good { H_OBJECT };");
    let out = dir.path().join("out");

    let driver = Driver::new(CompilerOptions::new().with_output(&out));
    let report = driver.run(&[bad.clone(), good], &mut std::io::sink());

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.compile_errors.len(), 1);
    let err = &report.compile_errors[0];
    assert_eq!(err.file, bad);
    assert_eq!(err.line, 4);
    assert!(err.to_string().contains(":4: error: signal `oops` must return void"));
    assert!(!out.join("moc_bad.json").exists());
    assert!(out.join("moc_good.json").exists());
}

#[test]
fn test_missing_input_is_an_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(&dir, "good.h", "class Good { H_OBJECT };");
    let missing = dir.path().join("missing.h");

    let mut stdout = Vec::new();
    let report = Driver::default().run(&[missing, good], &mut stdout);

    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.io_errors.len(), 1);
    assert_eq!(report.outcomes.len(), 1);
    assert!(!stdout.is_empty());
}

#[test]
fn test_unwritable_output_is_an_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(&dir, "a.h", "class A { H_OBJECT };");
    // A regular file where a directory is needed.
    let blocker = write(&dir, "blocker", "");

    let driver = Driver::new(CompilerOptions::new().with_output(blocker.join("out.json")));
    let report = driver.run(&[input], &mut std::io::sink());
    assert_eq!(report.exit_code(), 2);
}

#[test]
fn test_cycle_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(&dir, "a.h", "class A : public B { H_OBJECT };");
    let b = write(&dir, "b.h", "class B : public A { H_OBJECT };");
    let out = dir.path().join("out");

    let driver = Driver::new(CompilerOptions::new().with_output(&out));
    let report = driver.run(&[a, b], &mut std::io::sink());

    assert_eq!(report.exit_code(), 1);
    assert!(report.cycle.is_some());
    assert!(report.outcomes.is_empty());
    assert!(!out.exists());
}

#[test]
fn test_file_without_classes_gets_a_note() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(&dir, "plain.h", "struct Plain { int x; };");

    let report = Driver::default().run(&[input.clone()], &mut std::io::sink());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.notes.len(), 1);
    assert_eq!(report.notes[0].file, input);

    let quiet = Driver::new(CompilerOptions::new().with_notes(false));
    let report = quiet.run(&[input], &mut std::io::sink());
    assert!(report.notes.is_empty());
}

#[test]
fn test_rust_format_extension() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(&dir, "a.h", "class A { H_OBJECT };");
    let b = write(&dir, "b.h", "class B { H_OBJECT };");
    let out = dir.path().join("out");

    let driver = Driver::new(
        CompilerOptions::new()
            .with_output(&out)
            .with_format(OutputFormat::Rust),
    );
    let report = driver.run(&[a, b], &mut std::io::sink());
    assert_eq!(report.exit_code(), 0);
    let module = std::fs::read_to_string(out.join("moc_a.rs")).unwrap();
    assert!(module.contains("pub fn register_metadata()"));
}
