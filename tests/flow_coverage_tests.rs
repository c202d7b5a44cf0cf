#![cfg(unix)]

use flow_coverage::Revision;
use flow_coverage::coverage::{CoverageError, CoverageSource, FlowCoverage, sample_revision};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

/// Fake launcher: `<script> flow coverage <file>` prints the file's coverage
/// from a sibling `<file>.cov`, or exits 2 when there is none.
const LAUNCHER: &str = r#"#!/bin/sh
if [ "$1" != "flow" ] || [ "$2" != "coverage" ]; then
  echo "unexpected arguments: $*" >&2
  exit 64
fi
if [ ! -f "$3.cov" ]; then
  echo "no coverage for $3" >&2
  exit 2
fi
printf 'Covered: %s%% (some of many expressions)\n' "$(cat "$3.cov")"
"#;

fn setup_checkouts() -> (TempDir, FlowCoverage) {
    let temp = tempfile::tempdir().unwrap();
    let launcher = temp.path().join("fakepm");
    fs::write(&launcher, LAUNCHER).unwrap();
    let mut perms = fs::metadata(&launcher).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&launcher, perms).unwrap();

    for dir in ["base/web/src", "head/web/src"] {
        fs::create_dir_all(temp.path().join(dir)).unwrap();
    }

    let flow = FlowCoverage {
        package_manager: launcher.to_string_lossy().into_owned(),
        path: "web/".into(),
        base_dir: temp.path().join("base"),
        head_dir: temp.path().join("head"),
    };
    (temp, flow)
}

fn write_cov(root: &Path, checkout: &str, file: &str, value: &str) {
    fs::write(root.join(checkout).join("web").join(format!("{}.cov", file)), value).unwrap();
}

#[test]
fn reads_percentage_from_each_checkout() {
    let (temp, flow) = setup_checkouts();
    write_cov(temp.path(), "base", "src/a.js", "80");
    write_cov(temp.path(), "head", "src/a.js", "77.25");

    let base = flow.coverage(Revision::Base, "web/src/a.js").unwrap();
    let head = flow.coverage(Revision::Head, "web/src/a.js").unwrap();

    assert_eq!(base.value, Some(80.0));
    assert_eq!(head.raw, "77.25");
    assert_eq!(head.value, Some(77.25));
}

#[test]
fn failing_tool_is_an_error() {
    let (_temp, flow) = setup_checkouts();

    let err = flow.coverage(Revision::Head, "web/src/missing.js").unwrap_err();

    match err {
        CoverageError::CommandFailed {
            filename,
            revision,
            stderr,
        } => {
            assert_eq!(filename, "web/src/missing.js");
            assert_eq!(revision, Revision::Head);
            assert!(stderr.contains("no coverage for src/missing.js"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn garbage_output_is_unparseable_not_fatal() {
    let (temp, flow) = setup_checkouts();
    write_cov(temp.path(), "head", "src/a.js", "unknown");

    let pct = flow.coverage(Revision::Head, "web/src/a.js").unwrap();

    assert_eq!(pct.raw, "unknown");
    assert_eq!(pct.value, None);
}

#[test]
fn missing_launcher_is_a_spawn_error() {
    let (_temp, mut flow) = setup_checkouts();
    flow.package_manager = "/nonexistent/launcher".into();

    let err = flow.coverage(Revision::Base, "web/src/a.js").unwrap_err();
    assert!(matches!(err, CoverageError::Spawn { .. }));
}

#[test]
fn samples_many_files_in_parallel() {
    let (temp, flow) = setup_checkouts();
    let files: Vec<String> = (0..8).map(|i| format!("web/src/f{}.js", i)).collect();
    for (i, _) in files.iter().enumerate() {
        write_cov(temp.path(), "head", &format!("src/f{}.js", i), &format!("{}", i * 10));
    }

    let map = sample_revision(&flow, Revision::Head, &files, 3).unwrap();

    assert_eq!(map.len(), 8);
    assert_eq!(map["web/src/f5.js"].value, Some(50.0));
}
