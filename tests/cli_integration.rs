//! Integration tests for the `tl` CLI.
//!
//! Each test creates a temp workspace of markdown notes, runs `tl` as a
//! subprocess, and verifies stdout and/or file contents.

use std::fs;
use std::path::Path;
use std::process::Command;

use pretty_assertions::assert_eq;

/// Create a small workspace: one planned project and one loose note.
fn create_workspace(root: &Path) {
    fs::write(
        root.join("alpha.md"),
        "\
---
title: Alpha
Start: 2026-01-05
End: 2026-03-27
---
- [ ] Platform id:: E-1
- [ ] Login flow id:: S-1 epic:: E-1
- [x] Schema id:: SB-1 story:: S-1 due:: 2026-01-20
- [ ] Handlers id:: SB-2 story:: S-1 depends:: FS:^sb-1 due:: 2026-02-10 ^sb-2

| id | title | date |
|----|-------|------|
| M-1 | Beta | 2026-02-15 |
",
    )
    .unwrap();

    fs::create_dir_all(root.join("notes")).unwrap();
    fs::write(
        root.join("notes/errands.md"),
        "\
# Errands

Passport photos are in the drawer.

- [/] Renew passport id:: R-1 start:: 2026-01-06 due:: 2026-01-09
",
    )
    .unwrap();

    fs::write(
        root.join(".taskline.toml"),
        "[timeline]\nanchor = \"2026-01-05\"\nmin_horizon_months = 1\n",
    )
    .unwrap();
}

/// Run `tl` with the given args in the given directory, returning (stdout, stderr, success).
fn run_tl(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_tl"))
        .args(args)
        .current_dir(dir)
        .env_remove("TASKLINE_LOG")
        .output()
        .expect("failed to run tl");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `tl` expecting success, return stdout.
fn run_tl_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_tl(dir, args);
    if !success {
        panic!("tl {:?} failed:\nstdout: {}\nstderr: {}", args, stdout, stderr);
    }
    stdout
}

fn run_json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut args = args.to_vec();
    args.push("--json");
    serde_json::from_str(&run_tl_ok(dir, &args)).unwrap()
}

// ---------------------------------------------------------------------------
// Read command tests
// ---------------------------------------------------------------------------

#[test]
fn test_index_summarizes_projects() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    let out = run_tl_ok(tmp.path(), &["index"]);
    assert!(out.contains("alpha.md  Alpha"));
    assert!(out.contains("notes/errands.md  Errands"));

    let parsed = run_json(tmp.path(), &["index"]);
    let projects = parsed["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0]["key"], "alpha.md");
    assert_eq!(projects[0]["counts"]["total"], 4);
    assert_eq!(projects[0]["milestones"], 1);
    assert_eq!(projects[0]["next_due"], "2026-02-10");
}

#[test]
fn test_dir_flag() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());
    let elsewhere = tempfile::TempDir::new().unwrap();

    let dir = tmp.path().to_str().unwrap();
    let out = run_tl_ok(elsewhere.path(), &["-C", dir, "show", "R-1"]);
    assert!(out.contains("notes/errands.md::r-1 Renew passport"));
    assert!(out.contains("status: in-progress"));
}

#[test]
fn test_show_json() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    let task = run_json(tmp.path(), &["show", "alpha.md::sb-2"]);
    assert_eq!(task["id"], "SB-2");
    assert_eq!(task["role"], "subtask");
    assert_eq!(task["story"], "s-1");
    assert_eq!(task["depends"][0], "alpha.md::sb-1:FS");
}

#[test]
fn test_show_unknown_task_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    let (_, stderr, success) = run_tl(tmp.path(), &["show", "Z-9"]);
    assert!(!success);
    assert!(stderr.contains("error: task not found: Z-9"));
}

#[test]
fn test_tree_cascade_with_rollup() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    let out = run_tl_ok(tmp.path(), &["tree", "alpha.md"]);
    let lines: Vec<&str> = out.lines().skip(1).collect();
    assert_eq!(
        lines,
        vec![
            "  [ ] E-1 Platform  [2 subtasks]",
            "    [ ] S-1 Login flow  [50% of 2 subtasks]",
            "      [x] SB-1 Schema",
            "      [ ] SB-2 Handlers",
        ]
    );
}

#[test]
fn test_timeline_json_has_bars_heat_and_connector() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    let parsed = run_json(tmp.path(), &["timeline"]);
    assert_eq!(parsed["layout"]["anchor"], "2026-01-05");
    assert_eq!(parsed["layout"]["pixels_per_day"], 16.0);
    assert_eq!(parsed["routing"]["report"]["drawn"], 1);
    assert_eq!(parsed["routing"]["connectors"][0]["source"], "alpha.md::sb-1");
    assert_eq!(parsed["layout"]["milestones"][0]["offset"], 41);

    // Renew passport covers Tue..Fri of the first week
    let heat = parsed["heat"].as_array().unwrap();
    let counts: Vec<u64> = heat.iter().take(7).map(|c| c["count"].as_u64().unwrap()).collect();
    assert_eq!(counts, vec![0, 1, 1, 1, 1, 0, 0]);
}

#[test]
fn test_timeline_filters_and_zoom() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    let parsed = run_json(
        tmp.path(),
        &["timeline", "--hide-epics", "--hide-done", "--zoom", "0"],
    );
    assert_eq!(parsed["layout"]["pixels_per_day"], 2.0);
    let labels: Vec<&str> = parsed["layout"]["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["Alpha", "Login flow", "Handlers", "Errands", "Renew passport"]);
    // the prerequisite is hidden, so the edge has no bar to leave from
    assert_eq!(parsed["routing"]["report"]["unresolved"], 1);
}

#[test]
fn test_timeline_text_chart() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    let out = run_tl_ok(tmp.path(), &["timeline", "--days", "14"]);
    assert!(out.contains("alpha.md::sb-1 -> alpha.md::sb-2 FS"));
    assert!(out.contains("connectors: 1 drawn, 0 suppressed, 0 cross-document, 0 unresolved"));
    let passport = out.lines().find(|l| l.contains("Renew passport")).unwrap();
    assert!(passport.ends_with(" ████··     ··"));
}

#[test]
fn test_check_reports_omissions() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());
    fs::write(
        tmp.path().join("notes/team.md"),
        "| Name | Role | Team |\n|---|---|---|\n| Ann | Dev | Core |\n",
    )
    .unwrap();
    run_tl_ok(tmp.path(), &["check"]);

    fs::write(
        tmp.path().join("broken.md"),
        "- [ ] Bad id:: B-1 due:: 2026-02-30\n",
    )
    .unwrap();
    let (stdout, stderr, success) = run_tl(tmp.path(), &["check"]);
    assert!(!success);
    assert!(stdout.contains("broken.md:1: invalid date '2026-02-30' for due::"));
    assert!(stderr.contains("1 record(s) omitted"));
}

#[test]
fn test_bad_config_is_an_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());
    fs::write(tmp.path().join(".taskline.toml"), "[timeline]\nzoom = \"wide\"\n").unwrap();

    let (_, stderr, success) = run_tl(tmp.path(), &["index"]);
    assert!(!success);
    assert!(stderr.contains(".taskline.toml"));
}

// ---------------------------------------------------------------------------
// Write command tests
// ---------------------------------------------------------------------------

#[test]
fn test_move_shifts_due_in_place() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    let out = run_tl_ok(tmp.path(), &["move", "SB-2", "-3"]);
    assert_eq!(out, "alpha.md::sb-2: updated\n");
    let text = fs::read_to_string(tmp.path().join("alpha.md")).unwrap();
    assert!(text.contains(
        "- [ ] Handlers id:: SB-2 story:: S-1 depends:: FS:^sb-1 due:: 2026-02-07 ^sb-2\n"
    ));
}

#[test]
fn test_resize_adds_start_before_block_ref() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    run_tl_ok(tmp.path(), &["resize", "SB-2", "--start", "-4"]);
    let text = fs::read_to_string(tmp.path().join("alpha.md")).unwrap();
    assert!(text.contains("due:: 2026-02-10 start:: 2026-02-06 ^sb-2\n"));
}

#[test]
fn test_status_done_records_completion() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    let out = run_json(tmp.path(), &["status", "R-1", "done"]);
    assert_eq!(out["outcome"], "applied");
    let text = fs::read_to_string(tmp.path().join("notes/errands.md")).unwrap();
    assert!(text.contains("- [x] Renew passport id:: R-1 start:: 2026-01-06 due:: 2026-01-09 completed:: "));

    let task = run_json(tmp.path(), &["show", "R-1"]);
    assert_eq!(task["status"], "done");
}

#[test]
fn test_set_and_unset_properties() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    run_tl_ok(tmp.path(), &["set", "R-1", "priority=high", "--unset", "start"]);
    let text = fs::read_to_string(tmp.path().join("notes/errands.md")).unwrap();
    assert!(text.contains("- [/] Renew passport id:: R-1 due:: 2026-01-09 priority:: high\n"));

    let (_, stderr, success) = run_tl(tmp.path(), &["set", "R-1", "due=soon"]);
    assert!(!success);
    assert!(stderr.contains("invalid date"));
}

#[test]
fn test_project_commands_edit_front_matter() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());

    run_tl_ok(tmp.path(), &["move-project", "alpha.md", "7"]);
    run_tl_ok(tmp.path(), &["resize-project", "alpha.md", "--end", "-1"]);
    let text = fs::read_to_string(tmp.path().join("alpha.md")).unwrap();
    assert!(text.starts_with("---\ntitle: Alpha\nStart: 2026-01-12\nEnd: 2026-04-02\n---\n"));

    let (_, stderr, success) = run_tl(tmp.path(), &["move-project", "nope.md", "1"]);
    assert!(!success);
    assert!(stderr.contains("project not found: nope.md"));
}

#[test]
fn test_zero_move_is_unchanged() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_workspace(tmp.path());
    let before = fs::read_to_string(tmp.path().join("alpha.md")).unwrap();

    let out = run_tl_ok(tmp.path(), &["move", "SB-2", "0"]);
    assert_eq!(out, "alpha.md::sb-2: unchanged\n");
    assert_eq!(fs::read_to_string(tmp.path().join("alpha.md")).unwrap(), before);
}
