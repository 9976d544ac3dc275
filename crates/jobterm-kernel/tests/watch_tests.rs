//! multiWatch through a Session.

use std::fs;
use std::path::{Path, PathBuf};

use jobterm_kernel::scheduler::SEPARATOR_WIDTH;
use jobterm_kernel::{CaptureSink, JobControls, LocalContext, MemoryHistory, Session, SessionConfig};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("jobterm-watch-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn session_in(dir: &Path) -> (Session, CaptureSink) {
    let sink = CaptureSink::new();
    let config = SessionConfig::fast().with_watch_dir(dir);
    let session = Session::new(config, LocalContext::new(dir), sink.clone())
        .with_history(MemoryHistory::new());
    (session, sink)
}

/// Blocks as (label, body) pairs, in display order.
fn blocks(lines: &[String]) -> Vec<(String, Vec<String>)> {
    let separator = "-".repeat(SEPARATOR_WIDTH);
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if lines[i].starts_with('"') && lines.get(i + 1) == Some(&separator) {
            let label = lines[i].clone();
            let mut body = Vec::new();
            let mut j = i + 2;
            while j < lines.len() && lines[j] != separator {
                body.push(lines[j].clone());
                j += 1;
            }
            out.push((label, body));
            i = j + 1;
        } else {
            i += 1;
        }
    }
    out
}

fn capture_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(".temp_mw_"))
        .count()
}

// ============================================================================
// Output blocks
// ============================================================================

#[test]
fn two_commands_two_blocks() {
    let dir = scratch("two");
    let (mut session, sink) = session_in(&dir);
    session.dispatch(r#"multiWatch ["echo A", "echo B"]"#);

    let lines = sink.lines();
    assert_eq!(lines[0], "multiWatch: starting parallel execution");
    assert_eq!(lines.last().unwrap(), "multiWatch: execution completed");

    let mut found = blocks(&lines);
    found.sort();
    assert_eq!(found.len(), 2);
    assert!(found[0].0.starts_with("\"echo A\", "));
    assert_eq!(found[0].1, vec!["A"]);
    assert!(found[1].0.starts_with("\"echo B\", "));
    assert_eq!(found[1].1, vec!["B"]);
    assert_eq!(capture_files(&dir), 0);
}

#[test]
fn header_carries_timestamp() {
    let dir = scratch("stamp");
    let (mut session, sink) = session_in(&dir);
    session.dispatch(r#"multiWatch ["echo T"]"#);
    let lines = sink.lines();
    let (label, _) = &blocks(&lines)[0];
    // "echo T", YYYY-MM-DD HH:MM:SS:
    let stamp = label
        .strip_prefix("\"echo T\", ")
        .and_then(|s| s.strip_suffix(':'))
        .unwrap();
    assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
}

#[test]
fn label_is_unescaped_command() {
    let dir = scratch("label");
    let (mut session, sink) = session_in(&dir);
    session.dispatch(r#"multiWatch ["echo \"quoted\""]"#);
    let lines = sink.lines();
    let found = blocks(&lines);
    assert!(found[0].0.starts_with(r#""echo "quoted"", "#));
    assert_eq!(found[0].1, vec!["quoted"]);
}

#[test]
fn every_line_appears_once_in_order() {
    let dir = scratch("order");
    let (mut session, sink) = session_in(&dir);
    session.dispatch(r#"multiWatch ["seq 1 500"]"#);
    let body: Vec<String> = blocks(&sink.lines())
        .into_iter()
        .flat_map(|(_, body)| body)
        .collect();
    let expected: Vec<String> = (1..=500).map(|i| i.to_string()).collect();
    assert_eq!(body, expected);
}

#[test]
fn slow_output_is_tailed() {
    let dir = scratch("slow");
    let (mut session, sink) = session_in(&dir);
    session.dispatch(r#"multiWatch ["echo first; sleep 0.3; echo second"]"#);
    let body: Vec<String> = blocks(&sink.lines())
        .into_iter()
        .flat_map(|(_, body)| body)
        .collect();
    assert_eq!(body, vec!["first", "second"]);
}

#[test]
fn stderr_is_captured() {
    let dir = scratch("stderr");
    let (mut session, sink) = session_in(&dir);
    session.dispatch(r#"multiWatch ["echo err 1>&2"]"#);
    assert_eq!(blocks(&sink.lines())[0].1, vec!["err"]);
}

#[test]
fn silent_command_has_no_block() {
    let dir = scratch("silent");
    let (mut session, sink) = session_in(&dir);
    session.dispatch(r#"multiWatch ["true"]"#);
    assert_eq!(
        sink.lines(),
        vec![
            "multiWatch: starting parallel execution",
            "multiWatch: execution completed",
        ]
    );
}

// ============================================================================
// Diagnostics, interruption, cleanup
// ============================================================================

#[test]
fn malformed_list_spawns_nothing() {
    let dir = scratch("malformed");
    let (mut session, sink) = session_in(&dir);
    session.dispatch("multiWatch echo A");
    assert_eq!(
        sink.lines(),
        vec!["multiWatch: malformed arguments (expected [ ... ])"]
    );
}

#[test]
fn interrupt_ends_watch_and_removes_files() {
    let dir = scratch("interrupt");
    let sink = CaptureSink::new();
    let mut calls = 0;
    let pump = move |c: &JobControls| {
        calls += 1;
        if calls == 5 {
            c.request_interrupt();
        }
    };
    let mut session = Session::new(
        SessionConfig::fast().with_watch_dir(&dir),
        LocalContext::new(&dir),
        sink.clone(),
    )
    .with_history(MemoryHistory::new())
    .with_pump(pump);

    let started = std::time::Instant::now();
    session.dispatch(r#"multiWatch ["sleep 30", "sleep 30"]"#);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(sink.lines().last().unwrap(), "multiWatch: execution completed");
    assert_eq!(capture_files(&dir), 0);
}

#[test]
fn session_continues_after_watch() {
    let dir = scratch("after");
    let (mut session, sink) = session_in(&dir);
    session.dispatch(r#"multiWatch ["echo A"]"#);
    sink.take();
    session.dispatch("echo next");
    assert_eq!(sink.lines(), vec!["next"]);
}
