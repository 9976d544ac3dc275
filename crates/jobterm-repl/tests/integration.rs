//! Integration tests for the jobterm REPL and binary.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use jobterm_kernel::{CaptureSink, LocalContext, MemoryHistory, Session, SessionConfig};
use jobterm_repl::{Repl, Step};
use rstest::rstest;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("jobterm-repl-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn repl() -> (Repl, CaptureSink) {
    let sink = CaptureSink::new();
    let session = Session::new(
        SessionConfig::fast(),
        LocalContext::new(std::env::temp_dir()),
        sink.clone(),
    )
    .with_history(MemoryHistory::new());
    (Repl::with_session(session), sink)
}

// ============================================================================
// Meta commands
// ============================================================================

#[rstest]
#[case::quit("/quit")]
#[case::short("/q")]
fn quit_leaves_without_dispatch(#[case] line: &str) {
    let (mut repl, sink) = repl();
    assert_eq!(repl.process_line(line), Step::Exit);
    assert!(sink.is_empty());
}

#[test]
fn exit_builtin_closes_session() {
    let (mut repl, sink) = repl();
    assert_eq!(repl.process_line("exit"), Step::Exit);
    assert_eq!(sink.lines(), vec!["Closing jobterm..."]);
}

#[test]
fn help_lists_meta_commands() {
    let (mut repl, _sink) = repl();
    let Step::Continue(Some(help)) = repl.process_line("/help") else {
        panic!("expected help text");
    };
    assert!(help.contains("/search TERM"));
    assert!(help.contains("multiWatch"));
}

#[test]
fn search_prefills_most_recent_match() {
    let (mut repl, sink) = repl();
    repl.process_line("echo alpha-1");
    repl.process_line("echo alpha-2");
    sink.take();
    assert_eq!(
        repl.process_line("/search alpha"),
        Step::Prefill("echo alpha-2".to_string())
    );
    assert_eq!(sink.lines()[0], "Multiple matches found (using most recent):");
}

#[test]
fn search_without_match_continues() {
    let (mut repl, sink) = repl();
    repl.process_line("echo present");
    sink.take();
    assert_eq!(repl.process_line("/search missing"), Step::Continue(None));
    assert_eq!(sink.lines(), vec!["No match found in history"]);
}

#[test]
fn search_needs_a_term() {
    let (mut repl, _sink) = repl();
    assert_eq!(
        repl.process_line("/search"),
        Step::Continue(Some("Usage: /search TERM".to_string()))
    );
}

#[test]
fn cwd_and_prompt_follow_cd() {
    let (mut repl, _sink) = repl();
    repl.process_line("cd /");
    assert_eq!(repl.prompt(), "jobterm:/> ");
    assert_eq!(repl.process_line("/cwd"), Step::Continue(Some("/".to_string())));
}

#[test]
fn bg_lists_background_jobs() {
    let (mut repl, _sink) = repl();
    assert_eq!(
        repl.process_line("/bg"),
        Step::Continue(Some("(no background jobs)".to_string()))
    );
    repl.process_line("sleep 5 &");
    let Step::Continue(Some(listing)) = repl.process_line("/bg") else {
        panic!("expected listing");
    };
    assert!(listing.starts_with("Background jobs:"));
    assert!(listing.contains("sleep 5 &"));
    repl.session_mut().shutdown();
}

// ============================================================================
// Ordinary lines
// ============================================================================

#[test]
fn absolute_path_is_a_command_not_a_meta_command() {
    let (mut repl, sink) = repl();
    assert_eq!(repl.process_line("/bin/echo hi"), Step::Continue(None));
    assert_eq!(sink.lines(), vec!["hi"]);
}

#[test]
fn pipeline_output_reaches_sink() {
    let (mut repl, sink) = repl();
    repl.process_line("printf 'b\\na\\n' | sort");
    assert_eq!(sink.lines(), vec!["a", "b"]);
}

// ============================================================================
// Binary
// ============================================================================

fn jobterm(name: &str) -> (Command, PathBuf) {
    let dir = scratch(name);
    let config = dir.join("config");
    fs::create_dir_all(config.join("jobterm")).unwrap();
    fs::write(config.join("jobterm/config.toml"), "watch_warmup_ms = 20\n").unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_jobterm"));
    cmd.current_dir(&dir).env("XDG_CONFIG_HOME", &config);
    (cmd, dir)
}

#[test]
fn dash_c_runs_one_line() {
    let (mut cmd, dir) = jobterm("dash-c");
    let output = cmd.args(["-c", "echo hello | tr a-z A-Z"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "HELLO\n");
    assert_eq!(
        fs::read_to_string(dir.join(".jobterm_history.txt")).unwrap(),
        "echo hello | tr a-z A-Z\n"
    );
}

#[test]
fn dash_c_runs_multiwatch() {
    let (mut cmd, _dir) = jobterm("dash-c-watch");
    let output = cmd.args(["-c", r#"multiWatch ["echo W"]"#]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("multiWatch: starting parallel execution\n"));
    assert!(stdout.contains("\"echo W\", "));
    assert!(stdout.contains("\nW\n"));
    assert!(stdout.ends_with("multiWatch: execution completed\n"));
}

#[test]
fn dash_c_without_command_fails() {
    let (mut cmd, _dir) = jobterm("dash-c-missing");
    let output = cmd.arg("-c").output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("-c requires a command argument"));
}

#[test]
fn version_names_the_binary() {
    let (mut cmd, _dir) = jobterm("version");
    let output = cmd.arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("jobterm "));
}

#[test]
fn unknown_option_fails() {
    let (mut cmd, _dir) = jobterm("unknown");
    let output = cmd.arg("--bogus").output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown option: --bogus"));
}
