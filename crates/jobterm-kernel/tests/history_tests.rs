//! History store behavior, on disk and through a Session.

use std::fs;
use std::path::PathBuf;

use jobterm_kernel::{
    CaptureSink, FileHistory, HistoryStore, LocalContext, MemoryHistory, Session, SessionConfig,
};
use rstest::rstest;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("jobterm-history-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[rstest]
#[case::file(Box::new(FileHistory::open(scratch("roundtrip").join("h.txt"))) as Box<dyn HistoryStore>)]
#[case::memory(Box::new(MemoryHistory::new()) as Box<dyn HistoryStore>)]
fn append_then_search_finds_latest(#[case] mut store: Box<dyn HistoryStore>) {
    store.append("ls -la /srv");
    store.append("echo unique-marker-42");
    store.append("pwd");
    assert_eq!(store.search("unique-marker")[0], "echo unique-marker-42");
    assert_eq!(store.list_all(), vec!["ls -la /srv", "echo unique-marker-42", "pwd"]);
}

#[test]
fn file_history_is_plain_lines() {
    let path = scratch("plain").join("h.txt");
    let mut store = FileHistory::open(&path);
    store.append("echo a");
    store.append("echo b");
    assert_eq!(store.path(), path.as_path());
    assert_eq!(fs::read_to_string(store.path()).unwrap(), "echo a\necho b\n");
}

#[test]
fn file_history_survives_reopen() {
    let path = scratch("reopen").join("h.txt");
    FileHistory::open(&path).append("first session");
    let store = FileHistory::open(&path);
    assert_eq!(store.search("first"), vec!["first session"]);
}

#[test]
fn session_writes_history_file_in_start_directory() {
    let dir = scratch("session");
    let sink = CaptureSink::new();
    let mut session = Session::new(SessionConfig::fast(), LocalContext::new(&dir), sink.clone());
    session.dispatch("echo recorded");
    session.dispatch("cd /");
    session.dispatch("jobs");

    let text = fs::read_to_string(dir.join(".jobterm_history.txt")).unwrap();
    assert_eq!(text, "echo recorded\ncd /\njobs\n");
}

#[test]
fn failed_lines_are_still_recorded() {
    let dir = scratch("failed");
    let sink = CaptureSink::new();
    let mut session = Session::new(SessionConfig::fast(), LocalContext::new(&dir), sink.clone());
    session.dispatch("> nowhere");
    session.dispatch("history");
    assert_eq!(
        sink.lines(),
        vec![
            "Error: Redirection specified but no command given",
            "    1  > nowhere",
            "    2  history",
        ]
    );
}

#[test]
fn single_search_match() {
    let sink = CaptureSink::new();
    let mut session = Session::new(
        SessionConfig::fast(),
        LocalContext::new(std::env::temp_dir()),
        sink.clone(),
    )
    .with_history(MemoryHistory::new());
    session.dispatch("echo only-once");
    sink.take();
    assert_eq!(session.search_history("only-once").as_deref(), Some("echo only-once"));
    assert_eq!(sink.lines(), vec!["Command found"]);

    sink.take();
    assert_eq!(session.search_history("absent"), None);
    assert_eq!(sink.lines(), vec!["No match found in history"]);
}

#[test]
fn ambiguous_search_lists_at_most_ten() {
    let sink = CaptureSink::new();
    let mut session = Session::new(
        SessionConfig::fast(),
        LocalContext::new(std::env::temp_dir()),
        sink.clone(),
    )
    .with_history(MemoryHistory::new());
    for i in 0..15 {
        session.dispatch(&format!("true {}", i));
    }
    sink.take();
    assert_eq!(session.search_history("true").as_deref(), Some("true 14"));
    let lines = sink.lines();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[1], "  1. true 14");
    assert_eq!(lines[10], "  10. true 5");
}
