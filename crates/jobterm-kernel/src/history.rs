//! Command history stores.
//!
//! The core only needs three operations: append a line, search for a
//! substring (most recent first), and list everything in order. A failed
//! append is never fatal.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Entries considered by `history` and by searches.
pub const HISTORY_WINDOW: usize = 1000;

/// Most matches a search returns.
pub const MAX_SEARCH_MATCHES: usize = 100;

/// Storage for dispatched command lines.
pub trait HistoryStore: Send {
    /// Record one line. Failures are swallowed.
    fn append(&mut self, line: &str);

    /// Lines containing `term`, most recent first.
    fn search(&self, term: &str) -> Vec<String>;

    /// Every stored line, oldest first.
    fn list_all(&self) -> Vec<String>;
}

fn search_lines(lines: &[String], term: &str) -> Vec<String> {
    let start = lines.len().saturating_sub(HISTORY_WINDOW);
    lines[start..]
        .iter()
        .rev()
        .filter(|line| line.contains(term))
        .take(MAX_SEARCH_MATCHES)
        .cloned()
        .collect()
}

/// Append-only plain-text history: one command per line, no escaping.
#[derive(Debug, Clone)]
pub struct FileHistory {
    path: PathBuf,
}

impl FileHistory {
    /// Open (creating if needed) the history file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Err(e) = OpenOptions::new().create(true).append(true).open(&path) {
            tracing::debug!("history file {} unavailable: {}", path.display(), e);
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileHistory {
    fn append(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = result {
            tracing::debug!("history append to {} failed: {}", self.path.display(), e);
        }
    }

    fn search(&self, term: &str) -> Vec<String> {
        search_lines(&self.list_all(), term)
    }

    fn list_all(&self) -> Vec<String> {
        match std::fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect(),
            Err(e) => {
                tracing::debug!("history read from {} failed: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }
}

/// In-memory history, for embedders without a writable directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    lines: Vec<String>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&mut self, line: &str) {
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
    }

    fn search(&self, term: &str) -> Vec<String> {
        search_lines(&self.lines, term)
    }

    fn list_all(&self) -> Vec<String> {
        self.lines.clone()
    }
}
