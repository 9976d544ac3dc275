//! Display sinks: where the core sends user-visible lines.

use std::sync::{Arc, Mutex, MutexGuard};

/// Line-oriented output collaborator.
///
/// The core calls `append_line` once per line, in display order. Lines never
/// contain a trailing newline.
pub trait DisplaySink: Send {
    fn append_line(&mut self, text: &str);
}

impl DisplaySink for Vec<String> {
    fn append_line(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

/// A cloneable in-memory sink.
///
/// Every clone shares the same buffer, so a test can hand one clone to a
/// session and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of every line captured so far.
    pub fn lines(&self) -> Vec<String> {
        self.guard().clone()
    }

    /// Drain the buffer, returning what it held.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.guard())
    }

    /// True if any captured line equals `line`.
    pub fn contains(&self, line: &str) -> bool {
        self.guard().iter().any(|l| l == line)
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl DisplaySink for CaptureSink {
    fn append_line(&mut self, text: &str) {
        self.guard().push(text.to_string());
    }
}
