//! Collaborator seams: the session context, the event pump, and the
//! cooperative gesture flags shared between them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Working directory and environment the session runs commands in.
pub trait SessionContext: Send {
    fn working_directory(&self) -> &Path;
    fn set_working_directory(&mut self, path: PathBuf);
    fn env_var(&self, name: &str) -> Option<String>;
}

/// Context backed by the process environment.
///
/// Variables can be overridden (or hidden) per context without touching the
/// real process environment.
#[derive(Debug, Clone)]
pub struct LocalContext {
    cwd: PathBuf,
    overrides: HashMap<String, Option<String>>,
}

impl LocalContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            overrides: HashMap::new(),
        }
    }

    /// Start in the process's current directory, or `/` if it is unreadable.
    pub fn from_process() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|e| {
            tracing::warn!("current directory unavailable: {}", e);
            PathBuf::from("/")
        });
        Self::new(cwd)
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), Some(value.into()));
        self
    }

    pub fn without_var(mut self, name: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), None);
        self
    }
}

impl SessionContext for LocalContext {
    fn working_directory(&self) -> &Path {
        &self.cwd
    }

    fn set_working_directory(&mut self, path: PathBuf) {
        self.cwd = path;
    }

    fn env_var(&self, name: &str) -> Option<String> {
        match self.overrides.get(name) {
            Some(value) => value.clone(),
            None => std::env::var(name).ok(),
        }
    }
}

/// Interrupt and suspend gestures, as cooperative flags.
///
/// Setting a flag does nothing else, so a signal handler may call
/// [`request_interrupt`](Self::request_interrupt) directly. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct JobControls {
    interrupt: Arc<AtomicBool>,
    suspend: Arc<AtomicBool>,
}

impl JobControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    pub fn request_suspend(&self) {
        self.suspend.store(true, Ordering::SeqCst);
    }

    /// Consume a pending interrupt.
    pub fn take_interrupt(&self) -> bool {
        self.interrupt.swap(false, Ordering::SeqCst)
    }

    /// Consume a pending suspend.
    pub fn take_suspend(&self) -> bool {
        self.suspend.swap(false, Ordering::SeqCst)
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    pub fn suspend_pending(&self) -> bool {
        self.suspend.load(Ordering::SeqCst)
    }

    /// Drop any stale gestures.
    pub fn clear(&self) {
        self.interrupt.store(false, Ordering::SeqCst);
        self.suspend.store(false, Ordering::SeqCst);
    }
}

/// The host's event loop, as seen from inside a long-running operation.
///
/// The core calls `pump` once per loop iteration while a foreground pipeline,
/// `fg`, or multiWatch is in progress. Implementations process pending UI
/// events and may raise gestures through `controls`.
pub trait EventPump {
    fn pump(&mut self, controls: &JobControls);
}

/// Pump for hosts with nothing to process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPump;

impl EventPump for NoopPump {
    fn pump(&mut self, _controls: &JobControls) {}
}

impl<F> EventPump for F
where
    F: FnMut(&JobControls),
{
    fn pump(&mut self, controls: &JobControls) {
        self(controls)
    }
}
