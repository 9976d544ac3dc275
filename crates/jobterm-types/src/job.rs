//! Job state and exit reporting types.

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Job is the session's foreground job.
    Running,
    /// Job was paused by a suspend gesture and waits for `fg`.
    Suspended,
    /// Job runs detached and is reaped by periodic ticks.
    Background,
    /// Job's tracked process has exited.
    Completed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Running => write!(f, "Running"),
            JobState::Suspended => write!(f, "Suspended"),
            JobState::Background => write!(f, "Background"),
            JobState::Completed => write!(f, "Completed"),
        }
    }
}

/// How a process terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReport {
    /// Normal exit with a status code.
    Exited(i32),
    /// Killed by a signal, carrying the signal's name (e.g. `SIGKILL`).
    Signaled(String),
}

impl ExitReport {
    /// True for a zero exit status.
    pub fn success(&self) -> bool {
        matches!(self, ExitReport::Exited(0))
    }
}

impl std::fmt::Display for ExitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReport::Exited(code) => write!(f, "exited with status {}", code),
            ExitReport::Signaled(name) => write!(f, "killed by signal {}", name),
        }
    }
}

/// Information about a tracked job, for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    /// 1-based position in its table.
    pub index: usize,
    /// The tracked (last-forked) process id.
    pub pid: u32,
    /// Original command text.
    pub command: String,
    /// Current state.
    pub state: JobState,
}
