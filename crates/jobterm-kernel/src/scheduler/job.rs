//! Job tracking: suspended and background tables, and teardown.
//!
//! A [`Job`] owns every child process of one pipeline. Only the last stage is
//! *tracked*: its pid identifies the job, its exit is the job's exit, and
//! gestures are delivered to it alone. Earlier stages are reaped quietly.

use std::io::PipeReader;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus};

use jobterm_types::{ExitReport, JobInfo, JobState};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::text::signal_name;

/// Convert a raw wait status into a report.
pub fn exit_report(status: ExitStatus) -> ExitReport {
    match (status.code(), status.signal()) {
        (Some(code), _) => ExitReport::Exited(code),
        (None, Some(signo)) => ExitReport::Signaled(signal_name(signo)),
        (None, None) => ExitReport::Exited(-1),
    }
}

/// Send `sig` to a single process.
pub fn send_signal(pid: u32, sig: Signal) -> nix::Result<()> {
    signal::kill(Pid::from_raw(pid as i32), sig)
}

/// One pipeline's processes.
#[derive(Debug)]
pub struct Job {
    pid: u32,
    command: String,
    state: JobState,
    exit: Option<ExitReport>,
    tracked: Child,
    others: Vec<Child>,
    capture: Option<PipeReader>,
}

impl Job {
    /// Wrap spawned children. `tracked` is the last stage.
    pub fn new(
        command: impl Into<String>,
        tracked: Child,
        others: Vec<Child>,
        capture: Option<PipeReader>,
    ) -> Self {
        let command = command.into();
        Self {
            pid: tracked.id(),
            command: if command.is_empty() {
                "unknown".to_string()
            } else {
                command
            },
            state: JobState::Running,
            exit: None,
            tracked,
            others,
            capture,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: JobState) {
        self.state = state;
    }

    pub(crate) fn capture_mut(&mut self) -> Option<&mut PipeReader> {
        self.capture.as_mut()
    }

    /// Close the capture pipe after end-of-file.
    pub(crate) fn close_capture(&mut self) {
        self.capture = None;
    }

    /// Non-blocking check of the tracked process.
    ///
    /// Earlier stages that have exited are reaped along the way.
    pub fn try_reap(&mut self) -> std::io::Result<Option<ExitReport>> {
        if let Some(report) = &self.exit {
            return Ok(Some(report.clone()));
        }
        self.reap_others();
        match self.tracked.try_wait()? {
            Some(status) => {
                let report = exit_report(status);
                self.state = JobState::Completed;
                self.exit = Some(report.clone());
                Ok(Some(report))
            }
            None => Ok(None),
        }
    }

    fn reap_others(&mut self) {
        self.others.retain_mut(|child| !matches!(child.try_wait(), Ok(Some(_)) | Err(_)));
    }

    /// Deliver a signal to the tracked process.
    pub fn signal(&self, sig: Signal) -> nix::Result<()> {
        send_signal(self.pid, sig)
    }

    /// True once every stage has been reaped.
    pub(crate) fn settle(&mut self) -> bool {
        let finished = !matches!(self.try_reap(), Ok(None));
        self.reap_others();
        finished && self.others.is_empty()
    }

    /// SIGKILL every stage and wait for each one.
    pub fn kill_and_reap(&mut self) {
        for child in self.others.iter_mut().chain(std::iter::once(&mut self.tracked)) {
            if let Err(e) = child.kill() {
                tracing::trace!("kill {}: {}", child.id(), e);
            }
            if let Err(e) = child.wait() {
                tracing::debug!("wait {}: {}", child.id(), e);
            }
        }
        self.others.clear();
        self.capture = None;
        self.state = JobState::Completed;
    }

    pub fn info(&self, index: usize) -> JobInfo {
        JobInfo {
            index,
            pid: self.pid,
            command: self.command.clone(),
            state: self.state,
        }
    }
}

/// Bounded table of jobs, in insertion order.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    capacity: usize,
}

impl JobTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a job, or hand it back when the table is full.
    pub fn push(&mut self, job: Job) -> Result<(), Job> {
        if self.is_full() {
            return Err(job);
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Remove the most recently inserted job.
    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.capacity
    }

    /// Remove every job whose tracked process has exited, in table order.
    pub fn reap(&mut self) -> Vec<Job> {
        let mut done = Vec::new();
        let mut kept = Vec::with_capacity(self.jobs.len());
        for mut job in self.jobs.drain(..) {
            match job.try_reap() {
                Ok(Some(_)) => done.push(job),
                Ok(None) => kept.push(job),
                Err(e) => {
                    tracing::warn!("wait for [{}] failed: {}", job.pid(), e);
                    kept.push(job);
                }
            }
        }
        self.jobs = kept;
        done
    }

    /// Listing entries, 1-based.
    pub fn infos(&self) -> Vec<JobInfo> {
        self.jobs
            .iter()
            .enumerate()
            .map(|(i, job)| job.info(i + 1))
            .collect()
    }

    /// SIGKILL and reap every job, emptying the table.
    pub fn kill_all(&mut self) {
        for mut job in self.jobs.drain(..) {
            tracing::debug!("terminating [{}] {}", job.pid(), job.command());
            job.kill_and_reap();
        }
    }
}

/// The session's suspended (LIFO) and background tables.
///
/// Jobs that overflow a table, jobs abandoned after an interrupt, and finished
/// pipelines whose earlier stages are still running are kept untracked: they
/// are never listed or announced, only reaped quietly and killed at shutdown.
#[derive(Debug)]
pub struct JobManager {
    suspended: JobTable,
    background: JobTable,
    untracked: Vec<Job>,
}

impl JobManager {
    pub fn new(suspended_capacity: usize, background_capacity: usize) -> Self {
        Self {
            suspended: JobTable::with_capacity(suspended_capacity),
            background: JobTable::with_capacity(background_capacity),
            untracked: Vec::new(),
        }
    }

    /// Track a stopped job. Returns its pid, or `None` when the table was full.
    pub fn suspend(&mut self, mut job: Job) -> Option<u32> {
        job.set_state(JobState::Suspended);
        let pid = job.pid();
        match self.suspended.push(job) {
            Ok(()) => Some(pid),
            Err(job) => {
                tracing::warn!("suspended table full, [{}] is no longer tracked", pid);
                self.abandon(job);
                None
            }
        }
    }

    /// Track a background job. Returns its pid, or `None` when the table was full.
    pub fn add_background(&mut self, mut job: Job) -> Option<u32> {
        job.set_state(JobState::Background);
        let pid = job.pid();
        match self.background.push(job) {
            Ok(()) => Some(pid),
            Err(job) => {
                tracing::warn!("background table full, [{}] is no longer tracked", pid);
                self.abandon(job);
                None
            }
        }
    }

    /// Most recently suspended job.
    pub fn pop_suspended(&mut self) -> Option<Job> {
        self.suspended.pop()
    }

    /// Stop tracking a job; its processes are reaped quietly on later ticks.
    pub fn abandon(&mut self, mut job: Job) {
        if !job.settle() {
            self.untracked.push(job);
        }
    }

    pub fn suspended(&self) -> Vec<JobInfo> {
        self.suspended.infos()
    }

    pub fn background(&self) -> Vec<JobInfo> {
        self.background.infos()
    }

    pub fn untracked_len(&self) -> usize {
        self.untracked.len()
    }

    /// Reap finished background jobs, returning their pids in table order.
    pub fn reap_background(&mut self) -> Vec<u32> {
        self.untracked.retain_mut(|job| !job.settle());
        let mut pids = Vec::new();
        for job in self.background.reap() {
            pids.push(job.pid());
            self.abandon(job);
        }
        pids
    }

    /// Forcibly terminate and reap everything still tracked.
    pub fn shutdown(&mut self) {
        self.background.kill_all();
        self.suspended.kill_all();
        for mut job in self.untracked.drain(..) {
            job.kill_and_reap();
        }
    }
}
