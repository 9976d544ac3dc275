//! The Session: one interactive terminal's command state.
//!
//! A `Session` owns the working directory context, the display sink, the
//! history store, the job tables, and the foreground slot. The host calls
//! [`Session::dispatch`] once per entered line, [`Session::tick_background_reap`]
//! periodically, and forwards user gestures with
//! [`Session::forward_interrupt`] / [`Session::forward_suspend`].
//!
//! ```text
//!   dispatch(line) ─▶ history.append ─▶ parse
//!        ├─ builtin ─────────────▶ history / cd / fg / jobs / exit
//!        ├─ multiWatch ──────────▶ Watch::run
//!        └─ pipeline ─▶ spawn ─┬─ background ─▶ JobManager
//!                              └─ foreground ─▶ Foreground::wait
//! ```

use std::path::{Path, PathBuf};

use jobterm_types::{DisplaySink, ExitReport, JobInfo, JobState};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::AccessFlags;

use crate::config::SessionConfig;
use crate::context::{EventPump, JobControls, LocalContext, NoopPump, SessionContext};
use crate::error::SpawnError;
use crate::history::{FileHistory, HISTORY_WINDOW, HistoryStore};
use crate::parser::{self, Pipeline, Request};
use crate::paths;
use crate::scheduler::{Foreground, Job, JobManager, Launch, Outcome, Watch, WatchSettings, spawn_pipeline};
use crate::text::{display_directory, errno_text, os_error_text, truncate_for_display};

/// Most search matches listed when a search is ambiguous.
pub const SHOWN_SEARCH_MATCHES: usize = 10;

/// What the host should do after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Exit,
}

/// One terminal's command state.
pub struct Session {
    config: SessionConfig,
    context: Box<dyn SessionContext>,
    sink: Box<dyn DisplaySink>,
    history: Box<dyn HistoryStore>,
    pump: Box<dyn EventPump>,
    controls: JobControls,
    jobs: JobManager,
    foreground: Option<Job>,
    shut_down: bool,
}

impl Session {
    /// Create a session in `context`, reporting to `sink`.
    ///
    /// History goes to `config.history_file`, resolved against the initial
    /// working directory.
    pub fn new(
        config: SessionConfig,
        context: impl SessionContext + 'static,
        sink: impl DisplaySink + 'static,
    ) -> Self {
        let history_path = paths::resolve(context.working_directory(), &config.history_file);
        let jobs = JobManager::new(config.suspended_capacity, config.background_capacity);
        Self {
            context: Box::new(context),
            sink: Box::new(sink),
            history: Box::new(FileHistory::open(history_path)),
            pump: Box::new(NoopPump),
            controls: JobControls::new(),
            jobs,
            foreground: None,
            shut_down: false,
            config,
        }
    }

    /// Session in the process's current directory.
    pub fn local(config: SessionConfig, sink: impl DisplaySink + 'static) -> Self {
        Self::new(config, LocalContext::from_process(), sink)
    }

    pub fn with_history(mut self, history: impl HistoryStore + 'static) -> Self {
        self.history = Box::new(history);
        self
    }

    pub fn with_pump(mut self, pump: impl EventPump + 'static) -> Self {
        self.pump = Box::new(pump);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn working_directory(&self) -> &Path {
        self.context.working_directory()
    }

    pub fn history(&self) -> &dyn HistoryStore {
        self.history.as_ref()
    }

    /// Shared handle over the gesture flags.
    pub fn controls(&self) -> JobControls {
        self.controls.clone()
    }

    pub fn forward_interrupt(&self) {
        self.controls.request_interrupt();
    }

    pub fn forward_suspend(&self) {
        self.controls.request_suspend();
    }

    pub fn suspended_jobs(&self) -> Vec<JobInfo> {
        self.jobs.suspended()
    }

    pub fn background_jobs(&self) -> Vec<JobInfo> {
        self.jobs.background()
    }

    /// The job currently in the foreground, if a dispatch is in progress.
    pub fn foreground_job(&self) -> Option<JobInfo> {
        self.foreground.as_ref().map(|job| job.info(1))
    }

    fn emit(&mut self, line: &str) {
        self.sink.append_line(line);
    }

    /// Handle one entered line.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn dispatch(&mut self, line: &str) -> Dispatch {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            return Dispatch::Continue;
        }
        self.history.append(line);

        let request = match parser::parse(line) {
            Ok(request) => request,
            Err(e) => {
                self.emit(&e.to_string());
                return Dispatch::Continue;
            }
        };

        match request {
            Request::Empty => {}
            Request::History => self.show_history(),
            Request::Cd(target) => self.change_directory(target.as_deref()),
            Request::Fg => self.resume_suspended(),
            Request::Jobs => self.list_jobs(),
            Request::MultiWatch(commands) => self.multi_watch(&commands),
            Request::Exit => {
                self.emit("Closing jobterm...");
                return Dispatch::Exit;
            }
            Request::Run(pipeline) => self.run_pipeline(&pipeline),
        }
        Dispatch::Continue
    }

    /// Reap finished background jobs and announce each one.
    pub fn tick_background_reap(&mut self) {
        for pid in self.jobs.reap_background() {
            self.emit(&format!("[{}] done", pid));
        }
    }

    /// Directory children are started in: the session directory if it still
    /// exists, else `$HOME`, else `/`.
    fn launch_dir(&self) -> PathBuf {
        let cwd = self.context.working_directory();
        if cwd.is_dir() {
            return cwd.to_path_buf();
        }
        match self.context.env_var("HOME").map(PathBuf::from) {
            Some(home) if home.is_dir() => home,
            _ => PathBuf::from("/"),
        }
    }

    fn run_pipeline(&mut self, pipeline: &Pipeline) {
        let cwd = self.launch_dir();
        let launch = Launch {
            interpreter: &self.config.interpreter,
            cwd: &cwd,
        };
        let job = match spawn_pipeline(pipeline, &launch) {
            Ok(job) => job,
            Err(e) => {
                self.spawn_failed(e);
                return;
            }
        };

        if pipeline.background {
            if let Some(pid) = self.jobs.add_background(job) {
                self.emit(&format!("[{}] running in background", pid));
            }
            return;
        }

        self.controls.clear();
        self.foreground = Some(job);
        if let Some(report) = self.wait_foreground() {
            match report {
                ExitReport::Exited(0) => {}
                ExitReport::Exited(code) => {
                    self.emit(&format!("Command exited with status {}", code))
                }
                ExitReport::Signaled(name) => {
                    self.emit(&format!("Command terminated by signal {}", name))
                }
            }
        }
    }

    fn spawn_failed(&mut self, err: SpawnError) {
        match err {
            SpawnError::Redirect { .. } => self.emit(&err.to_string()),
            other => tracing::error!("dispatch aborted: {}", other),
        }
    }

    /// Wait on the foreground slot and settle the job afterwards.
    ///
    /// Returns the exit report when the job ran to completion.
    fn wait_foreground(&mut self) -> Option<ExitReport> {
        let job = self.foreground.as_mut()?;
        let mut fg = Foreground {
            sink: &mut *self.sink,
            pump: &mut *self.pump,
            controls: &self.controls,
            poll_interval: self.config.poll_interval(),
        };
        let outcome = fg.wait(job);
        let job = self.foreground.take()?;

        match outcome {
            Ok(Outcome::Exited(report)) => {
                self.jobs.abandon(job);
                Some(report)
            }
            Ok(Outcome::Interrupted) => {
                self.jobs.abandon(job);
                self.emit("^C");
                None
            }
            Ok(Outcome::Suspended) => {
                if let Some(pid) = self.jobs.suspend(job) {
                    self.emit(&format!("[{}] suspended", pid));
                }
                self.emit("^Z");
                None
            }
            Err(e) => {
                let mut job = job;
                job.kill_and_reap();
                self.spawn_failed(e);
                None
            }
        }
    }

    fn resume_suspended(&mut self) {
        let Some(mut job) = self.jobs.pop_suspended() else {
            self.emit("fg: no suspended jobs");
            return;
        };
        if let Err(errno) = job.signal(Signal::SIGCONT) {
            self.emit(&format!(
                "fg: cannot resume [{}]: {}",
                job.pid(),
                errno_text(errno)
            ));
            self.jobs.abandon(job);
            return;
        }

        let pid = job.pid();
        self.emit(&format!(
            "Resumed [{}]: {}",
            pid,
            truncate_for_display(job.command())
        ));
        job.set_state(JobState::Running);
        self.controls.clear();
        self.foreground = Some(job);
        if let Some(report) = self.wait_foreground() {
            self.emit(&format!("[{}] {}", pid, report));
        }
    }

    fn list_jobs(&mut self) {
        let jobs = self.jobs.suspended();
        if jobs.is_empty() {
            self.emit("No suspended jobs");
            return;
        }
        self.emit("Suspended jobs:");
        for info in jobs {
            self.emit(&format!(
                "[{}] {} {}",
                info.index,
                info.pid,
                truncate_for_display(&info.command)
            ));
        }
    }

    fn change_directory(&mut self, target: Option<&str>) {
        let target = match target {
            Some(path) => PathBuf::from(path),
            None => self
                .context
                .env_var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/")),
        };
        let resolved = paths::resolve(self.context.working_directory(), &target);

        let checked = std::fs::canonicalize(&resolved).and_then(|dir| {
            if !dir.is_dir() {
                return Err(std::io::Error::from(Errno::ENOTDIR));
            }
            nix::unistd::access(&dir, AccessFlags::X_OK).map_err(std::io::Error::from)?;
            Ok(dir)
        });

        match checked {
            Ok(dir) => {
                let shown = display_directory(&dir.to_string_lossy());
                self.context.set_working_directory(dir);
                self.emit(&format!("[changed directory to {}]", shown));
            }
            Err(e) => self.emit(&format!("cd: {}", os_error_text(&e))),
        }
    }

    fn show_history(&mut self) {
        let lines = self.history.list_all();
        if lines.is_empty() {
            self.emit("No history found");
            return;
        }
        let start = lines.len().saturating_sub(HISTORY_WINDOW);
        for (i, line) in lines.iter().enumerate().skip(start) {
            self.emit(&format!("{:>5}  {}", i + 1, line));
        }
    }

    /// Search history for `term`, most recent first.
    ///
    /// Reports the result to the sink and returns the recalled command.
    pub fn search_history(&mut self, term: &str) -> Option<String> {
        if self.history.list_all().is_empty() {
            self.emit("No commands in history yet");
            return None;
        }
        let matches = self.history.search(term);
        match matches.len() {
            0 => {
                self.emit("No match found in history");
                None
            }
            1 => {
                self.emit("Command found");
                matches.into_iter().next()
            }
            _ => {
                self.emit("Multiple matches found (using most recent):");
                for (i, found) in matches.iter().take(SHOWN_SEARCH_MATCHES).enumerate() {
                    self.emit(&format!("  {}. {}", i + 1, found));
                }
                matches.into_iter().next()
            }
        }
    }

    fn multi_watch(&mut self, commands: &[String]) {
        let cwd = self.launch_dir();
        self.controls.clear();
        let mut watch = Watch {
            sink: &mut *self.sink,
            pump: &mut *self.pump,
            controls: &self.controls,
            settings: WatchSettings {
                interpreter: &self.config.interpreter,
                cwd: &cwd,
                dir: &self.config.watch_dir,
                poll_interval: self.config.watch_poll(),
                warmup: self.config.watch_warmup(),
                trap_interrupt: self.config.trap_watch_interrupt,
            },
        };
        if let Err(e) = watch.run(commands) {
            tracing::error!("multiWatch aborted: {}", e);
        }
    }

    /// Kill and reap every tracked job. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if let Some(mut job) = self.foreground.take() {
            job.kill_and_reap();
        }
        self.jobs.shutdown();
        tracing::debug!("session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
