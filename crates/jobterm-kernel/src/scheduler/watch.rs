//! multiWatch: run several commands at once and tail their output.
//!
//! Each command writes stdout and stderr into its own capture file, named
//! after the parent and child pids. After a warm-up delay the files are
//! tailed by byte cursor, and every chunk of new complete lines is shown as
//! a block:
//!
//! ```text
//! "echo A", 2026-01-01 12:00:00:
//! ----------------------------------------------------
//! A
//! ----------------------------------------------------
//! ```
//!
//! The loop ends when every child has exited and an iteration read nothing,
//! or when an interrupt is observed. Children are then killed, files removed,
//! and the previous SIGINT disposition restored.

use std::ffi::c_int;
use std::fs::{self, File, OpenOptions};
use std::os::fd::AsFd;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use jobterm_types::DisplaySink;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

use crate::context::{EventPump, JobControls};
use crate::error::SpawnError;
use crate::paths;
use crate::text::LineBuffer;

use super::pipeline::{READ_CHUNK, poll_timeout};

/// Width of the line framing each output block.
pub const SEPARATOR_WIDTH: usize = 52;

static WATCH_STOP: AtomicBool = AtomicBool::new(false);
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

extern "C" fn on_watch_interrupt(_: c_int) {
    WATCH_STOP.store(true, Ordering::SeqCst);
}

/// SIGINT handler installed for one multiWatch run.
///
/// The handler only raises a stop flag. Dropping the guard restores the
/// disposition that was in effect before.
struct InterruptTrap {
    previous: Option<SigAction>,
}

impl InterruptTrap {
    fn install() -> Self {
        WATCH_STOP.store(false, Ordering::SeqCst);
        let action = SigAction::new(
            SigHandler::Handler(on_watch_interrupt),
            SaFlags::empty(),
            SigSet::empty(),
        );
        // SAFETY: the handler only stores to an atomic.
        match unsafe { sigaction(Signal::SIGINT, &action) } {
            Ok(previous) => Self {
                previous: Some(previous),
            },
            Err(e) => {
                tracing::warn!("could not trap SIGINT for multiWatch: {}", e);
                Self { previous: None }
            }
        }
    }

    fn triggered() -> bool {
        WATCH_STOP.swap(false, Ordering::SeqCst)
    }
}

impl Drop for InterruptTrap {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // SAFETY: restoring a disposition previously returned by sigaction.
            if let Err(e) = unsafe { sigaction(Signal::SIGINT, &previous) } {
                tracing::warn!("could not restore SIGINT disposition: {}", e);
            }
        }
    }
}

/// Launch parameters for a multiWatch run.
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings<'a> {
    pub interpreter: &'a Path,
    pub cwd: &'a Path,
    pub dir: &'a Path,
    pub poll_interval: Duration,
    pub warmup: Duration,
    pub trap_interrupt: bool,
}

/// One member of a multiWatch set.
#[derive(Debug)]
struct WatchTask {
    command: String,
    pid: u32,
    path: PathBuf,
    child: Child,
    running: bool,
    file: Option<File>,
    cursor: u64,
    lines: LineBuffer,
}

impl WatchTask {
    fn spawn(command: &str, settings: &WatchSettings<'_>) -> Result<Self, SpawnError> {
        let parent = std::process::id();
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        let staging = settings
            .dir
            .join(format!(".temp_mw_{}_staging{}.txt", parent, seq));
        let temp_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| SpawnError::TempFile { path, source }
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(&staging)
            .map_err(temp_err(&staging))?;
        let err_file = file.try_clone().map_err(temp_err(&staging))?;

        let spawned = Command::new(settings.interpreter)
            .arg("-c")
            .arg(command)
            .current_dir(settings.cwd)
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(file)
            .stderr(err_file)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                let _ = fs::remove_file(&staging);
                return Err(SpawnError::Spawn {
                    command: command.to_string(),
                    source,
                });
            }
        };

        let pid = child.id();
        let path = paths::watch_capture_file(settings.dir, parent, pid);
        if let Err(source) = fs::rename(&staging, &path) {
            let _ = child.kill();
            let _ = child.wait();
            let _ = fs::remove_file(&staging);
            return Err(SpawnError::TempFile {
                path: staging,
                source,
            });
        }

        tracing::debug!("multiWatch [{}] {} -> {}", pid, command, path.display());
        Ok(Self {
            command: command.to_string(),
            pid,
            path,
            child,
            running: true,
            file: None,
            cursor: 0,
            lines: LineBuffer::new(),
        })
    }

    fn reap(&mut self) {
        if self.running && !matches!(self.child.try_wait(), Ok(None)) {
            self.running = false;
        }
    }
}

/// Every task of one run; dropping it kills, reaps and unlinks.
#[derive(Debug, Default)]
struct WatchSet {
    tasks: Vec<WatchTask>,
}

impl Drop for WatchSet {
    fn drop(&mut self) {
        for task in self.tasks.iter_mut() {
            if task.running {
                let _ = task.child.kill();
            }
            if let Err(e) = task.child.wait() {
                tracing::debug!("wait [{}]: {}", task.pid, e);
            }
            task.file = None;
            if let Err(e) = fs::remove_file(&task.path) {
                tracing::debug!("remove {}: {}", task.path.display(), e);
            }
        }
    }
}

/// A multiWatch run and the collaborators it reports to.
pub struct Watch<'a> {
    pub sink: &'a mut dyn DisplaySink,
    pub pump: &'a mut dyn EventPump,
    pub controls: &'a JobControls,
    pub settings: WatchSettings<'a>,
}

impl Watch<'_> {
    /// Run `commands` to completion or interruption.
    ///
    /// Cleanup and the completion line happen even when setup fails.
    #[tracing::instrument(level = "debug", skip(self, commands), fields(count = commands.len()))]
    pub fn run(&mut self, commands: &[String]) -> Result<(), SpawnError> {
        self.sink.append_line("multiWatch: starting parallel execution");
        let trap = self.settings.trap_interrupt.then(InterruptTrap::install);

        let mut set = WatchSet::default();
        let result = self.start(commands, &mut set).and_then(|()| self.tail(&mut set));

        drop(set);
        drop(trap);
        self.sink.append_line("multiWatch: execution completed");
        result
    }

    fn start(&mut self, commands: &[String], set: &mut WatchSet) -> Result<(), SpawnError> {
        for command in commands {
            set.tasks.push(WatchTask::spawn(command, &self.settings)?);
        }

        std::thread::sleep(self.settings.warmup);

        for task in set.tasks.iter_mut() {
            match File::open(&task.path) {
                Ok(file) => task.file = Some(file),
                Err(e) => {
                    tracing::debug!("open {}: {}", task.path.display(), e);
                    self.sink.append_line(&format!(
                        "Warning: Could not open temp file for PID {}",
                        task.pid
                    ));
                }
            }
        }
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        let trapped = self.settings.trap_interrupt && InterruptTrap::triggered();
        trapped | self.controls.take_interrupt()
    }

    fn tail(&mut self, set: &mut WatchSet) -> Result<(), SpawnError> {
        let mut buf = vec![0u8; READ_CHUNK];
        let timeout = poll_timeout(self.settings.poll_interval);

        loop {
            if self.stop_requested() {
                tracing::debug!("multiWatch interrupted");
                return Ok(());
            }

            let ready = {
                let mut owners = Vec::new();
                let mut fds = Vec::new();
                for (i, task) in set.tasks.iter().enumerate() {
                    if let Some(file) = &task.file {
                        owners.push(i);
                        fds.push(PollFd::new(file.as_fd(), PollFlags::POLLIN));
                    }
                }
                if fds.is_empty() {
                    std::thread::sleep(self.settings.poll_interval);
                    Vec::new()
                } else {
                    match poll(&mut fds, timeout) {
                        Ok(_) => owners
                            .into_iter()
                            .zip(fds.iter())
                            .filter(|(_, fd)| {
                                fd.revents().is_some_and(|r| {
                                    r.intersects(
                                        PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR,
                                    )
                                })
                            })
                            .map(|(i, _)| i)
                            .collect(),
                        Err(Errno::EINTR) => Vec::new(),
                        Err(e) => return Err(SpawnError::Poll(e)),
                    }
                }
            };

            for task in set.tasks.iter_mut() {
                task.reap();
            }
            let running = set.tasks.iter().filter(|t| t.running).count();

            let mut produced = false;
            for i in ready {
                produced |= self.read_task(&mut set.tasks[i], &mut buf);
            }

            self.pump.pump(self.controls);

            if running == 0 && !produced {
                break;
            }
        }

        for task in set.tasks.iter_mut() {
            while self.read_task(task, &mut buf) {}
            self.flush(task);
        }
        Ok(())
    }

    /// One positioned read at the task's cursor. Returns true if bytes arrived.
    fn read_task(&mut self, task: &mut WatchTask, buf: &mut [u8]) -> bool {
        let Some(file) = &task.file else {
            return false;
        };
        match file.read_at(buf, task.cursor) {
            Ok(0) => {
                // The file can still grow while its writer is alive.
                if !task.running {
                    task.file = None;
                    self.flush(task);
                }
                false
            }
            Ok(n) => {
                task.cursor += n as u64;
                let lines = task.lines.push(&buf[..n]);
                if !lines.is_empty() {
                    self.block(&task.command, &lines);
                }
                true
            }
            Err(e) => {
                tracing::debug!("read {}: {}", task.path.display(), e);
                task.file = None;
                self.flush(task);
                false
            }
        }
    }

    /// Emit a trailing line that never got its newline.
    fn flush(&mut self, task: &mut WatchTask) {
        if let Some(rest) = task.lines.finish() {
            self.block(&task.command, &[rest]);
        }
    }

    fn block(&mut self, command: &str, lines: &[String]) {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let separator = "-".repeat(SEPARATOR_WIDTH);
        self.sink.append_line(&format!("\"{}\", {}:", command, stamp));
        self.sink.append_line(&separator);
        for line in lines {
            self.sink.append_line(line);
        }
        self.sink.append_line(&separator);
    }
}
