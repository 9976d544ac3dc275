//! Pipeline execution.
//!
//! Every stage runs as `interpreter -c TEXT` in its own process group. Stage
//! `k`'s stdout feeds stage `k+1`'s stdin through an OS pipe; the first stage
//! reads `/dev/null` unless redirected. The last stage writes both stdout and
//! stderr to a capture pipe (or to its `>` file), which the foreground loop
//! drains into the display sink.
//!
//! ```text
//!   /dev/null ──▶ stage 1 ──pipe──▶ stage 2 ──pipe──▶ stage N ──capture──▶ sink
//!                 stderr: inherited                   stderr: capture
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, PipeReader, Read};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use jobterm_types::{DisplaySink, ExitReport};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::signal::Signal;

use crate::context::{EventPump, JobControls};
use crate::error::SpawnError;
use crate::parser::{Pipeline, Stage};
use crate::paths;
use crate::text::split_chunk;

use super::job::Job;

/// Bytes read from a capture pipe per readiness event.
pub const READ_CHUNK: usize = 8192;

/// Where and how stages are launched.
#[derive(Debug, Clone, Copy)]
pub struct Launch<'a> {
    pub interpreter: &'a Path,
    pub cwd: &'a Path,
}

/// Spawn every stage of `pipeline` and return the job that owns them.
///
/// On failure, stages already started are killed and reaped.
#[tracing::instrument(level = "debug", skip(pipeline, launch), fields(stages = pipeline.len()))]
pub fn spawn_pipeline(pipeline: &Pipeline, launch: &Launch<'_>) -> Result<Job, SpawnError> {
    let mut children = Vec::with_capacity(pipeline.len());
    let capture = match spawn_stages(&pipeline.stages, launch, &mut children) {
        Ok(capture) => capture,
        Err(e) => {
            for child in children.iter_mut() {
                let _ = child.kill();
                let _ = child.wait();
            }
            return Err(e);
        }
    };

    match children.pop() {
        Some(tracked) => {
            tracing::debug!("spawned [{}] {}", tracked.id(), pipeline.text);
            Ok(Job::new(pipeline.text.clone(), tracked, children, capture))
        }
        None => Err(SpawnError::Spawn {
            command: pipeline.text.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty pipeline"),
        }),
    }
}

fn spawn_stages(
    stages: &[Stage],
    launch: &Launch<'_>,
    children: &mut Vec<Child>,
) -> Result<Option<PipeReader>, SpawnError> {
    let mut upstream: Option<PipeReader> = None;
    let mut capture = None;

    for (i, stage) in stages.iter().enumerate() {
        let last = i + 1 == stages.len();
        let mut cmd = Command::new(launch.interpreter);
        cmd.arg("-c")
            .arg(&stage.command)
            .current_dir(launch.cwd)
            .process_group(0);

        if let Some(reader) = upstream.take() {
            cmd.stdin(reader);
        } else if let Some(input) = &stage.input {
            let path = paths::resolve(launch.cwd, input);
            let file = File::open(&path).map_err(|source| SpawnError::Redirect {
                direction: "input",
                path: path.clone(),
                source,
            })?;
            cmd.stdin(file);
        } else {
            cmd.stdin(Stdio::null());
        }

        if !last {
            let (reader, writer) = io::pipe().map_err(SpawnError::Pipe)?;
            cmd.stdout(writer);
            upstream = Some(reader);
        } else if let Some(output) = &stage.output {
            let path = paths::resolve(launch.cwd, output);
            let redirect_err = |source| SpawnError::Redirect {
                direction: "output",
                path: path.clone(),
                source,
            };
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o644)
                .open(&path)
                .map_err(redirect_err)?;
            let err_file = file.try_clone().map_err(redirect_err)?;
            cmd.stdout(file).stderr(err_file);
        } else {
            let (reader, writer) = io::pipe().map_err(SpawnError::Pipe)?;
            let err_writer = writer.try_clone().map_err(SpawnError::Pipe)?;
            cmd.stdout(writer).stderr(err_writer);
            capture = Some(reader);
        }

        let child = cmd.spawn().map_err(|source| SpawnError::Spawn {
            command: stage.command.clone(),
            source,
        })?;
        children.push(child);
        // `cmd` drops here, closing the parent's copies of the write ends.
    }

    Ok(capture)
}

/// How a foreground wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The tracked process exited and its output was drained.
    Exited(ExitReport),
    /// An interrupt was delivered; the job is no longer waited on.
    Interrupted,
    /// A suspend was delivered; the job should move to the suspended table.
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Idle,
    Data,
    Closed,
}

/// The foreground wait loop and the collaborators it talks to.
pub struct Foreground<'a> {
    pub sink: &'a mut dyn DisplaySink,
    pub pump: &'a mut dyn EventPump,
    pub controls: &'a JobControls,
    pub poll_interval: Duration,
}

impl Foreground<'_> {
    /// Wait for `job`, streaming its capture pipe into the sink.
    ///
    /// Each iteration does a non-blocking reap, one bounded readiness check
    /// on the capture pipe, and one call to the event pump. Gestures raised
    /// by the pump are delivered to the tracked process before returning.
    pub fn wait(&mut self, job: &mut Job) -> Result<Outcome, SpawnError> {
        let mut buf = vec![0u8; READ_CHUNK];
        let timeout = poll_timeout(self.poll_interval);

        loop {
            if let Some(report) = job.try_reap().map_err(SpawnError::Wait)? {
                self.drain(job, &mut buf)?;
                return Ok(Outcome::Exited(report));
            }

            let closed = match job.capture_mut() {
                Some(capture) => {
                    read_capture(capture, &mut buf, timeout, &mut *self.sink)? == Readiness::Closed
                }
                None => {
                    std::thread::sleep(self.poll_interval);
                    false
                }
            };
            if closed {
                job.close_capture();
            }

            self.pump.pump(self.controls);

            if self.controls.take_interrupt() {
                deliver(job, Signal::SIGINT);
                return Ok(Outcome::Interrupted);
            }
            if self.controls.take_suspend() {
                deliver(job, Signal::SIGTSTP);
                return Ok(Outcome::Suspended);
            }
        }
    }

    /// Read whatever is still buffered once the tracked process is gone.
    fn drain(&mut self, job: &mut Job, buf: &mut [u8]) -> Result<(), SpawnError> {
        while let Some(capture) = job.capture_mut() {
            match read_capture(capture, buf, PollTimeout::ZERO, &mut *self.sink)? {
                Readiness::Data => {}
                Readiness::Idle => break,
                Readiness::Closed => job.close_capture(),
            }
        }
        Ok(())
    }
}

fn deliver(job: &Job, sig: Signal) {
    if let Err(e) = job.signal(sig) {
        tracing::debug!("{} to [{}] failed: {}", sig, job.pid(), e);
    }
}

pub(crate) fn poll_timeout(interval: Duration) -> PollTimeout {
    PollTimeout::from(u16::try_from(interval.as_millis()).unwrap_or(u16::MAX))
}

/// One bounded readiness check, then at most one read.
///
/// Each read is split on its own: bytes after the read's last newline are
/// shown as a line even if the rest of that line arrives later.
fn read_capture(
    capture: &mut PipeReader,
    buf: &mut [u8],
    timeout: PollTimeout,
    sink: &mut dyn DisplaySink,
) -> Result<Readiness, SpawnError> {
    let revents = {
        let mut fds = [PollFd::new(capture.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, timeout) {
            Ok(0) | Err(Errno::EINTR) => return Ok(Readiness::Idle),
            Ok(_) => fds[0].revents().unwrap_or(PollFlags::empty()),
            Err(e) => return Err(SpawnError::Poll(e)),
        }
    };
    if !revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR) {
        return Ok(Readiness::Idle);
    }

    match capture.read(buf) {
        Ok(0) => Ok(Readiness::Closed),
        Ok(n) => {
            for line in split_chunk(&buf[..n]) {
                sink.append_line(&line);
            }
            Ok(Readiness::Data)
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Readiness::Idle),
        Err(e) => {
            tracing::debug!("capture read failed: {}", e);
            Ok(Readiness::Closed)
        }
    }
}
