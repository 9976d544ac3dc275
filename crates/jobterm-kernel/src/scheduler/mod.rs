//! Scheduler module for jobterm: pipelines, job tables, and multiWatch.
//!
//! This module provides:
//! - **Pipeline execution**: spawn stages connected by OS pipes and wait for
//!   the last one without ever blocking the host's event loop.
//! - **Job control**: bounded suspended and background tables, reaping, and
//!   forced teardown.
//! - **multiWatch**: parallel commands whose output is tailed from capture
//!   files and shown as labeled blocks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  spawn_pipeline + Foreground                  │
//! │  ┌─────────┐   pipe    ┌─────────┐   pipe    ┌─────────┐      │
//! │  │ stage 1 │──────────▶│ stage 2 │──────────▶│ stage N │──▶ sink
//! │  └─────────┘           └─────────┘           └─────────┘      │
//! │  loop: try_wait ─▶ poll(capture) ─▶ pump ─▶ gestures           │
//! └──────────────────────────────────────────────────────────────┘
//!
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         JobManager                            │
//! │  suspended: JobTable (LIFO, bounded)                          │
//! │  background: JobTable (bounded, reaped on tick)               │
//! │  untracked: overflow and abandoned children, reaped quietly   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod job;
mod pipeline;
mod watch;

pub use job::{Job, JobManager, JobTable, exit_report, send_signal};
pub use pipeline::{Foreground, Launch, Outcome, READ_CHUNK, spawn_pipeline};
pub use watch::{SEPARATOR_WIDTH, Watch, WatchSettings};
