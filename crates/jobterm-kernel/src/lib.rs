//! jobterm-kernel: command execution and job control for jobterm.
//!
//! This crate provides:
//!
//! - **Parser**: classifies a dispatched line into a builtin, a multiWatch
//!   command set, or a pipeline
//! - **Scheduler**: pipeline spawning over OS pipes, the non-blocking
//!   foreground loop, suspended/background job tables, and multiWatch
//! - **Session**: the composition root a front end drives
//! - **History**: append/search/list stores
//! - **Config**: TOML-backed session tunables
//!
//! The core is single-threaded. Every wait is non-blocking or bounded by a
//! short timeout, and the host's [`EventPump`] is called once per loop
//! iteration while a command is in progress.

pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod parser;
pub mod paths;
pub mod scheduler;
pub mod session;
pub mod text;

pub use config::SessionConfig;
pub use context::{EventPump, JobControls, LocalContext, NoopPump, SessionContext};
pub use error::{ConfigError, ParseError, SpawnError};
pub use history::{FileHistory, HistoryStore, MemoryHistory};
pub use parser::{Pipeline, Request, Stage, parse};
pub use session::{Dispatch, Session};

// Data types, for embedders that only depend on the kernel
pub use jobterm_types::{CaptureSink, DisplaySink, ExitReport, JobInfo, JobState};
