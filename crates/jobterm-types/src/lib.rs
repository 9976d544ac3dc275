//! Pure data types for jobterm: job states, exit reports and display sinks.
//!
//! This crate is a leaf dependency with no process control and no I/O.
//! Front ends can depend on it to render job listings or capture output
//! without pulling in the kernel.

pub mod job;
pub mod sink;

// Flat re-exports for convenience
pub use job::*;
pub use sink::*;
