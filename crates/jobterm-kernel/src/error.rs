//! Error types for the jobterm core.
//!
//! User-triggered failures never surface as errors: they are rendered as
//! display lines. The types here cover malformed input, which becomes a
//! diagnostic line, and internal resource failures, which abort a single
//! dispatch and go to the developer log.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed command text. `Display` is the user-facing diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("multiWatch: malformed arguments (expected [ ... ])")]
    MalformedWatchList,
    #[error("multiWatch: no commands found")]
    NoWatchCommands,
    #[error("Error: Redirection specified but no command given")]
    RedirectWithoutCommand,
}

/// Failure to set up processes for a dispatch.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("pipe: {0}")]
    Pipe(#[source] std::io::Error),
    /// A stage's redirect file could not be opened. `Display` is shown to
    /// the user.
    #[error("open {} file: {}", .direction, crate::text::os_error_text(.source))]
    Redirect {
        direction: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("wait: {0}")]
    Wait(#[source] std::io::Error),
    #[error("poll: {0}")]
    Poll(#[source] nix::Error),
    #[error("temp file {}: {source}", .path.display())]
    TempFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to load a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_render_as_diagnostics() {
        assert_eq!(
            ParseError::MalformedWatchList.to_string(),
            "multiWatch: malformed arguments (expected [ ... ])"
        );
        assert_eq!(
            ParseError::RedirectWithoutCommand.to_string(),
            "Error: Redirection specified but no command given"
        );
    }

    #[test]
    fn redirect_failure_uses_os_wording() {
        let err = SpawnError::Redirect {
            direction: "input",
            path: PathBuf::from("/missing"),
            source: std::io::Error::from_raw_os_error(2),
        };
        assert_eq!(err.to_string(), "open input file: No such file or directory");
    }
}
