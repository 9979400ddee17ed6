//! Error types shared by all phases of a word count job.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit status for a successful job.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status for a job that failed after processing started.
pub const EXIT_JOB_FAILED: i32 = 1;
/// Exit status for an invalid invocation.
pub const EXIT_INVALID_INVOCATION: i32 = 2;

#[derive(Error, Debug)]
pub enum Error {
    /// A source is missing or unreadable, or a partition boundary could not be resolved.
    #[error("input error on {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid or missing locations/options. Always raised before any partition is dispatched.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any other failure once processing has started.
    #[error("job execution failed: {0}")]
    JobExecution(String),
}

impl Error {
    pub fn input(path: impl Into<PathBuf>, source: io::Error) -> Error {
        Error::Input {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Error {
        Error::Configuration(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Error {
        Error::JobExecution(msg.into())
    }

    /// The process exit status a caller should report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration(_) => EXIT_INVALID_INVOCATION,
            Error::Input { .. } | Error::JobExecution(_) => EXIT_JOB_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let e = Error::config("no output location");
        assert_eq!(e.exit_code(), EXIT_INVALID_INVOCATION);

        let e = Error::input("missing.txt", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(e.exit_code(), EXIT_JOB_FAILED);
        assert!(e.to_string().contains("missing.txt"));

        assert_eq!(Error::execution("boom").exit_code(), EXIT_JOB_FAILED);
    }
}
