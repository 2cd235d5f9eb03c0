//! Error taxonomy for a single run.
//!
//! Setup and spawn errors are raised before any child exists, so they never
//! require process cleanup. Logging failures have no variant here: they are
//! swallowed inside [`crate::io::diag`].

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// One of the three standard streams of the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stream::Stdin => "stdin",
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        })
    }
}

/// Invalid settings or an unopenable redirection target.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("program path is empty")]
    EmptyProgram,

    #[error("invalid environment entry {0:?}: expected KEY=VALUE")]
    InvalidEnv(String),

    #[error("cannot open {stream} redirection {}: {source}", .path.display())]
    Redirect {
        stream: Stream,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Anything that stops a run from producing an [`ExecutionResult`].
///
/// [`ExecutionResult`]: crate::core::outcome::ExecutionResult
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// The OS refused to create the process (missing or non-executable program).
    #[error("failed to launch {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Waiting on a live child failed. The child is still terminated and reaped.
    #[error("failed to wait for child: {0}")]
    Supervise(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("privilege {0:?} not found")]
    NotFound(String),
}
