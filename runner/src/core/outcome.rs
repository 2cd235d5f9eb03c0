//! Final status of a single supervised child.
//!
//! Classification is pure: the platform layer turns a native exit status into
//! an [`ExecutionResult`], and [`status_code`] folds a complete `run` outcome
//! into the integer boundary value.

use serde::Serialize;

use crate::error::RunError;
use crate::exit_codes;

/// How a child that was successfully launched finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum ExecutionResult {
    /// Normal exit with the child's own exit code.
    Exited(i32),
    /// Terminated by a POSIX signal or a Windows exception code.
    Signaled(i32),
    /// The deadline elapsed first and the child was forcibly terminated.
    #[serde(rename = "timeout")]
    TimedOut,
}

impl ExecutionResult {
    /// Integer form of this result. Never collides with a normal exit code
    /// for the non-`Exited` variants.
    pub fn code(self) -> i32 {
        match self {
            ExecutionResult::Exited(code) => code,
            ExecutionResult::Signaled(_) => exit_codes::SIGNALED,
            ExecutionResult::TimedOut => exit_codes::TIMED_OUT,
        }
    }

    pub fn success(self) -> bool {
        matches!(self, ExecutionResult::Exited(0))
    }
}

/// Fold the outcome of a complete call into one definite integer.
pub fn status_code(outcome: &Result<ExecutionResult, RunError>) -> i32 {
    match outcome {
        Ok(result) => result.code(),
        Err(RunError::Setup(_)) => exit_codes::SETUP_FAILED,
        Err(RunError::Spawn { .. }) => exit_codes::LAUNCH_FAILED,
        Err(RunError::Supervise(_)) => exit_codes::SUPERVISION_FAILED,
    }
}
