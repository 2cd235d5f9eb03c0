//! Race child completion against the deadline.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::outcome::ExecutionResult;
use crate::diag;
use crate::error::RunError;
use crate::io::diag::Logger;
use crate::io::launch::{ChildGuard, KILL_GRACE};
use crate::platform::{Native, ProcessControl};

/// Wait for `child`, bounded by `deadline` when one is set.
///
/// On expiry the child and its group are killed and reaped before
/// [`ExecutionResult::TimedOut`] is returned. If waiting fails the guard still
/// terminates and reaps the child when it is dropped.
#[instrument(skip_all, fields(pid = child.id(), timeout_secs = deadline.map(|d| d.as_secs())))]
pub fn supervise(
    child: &mut ChildGuard,
    deadline: Option<Duration>,
    logger: &Logger,
) -> Result<ExecutionResult, RunError> {
    let status = match deadline {
        None => child.wait().map_err(RunError::Supervise)?,
        Some(limit) => match child.wait_timeout(limit).map_err(RunError::Supervise)? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = limit.as_secs(), "child timed out, killing");
                diag!(logger, "Timeout expired, killing all child processes\n");
                if let Err(err) = child.terminate() {
                    warn!(err = %err, "terminate after timeout failed");
                }
                if !child.reap_within(KILL_GRACE).map_err(RunError::Supervise)? {
                    warn!(pid = child.id(), "child survived kill after timeout");
                }
                return Ok(ExecutionResult::TimedOut);
            }
        },
    };

    let result = Native::classify(status);
    if let ExecutionResult::Signaled(signal) = result {
        diag!(logger, "The child process was killed by signal {}\n", signal);
    }
    debug!(result = ?result, "child finished");
    Ok(result)
}
