//! One synchronous, timeout-bounded run: settings in, one result out.

use tracing::{info, instrument};

use crate::core::outcome::{ExecutionResult, status_code};
use crate::diag;
use crate::error::RunError;
use crate::io::launch::launch;
use crate::io::redirect::OpenedStreams;
use crate::io::supervise::supervise;
use crate::settings::RunSettings;

/// Launch `settings.program`, wait for it within the configured limit, and
/// report how it finished.
///
/// Setup problems (invalid settings, unopenable redirection targets) are
/// reported before any child exists. Once a child is spawned it is always
/// terminated if still alive and reaped before this returns.
#[instrument(skip_all, fields(program = %settings.program.display()))]
pub fn run(settings: RunSettings) -> Result<ExecutionResult, RunError> {
    if let Err(err) = settings.validate() {
        diag!(settings.logger, "Invalid run settings: {}\n", err);
        return Err(err.into());
    }
    let streams = match OpenedStreams::open(&settings.redirects, settings.append) {
        Ok(streams) => streams,
        Err(err) => {
            diag!(settings.logger, "{}\n", err);
            return Err(err.into());
        }
    };

    let mut child = launch(&settings, streams)?;
    let result = supervise(&mut child, settings.deadline(), &settings.logger)?;
    info!(result = ?result, "run finished");
    Ok(result)
}

/// [`run`] folded into the integer boundary value (see [`crate::exit_codes`]).
pub fn run_code(settings: RunSettings) -> i32 {
    status_code(&run(settings))
}
