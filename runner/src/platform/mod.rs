//! Per-platform process control, selected at build time.
//!
//! The rest of the runner only talks to [`Native`] through [`ProcessControl`].

use std::io;
use std::process::{Child, Command, ExitStatus};

use crate::core::outcome::ExecutionResult;
use crate::error::PrivilegeError;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::Posix as Native;
#[cfg(windows)]
pub use windows::Windows as Native;

pub trait ProcessControl {
    /// Handle used to terminate the child together with its descendants.
    type Group;

    /// Configure `cmd` before spawn. `isolate` is set when a deadline is armed.
    fn prepare(cmd: &mut Command, isolate: bool);

    /// Start tracking a freshly spawned child.
    fn track(child: &Child, isolate: bool) -> io::Result<Self::Group>;

    /// Forcibly terminate a child that has not been reaped yet, and its group
    /// where the platform tracks one. A child that already exited is a no-op.
    fn terminate(child: &mut Child, group: &Self::Group) -> io::Result<()>;

    fn classify(status: ExitStatus) -> ExecutionResult;

    /// Remove `name` from the current process token, best-effort.
    fn drop_privilege(name: &str) -> Result<(), PrivilegeError>;
}
