//! Stable result and exit codes.
//!
//! The negative values are the integer form of a run outcome (see
//! [`crate::run_code`]). POSIX exit codes are `0..=255` and Windows codes in
//! the NTSTATUS error range are reported as exceptions, so none of these can be
//! mistaken for a normal exit.

/// Child was terminated by a signal (POSIX) or an unhandled exception (Windows).
pub const SIGNALED: i32 = -1;
/// Deadline elapsed and the child was forcibly terminated.
pub const TIMED_OUT: i32 = -2;
/// The OS refused to create the child process.
pub const LAUNCH_FAILED: i32 = -3;
/// Invalid settings or an unopenable redirection target; no child was created.
pub const SETUP_FAILED: i32 = -4;
/// Waiting on the child failed; the child was terminated and reaped.
pub const SUPERVISION_FAILED: i32 = -5;

/// CLI: the child exited with code 0.
pub const OK: i32 = 0;
/// CLI: invalid arguments, unreadable settings file, or unknown privilege.
pub const INVALID: i32 = 1;
/// CLI: the run produced a definite result other than exit code 0.
pub const CHILD_FAILED: i32 = 2;
