//! Timeout-bounded subprocess runner for test harnesses.
//!
//! A single blocking call launches one test program with redirected standard
//! streams and a replacement environment, enforces a wall-clock limit, and
//! reports exactly one result. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure logic (result classification, environment parsing).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (redirection files, spawn, wait,
//!   diagnostic sink, settings files).
//! - **[`platform`]**: POSIX process groups vs Windows job objects and token
//!   privileges, chosen at build time behind one trait.
//!
//! [`run`](run()) and [`drop_privilege`] are the entry points.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod platform;
pub mod privilege;
pub mod run;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::outcome::ExecutionResult;
pub use crate::error::{PrivilegeError, RunError, SetupError};
pub use crate::privilege::drop_privilege;
pub use crate::run::{run, run_code};
pub use crate::settings::{Redirections, RunSettings};
