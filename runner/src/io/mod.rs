//! I/O for a single run: redirection files, spawn, wait, diagnostics.

pub mod diag;
pub mod launch;
pub mod redirect;
pub mod settings_file;
pub mod supervise;
