//! The settings value consumed by one call to [`crate::run`].

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::environment::first_invalid;
use crate::error::SetupError;
use crate::io::diag::Logger;

/// Files substituted for the child's standard streams. `None` inherits the
/// caller's stream unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirections {
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

/// Everything needed to launch and supervise a single child.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Program to execute.
    pub program: PathBuf,
    /// Full argument vector; element 0 is what the child sees as its own name.
    /// An empty vector means `[program]`.
    pub argv: Vec<OsString>,
    /// `KEY=VALUE` entries that replace the inherited environment entirely.
    pub env: Vec<String>,
    pub redirects: Redirections,
    /// Append to stdout/stderr files instead of truncating them.
    pub append: bool,
    /// Wall-clock limit in whole seconds; 0 waits forever.
    pub timeout_secs: u64,
    pub logger: Logger,
}

impl RunSettings {
    /// Settings for `program` with `argv = [program]`, an empty environment,
    /// inherited streams, no timeout, and a discarding logger.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        Self {
            argv: vec![program.clone().into_os_string()],
            program,
            env: Vec::new(),
            redirects: Redirections::default(),
            append: false,
            timeout_secs: 0,
            logger: Logger::discard(),
        }
    }

    /// Append arguments after `argv[0]`.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, path: impl Into<PathBuf>) -> Self {
        self.redirects.stdin = Some(path.into());
        self
    }

    pub fn stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.redirects.stdout = Some(path.into());
        self
    }

    pub fn stderr(mut self, path: impl Into<PathBuf>) -> Self {
        self.redirects.stderr = Some(path.into());
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// `None` when the run is unbounded.
    pub fn deadline(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.program.as_os_str().is_empty() {
            return Err(SetupError::EmptyProgram);
        }
        if let Some(entry) = first_invalid(&self.env) {
            return Err(SetupError::InvalidEnv(entry.to_string()));
        }
        Ok(())
    }
}
