//! Test-only helpers for building runs and inspecting their side effects.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use crate::io::diag::{LockedSink, Logger};
use crate::settings::RunSettings;

/// Minimal environment that lets `/bin/sh` find standard utilities.
pub const TEST_PATH: &str = "PATH=/usr/bin:/bin";

/// Settings for `/bin/sh -c <script>` with only [`TEST_PATH`] in the environment.
pub fn sh(script: &str) -> RunSettings {
    RunSettings::new("/bin/sh")
        .args(["-c", script])
        .env([TEST_PATH])
}

/// A logger backed by an in-memory sink, plus the sink for reading it back.
pub fn memory_logger() -> (Logger, Arc<LockedSink<Vec<u8>>>) {
    let sink = Arc::new(LockedSink::new(Vec::new()));
    (Logger::new(sink.clone()), sink)
}

/// Everything written to an in-memory sink so far.
pub fn sink_text(sink: &LockedSink<Vec<u8>>) -> String {
    sink.with_inner(|buf| String::from_utf8_lossy(buf).into_owned())
}

/// Scratch directory for redirection targets.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.path(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read(&self, name: &str) -> std::io::Result<String> {
        fs::read_to_string(self.path(name))
    }
}
