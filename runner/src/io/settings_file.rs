//! Run settings stored as a TOML document.
//!
//! This is the marshaling boundary for callers that describe a run as data:
//! the file is parsed, validated, and converted into a [`RunSettings`] once
//! per call.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::environment::first_invalid;
use crate::io::diag::{LockedSink, Logger};
use crate::settings::{Redirections, RunSettings};

/// A run described as TOML.
///
/// Redirection paths follow the harness convention that an empty string means
/// "no redirection". `log` selects the diagnostic sink; empty means stderr.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SettingsFile {
    pub program: String,
    /// Full argument vector. Empty means `[program]`.
    pub argv: Vec<String>,
    pub env: Vec<String>,
    pub stdin: String,
    pub stdout: String,
    pub stderr: String,
    pub append: bool,
    /// Whole seconds, 0 for no limit.
    pub timeout: u64,
    pub log: String,
}

impl SettingsFile {
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(anyhow!("program must be a non-empty path"));
        }
        if let Some(entry) = first_invalid(&self.env) {
            return Err(anyhow!("env entry {entry:?} must have the form KEY=VALUE"));
        }
        Ok(())
    }

    /// Build the per-call settings, opening the diagnostic sink if one is named.
    pub fn into_settings(self) -> Result<RunSettings> {
        self.validate()?;
        let logger = match non_empty(&self.log) {
            Some(path) => Logger::new(Arc::new(
                LockedSink::append_to(&path)
                    .with_context(|| format!("open diagnostic log {}", path.display()))?,
            )),
            None => Logger::stderr(),
        };

        let mut settings = RunSettings::new(&self.program)
            .env(self.env)
            .append(self.append)
            .timeout_secs(self.timeout)
            .logger(logger);
        if !self.argv.is_empty() {
            settings.argv = self.argv.into_iter().map(Into::into).collect();
        }
        settings.redirects = Redirections {
            stdin: non_empty(&self.stdin),
            stdout: non_empty(&self.stdout),
            stderr: non_empty(&self.stderr),
        };
        Ok(settings)
    }
}

fn non_empty(path: &str) -> Option<PathBuf> {
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// Load and validate a settings file.
pub fn load_settings_file(path: &Path) -> Result<SettingsFile> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file: SettingsFile =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    file.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(file)
}

/// Atomically write a settings file (temp file + rename).
pub fn write_settings_file(path: &Path, file: &SettingsFile) -> Result<()> {
    file.validate()?;
    let mut buf = toml::to_string_pretty(file).context("serialize settings toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("settings path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp settings {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace settings {}", path.display()))?;
    Ok(())
}
