//! Command-line front end for the timeout-bounded runner.
//!
//! `runner exec` describes a run with flags, `runner run-file` reads it from a
//! TOML settings file. Both print the integer result code (or a JSON result
//! object with `--json`) on stdout.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use runner::core::outcome::status_code;
use runner::exit_codes;
use runner::io::diag::{LockedSink, Logger};
use runner::io::settings_file::load_settings_file;
use runner::{ExecutionResult, RunSettings, drop_privilege, logging, run};

#[derive(Parser)]
#[command(
    name = "runner",
    version,
    about = "Run one test program with redirected streams and a time limit"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run PROGRAM with ARGS.
    Exec(ExecArgs),
    /// Run the program described by a TOML settings file.
    RunFile {
        /// Settings file (program, argv, env, stdin, stdout, stderr, append, timeout, log).
        path: PathBuf,
        /// Print the result as JSON instead of a bare code.
        #[arg(long)]
        json: bool,
    },
    /// Remove a privilege from this process's token (Windows only; no-op elsewhere).
    DropPrivilege { name: String },
}

#[derive(clap::Args)]
struct ExecArgs {
    /// Redirect the child's stdin from this file (must exist).
    #[arg(long)]
    stdin: Option<PathBuf>,
    /// Redirect the child's stdout to this file.
    #[arg(long)]
    stdout: Option<PathBuf>,
    /// Redirect the child's stderr to this file.
    #[arg(long)]
    stderr: Option<PathBuf>,
    /// Append to stdout/stderr files instead of truncating them.
    #[arg(long)]
    append: bool,
    /// Wall-clock limit in seconds; 0 waits forever.
    #[arg(long, default_value_t = 0)]
    timeout: u64,
    /// Environment entry for the child (repeatable). Replaces the inherited environment.
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,
    /// Start from this process's environment instead of an empty one.
    #[arg(long)]
    inherit_env: bool,
    /// Append diagnostics to this file instead of stderr.
    #[arg(long)]
    log: Option<PathBuf>,
    /// Print the result as JSON instead of a bare code.
    #[arg(long)]
    json: bool,
    /// Program to run.
    program: PathBuf,
    /// Arguments passed to the program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// JSON form of a run outcome.
#[derive(Serialize)]
struct Report {
    code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    logging::init();
    match dispatch() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn dispatch() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Exec(args) => {
            let json = args.json;
            cmd_run(exec_settings(args)?, json)
        }
        Command::RunFile { path, json } => {
            let settings = load_settings_file(&path)?.into_settings()?;
            cmd_run(settings, json)
        }
        Command::DropPrivilege { name } => {
            drop_privilege(&name)?;
            Ok(exit_codes::OK)
        }
    }
}

fn exec_settings(args: ExecArgs) -> Result<RunSettings> {
    let logger = match &args.log {
        Some(path) => Logger::new(Arc::new(
            LockedSink::append_to(path)
                .with_context(|| format!("open diagnostic log {}", path.display()))?,
        )),
        None => Logger::stderr(),
    };

    let mut env: Vec<String> = Vec::new();
    if args.inherit_env {
        env.extend(inherited_env(std::env::vars_os()));
    }
    env.extend(args.env);

    let mut settings = RunSettings::new(args.program)
        .args(args.args)
        .env(env)
        .append(args.append)
        .timeout_secs(args.timeout)
        .logger(logger);
    settings.redirects.stdin = args.stdin;
    settings.redirects.stdout = args.stdout;
    settings.redirects.stderr = args.stderr;
    Ok(settings)
}

/// Render inherited variables as `KEY=VALUE`, skipping any that are not UTF-8.
fn inherited_env<I>(vars: I) -> Vec<String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.to_str(), value.to_str()) {
            (Some(key), Some(value)) => Some(format!("{key}={value}")),
            _ => {
                warn!(key = %key.to_string_lossy(), "skipping non-UTF-8 environment variable");
                None
            }
        })
        .collect()
}

fn cmd_run(settings: RunSettings, json: bool) -> Result<i32> {
    let outcome = run(settings);
    let code = status_code(&outcome);
    if json {
        let report = match &outcome {
            Ok(result) => Report {
                code,
                result: Some(*result),
                error: None,
            },
            Err(err) => Report {
                code,
                result: None,
                error: Some(err.to_string()),
            },
        };
        println!(
            "{}",
            serde_json::to_string(&report).context("serialize result")?
        );
    } else {
        if let Err(err) = &outcome {
            eprintln!("{err}");
        }
        println!("{code}");
    }
    Ok(if matches!(outcome, Ok(result) if result.success()) {
        exit_codes::OK
    } else {
        exit_codes::CHILD_FAILED
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exec_with_trailing_args() {
        let cli = Cli::parse_from([
            "runner",
            "exec",
            "--timeout",
            "5",
            "--env",
            "A=1",
            "--stdout",
            "out.txt",
            "--",
            "/bin/sh",
            "-c",
            "exit 3",
        ]);
        let Command::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(args.timeout, 5);
        assert_eq!(args.env, vec!["A=1".to_string()]);
        assert_eq!(args.stdout, Some(PathBuf::from("out.txt")));
        assert_eq!(args.program, PathBuf::from("/bin/sh"));
        assert_eq!(args.args, vec!["-c".to_string(), "exit 3".to_string()]);
    }

    #[test]
    fn parse_run_file() {
        let cli = Cli::parse_from(["runner", "run-file", "run.toml", "--json"]);
        assert!(matches!(
            cli.command,
            Command::RunFile { ref path, json: true } if path == &PathBuf::from("run.toml")
        ));
    }

    #[test]
    fn exec_settings_replace_environment() {
        let cli = Cli::parse_from(["runner", "exec", "--env", "ONLY=1", "--", "prog", "x"]);
        let Command::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        let settings = exec_settings(args).expect("settings");
        assert_eq!(settings.env, vec!["ONLY=1".to_string()]);
        assert_eq!(settings.argv.len(), 2);
        assert_eq!(settings.deadline(), None);
    }

    #[cfg(unix)]
    #[test]
    fn inherited_env_skips_non_utf8_entries() {
        use std::os::unix::ffi::OsStringExt;

        let vars = [
            (OsString::from("GOOD"), OsString::from("yes")),
            (OsString::from("BAD"), OsString::from_vec(vec![0xff])),
            (OsString::from_vec(vec![b'K', 0xfe]), OsString::from("v")),
        ];
        assert_eq!(inherited_env(vars), vec!["GOOD=yes".to_string()]);
    }
}
