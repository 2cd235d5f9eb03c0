//! Spawn exactly one child and own it until the call returns.

use std::io::{self, IsTerminal};
use std::process::{Child, Command, ExitStatus};
use std::time::Duration;

use tracing::{debug, error, instrument, warn};

use crate::core::environment::split_entry;
use crate::diag;
use crate::error::RunError;
use crate::io::redirect::OpenedStreams;
use crate::platform::{Native, ProcessControl};
use crate::settings::RunSettings;

type Group = <Native as ProcessControl>::Group;

/// How long a killed child may take to disappear before it is abandoned.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// A live child plus the handle used to terminate its group.
///
/// Dropping the guard terminates the child if it was never reaped and then
/// waits for it, so no exit path of a run leaves a child behind.
pub struct ChildGuard {
    child: Child,
    group: Group,
    reaped: bool,
}

impl ChildGuard {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }

    /// Wait at most `timeout`; `None` means the child is still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        use wait_timeout::ChildExt;

        let status = self.child.wait_timeout(timeout)?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Wait up to `grace` for a child that was just terminated. `false` means
    /// it is still alive and was not reaped.
    pub fn reap_within(&mut self, grace: Duration) -> io::Result<bool> {
        Ok(self.wait_timeout(grace)?.is_some())
    }

    /// Terminate the child and its group. A no-op once the child is reaped.
    pub fn terminate(&mut self) -> io::Result<()> {
        if self.reaped {
            return Ok(());
        }
        Native::terminate(&mut self.child, &self.group)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        warn!(pid = self.child.id(), "child still running at end of run, terminating");
        if let Err(err) = self.terminate() {
            error!(pid = self.child.id(), err = %err, "failed to terminate child");
        }
        match self.reap_within(KILL_GRACE) {
            Ok(true) => {}
            Ok(false) => error!(pid = self.child.id(), "child survived kill, abandoning it"),
            Err(err) => error!(pid = self.child.id(), err = %err, "failed to reap child"),
        }
    }
}

/// Spawn the child described by `settings` with `streams` as its stdio.
///
/// The parent's copies of the redirection files are closed before this
/// returns. A spawn failure creates no child and needs no cleanup.
#[instrument(skip_all, fields(program = %settings.program.display(), timeout_secs = settings.timeout_secs))]
pub fn launch(settings: &RunSettings, streams: OpenedStreams) -> Result<ChildGuard, RunError> {
    let isolate = settings.deadline().is_some();
    if cfg!(unix) && stops_on_terminal_read(settings, io::stdin().is_terminal()) {
        warn!("stdin is an inherited terminal; the child runs in a background group and stops if it reads");
    }
    let mut cmd = build_command(settings);
    streams.apply(&mut cmd);
    Native::prepare(&mut cmd, isolate);

    debug!("spawning child process");
    let spawned = cmd.spawn();
    drop(cmd);
    let child = match spawned {
        Ok(child) => child,
        Err(source) => {
            error!(err = %source, "failed to spawn child");
            diag!(
                settings.logger,
                "Failed to launch {}: {}\n",
                settings.program.display(),
                source
            );
            return Err(RunError::Spawn {
                program: settings.program.clone(),
                source,
            });
        }
    };

    let group = match Native::track(&child, isolate) {
        Ok(group) => group,
        Err(err) => {
            warn!(err = %err, "cannot track child group, timeout kills the child only");
            Default::default()
        }
    };
    debug!(pid = child.id(), "child spawned");
    Ok(ChildGuard {
        child,
        group,
        reaped: false,
    })
}

fn build_command(settings: &RunSettings) -> Command {
    let mut cmd = Command::new(&settings.program);
    if let Some((arg0, rest)) = settings.argv.split_first() {
        set_arg0(&mut cmd, arg0);
        cmd.args(rest);
    }
    cmd.env_clear();
    cmd.envs(settings.env.iter().filter_map(|entry| split_entry(entry)));
    cmd
}

/// A child isolated in its own process group stops with SIGTTIN when it
/// reads an inherited controlling terminal.
fn stops_on_terminal_read(settings: &RunSettings, stdin_is_terminal: bool) -> bool {
    stdin_is_terminal && settings.deadline().is_some() && settings.redirects.stdin.is_none()
}

#[cfg(unix)]
fn set_arg0(cmd: &mut Command, arg0: &std::ffi::OsStr) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(arg0);
}

#[cfg(not(unix))]
fn set_arg0(_cmd: &mut Command, _arg0: &std::ffi::OsStr) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::outcome::ExecutionResult;
    use std::fs;

    #[test]
    fn spawn_failure_is_launch_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = RunSettings::new(temp.path().join("no-such-program"));
        let err = launch(&settings, OpenedStreams::default())
            .err()
            .expect("spawn must fail");
        assert!(matches!(err, RunError::Spawn { .. }));
    }

    #[test]
    fn arg0_and_env_are_passed_through() {
        let temp = tempfile::tempdir().expect("tempdir");
        let out = temp.path().join("out.txt");
        let settings = RunSettings::new("/bin/sh")
            .args(["-c", "printf '%s|%s|%s' \"$0\" \"$GREETING\" \"$HOME\""])
            .env(["GREETING=hello"])
            .stdout(&out);
        let streams = OpenedStreams::open(&settings.redirects, false).expect("open");

        let mut guard = launch(&settings, streams).expect("launch");
        let status = guard.wait().expect("wait");
        assert_eq!(Native::classify(status), ExecutionResult::Exited(0));
        assert_eq!(fs::read_to_string(&out).expect("read"), "/bin/sh|hello|");
    }

    #[test]
    fn terminal_stdin_warning_needs_deadline_and_inherited_stdin() {
        let bounded = RunSettings::new("prog").timeout_secs(1);
        assert!(stops_on_terminal_read(&bounded, true));
        assert!(!stops_on_terminal_read(&bounded, false));
        assert!(!stops_on_terminal_read(&RunSettings::new("prog"), true));
        assert!(!stops_on_terminal_read(&bounded.stdin("in.txt"), true));
    }

    #[test]
    fn reap_within_gives_up_on_live_child() {
        let settings = RunSettings::new("/bin/sh")
            .args(["-c", "sleep 30"])
            .env(["PATH=/usr/bin:/bin"])
            .timeout_secs(1);
        let mut guard = launch(&settings, OpenedStreams::default()).expect("launch");

        let started = std::time::Instant::now();
        assert!(!guard.reap_within(Duration::from_millis(200)).expect("wait"));
        assert!(started.elapsed() < KILL_GRACE);

        guard.terminate().expect("terminate");
        assert!(guard.reap_within(KILL_GRACE).expect("wait"));
    }

    #[test]
    fn dropping_guard_kills_running_child() {
        let settings = RunSettings::new("/bin/sh")
            .args(["-c", "sleep 30"])
            .env(["PATH=/usr/bin:/bin"])
            .timeout_secs(1);
        let guard = launch(&settings, OpenedStreams::default()).expect("launch");
        let pid = nix::unistd::Pid::from_raw(guard.id() as i32);
        drop(guard);
        assert_eq!(
            nix::sys::signal::kill(pid, None),
            Err(nix::errno::Errno::ESRCH),
            "child must be gone after drop"
        );
    }
}
