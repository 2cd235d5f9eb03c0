//! POSIX: process groups and signals.

use std::io;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus};

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, warn};

use super::ProcessControl;
use crate::core::outcome::ExecutionResult;
use crate::error::PrivilegeError;

pub struct Posix;

impl ProcessControl for Posix {
    /// Process group id, equal to the child's pid when isolated.
    type Group = Option<Pid>;

    fn prepare(cmd: &mut Command, isolate: bool) {
        if isolate {
            cmd.process_group(0);
        }
    }

    fn track(child: &Child, isolate: bool) -> io::Result<Self::Group> {
        if !isolate {
            return Ok(None);
        }
        let pid = i32::try_from(child.id()).map_err(io::Error::other)?;
        Ok(Some(Pid::from_raw(pid)))
    }

    fn terminate(child: &mut Child, group: &Self::Group) -> io::Result<()> {
        if let Some(pgid) = group {
            match killpg(*pgid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => return Ok(()),
                Err(errno) => {
                    warn!(pgid = pgid.as_raw(), err = %errno, "killpg failed, killing child only");
                }
            }
        }
        match child.kill() {
            Err(err) if err.kind() != io::ErrorKind::InvalidInput => Err(err),
            _ => Ok(()),
        }
    }

    fn classify(status: ExitStatus) -> ExecutionResult {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExecutionResult::Exited(code),
            (None, Some(signal)) => ExecutionResult::Signaled(signal),
            (None, None) => ExecutionResult::Signaled(0),
        }
    }

    fn drop_privilege(name: &str) -> Result<(), PrivilegeError> {
        debug!(privilege = name, "no token privileges on this platform");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn classify_exit_and_signal() {
        assert_eq!(
            Posix::classify(ExitStatus::from_raw(3 << 8)),
            ExecutionResult::Exited(3)
        );
        assert_eq!(
            Posix::classify(ExitStatus::from_raw(9)),
            ExecutionResult::Signaled(9)
        );
    }

    #[test]
    fn terminate_exited_child_is_idempotent() {
        let mut cmd = Command::new("/bin/sh");
        cmd.args(["-c", "exit 0"]);
        Posix::prepare(&mut cmd, true);
        let mut child = cmd.spawn().expect("spawn");
        let group = Posix::track(&child, true).expect("track");
        assert_eq!(group, Some(Pid::from_raw(child.id() as i32)));

        thread::sleep(Duration::from_millis(200));
        Posix::terminate(&mut child, &group).expect("first terminate");
        Posix::terminate(&mut child, &group).expect("second terminate");
        child.wait().expect("reap");
    }

    #[test]
    fn terminate_kills_sleeping_group() {
        let mut cmd = Command::new("/bin/sh");
        cmd.args(["-c", "sleep 30"]);
        Posix::prepare(&mut cmd, true);
        let mut child = cmd.spawn().expect("spawn");
        let group = Posix::track(&child, true).expect("track");

        Posix::terminate(&mut child, &group).expect("terminate");
        let status = child.wait().expect("reap");
        assert_eq!(
            Posix::classify(status),
            ExecutionResult::Signaled(Signal::SIGKILL as i32)
        );
    }

    #[test]
    fn drop_privilege_is_noop() {
        Posix::drop_privilege("SeNoSuchPrivilege").expect("noop");
        Posix::drop_privilege("SeDebugPrivilege").expect("noop");
    }
}
