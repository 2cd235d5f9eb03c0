//! Native Windows: job objects and process token privileges.

#![allow(unsafe_code)]

use std::ffi::OsStr;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::AsRawHandle;
use std::process::{Child, Command, ExitStatus};
use std::ptr;

use tracing::{debug, warn};
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_INSUFFICIENT_BUFFER, ERROR_NOT_ALL_ASSIGNED, GetLastError, HANDLE, LUID,
};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, GetTokenInformation, LUID_AND_ATTRIBUTES, LookupPrivilegeValueW,
    SE_PRIVILEGE_REMOVED, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
    TokenPrivileges,
};
use windows_sys::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, TerminateJobObject,
};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

use super::ProcessControl;
use crate::core::outcome::ExecutionResult;
use crate::error::PrivilegeError;

/// Exit code given to every process in a job terminated on timeout.
const TERMINATED_EXIT_CODE: u32 = 1;
/// NTSTATUS codes with error severity; a process ending with one crashed.
const EXCEPTION_SEVERITY: u32 = 0xC000_0000;

pub struct Windows;

/// Owned job object handle.
pub struct Job(HANDLE);

impl Job {
    fn create() -> io::Result<Self> {
        // SAFETY: null attributes and name are documented as valid.
        let handle = unsafe { CreateJobObjectW(ptr::null(), ptr::null()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self(handle))
    }

    fn assign(&self, child: &Child) -> io::Result<()> {
        // SAFETY: both handles are open for the duration of the call.
        let ok = unsafe { AssignProcessToJobObject(self.0, child.as_raw_handle()) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        // SAFETY: the handle is owned and closed exactly once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

impl ProcessControl for Windows {
    type Group = Option<Job>;

    fn prepare(_cmd: &mut Command, _isolate: bool) {}

    fn track(child: &Child, isolate: bool) -> io::Result<Self::Group> {
        if !isolate {
            return Ok(None);
        }
        let job = Job::create()?;
        job.assign(child)?;
        Ok(Some(job))
    }

    fn terminate(child: &mut Child, group: &Self::Group) -> io::Result<()> {
        if let Some(job) = group {
            // SAFETY: the job handle is open; terminating an empty job is a no-op.
            if unsafe { TerminateJobObject(job.0, TERMINATED_EXIT_CODE) } != 0 {
                return Ok(());
            }
            warn!(err = %io::Error::last_os_error(), "TerminateJobObject failed, killing child only");
        }
        match child.kill() {
            Err(err) if err.kind() != io::ErrorKind::InvalidInput => Err(err),
            _ => Ok(()),
        }
    }

    fn classify(status: ExitStatus) -> ExecutionResult {
        let code = status.code().unwrap_or_default();
        if code as u32 >= EXCEPTION_SEVERITY {
            ExecutionResult::Signaled(code)
        } else {
            ExecutionResult::Exited(code)
        }
    }

    fn drop_privilege(name: &str) -> Result<(), PrivilegeError> {
        let luid = lookup_privilege(name).ok_or_else(|| PrivilegeError::NotFound(name.to_string()))?;
        let token = match Token::open_current() {
            Ok(token) => token,
            Err(err) => {
                warn!(privilege = name, err = %err, "cannot open process token");
                return Ok(());
            }
        };
        match token.holds(luid) {
            Ok(true) => {
                if let Err(err) = token.remove(luid) {
                    warn!(privilege = name, err = %err, "privilege removal denied");
                } else {
                    debug!(privilege = name, "privilege removed");
                }
            }
            Ok(false) => debug!(privilege = name, "privilege not held"),
            Err(err) => warn!(privilege = name, err = %err, "cannot read token privileges"),
        }
        Ok(())
    }
}

fn lookup_privilege(name: &str) -> Option<LUID> {
    let wide: Vec<u16> = OsStr::new(name).encode_wide().chain(Some(0)).collect();
    let mut luid = LUID {
        LowPart: 0,
        HighPart: 0,
    };
    // SAFETY: `wide` is NUL-terminated and `luid` is a valid out pointer.
    let ok = unsafe { LookupPrivilegeValueW(ptr::null(), wide.as_ptr(), &mut luid) };
    (ok != 0).then_some(luid)
}

struct Token(HANDLE);

impl Token {
    fn open_current() -> io::Result<Self> {
        let mut handle: HANDLE = ptr::null_mut();
        // SAFETY: the pseudo handle from GetCurrentProcess needs no closing.
        let ok = unsafe {
            OpenProcessToken(
                GetCurrentProcess(),
                TOKEN_QUERY | TOKEN_ADJUST_PRIVILEGES,
                &mut handle,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self(handle))
    }

    fn holds(&self, luid: LUID) -> io::Result<bool> {
        let mut len = 0u32;
        // SAFETY: a null buffer of length 0 asks for the required size.
        let ok = unsafe { GetTokenInformation(self.0, TokenPrivileges, ptr::null_mut(), 0, &mut len) };
        if ok != 0 || unsafe { GetLastError() } != ERROR_INSUFFICIENT_BUFFER {
            return Err(io::Error::last_os_error());
        }

        // u64 storage keeps TOKEN_PRIVILEGES suitably aligned.
        let mut buf = vec![0u64; (len as usize).div_ceil(8)];
        // SAFETY: `buf` holds at least `len` writable bytes.
        let ok = unsafe {
            GetTokenInformation(self.0, TokenPrivileges, buf.as_mut_ptr().cast(), len, &mut len)
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }

        let privileges = buf.as_ptr().cast::<TOKEN_PRIVILEGES>();
        // SAFETY: the kernel wrote a TOKEN_PRIVILEGES header followed by
        // `PrivilegeCount` entries into `buf`.
        let entries = unsafe {
            let count = (*privileges).PrivilegeCount as usize;
            let first = (&raw const (*privileges).Privileges).cast::<LUID_AND_ATTRIBUTES>();
            std::slice::from_raw_parts(first, count)
        };
        Ok(entries
            .iter()
            .any(|entry| entry.Luid.LowPart == luid.LowPart && entry.Luid.HighPart == luid.HighPart))
    }

    fn remove(&self, luid: LUID) -> io::Result<()> {
        let adjustment = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: luid,
                Attributes: SE_PRIVILEGE_REMOVED,
            }],
        };
        // SAFETY: `adjustment` is a complete single-entry TOKEN_PRIVILEGES.
        let ok = unsafe {
            AdjustTokenPrivileges(
                self.0,
                0,
                &adjustment,
                size_of::<TOKEN_PRIVILEGES>() as u32,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if ok == 0 || unsafe { GetLastError() } == ERROR_NOT_ALL_ASSIGNED {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        // SAFETY: the handle is owned and closed exactly once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}
