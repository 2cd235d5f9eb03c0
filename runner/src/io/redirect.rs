//! Open redirection targets before the child is spawned.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{SetupError, Stream};
use crate::settings::Redirections;

/// Opened files for the child's stream slots. `None` leaves the slot inherited.
///
/// Ownership moves into the [`Command`] on [`apply`](Self::apply); the parent's
/// copies are closed when that command is dropped right after spawn.
#[derive(Debug, Default)]
pub struct OpenedStreams {
    pub stdin: Option<File>,
    pub stdout: Option<File>,
    pub stderr: Option<File>,
}

impl OpenedStreams {
    /// Open every requested target, failing on the first that cannot be opened.
    ///
    /// stdin must already exist. stdout/stderr are created, then truncated or,
    /// with `append`, positioned at end of file. When both name the same path
    /// they share a single open file description.
    pub fn open(redirects: &Redirections, append: bool) -> Result<Self, SetupError> {
        let stdin = redirects
            .stdin
            .as_deref()
            .map(open_input)
            .transpose()?;
        let stdout = redirects
            .stdout
            .as_deref()
            .map(|path| open_output(Stream::Stdout, path, append))
            .transpose()?;

        let stderr = match (&redirects.stderr, &redirects.stdout, &stdout) {
            (Some(err_path), Some(out_path), Some(out_file)) if err_path == out_path => {
                debug!(path = %err_path.display(), "stderr shares stdout file");
                Some(out_file.try_clone().map_err(|source| SetupError::Redirect {
                    stream: Stream::Stderr,
                    path: err_path.clone(),
                    source,
                })?)
            }
            (Some(err_path), _, _) => Some(open_output(Stream::Stderr, err_path, append)?),
            (None, _, _) => None,
        };

        Ok(Self {
            stdin,
            stdout,
            stderr,
        })
    }

    pub fn apply(self, cmd: &mut Command) {
        if let Some(file) = self.stdin {
            cmd.stdin(Stdio::from(file));
        }
        if let Some(file) = self.stdout {
            cmd.stdout(Stdio::from(file));
        }
        if let Some(file) = self.stderr {
            cmd.stderr(Stdio::from(file));
        }
    }
}

fn open_input(path: &Path) -> Result<File, SetupError> {
    File::open(path).map_err(|source| SetupError::Redirect {
        stream: Stream::Stdin,
        path: path.to_path_buf(),
        source,
    })
}

fn open_output(stream: Stream, path: &Path, append: bool) -> Result<File, SetupError> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path).map_err(|source| SetupError::Redirect {
        stream,
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;

    fn redirects(
        stdin: Option<PathBuf>,
        stdout: Option<PathBuf>,
        stderr: Option<PathBuf>,
    ) -> Redirections {
        Redirections {
            stdin,
            stdout,
            stderr,
        }
    }

    #[test]
    fn nothing_requested_opens_nothing() {
        let streams = OpenedStreams::open(&Redirections::default(), false).expect("open");
        assert!(streams.stdin.is_none());
        assert!(streams.stdout.is_none());
        assert!(streams.stderr.is_none());
    }

    #[test]
    fn missing_stdin_is_setup_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("missing.in");
        let err = OpenedStreams::open(&redirects(Some(missing.clone()), None, None), false)
            .unwrap_err();
        match err {
            SetupError::Redirect { stream, path, .. } => {
                assert_eq!(stream, Stream::Stdin);
                assert_eq!(path, missing);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn stdout_is_truncated_without_append() {
        let temp = tempfile::tempdir().expect("tempdir");
        let out = temp.path().join("out.txt");
        fs::write(&out, "previous contents").expect("seed");

        let streams =
            OpenedStreams::open(&redirects(None, Some(out.clone()), None), false).expect("open");
        streams.stdout.expect("stdout").write_all(b"new").expect("write");
        assert_eq!(fs::read_to_string(&out).expect("read"), "new");
    }

    #[test]
    fn stdout_resumes_at_end_with_append() {
        let temp = tempfile::tempdir().expect("tempdir");
        let out = temp.path().join("out.txt");
        fs::write(&out, "old-").expect("seed");

        let streams =
            OpenedStreams::open(&redirects(None, Some(out.clone()), None), true).expect("open");
        streams.stdout.expect("stdout").write_all(b"new").expect("write");
        assert_eq!(fs::read_to_string(&out).expect("read"), "old-new");
    }

    #[test]
    fn shared_stdout_stderr_path_shares_offset() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = temp.path().join("both.log");

        let streams = OpenedStreams::open(
            &redirects(None, Some(log.clone()), Some(log.clone())),
            false,
        )
        .expect("open");
        streams.stdout.expect("stdout").write_all(b"out;").expect("write");
        streams.stderr.expect("stderr").write_all(b"err;").expect("write");
        assert_eq!(fs::read_to_string(&log).expect("read"), "out;err;");
    }

    #[test]
    fn unwritable_stderr_target_is_setup_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bad = temp.path().join("no-such-dir").join("err.txt");
        let err = OpenedStreams::open(&redirects(None, None, Some(bad)), false).unwrap_err();
        assert!(matches!(
            err,
            SetupError::Redirect {
                stream: Stream::Stderr,
                ..
            }
        ));
    }
}
