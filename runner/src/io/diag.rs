//! Diagnostic logger shared between concurrent runs.
//!
//! A message is rendered completely into a private buffer before the sink's
//! lock is taken, so readers of the sink only ever see whole messages. Every
//! failure on this path (allocation, formatting, poisoned lock, write, flush)
//! drops the message: diagnostics must never change the outcome of the run
//! they describe.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// First buffer reservation for a rendered message.
pub const INITIAL_GUESS: usize = 512;

/// Log through a [`Logger`] with `format!` syntax.
///
/// ```
/// use runner::diag;
/// use runner::io::diag::Logger;
///
/// let logger = Logger::discard();
/// diag!(logger, "child {} exited with {}\n", 42, 0);
/// ```
#[macro_export]
macro_rules! diag {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log(::std::format_args!($($arg)+))
    };
}

/// Destination for complete diagnostic messages.
///
/// Implementations must write `message` atomically with respect to other
/// callers and flush before returning.
pub trait Sink: Send + Sync {
    fn write_message(&self, message: &[u8]) -> io::Result<()>;
}

/// A writer behind a mutex: lock, write everything, flush, unlock.
#[derive(Debug)]
pub struct LockedSink<W> {
    inner: Mutex<W>,
}

impl<W: Write + Send> LockedSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Run `f` against the writer under the lock (e.g. to read an in-memory sink).
    pub fn with_inner<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl LockedSink<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl LockedSink<File> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> Sink for LockedSink<W> {
    fn write_message(&self, message: &[u8]) -> io::Result<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("diagnostic sink lock poisoned"))?;
        writer.write_all(message)?;
        writer.flush()
    }
}

struct Discard;

impl Sink for Discard {
    fn write_message(&self, _message: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// Capability handed to a run for emitting diagnostics. Cheap to clone; all
/// clones share one sink.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Sink>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::discard()
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }

    pub fn discard() -> Self {
        Self::new(Arc::new(Discard))
    }

    pub fn stderr() -> Self {
        Self::new(Arc::new(LockedSink::stderr()))
    }

    /// Render `args` and hand the whole message to the sink. Never fails.
    pub fn log(&self, args: fmt::Arguments<'_>) {
        let Some(message) = render(args) else {
            return;
        };
        if let Err(err) = self.sink.write_message(&message) {
            tracing::debug!(err = %err, "dropped diagnostic message");
        }
    }
}

/// Render into a buffer reserved to [`INITIAL_GUESS`]; when the message is
/// longer, render once more into a buffer reserved to the exact length.
///
/// Returns `None` for empty messages, allocation failure, formatting errors,
/// or output that changed length between the two passes.
fn render(args: fmt::Arguments<'_>) -> Option<Vec<u8>> {
    let (buf, needed) = render_bounded(args, INITIAL_GUESS)?;
    if needed == 0 {
        return None;
    }
    if needed <= INITIAL_GUESS {
        return Some(buf);
    }
    let (buf, again) = render_bounded(args, needed)?;
    (again == needed).then_some(buf)
}

fn render_bounded(args: fmt::Arguments<'_>, capacity: usize) -> Option<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity).ok()?;
    let mut writer = BoundedWriter {
        buf,
        capacity,
        needed: 0,
    };
    fmt::write(&mut writer, args).ok()?;
    Some((writer.buf, writer.needed))
}

/// Fills at most `capacity` bytes but counts the full rendered length.
struct BoundedWriter {
    buf: Vec<u8>,
    capacity: usize,
    needed: usize,
}

impl fmt::Write for BoundedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.capacity - self.buf.len();
        let take = room.min(s.len());
        self.buf.extend_from_slice(&s.as_bytes()[..take]);
        self.needed += s.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_logger, sink_text as contents};
    use std::thread;

    struct FailingSink;

    impl Sink for FailingSink {
        fn write_message(&self, _message: &[u8]) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    #[test]
    fn short_message_is_written_whole() {
        let (logger, sink) = memory_logger();
        diag!(logger, "code {} from {}\n", 3, "child");
        assert_eq!(contents(&sink), "code 3 from child\n");
    }

    #[test]
    fn message_longer_than_guess_is_rerendered_intact() {
        let (logger, sink) = memory_logger();
        let long = "x".repeat(INITIAL_GUESS * 3 + 17);
        diag!(logger, "[{}]\n", long);
        let written = contents(&sink);
        assert_eq!(written.len(), long.len() + 3);
        assert_eq!(written, format!("[{long}]\n"));
    }

    #[test]
    fn message_exactly_at_guess_fits_first_pass() {
        let text = "y".repeat(INITIAL_GUESS);
        let rendered = render(format_args!("{text}")).expect("rendered");
        assert_eq!(rendered.len(), INITIAL_GUESS);
    }

    #[test]
    fn empty_message_is_dropped() {
        let (logger, sink) = memory_logger();
        diag!(logger, "{}", "");
        assert!(contents(&sink).is_empty());
    }

    #[test]
    fn failing_sink_is_swallowed() {
        let logger = Logger::new(Arc::new(FailingSink));
        diag!(logger, "still fine {}\n", 1);
    }

    #[test]
    fn concurrent_messages_never_interleave() {
        let (logger, sink) = memory_logger();
        let handles: Vec<_> = (0..8)
            .map(|id| {
                let logger = logger.clone();
                thread::spawn(move || {
                    for n in 0..50 {
                        let payload = id.to_string().repeat(700);
                        diag!(logger, "{id}:{n}:{payload}\n");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("logger thread");
        }

        let written = contents(&sink);
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 8 * 50);
        for line in lines {
            let mut parts = line.splitn(3, ':');
            let id = parts.next().expect("id");
            let _n = parts.next().expect("n");
            let payload = parts.next().expect("payload");
            assert_eq!(payload, id.repeat(700), "interleaved line: {line}");
        }
    }

    #[test]
    fn append_sink_keeps_existing_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("diag.log");
        std::fs::write(&path, "old\n").expect("seed");
        let logger = Logger::new(Arc::new(LockedSink::append_to(&path).expect("open")));
        diag!(logger, "new {}\n", 1);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "old\nnew 1\n");
    }
}
