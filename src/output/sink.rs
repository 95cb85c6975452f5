//! Buffered response sink shared between the network tasks and the command
//! thread.
//!
//! Every component that produces output (command handlers, the shell, the
//! WebSocket command channel) writes through an [`OutputSink`] without knowing
//! which transport sits behind it. The transport is an injected write
//! callback: a socket-backed queue, a WebSocket frame encoder, or nothing at
//! all for [`OutputSink::null`].
//!
//! # Lifecycle
//!
//! A sink is shared through an `Arc` by the connection that created it and,
//! while a command runs, by the command thread. Two flags decide when it may
//! be reclaimed:
//!
//! - `closed` is set by the network task when the connection is torn down.
//!   Later writes report success but are dropped.
//! - `done` is set by the command thread once it has finished writing a
//!   response. A fresh sink is idle and therefore starts out `done`.
//!
//! See [`crate::output::collector`] for the deferred release of sinks that are
//! closed while a command is still running.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Write callback: receives a buffer and returns how many bytes it accepted.
///
/// The callback is expected to take everything; a short count marks the sink
/// closed.
pub type WriteFn = Box<dyn FnMut(&[u8]) -> usize + Send>;

struct Inner {
    write: WriteFn,
    prepending: Vec<u8>,
}

pub struct OutputSink {
    inner: Mutex<Inner>,
    closed: AtomicBool,
    done: AtomicBool,
    no_response: AtomicBool,
    uploading: AtomicBool,
    append_nl: AtomicBool,
    prepend_ok: AtomicBool,
}

impl OutputSink {
    /// Creates a sink that forwards every write to `write`.
    pub fn new<F>(write: F) -> Self
    where
        F: FnMut(&[u8]) -> usize + Send + 'static,
    {
        Self {
            inner: Mutex::new(Inner {
                write: Box::new(write),
                prepending: Vec::new(),
            }),
            closed: AtomicBool::new(false),
            done: AtomicBool::new(true),
            no_response: AtomicBool::new(false),
            uploading: AtomicBool::new(false),
            append_nl: AtomicBool::new(false),
            prepend_ok: AtomicBool::new(false),
        }
    }

    /// Creates a sink that accepts and discards everything.
    pub fn null() -> Self {
        Self::new(|buf: &[u8]| buf.len())
    }

    /// Writes `buf` and returns the number of bytes accepted.
    ///
    /// A closed sink accepts everything and emits nothing, so a successful
    /// return is not proof that the peer saw the data.
    pub fn write(&self, buf: &[u8]) -> usize {
        if self.is_closed() {
            return buf.len();
        }

        let mut inner = self.lock();
        self.emit(&mut inner, buf);
        buf.len()
    }

    pub fn puts(&self, s: &str) -> usize {
        self.write(s.as_bytes())
    }

    /// Formats `args` and writes the result as a single block.
    ///
    /// The text is rendered while the write lock is held, so a concurrent
    /// writer can never interleave with it.
    ///
    /// ```
    /// # use smoothie_net::output::OutputSink;
    /// let sink = OutputSink::null();
    /// assert_eq!(sink.printf(format_args!("X:{} Y:{}\n", 1, 2)), 8);
    /// ```
    pub fn printf(&self, args: fmt::Arguments<'_>) -> usize {
        if self.is_closed() {
            return fmt::format(args).len();
        }

        let mut inner = self.lock();
        let text = fmt::format(args);
        self.emit(&mut inner, text.as_bytes());
        text.len()
    }

    /// Emits everything buffered in prepend mode as one block and leaves
    /// prepend mode. Returns the number of bytes flushed.
    pub fn flush_prepend(&self) -> usize {
        let mut inner = self.lock();
        self.prepend_ok.store(false, Ordering::Release);
        if inner.prepending.is_empty() {
            return 0;
        }

        let block = std::mem::take(&mut inner.prepending);
        self.emit(&mut inner, &block);
        block.len()
    }

    /// Clears the per-command flags. Called when a new command line is
    /// submitted, which also marks the sink busy until the command completes.
    pub fn clear_flags(&self) {
        self.append_nl.store(false, Ordering::Release);
        self.prepend_ok.store(false, Ordering::Release);
        self.no_response.store(false, Ordering::Release);
        self.done.store(false, Ordering::Release);
    }

    pub fn set_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Signals that the command thread has finished with this sink.
    pub fn set_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn set_no_response(&self, flag: bool) {
        self.no_response.store(flag, Ordering::Release);
    }

    pub fn is_no_response(&self) -> bool {
        self.no_response.load(Ordering::Acquire)
    }

    pub fn set_uploading(&self, flag: bool) {
        self.uploading.store(flag, Ordering::Release);
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    pub fn set_append_nl(&self, flag: bool) {
        self.append_nl.store(flag, Ordering::Release);
    }

    pub fn is_append_nl(&self) -> bool {
        self.append_nl.load(Ordering::Acquire)
    }

    pub fn set_prepend_ok(&self, flag: bool) {
        self.prepend_ok.store(flag, Ordering::Release);
    }

    pub fn is_prepend_ok(&self) -> bool {
        self.prepend_ok.load(Ordering::Acquire)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // a writer that panicked leaves nothing half-written behind
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, inner: &mut Inner, buf: &[u8]) {
        // closed may have been set while we waited for the lock
        if self.is_closed() {
            return;
        }
        if self.is_prepend_ok() {
            inner.prepending.extend_from_slice(buf);
            return;
        }
        if buf.is_empty() {
            return;
        }

        let accepted = (inner.write)(buf);
        if accepted != buf.len() {
            tracing::warn!(
                offered = buf.len(),
                accepted,
                "Output sink write failed, closing sink"
            );
            self.set_closed();
        }
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("closed", &self.is_closed())
            .field("done", &self.is_done())
            .field("no_response", &self.is_no_response())
            .field("uploading", &self.is_uploading())
            .field("append_nl", &self.is_append_nl())
            .field("prepend_ok", &self.is_prepend_ok())
            .finish()
    }
}
