//! Per-connection console plumbing shared by the shell and the WebSocket
//! command channel.
//!
//! The command thread never touches a socket. Its writes go through the
//! console's [`OutputSink`], whose callback frames them and parks them on a
//! bounded outbound queue; the task owning the socket drains that queue with
//! [`Console::next_output`] and writes the bytes itself. When the queue is
//! full the command thread blocks until the socket catches up.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::command::line::{LineBuffer, Resubmit};
use crate::command::queue::CommandQueue;
use crate::output::{OutputSink, SinkCollector};
use crate::websocket::frame::{self, Opcode};

/// Outbound chunks that may wait for the socket before writers block.
pub const OUTBOUND_DEPTH: usize = 16;

/// Pause between attempts to queue a held-back line.
pub const RESUBMIT_DELAY: Duration = Duration::from_millis(10);

/// Bytes read ahead from the peer while a line waits for the command queue.
/// Past this the socket is left alone until the line is queued.
pub const READ_AHEAD_LIMIT: usize = 4096;

/// How console output is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Bytes are written verbatim.
    Raw,
    /// Every write becomes one or more WebSocket text frames.
    WebSocketText,
}

impl Framing {
    pub fn frames(self, data: &[u8]) -> Vec<Bytes> {
        match self {
            Framing::Raw => vec![Bytes::copy_from_slice(data)],
            Framing::WebSocketText => frame::encode_chunked(data, Opcode::Text)
                .into_iter()
                .map(|frame| frame.freeze())
                .collect(),
        }
    }
}

pub struct Console {
    sink: Arc<OutputSink>,
    outbound: mpsc::Receiver<Bytes>,
    lines: LineBuffer,
    queue: CommandQueue,
    framing: Framing,
}

impl Console {
    pub fn new(queue: CommandQueue, framing: Framing) -> Self {
        let (tx, outbound) = mpsc::channel::<Bytes>(OUTBOUND_DEPTH);

        // runs on the command thread, which is allowed to block
        let sink = OutputSink::new(move |buf: &[u8]| {
            for chunk in framing.frames(buf) {
                if tx.blocking_send(chunk).is_err() {
                    return 0;
                }
            }
            buf.len()
        });

        Self {
            sink: Arc::new(sink),
            outbound,
            lines: LineBuffer::new(),
            queue,
            framing,
        }
    }

    pub fn sink(&self) -> &Arc<OutputSink> {
        &self.sink
    }

    /// Waits for the next chunk the command thread produced.
    ///
    /// Cancel safe, so it can sit in a `select!` next to a socket read.
    pub async fn next_output(&mut self) -> Option<Bytes> {
        self.outbound.recv().await
    }

    /// Feeds received bytes to the line processor.
    ///
    /// A line the command queue has no room for is retried every
    /// [`RESUBMIT_DELAY`]; meanwhile queued output keeps flowing to `stream`
    /// so a command blocked on output can finish. With `max_attempts` set the
    /// line is dropped after that many tries.
    ///
    /// While waiting the peer is still read from: new bytes are appended to
    /// `inbound` for the caller to process next. Returns `false` if the peer
    /// disconnected in the meantime.
    pub async fn input<S>(
        &mut self,
        data: &[u8],
        stream: &mut S,
        inbound: &mut BytesMut,
        max_attempts: Option<usize>,
    ) -> anyhow::Result<bool>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut rest = data;
        while !rest.is_empty() {
            let fed = self.lines.feed(rest, &self.sink, &self.queue);
            rest = &rest[fed.consumed..];

            if fed.discarded {
                self.notify(stream, "error:Discarding long line\n").await?;
            }
            if fed.pending && !self.resubmit(stream, inbound, max_attempts).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Writes `text` straight to the peer, bypassing the sink.
    pub async fn notify<W>(&self, writer: &mut W, text: &str) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        for chunk in self.framing.frames(text.as_bytes()) {
            writer.write_all(&chunk).await?;
        }
        Ok(())
    }

    /// Tears the console down and hands the sink to `collector`.
    pub fn finish(self, collector: &SinkCollector) {
        let Console {
            sink,
            outbound,
            mut lines,
            ..
        } = self;

        if let Some(line) = lines.abandon() {
            warn!(line = %line, "Dropping unsubmitted command line");
        }
        sink.set_closed();
        // wakes a command thread blocked on a full outbound queue
        drop(outbound);
        collector.release(sink);
    }

    /// Retries the held-back line. `false` if the peer went away first.
    async fn resubmit<S>(
        &mut self,
        stream: &mut S,
        inbound: &mut BytesMut,
        max_attempts: Option<usize>,
    ) -> anyhow::Result<bool>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut attempts = 0;
        loop {
            match self.lines.resubmit(&self.queue) {
                Resubmit::Queued => return Ok(true),
                Resubmit::Stopped => anyhow::bail!("command thread has stopped"),
                Resubmit::Full => {}
            }

            attempts += 1;
            if max_attempts.is_some_and(|max| attempts >= max) {
                if let Some(line) = self.lines.abandon() {
                    warn!(line = %line, attempts, "Command queue stayed full, dropping line");
                }
                return Ok(true);
            }

            tokio::select! {
                Some(chunk) = self.outbound.recv() => {
                    stream.write_all(&chunk).await?;
                }

                read = stream.read_buf(inbound), if inbound.len() < READ_AHEAD_LIMIT => {
                    if read? == 0 {
                        debug!(attempts, "Peer disconnected while a line waited for the queue");
                        return Ok(false);
                    }
                }

                _ = tokio::time::sleep(RESUBMIT_DELAY) => {}
            }
        }
    }
}
