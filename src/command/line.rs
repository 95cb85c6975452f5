//! Line accumulation for every console (shell, WebSocket command channel).
//!
//! Bytes arrive in arbitrary chunks. [`LineBuffer::feed`] edits them the way
//! a terminal would (CR ignored, backspace/delete erase), cuts them into
//! lines and queues each line for the command thread.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use crate::command::queue::{Command, CommandQueue};
use crate::output::OutputSink;

/// Longest accepted line including its terminator.
pub const MAX_LINE_LENGTH: usize = 132;

const BACKSPACE: u8 = 8;
const DELETE: u8 = 127;

/// Result of one [`LineBuffer::feed`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Fed {
    /// Bytes of the input that were processed.
    pub consumed: usize,
    /// A completed line could not be queued and waits in the buffer.
    pub pending: bool,
    /// An over-long line was dropped.
    pub discarded: bool,
}

#[derive(Debug, Default)]
pub struct LineBuffer {
    line: Vec<u8>,
    discard: bool,
    pending: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resubmit {
    Queued,
    Full,
    Stopped,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            line: Vec::with_capacity(MAX_LINE_LENGTH),
            discard: false,
            pending: None,
        }
    }

    /// Processes `input`, queueing every completed line for `sink`.
    ///
    /// Stops right after a line the queue had no room for; that line is kept
    /// and must be pushed with [`resubmit`](LineBuffer::resubmit) before
    /// feeding the rest of the input.
    pub fn feed(&mut self, input: &[u8], sink: &Arc<OutputSink>, queue: &CommandQueue) -> Fed {
        let mut fed = Fed::default();

        for (i, &byte) in input.iter().enumerate() {
            fed.consumed = i + 1;

            if self.discard {
                if byte == b'\n' {
                    self.discard = false;
                }
            } else if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.line).into_owned();
                self.line.clear();
                sink.clear_flags();

                match queue.try_submit(Command { line, sink: Arc::clone(sink) }) {
                    Ok(()) => {}
                    Err(TrySendError::Full(command)) => {
                        self.pending = Some(command);
                        fed.pending = true;
                        return fed;
                    }
                    Err(TrySendError::Closed(command)) => {
                        tracing::warn!(line = %command.line, "Command thread gone, dropping line");
                        command.sink.set_done();
                    }
                }
            } else if self.line.len() >= MAX_LINE_LENGTH - 1 {
                self.line.clear();
                self.discard = true;
                fed.discarded = true;
            } else if byte == b'\r' {
                continue;
            } else if byte == BACKSPACE || byte == DELETE {
                self.line.pop();
            } else {
                self.line.push(byte);
            }
        }

        fed
    }

    /// Tries once more to queue the line held back by [`feed`](LineBuffer::feed).
    pub fn resubmit(&mut self, queue: &CommandQueue) -> Resubmit {
        let Some(command) = self.pending.take() else {
            return Resubmit::Queued;
        };

        match queue.try_submit(command) {
            Ok(()) => Resubmit::Queued,
            Err(TrySendError::Full(command)) => {
                self.pending = Some(command);
                Resubmit::Full
            }
            Err(TrySendError::Closed(command)) => {
                command.sink.set_done();
                Resubmit::Stopped
            }
        }
    }

    /// Gives up on the held-back line. Its sink is marked done since no
    /// command will ever finish for it.
    pub fn abandon(&mut self) -> Option<String> {
        self.pending.take().map(|command| {
            command.sink.set_done();
            command.line
        })
    }
}
