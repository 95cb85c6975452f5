use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::output::OutputSink;

/// A complete command line together with the sink its response goes to.
#[derive(Debug)]
pub struct Command {
    pub line: String,
    pub sink: Arc<OutputSink>,
}

/// Sending half of the bounded queue feeding the command thread.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::Sender<Command>,
}

/// Creates a command queue holding at most `depth` lines.
pub fn channel(depth: usize) -> (CommandQueue, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (CommandQueue { tx }, rx)
}

impl CommandQueue {
    /// Queues `command` without waiting. A full queue hands the command back.
    pub fn try_submit(&self, command: Command) -> Result<(), TrySendError<Command>> {
        self.tx.try_send(command)
    }
}
