use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::queue::Command;
use crate::output::OutputSink;

/// Interprets command lines. This is where the GCode dispatcher plugs in.
///
/// Handlers run on the command thread and may block; anything written to
/// `out` ends up on the connection the line came from.
pub trait CommandHandler: Send + 'static {
    fn dispatch(&mut self, line: &str, out: &OutputSink);
}

impl<F> CommandHandler for F
where
    F: FnMut(&str, &OutputSink) + Send + 'static,
{
    fn dispatch(&mut self, line: &str, out: &OutputSink) {
        self(line, out)
    }
}

/// The command-execution thread.
pub struct CommandExecutor {
    thread: JoinHandle<()>,
}

impl CommandExecutor {
    /// Starts the thread. It runs until every [`CommandQueue`] feeding
    /// `commands` has been dropped.
    ///
    /// [`CommandQueue`]: crate::command::CommandQueue
    pub fn spawn<H>(mut handler: H, mut commands: mpsc::Receiver<Command>) -> anyhow::Result<Self>
    where
        H: CommandHandler,
    {
        let thread = thread::Builder::new()
            .name("command".into())
            .spawn(move || {
                info!("Command thread running");
                while let Some(command) = commands.blocking_recv() {
                    execute(&mut handler, command);
                }
                info!("Command thread exiting");
            })?;

        Ok(Self { thread })
    }

    pub fn join(self) {
        if self.thread.join().is_err() {
            tracing::error!("Command thread panicked");
        }
    }
}

/// Runs one command to completion and marks its sink done.
pub fn execute<H>(handler: &mut H, command: Command)
where
    H: CommandHandler + ?Sized,
{
    let Command { line, sink } = command;
    debug!(line = %line, closed = sink.is_closed(), "Dispatching command");

    handler.dispatch(&line, &sink);

    if sink.is_append_nl() {
        sink.puts("\n");
    }
    sink.flush_prepend();
    // last, after every write this command can make
    sink.set_done();
}
