//! The shared line-command processor.
//!
//! Consoles (shell connections, WebSocket command channels) cut incoming
//! bytes into lines with a [`LineBuffer`] and queue them on a
//! [`CommandQueue`]. A single [`CommandExecutor`] thread runs them through a
//! [`CommandHandler`] and writes the response to the originating console's
//! output sink.

pub mod builtin;
pub mod console;
pub mod executor;
pub mod line;
pub mod queue;

pub use builtin::BuiltinCommands;
pub use console::{Console, Framing};
pub use executor::{CommandExecutor, CommandHandler};
pub use line::LineBuffer;
pub use queue::{Command, CommandQueue};
