//! Response output shared across threads.

pub mod collector;
pub mod sink;

pub use collector::SinkCollector;
pub use sink::{OutputSink, WriteFn};
