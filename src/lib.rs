//! Smoothie network command/control.
//!
//! HTTP file server with WebSocket `/command` and `/upload` channels, a
//! Telnet-style shell, and the output sinks that carry command responses
//! from the command thread back to the connections.

pub mod command;
pub mod config;
pub mod http;
pub mod output;
pub mod server;
pub mod websocket;
