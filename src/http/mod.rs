//! HTTP file server and WebSocket upgrade.
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: per-client state machine serving files with keep-alive
//! - **`parser`**: incremental request parser fed with raw socket reads
//! - **`request`**: parsed request representation
//! - **`response`**: response heads with a builder
//! - **`writer`**: serializes responses and writes them out
//! - **`mime`**: content type by file extension
//! - **`upgrade`**: WebSocket handshake for `/command` and `/upload`
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitingRequest  │ ← read and parse until a request is complete
//!        └──────┬───────────┘
//!               │
//!     ┌─────────┼─────────────────────┐
//!     │ GET     │ upgrade             │ EOF / parse error
//!     ▼         ▼                     ▼
//! ┌─────────┐ ┌───────────┐      ┌────────┐
//! │ Serving │ │ Upgrading │      │ Closed │
//! └────┬────┘ └─────┬─────┘      └────────┘
//!      │ file sent  │ 101 sent, socket handed to the WebSocket layer
//!      └→ AwaitingRequest, or Closed if the request asked to close
//! ```
//!
//! # Example
//!
//! ```ignore
//! use smoothie_net::http::connection::Connection;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         tokio::spawn(async move {
//!             match Connection::new(socket, "www").run().await {
//!                 Ok(Some(upgraded)) => { /* hand to the WebSocket layer */ }
//!                 Ok(None) => {}
//!                 Err(e) => eprintln!("Connection error: {}", e),
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod upgrade;
pub mod writer;
