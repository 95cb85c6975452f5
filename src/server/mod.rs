//! Accept loops for the HTTP and shell servers.

pub mod listener;
pub mod shell;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use crate::command::CommandQueue;
use crate::output::SinkCollector;

/// What connection tasks share: the way into the command thread and the
/// collector their sinks go to when they close.
#[derive(Debug, Clone)]
pub struct Services {
    pub queue: CommandQueue,
    pub collector: Arc<SinkCollector>,
}

/// Takes a connection slot, or returns `None` when all are in use and the
/// new socket should be dropped.
fn admit(slots: &Arc<Semaphore>, peer: SocketAddr, server: &'static str) -> Option<OwnedSemaphorePermit> {
    match Arc::clone(slots).try_acquire_owned() {
        Ok(permit) => Some(permit),
        Err(_) => {
            warn!(%peer, server, "Connection limit reached, closing new connection");
            None
        }
    }
}
