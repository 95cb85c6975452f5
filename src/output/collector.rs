//! Deferred release of output sinks.
//!
//! When a connection closes while the command thread is still writing a
//! response, the network side cannot drop its handle to the sink straight
//! away. [`SinkCollector::release`] parks such sinks in a FIFO and a periodic
//! tick drops them once the command thread has marked them `done`.
//!
//! Only the oldest entry is inspected on each pass: commands finish in the
//! order they were queued, so a newer sink is assumed busy as long as an
//! older one is.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::output::OutputSink;

#[derive(Debug, Default)]
pub struct SinkCollector {
    pending: Mutex<VecDeque<Arc<OutputSink>>>,
}

impl SinkCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands over the network side's handle to `sink` at connection teardown.
    ///
    /// The sink is marked closed first, so any write still in flight from the
    /// command thread becomes a no-op. If the sink is already done the handle
    /// is dropped immediately, otherwise it waits for a later [`collect`].
    ///
    /// [`collect`]: SinkCollector::collect
    pub fn release(&self, sink: Arc<OutputSink>) {
        sink.set_closed();

        if sink.is_done() {
            debug!("Releasing output sink");
            drop(sink);
            return;
        }

        info!("Delaying release of busy output sink");
        self.lock().push_back(sink);
    }

    /// Drops every sink at the front of the queue that is done, stopping at
    /// the first one that is not. Returns how many were released.
    pub fn collect(&self) -> usize {
        let mut pending = self.lock();
        let mut released = 0;

        while let Some(front) = pending.front() {
            debug_assert!(front.is_closed());
            if !front.is_done() {
                break;
            }
            pending.pop_front();
            released += 1;
        }

        if released > 0 {
            debug!(released, remaining = pending.len(), "Released output sinks");
        }
        released
    }

    /// Number of sinks still waiting for their command to finish.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Runs [`collect`](SinkCollector::collect) every `period` on the tokio
    /// runtime until the returned task is aborted.
    pub fn spawn(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                collector.collect();
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Arc<OutputSink>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
