//! The `/command` endpoint: console lines carried in WebSocket frames.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::command::{CommandQueue, Console, Framing};
use crate::output::SinkCollector;
use crate::websocket::frame::{CLOSE_FRAME, Decoded, FrameDecoder};

/// Largest payload accepted in a single command frame.
pub const DECODE_BUFFER_SIZE: usize = 256;

/// Space reserved in the decoder before each socket read.
const READ_RESERVE: usize = 1024;

/// An upgraded connection feeding the command queue.
///
/// Every payload goes through the console's line processor; command output
/// comes back as text frames.
pub struct CommandChannel {
    stream: TcpStream,
    decoder: FrameDecoder,
    console: Console,
    collector: Arc<SinkCollector>,
}

impl CommandChannel {
    /// `leftover` are bytes read together with the upgrade request.
    pub fn new(
        stream: TcpStream,
        leftover: &[u8],
        queue: CommandQueue,
        collector: Arc<SinkCollector>,
    ) -> Self {
        let mut decoder = FrameDecoder::new();
        decoder.extend(leftover);

        Self {
            stream,
            decoder,
            console: Console::new(queue, Framing::WebSocketText),
            collector,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("Command channel open");
        let result = self.serve().await;

        // best effort, the peer may already be gone
        if let Err(e) = self.stream.write_all(&CLOSE_FRAME).await {
            debug!(error = %e, "Could not send close frame");
        }
        self.console.finish(&self.collector);
        info!("Command channel closed");
        result
    }

    async fn serve(&mut self) -> anyhow::Result<()> {
        let mut payload = [0u8; DECODE_BUFFER_SIZE];

        loop {
            if !self.drain(&mut payload).await? {
                return Ok(());
            }

            self.decoder.buffer_mut().reserve(READ_RESERVE);

            tokio::select! {
                Some(chunk) = self.console.next_output() => {
                    self.stream.write_all(&chunk).await?;
                }

                read = self.stream.read_buf(self.decoder.buffer_mut()) => {
                    if read? == 0 {
                        debug!("Peer went away without a close frame");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Decodes buffered frames until more bytes are needed.
    ///
    /// Returns `false` once the channel should close.
    async fn drain(&mut self, payload: &mut [u8]) -> anyhow::Result<bool> {
        loop {
            match self.decoder.decode(payload) {
                Ok(Decoded::NeedMore) => return Ok(true),

                Ok(Decoded::Payload(n)) => {
                    // bytes read while a line waits land behind the current frame
                    let connected = self
                        .console
                        .input(
                            &payload[..n],
                            &mut self.stream,
                            self.decoder.buffer_mut(),
                            None,
                        )
                        .await?;
                    if !connected {
                        return Ok(false);
                    }
                }

                Ok(Decoded::Close) => {
                    debug!("Close frame received");
                    return Ok(false);
                }

                Err(e) => {
                    warn!(error = %e, "Dropping command channel");
                    return Ok(false);
                }
            }
        }
    }
}
