//! Telnet-style command shell.
//!
//! Each client gets its own console: lines go to the command thread, output
//! comes back verbatim. `quit` ends the session.

use std::sync::Arc;

use anyhow::Context;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::command::{CommandQueue, Console, Framing};
use crate::config::ShellConfig;
use crate::output::SinkCollector;
use crate::server::{Services, admit};

pub const WELCOME: &str = "Welcome to the Smoothie Shell\n";
pub const GOODBYE: &str = "Goodbye!\n";

/// Tries given to a line the command queue has no room for before it is
/// dropped.
pub const RESUBMIT_ATTEMPTS: usize = 100;

const READ_BUFFER_SIZE: usize = 256;

pub async fn run(cfg: &ShellConfig, services: Services) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("binding shell server to {}", cfg.listen_addr))?;
    info!("Shell listening on {}", cfg.listen_addr);

    serve(listener, cfg.max_connections, services).await
}

/// Accepts shell clients on an already bound listener.
pub async fn serve(listener: TcpListener, max_connections: usize, services: Services) -> anyhow::Result<()> {
    let slots = Arc::new(Semaphore::new(max_connections));

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Shell accept failed");
                continue;
            }
        };

        let Some(permit) = admit(&slots, peer, "shell") else {
            drop(socket);
            continue;
        };
        info!("Shell connection from {}", peer);

        let connection = ShellConnection::new(
            socket,
            services.queue.clone(),
            Arc::clone(&services.collector),
        );
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = connection.run().await {
                warn!("Shell connection error from {}: {:#}", peer, e);
            }
            info!("Shell connection from {} closed", peer);
        });
    }
}

pub struct ShellConnection {
    stream: TcpStream,
    inbound: BytesMut,
    console: Console,
    collector: Arc<SinkCollector>,
}

impl ShellConnection {
    pub fn new(stream: TcpStream, queue: CommandQueue, collector: Arc<SinkCollector>) -> Self {
        Self {
            stream,
            inbound: BytesMut::with_capacity(READ_BUFFER_SIZE),
            console: Console::new(queue, Framing::Raw),
            collector,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let result = self.serve().await;
        self.console.finish(&self.collector);
        result
    }

    async fn serve(&mut self) -> anyhow::Result<()> {
        self.stream.write_all(WELCOME.as_bytes()).await?;

        loop {
            self.inbound.reserve(READ_BUFFER_SIZE);

            tokio::select! {
                Some(chunk) = self.console.next_output() => {
                    self.stream.write_all(&chunk).await?;
                }

                read = self.stream.read_buf(&mut self.inbound) => {
                    if read? == 0 {
                        debug!("Shell client disconnected");
                        return Ok(());
                    }
                    if !self.process().await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handles everything received so far, including bytes that arrive
    /// while a line waits for the command queue. `false` once the session
    /// is over.
    async fn process(&mut self) -> anyhow::Result<bool> {
        while !self.inbound.is_empty() {
            let data = self.inbound.split();

            if is_quit(&data) {
                self.stream.write_all(GOODBYE.as_bytes()).await?;
                self.stream.shutdown().await.ok();
                return Ok(false);
            }

            let connected = self
                .console
                .input(&data, &mut self.stream, &mut self.inbound, Some(RESUBMIT_ATTEMPTS))
                .await?;
            if !connected {
                debug!("Shell client disconnected");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn is_quit(data: &[u8]) -> bool {
    data.trim_ascii_end() == b"quit"
}
