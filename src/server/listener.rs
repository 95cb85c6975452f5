use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::http::connection::Connection;
use crate::http::upgrade::Endpoint;
use crate::server::{Services, admit};
use crate::websocket::{CommandChannel, UploadChannel};

pub async fn run(cfg: &HttpConfig, services: Services) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("binding HTTP server to {}", cfg.listen_addr))?;
    info!("Listening on {}", cfg.listen_addr);

    serve(listener, cfg.clone(), services).await
}

/// Accepts HTTP clients on an already bound listener.
pub async fn serve(listener: TcpListener, cfg: HttpConfig, services: Services) -> anyhow::Result<()> {
    let slots = Arc::new(Semaphore::new(cfg.max_connections));

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "HTTP accept failed");
                continue;
            }
        };

        let Some(permit) = admit(&slots, peer, "http") else {
            drop(socket);
            continue;
        };
        info!("Accepted connection from {}", peer);

        let root = cfg.root_dir.clone();
        let upload_dir = cfg.upload_dir.clone();
        let services = services.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle(socket, root, upload_dir, services).await {
                tracing::error!("Connection error from {}: {:#}", peer, e);
            }
            info!("Connection from {} closed", peer);
        });
    }
}

async fn handle(
    socket: TcpStream,
    root: PathBuf,
    upload_dir: PathBuf,
    services: Services,
) -> anyhow::Result<()> {
    let Some(upgraded) = Connection::new(socket, root).run().await? else {
        return Ok(());
    };

    match upgraded.endpoint {
        Endpoint::Command => {
            CommandChannel::new(
                upgraded.stream,
                &upgraded.leftover,
                services.queue,
                services.collector,
            )
            .run()
            .await
        }
        Endpoint::Upload => {
            UploadChannel::new(upgraded.stream, &upgraded.leftover, upload_dir)
                .run()
                .await
        }
    }
}
