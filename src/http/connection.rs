use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::http::mime::content_type;
use crate::http::parser::{Progress, RequestParser};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::upgrade::{self, Endpoint, Handshake};
use crate::http::writer::{ResponseWriter, serialize_response};

/// Size of each socket read while waiting for a request.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Largest slice of a file read from disk per refill.
pub const FILE_CHUNK_SIZE: usize = 2048;

/// A connection handed over to the WebSocket layer.
///
/// `leftover` holds bytes that arrived together with the upgrade request and
/// already belong to the WebSocket stream.
#[derive(Debug)]
pub struct Upgraded {
    pub stream: TcpStream,
    pub endpoint: Endpoint,
    pub leftover: Vec<u8>,
}

pub enum ConnectionState {
    AwaitingRequest,
    /// Streaming a file. The flag says whether to wait for another request
    /// afterwards.
    Serving(FileTransfer, bool),
    Upgrading(Request, Vec<u8>),
    Closed,
}

/// A file being streamed to the client.
///
/// Holds everything needed to resume after the socket stops accepting data:
/// the response head still to send, the chunk read from disk but not yet
/// written, and the number of file bytes not yet read.
pub struct FileTransfer {
    file: File,
    filename: PathBuf,
    bytes_left: u64,
    pending: Vec<u8>,
    sent: usize,
}

impl FileTransfer {
    fn new(file: File, filename: PathBuf, length: u64, content_type: &str) -> Self {
        Self {
            file,
            filename,
            bytes_left: length,
            pending: serialize_response(&Response::file(content_type, length)),
            sent: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.bytes_left == 0 && self.sent == self.pending.len()
    }

    /// Writes as much as the socket accepts right now.
    ///
    /// Returns once the transfer is complete or the socket would block; in
    /// the latter case the caller waits for write readiness and calls again.
    async fn pump(&mut self, stream: &TcpStream) -> io::Result<()> {
        loop {
            if self.sent == self.pending.len() {
                if self.bytes_left == 0 {
                    return Ok(());
                }
                self.refill().await?;
            }

            match stream.try_write(&self.pending[self.sent..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.sent += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    async fn refill(&mut self) -> io::Result<()> {
        let want = self.bytes_left.min(FILE_CHUNK_SIZE as u64) as usize;
        self.pending.resize(want, 0);
        self.file.read_exact(&mut self.pending).await?;
        self.bytes_left -= want as u64;
        self.sent = 0;
        debug!(file = %self.filename.display(), chunk = want, left = self.bytes_left, "Read file chunk");
        Ok(())
    }
}

/// One HTTP client.
///
/// Serves files from `root` over a keep-alive connection until the client
/// goes away or asks for a WebSocket upgrade, in which case the socket is
/// returned to the caller instead of being closed.
pub struct Connection {
    stream: TcpStream,
    root: PathBuf,
    carry: Vec<u8>,
    state: ConnectionState,
}

impl Connection {
    pub fn new(stream: TcpStream, root: impl Into<PathBuf>) -> Self {
        Self {
            stream,
            root: root.into(),
            carry: Vec::new(),
            state: ConnectionState::AwaitingRequest,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<Option<Upgraded>> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::AwaitingRequest => self.read_request().await?,

                ConnectionState::Serving(mut transfer, keep_alive) => {
                    self.send_file(&mut transfer).await?;
                    after_reply(keep_alive)
                }

                ConnectionState::Upgrading(request, leftover) => {
                    return self.upgrade(request, leftover).await;
                }

                ConnectionState::Closed => {
                    break;
                }
            };
        }

        Ok(None)
    }

    async fn read_request(&mut self) -> anyhow::Result<ConnectionState> {
        let mut parser = RequestParser::new();

        // bytes that followed the previous request on this connection
        let carry = std::mem::take(&mut self.carry);
        if !carry.is_empty() {
            if let Some(next) = self.on_bytes(&mut parser, &carry).await? {
                return Ok(next);
            }
        }

        let mut temp = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = self.stream.read(&mut temp).await?;

            if n == 0 {
                debug!("Client closed connection");
                return Ok(ConnectionState::Closed);
            }

            if let Some(next) = self.on_bytes(&mut parser, &temp[..n]).await? {
                return Ok(next);
            }
        }
    }

    /// Feeds one chunk to the parser. `None` while more bytes are needed.
    async fn on_bytes(
        &mut self,
        parser: &mut RequestParser,
        chunk: &[u8],
    ) -> anyhow::Result<Option<ConnectionState>> {
        match parser.feed(chunk) {
            Ok(Progress::NeedMore) => Ok(None),

            Ok(Progress::Complete) => {
                self.carry = parser.surplus().to_vec();
                match std::mem::take(parser).into_request() {
                    Some(request) => self.handle_request(request).await.map(Some),
                    None => Ok(Some(ConnectionState::Closed)),
                }
            }

            Ok(Progress::Upgrade { offset }) => {
                let leftover = chunk.get(offset..).unwrap_or_default().to_vec();
                Ok(std::mem::take(parser)
                    .into_request()
                    .map(|request| ConnectionState::Upgrading(request, leftover)))
            }

            Err(e) => {
                warn!(error = %e, code = e.sentinel(), "HTTP parse error");
                self.reply(Response::bad_request()).await?;
                Ok(Some(ConnectionState::Closed))
            }
        }
    }

    async fn handle_request(&mut self, request: Request) -> anyhow::Result<ConnectionState> {
        info!(method = ?request.method, path = %request.path, "Request");
        let keep_alive = request.keep_alive();

        if Endpoint::from_path(request.target()).is_some() {
            // a WebSocket endpoint asked for without the upgrade headers
            self.reply(upgrade::negotiate(&request).response()).await?;
            return Ok(after_reply(keep_alive));
        }

        if request.method != Method::GET {
            self.reply(Response::bad_request()).await?;
            return Ok(after_reply(keep_alive));
        }

        let target = match request.target() {
            "/" => "/index.html",
            other => other,
        };

        match self.open(target).await {
            Some((file, filename, length)) => {
                info!(file = %filename.display(), length, "Sending file");
                let transfer = FileTransfer::new(file, filename, length, content_type(target));
                Ok(ConnectionState::Serving(transfer, keep_alive))
            }
            None => {
                self.reply(Response::not_found()).await?;
                Ok(after_reply(keep_alive))
            }
        }
    }

    async fn open(&self, target: &str) -> Option<(File, PathBuf, u64)> {
        let filename = resolve(&self.root, target)?;

        let file = match File::open(&filename).await {
            Ok(file) => file,
            Err(e) => {
                info!(file = %filename.display(), error = %e, "Open file failed");
                return None;
            }
        };

        match file.metadata().await {
            Ok(meta) if meta.is_file() => Some((file, filename, meta.len())),
            _ => None,
        }
    }

    async fn send_file(&mut self, transfer: &mut FileTransfer) -> anyhow::Result<()> {
        loop {
            transfer.pump(&self.stream).await.with_context(|| {
                format!("sending {}", transfer.filename.display())
            })?;

            if transfer.is_done() {
                info!(file = %transfer.filename.display(), "Closing file");
                return Ok(());
            }

            self.stream.writable().await?;
        }
    }

    async fn upgrade(
        mut self,
        request: Request,
        leftover: Vec<u8>,
    ) -> anyhow::Result<Option<Upgraded>> {
        let handshake = upgrade::negotiate(&request);
        let mut writer = ResponseWriter::new(&handshake.response());

        match handshake {
            Handshake::Accept { endpoint, .. } => {
                writer
                    .write_to_stream(&mut self.stream)
                    .await
                    .context("sending WebSocket handshake")?;
                info!(?endpoint, leftover = leftover.len(), "Upgraded to WebSocket");

                Ok(Some(Upgraded {
                    stream: self.stream,
                    endpoint,
                    leftover,
                }))
            }
            Handshake::Reject(status) => {
                warn!(path = %request.path, status = status.as_u16(), "Rejected upgrade request");
                writer.write_to_stream(&mut self.stream).await?;
                self.stream.shutdown().await.ok();
                Ok(None)
            }
        }
    }

    async fn reply(&mut self, response: Response) -> anyhow::Result<()> {
        debug!(status = response.status.as_u16(), "Reply");
        ResponseWriter::new(&response)
            .write_to_stream(&mut self.stream)
            .await
    }
}

fn after_reply(keep_alive: bool) -> ConnectionState {
    if keep_alive {
        ConnectionState::AwaitingRequest
    } else {
        debug!("Client asked to close after the response");
        ConnectionState::Closed
    }
}

/// Maps a request target onto a file below `root`.
///
/// Targets that try to climb out of the root are refused.
pub fn resolve(root: &Path, target: &str) -> Option<PathBuf> {
    let relative = Path::new(target.trim_start_matches('/'));

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    Some(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_under_root() {
        let root = Path::new("/sd/www");
        assert_eq!(
            resolve(root, "/index.html"),
            Some(PathBuf::from("/sd/www/index.html"))
        );
        assert_eq!(
            resolve(root, "/css/site.css"),
            Some(PathBuf::from("/sd/www/css/site.css"))
        );
        assert_eq!(resolve(root, "/../config.ini"), None);
    }
}
