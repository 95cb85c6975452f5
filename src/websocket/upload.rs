//! The `/upload` endpoint.
//!
//! The client sends three kinds of frame in order: the file name, the file
//! size in decimal, then the contents in as many frames as it likes. One text
//! frame reports the outcome before the channel closes.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::http::connection::resolve;
use crate::websocket::frame::{self, CLOSE_FRAME, Decoded, FrameDecoder, Opcode};

/// Largest payload accepted in a single upload frame.
pub const UPLOAD_BUFFER_SIZE: usize = 2000;

pub const REPLY_OK: &str = "ok upload successful";
pub const REPLY_OPEN_FAILED: &str = "error file open failed";
pub const REPLY_WRITE_FAILED: &str = "error file write failed";
pub const REPLY_BAD_SIZE: &str = "error bad file size";

const READ_RESERVE: usize = 4096;

pub enum UploadState {
    Name,
    Size { name: String },
    Body { file: File, path: PathBuf, remaining: u64 },
}

impl UploadState {
    fn name(&self) -> &'static str {
        match self {
            UploadState::Name => "name",
            UploadState::Size { .. } => "size",
            UploadState::Body { .. } => "body",
        }
    }
}

pub struct UploadChannel {
    stream: TcpStream,
    decoder: FrameDecoder,
    dir: PathBuf,
    state: UploadState,
}

impl UploadChannel {
    /// Files land below `dir`. `leftover` are bytes read together with the
    /// upgrade request.
    pub fn new(stream: TcpStream, leftover: &[u8], dir: impl Into<PathBuf>) -> Self {
        let mut decoder = FrameDecoder::new();
        decoder.extend(leftover);

        Self {
            stream,
            decoder,
            dir: dir.into(),
            state: UploadState::Name,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut payload = vec![0u8; UPLOAD_BUFFER_SIZE];

        match self.receive(&mut payload).await? {
            Some(reply) => {
                info!(reply, "Upload finished");
                frame::write_frame(&mut self.stream, reply.as_bytes(), Opcode::Text).await?;
            }
            None => {
                warn!(state = self.state.name(), "Upload abandoned by peer");
            }
        }

        self.stream.write_all(&CLOSE_FRAME).await?;
        self.stream.shutdown().await.ok();
        Ok(())
    }

    /// Reads frames until the upload concludes. `None` if the peer closed
    /// or broke the framing first.
    async fn receive(&mut self, payload: &mut [u8]) -> anyhow::Result<Option<&'static str>> {
        loop {
            loop {
                match self.decoder.decode(payload) {
                    Ok(Decoded::NeedMore) => break,
                    Ok(Decoded::Payload(n)) => {
                        if let Some(reply) = self.step(&payload[..n]).await {
                            return Ok(Some(reply));
                        }
                    }
                    Ok(Decoded::Close) => return Ok(None),
                    Err(e) => {
                        warn!(error = %e, "Bad upload frame");
                        return Ok(None);
                    }
                }
            }

            self.decoder.buffer_mut().reserve(READ_RESERVE);
            if self.stream.read_buf(self.decoder.buffer_mut()).await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Advances the upload by one frame. Returns the reply once it is over.
    async fn step(&mut self, data: &[u8]) -> Option<&'static str> {
        let state = std::mem::replace(&mut self.state, UploadState::Name);

        let (next, reply) = match state {
            UploadState::Name => {
                let name = String::from_utf8_lossy(data).trim().to_string();
                debug!(name = %name, "Upload name");
                (UploadState::Size { name }, None)
            }

            UploadState::Size { name } => {
                let size = std::str::from_utf8(data)
                    .ok()
                    .and_then(|s| s.trim().parse::<u64>().ok());
                let Some(size) = size else {
                    warn!(name = %name, "Bad upload size");
                    return Some(REPLY_BAD_SIZE);
                };

                let Some((mut file, path)) = self.create(&name).await else {
                    return Some(REPLY_OPEN_FAILED);
                };

                if size == 0 {
                    info!(file = %path.display(), "Empty upload");
                    let reply = finish(&mut file, &path).await;
                    (UploadState::Name, Some(reply))
                } else {
                    info!(file = %path.display(), size, "Receiving upload");
                    (UploadState::Body { file, path, remaining: size }, None)
                }
            }

            UploadState::Body { mut file, path, remaining } => {
                let take = data.len().min(remaining as usize);
                if take < data.len() {
                    debug!(extra = data.len() - take, "Ignoring bytes past the declared size");
                }

                if let Err(e) = file.write_all(&data[..take]).await {
                    warn!(file = %path.display(), error = %e, "Upload write failed");
                    return Some(REPLY_WRITE_FAILED);
                }

                let remaining = remaining - take as u64;
                if remaining == 0 {
                    let reply = finish(&mut file, &path).await;
                    (UploadState::Name, Some(reply))
                } else {
                    (UploadState::Body { file, path, remaining }, None)
                }
            }
        };

        self.state = next;
        reply
    }

    async fn create(&self, name: &str) -> Option<(File, PathBuf)> {
        let Some(path) = resolve(&self.dir, name) else {
            warn!(name, "Refusing upload outside the upload directory");
            return None;
        };

        match File::create(&path).await {
            Ok(file) => {
                debug!(file = %path.display(), "Opened upload file");
                Some((file, path))
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Upload open failed");
                None
            }
        }
    }
}

async fn finish(file: &mut File, path: &std::path::Path) -> &'static str {
    match file.flush().await {
        Ok(()) => {
            info!(file = %path.display(), "Upload complete");
            REPLY_OK
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Upload write failed");
            REPLY_WRITE_FAILED
        }
    }
}
