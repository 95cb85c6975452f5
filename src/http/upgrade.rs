//! WebSocket opening handshake (RFC 6455, section 4.2).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};

use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};

/// Fixed GUID appended to the client key before hashing.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// What an upgraded connection is used for, chosen by the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `/command`: console lines in, command output out.
    Command,
    /// `/upload`: file name, size and contents in, status out.
    Upload,
}

impl Endpoint {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/command" => Some(Endpoint::Command),
            "/upload" => Some(Endpoint::Upload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Accept { endpoint: Endpoint, accept: String },
    Reject(StatusCode),
}

impl Handshake {
    /// The reply to send for this outcome.
    pub fn response(&self) -> Response {
        match self {
            Handshake::Accept { accept, .. } => Response::switching_protocols(accept),
            Handshake::Reject(status) => Response::empty(*status),
        }
    }
}

/// Computes `Sec-WebSocket-Accept` for a client's `Sec-WebSocket-Key`.
///
/// ```
/// # use smoothie_net::http::upgrade::accept_key;
/// assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn accept_key(key: &str) -> String {
    let mut sha = Sha1::new();
    sha.update(key.trim().as_bytes());
    sha.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(sha.finalize())
}

/// Decides whether `request` may become a WebSocket.
///
/// Unknown endpoints get 404. A known endpoint without a GET method,
/// `Upgrade: websocket` or a `Sec-WebSocket-Key` gets 400.
pub fn negotiate(request: &Request) -> Handshake {
    let Some(endpoint) = Endpoint::from_path(request.target()) else {
        return Handshake::Reject(StatusCode::NotFound);
    };

    if request.method != Method::GET {
        return Handshake::Reject(StatusCode::BadRequest);
    }

    let wants_websocket = request
        .header("Upgrade")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"));
    if !wants_websocket {
        return Handshake::Reject(StatusCode::BadRequest);
    }

    match request.header("Sec-WebSocket-Key") {
        Some(key) if !key.trim().is_empty() => Handshake::Accept {
            endpoint,
            accept: accept_key(key),
        },
        _ => Handshake::Reject(StatusCode::BadRequest),
    }
}
