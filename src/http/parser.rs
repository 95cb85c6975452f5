//! Incremental HTTP/1.1 request parsing.
//!
//! [`RequestParser`] accepts a request in whatever pieces the socket delivers
//! it and reports one of three outcomes per [`feed`](RequestParser::feed):
//! more bytes needed, request complete, or request complete and asking for a
//! protocol upgrade. In the upgrade case the offset of the first byte that
//! belongs to the new protocol is reported relative to the chunk just fed, so
//! the caller can hand those bytes on instead of losing them.
//!
//! The header block itself is tokenised with `httparse`.

use std::collections::HashMap;

use thiserror::Error;

use crate::http::request::{Method, Request};

/// Largest request head (request line plus headers) accepted.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Largest request body buffered. Only GET is served, so bodies are read
/// just to find where the next request starts.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const MAX_HEADERS: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unknown request method")]
    InvalidMethod,
    #[error("malformed request target")]
    InvalidUrl,
    #[error("unsupported HTTP version")]
    InvalidVersion,
    #[error("malformed header")]
    InvalidHeader,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("unsupported Transfer-Encoding")]
    UnsupportedTransferEncoding,
    #[error("request head larger than {MAX_HEAD_BYTES} bytes")]
    HeadTooLarge,
    #[error("request body larger than {MAX_BODY_BYTES} bytes")]
    BodyTooLarge,
}

impl ParseError {
    /// Numeric parser error code (always positive).
    pub fn code(&self) -> i32 {
        match self {
            ParseError::InvalidRequest => 1,
            ParseError::HeadTooLarge => 2,
            ParseError::BodyTooLarge => 3,
            ParseError::InvalidMethod => 6,
            ParseError::InvalidUrl => 7,
            ParseError::InvalidVersion => 9,
            ParseError::InvalidHeader => 10,
            ParseError::InvalidContentLength => 11,
            ParseError::UnsupportedTransferEncoding => 15,
        }
    }

    /// The error as a negative status, the negated [`code`](ParseError::code).
    pub fn sentinel(&self) -> i32 {
        -self.code()
    }
}

/// Outcome of a successful [`RequestParser::feed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The request is not complete yet.
    NeedMore,
    /// A complete request, including any `Content-Length` body.
    Complete,
    /// A complete upgrade request. `offset` indexes the chunk passed to the
    /// last `feed`: bytes from there on belong to the upgraded protocol.
    Upgrade { offset: usize },
}

impl Progress {
    /// Status as a single integer: `0` need more, `1` complete, `offset + 2`
    /// for an upgrade.
    pub fn code(&self) -> i32 {
        match self {
            Progress::NeedMore => 0,
            Progress::Complete => 1,
            Progress::Upgrade { offset } => *offset as i32 + 2,
        }
    }
}

#[derive(Debug, Default)]
pub struct RequestParser {
    buf: Vec<u8>,
    request: Option<Request>,
    head_len: usize,
    body_len: usize,
    progress: Option<Progress>,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and advances the parse.
    ///
    /// Request line, header names and header values may be split anywhere
    /// across calls. Once the request is complete, further bytes are kept as
    /// [`surplus`](RequestParser::surplus).
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Progress, ParseError> {
        let start = self.buf.len();
        self.buf.extend_from_slice(chunk);

        match self.progress {
            Some(Progress::Upgrade { .. }) => return Ok(Progress::Upgrade { offset: 0 }),
            Some(progress) => return Ok(progress),
            None => {}
        }

        if self.request.is_none() {
            let Some((request, head_len)) = parse_head(&self.buf)? else {
                return Ok(Progress::NeedMore);
            };

            self.head_len = head_len;
            if request.is_upgrade() {
                self.request = Some(request);
                let progress = Progress::Upgrade {
                    offset: head_len.saturating_sub(start),
                };
                self.progress = Some(progress);
                return Ok(progress);
            }

            self.body_len = body_length(&request)?;
            self.request = Some(request);
        }

        let body_end = self
            .head_len
            .checked_add(self.body_len)
            .ok_or(ParseError::BodyTooLarge)?;
        if self.buf.len() < body_end {
            return Ok(Progress::NeedMore);
        }

        if let Some(request) = self.request.as_mut() {
            request.body = self.buf[self.head_len..body_end].to_vec();
        }
        self.progress = Some(Progress::Complete);
        Ok(Progress::Complete)
    }

    pub fn is_complete(&self) -> bool {
        self.progress.is_some()
    }

    /// The parsed request, available once the head has been parsed.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn into_request(self) -> Option<Request> {
        self.request
    }

    pub fn method(&self) -> Option<&Method> {
        self.request.as_ref().map(|r| &r.method)
    }

    pub fn url(&self) -> Option<&str> {
        self.request.as_ref().map(|r| r.path.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.header(name))
    }

    /// Bytes received after the end of the complete message.
    pub fn surplus(&self) -> &[u8] {
        let end = match self.progress {
            Some(Progress::Complete) => self.head_len.saturating_add(self.body_len),
            Some(Progress::Upgrade { .. }) => self.head_len,
            _ => return &[],
        };
        self.buf.get(end..).unwrap_or(&[])
    }
}

/// Parses the request line and headers. `Ok(None)` while the head is still
/// incomplete.
fn parse_head(buf: &[u8]) -> Result<Option<(Request, usize)>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let head_len = match req.parse(buf).map_err(map_httparse_error)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial if buf.len() > MAX_HEAD_BYTES => {
            return Err(ParseError::HeadTooLarge);
        }
        httparse::Status::Partial => return Ok(None),
    };

    let method = req
        .method
        .and_then(Method::from_str)
        .ok_or(ParseError::InvalidMethod)?;
    let path = req.path.ok_or(ParseError::InvalidUrl)?;
    let version = match req.version {
        Some(0) => "HTTP/1.0",
        Some(1) => "HTTP/1.1",
        _ => return Err(ParseError::InvalidVersion),
    };

    let mut map = HashMap::with_capacity(req.headers.len());
    for header in req.headers.iter() {
        let value = std::str::from_utf8(header.value).map_err(|_| ParseError::InvalidHeader)?;
        map.insert(header.name.to_string(), value.trim().to_string());
    }

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers: map,
        body: Vec::new(),
    };
    Ok(Some((request, head_len)))
}

fn body_length(request: &Request) -> Result<usize, ParseError> {
    if let Some(encoding) = request.header("Transfer-Encoding") {
        if !encoding.trim().eq_ignore_ascii_case("identity") {
            return Err(ParseError::UnsupportedTransferEncoding);
        }
    }

    let Some(value) = request.header("Content-Length") else {
        return Ok(0);
    };

    let length = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidContentLength)?;
    if length > MAX_BODY_BYTES as u64 {
        return Err(ParseError::BodyTooLarge);
    }
    Ok(length as usize)
}

fn map_httparse_error(err: httparse::Error) -> ParseError {
    match err {
        httparse::Error::HeaderName | httparse::Error::HeaderValue | httparse::Error::NewLine => {
            ParseError::InvalidHeader
        }
        httparse::Error::Token => ParseError::InvalidUrl,
        httparse::Error::Version => ParseError::InvalidVersion,
        httparse::Error::TooManyHeaders => ParseError::HeadTooLarge,
        _ => ParseError::InvalidRequest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let mut parser = RequestParser::new();
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        assert_eq!(parser.feed(req), Ok(Progress::Complete));
        assert_eq!(parser.url(), Some("/"));
        assert_eq!(parser.header("Host"), Some("example.com"));
        assert!(parser.surplus().is_empty());
    }

    #[test]
    fn body_arrives_later() {
        let mut parser = RequestParser::new();
        assert_eq!(
            parser.feed(b"POST /api HTTP/1.1\r\nContent-Length: 5\r\n\r\nhe"),
            Ok(Progress::NeedMore)
        );
        assert_eq!(parser.feed(b"lloGET"), Ok(Progress::Complete));
        assert_eq!(parser.request().unwrap().body, b"hello");
        assert_eq!(parser.surplus(), b"GET");
    }
}
