use crate::http::mime::DEFAULT_CONTENT_TYPE;

/// HTTP status codes the server replies with.
///
/// - `SwitchingProtocols` (101): WebSocket upgrade accepted
/// - `Ok` (200): File follows
/// - `BadRequest` (400): Malformed or unsupported request
/// - `NotFound` (404): No such file or endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 101 Switching Protocols
    SwitchingProtocols,
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use smoothie_net::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::SwitchingProtocols => 101,
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::SwitchingProtocols => "Switching Protocols",
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
        }
    }

    /// 1xx responses carry neither a body nor entity headers.
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.as_u16())
    }
}

/// A response head plus an optional in-memory body.
///
/// File bodies are not held here; the connection streams them after the
/// head, which then carries the file's `Content-Length`.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Headers in the order they are sent
    pub headers: Vec<(String, String)>,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// Every non-informational response starts with `Content-Type` (default
/// `text/html`) and `Connection: keep-alive`, followed by the extra headers
/// in insertion order.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .content_type("text/css")
///     .header("Content-Length", "1024")
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Adds a header, replacing an earlier one with the same name.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        if key.eq_ignore_ascii_case("Content-Type") && !self.status.is_informational() {
            self.content_type = Some(value);
            return self;
        }

        match self
            .headers
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&key))
        {
            Some(existing) => existing.1 = value,
            None => self.headers.push((key, value)),
        }
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the final Response.
    ///
    /// Adds `Content-Length` from the body size unless one was set.
    pub fn build(self) -> Response {
        if self.status.is_informational() {
            return Response {
                status: self.status,
                headers: self.headers,
                body: Vec::new(),
            };
        }

        let mut headers = Vec::with_capacity(self.headers.len() + 3);
        headers.push((
            "Content-Type".to_string(),
            self.content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        ));
        headers.push(("Connection".to_string(), "keep-alive".to_string()));

        let has_length = self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("Content-Length"));
        headers.extend(self.headers);
        if !has_length {
            headers.push(("Content-Length".to_string(), self.body.len().to_string()));
        }

        Response {
            status: self.status,
            headers,
            body: self.body,
        }
    }
}

impl Response {
    /// A reply with no body (`Content-Length: 0`), used for errors.
    pub fn empty(status: StatusCode) -> Self {
        ResponseBuilder::new(status).build()
    }

    pub fn bad_request() -> Self {
        Self::empty(StatusCode::BadRequest)
    }

    pub fn not_found() -> Self {
        Self::empty(StatusCode::NotFound)
    }

    /// Head of a 200 reply whose body of `length` bytes is streamed later.
    pub fn file(content_type: &str, length: u64) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .content_type(content_type)
            .header("Content-Length", length.to_string())
            .build()
    }

    /// 101 reply accepting a WebSocket upgrade.
    pub fn switching_protocols(accept: &str) -> Self {
        ResponseBuilder::new(StatusCode::SwitchingProtocols)
            .header("Upgrade", "websocket")
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Accept", accept)
            .build()
    }

    /// Looks up a header by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }
}
