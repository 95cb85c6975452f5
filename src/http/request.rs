use std::collections::HashMap;

/// HTTP request methods.
///
/// The server only serves GET; every other method is parsed so that it can be
/// answered with 400 Bad Request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
}

/// A parsed HTTP request.
///
/// Header names are stored exactly as received. Lookups through
/// [`Request::header`] fall back to a case-insensitive match.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target as sent (e.g., "/index.html?x=1")
    pub path: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers as key-value pairs
    pub headers: HashMap<String, String>,
    /// Request body, if a Content-Length was given
    pub body: Vec<u8>,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Example
    ///
    /// ```
    /// # use smoothie_net::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }
}

impl Request {
    /// Retrieves a header value by name.
    ///
    /// An exact match on the name as received wins; otherwise the first
    /// ASCII case-insensitive match is returned. `None` if absent.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(key)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(key))
                    .map(|(_, value)| value)
            })
            .map(|v| v.as_str())
    }

    /// Whether the connection stays open after the response.
    ///
    /// `Connection: close` ends it and `Connection: keep-alive` keeps it;
    /// without either token HTTP/1.1 keeps the connection and HTTP/1.0 does
    /// not.
    pub fn keep_alive(&self) -> bool {
        if self.connection_has("close") {
            false
        } else if self.connection_has("keep-alive") {
            true
        } else {
            self.version == "HTTP/1.1"
        }
    }

    /// True when the client asks to switch protocols: an `Upgrade` header
    /// plus a `Connection` header listing the `upgrade` token.
    pub fn is_upgrade(&self) -> bool {
        self.header("Upgrade").is_some() && self.connection_has("upgrade")
    }

    /// The request target without its query string.
    pub fn target(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(p, _)| p)
    }

    fn connection_has(&self, token: &str) -> bool {
        self.header("Connection")
            .is_some_and(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
    }
}
