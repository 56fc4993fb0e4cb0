//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses, a set of
//! shortcut constructors for the common status-driven responses (redirects,
//! auth challenges, the 4xx/5xx family), and serialization to a byte buffer
//! for transmission over TCP.

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use super::{Headers, Method, StatusCode};

/// A response cookie, rendered into a `Set-Cookie` header by
/// [`Response::cookie`].
///
/// # Examples
///
/// ```
/// use plugweb::http::Cookie;
///
/// let cookie = Cookie::new("plugwebid", "abc").path("/").max_age(3600);
/// assert_eq!(cookie.header_value(), "plugwebid=abc; Max-Age=3600; Path=/");
/// ```
#[derive(Debug, Clone)]
pub struct Cookie {
    name: String,
    value: String,
    max_age: Option<u64>,
    path: Option<String>,
    domain: Option<String>,
    secure: bool,
}

impl Cookie {
    /// Creates a cookie with the given name and value and no attributes.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            path: None,
            domain: None,
            secure: false,
        }
    }

    /// Sets the `Max-Age` attribute in seconds.
    #[must_use]
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Sets the `Path` attribute.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the `Domain` attribute.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Marks the cookie `Secure`.
    #[must_use]
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Renders the `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(path) = &self.path {
            out.push_str(&format!("; Path={path}"));
        }
        if let Some(domain) = &self.domain {
            out.push_str(&format!("; Domain={domain}"));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        out
    }
}

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use plugweb::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// `200 OK` with an HTML body.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::Ok)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(body)
    }

    /// `200 OK` with a JSON body serialized from `value`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when `value` cannot be
    /// serialized.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(value)?;
        Ok(Self::new(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body(body))
    }

    /// `302 Found` pointing at `to`.
    pub fn redirect(to: impl Into<String>) -> Self {
        let mut response = Self::new(StatusCode::Found);
        response.headers.set("Location", to.into());
        response
    }

    /// `301 Moved Permanently` pointing at `to`.
    pub fn permanent_redirect(to: impl Into<String>) -> Self {
        let mut response = Self::new(StatusCode::MovedPermanently);
        response.headers.set("Location", to.into());
        response
    }

    /// `304 Not Modified` with an empty body.
    pub fn not_modified() -> Self {
        Self::new(StatusCode::NotModified)
    }

    /// `404 Not Found` with the given body.
    pub fn not_found(body: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound).body(body)
    }

    /// `403 Forbidden` with the given body.
    pub fn forbidden(body: impl Into<String>) -> Self {
        Self::new(StatusCode::Forbidden).body(body)
    }

    /// `405 Method Not Allowed` advertising `permitted` in the `Allow` header.
    pub fn not_allowed(permitted: &[Method]) -> Self {
        let allow = permitted
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut response = Self::new(StatusCode::MethodNotAllowed);
        response.headers.set("Allow", allow);
        response
    }

    /// `410 Gone` with the given body.
    pub fn gone(body: impl Into<String>) -> Self {
        Self::new(StatusCode::Gone).body(body)
    }

    /// `401 Unauthorized` carrying a `WWW-Authenticate: Basic` challenge for
    /// the given realm.
    pub fn need_auth(realm: &str) -> Self {
        let mut response = Self::new(StatusCode::Unauthorized).body("Authorization required");
        response
            .headers
            .set("WWW-Authenticate", format!("Basic realm=\"{realm}\""));
        response
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place. Intended for callers that receive a
    /// `Response` from an operation and need to decorate it without consuming it.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Replaces the `Content-Type` header.
    #[must_use]
    pub fn content_type(mut self, mime: impl Into<String>) -> Self {
        self.headers.set("Content-Type", mime);
        self
    }

    /// Appends a `Set-Cookie` header for the given cookie.
    #[must_use]
    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.headers.insert("Set-Cookie", cookie.header_value());
        self
    }

    /// Appends a `Set-Cookie` header that expires the named cookie immediately.
    #[must_use]
    pub fn delete_cookie(self, name: &str, path: &str) -> Self {
        self.cookie(Cookie::new(name, "").max_age(0).path(path))
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.insert("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        // Headers
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        // Body
        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}
