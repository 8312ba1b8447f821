//! HTTP/1.0 response serialization.
//!
//! Every response the base server writes has the same shape: a status line,
//! the `Server` and `Date` headers, the assembled headers in order, a blank
//! line, and the body. `Content-Length` is never computed here; the
//! [`ResponseAssembler`](crate::assemble::ResponseAssembler) and the
//! [`ErrorFormatter`](crate::error_page::ErrorFormatter) put it first in the
//! header list.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};

use super::Headers;

/// Protocol written on every status line. Connections carry one exchange.
pub const PROTOCOL: &str = "HTTP/1.0";

/// An HTTP response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use basehttp::http::{Headers, Response};
///
/// let response = Response::new(200, "OK")
///     .server("demo/1.0")
///     .headers(Headers::from([("Content-Length", "2")]))
///     .body(&b"ok"[..]);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.0 200 OK\r\nServer: demo/1.0\r\nDate: "));
/// assert!(text.ends_with("Content-Length: 2\r\n\r\nok"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    reason: String,
    server: Option<String>,
    date: DateTime<Utc>,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Creates a response with the given status line and no headers or body.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            server: None,
            date: Utc::now(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Sets the `Server` header value.
    #[must_use]
    pub fn server(mut self, identity: impl Into<String>) -> Self {
        self.server = Some(identity.into());
        self
    }

    /// Overrides the `Date` header timestamp.
    #[must_use]
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Sets the header list written after `Server` and `Date`, in order.
    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the response body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Serializes the response into a `BytesMut` buffer.
    pub fn into_bytes(self) -> BytesMut {
        let estimated_size = 128 + self.headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(format!("{PROTOCOL} {} {}\r\n", self.status, self.reason).as_bytes());

        if let Some(server) = &self.server {
            buf.put(format!("Server: {server}\r\n").as_bytes());
        }
        buf.put(format!("Date: {}\r\n", http_date(&self.date)).as_bytes());

        buf.put(self.headers.to_string().as_bytes());

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        buf.put(self.body);
        buf
    }
}

/// Formats a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn header_order_is_preserved() {
        let headers = Headers::from([("Content-Length", "5"), ("Content-Type", "text/plain")]);
        let s = to_string(
            Response::new(200, "OK")
                .server("test")
                .headers(headers)
                .body("hello")
                .into_bytes(),
        );
        let content_length = s.find("Content-Length: 5\r\n").unwrap();
        let content_type = s.find("Content-Type: text/plain\r\n").unwrap();
        assert!(content_length < content_type);
        assert!(s.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn date_header_format() {
        let date = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(http_date(&date), "Sun, 06 Nov 1994 08:49:37 GMT");
        let s = to_string(Response::new(404, "Not Found").date(date).into_bytes());
        assert_eq!(
            s,
            "HTTP/1.0 404 Not Found\r\nDate: Sun, 06 Nov 1994 08:49:37 GMT\r\n\r\n"
        );
    }

    #[test]
    fn reason_comes_from_caller() {
        let s = to_string(Response::new(418, "Short And Stout").into_bytes());
        assert!(s.starts_with("HTTP/1.0 418 Short And Stout\r\n"));
    }
}
