//! HTTP/1.x request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.x request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length header: {value:?}")]
    InvalidContentLength { value: String },

    #[error("declared body of {length} bytes exceeds the request size limit")]
    TooLarge { length: usize },
}

/// Largest request (head plus body) a server will buffer (8 MiB).
pub const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// A fully parsed HTTP/1.x request. Immutable once parsed.
///
/// Created by [`Request::parse`] from a raw byte buffer. The body is present
/// only when the request declared a `Content-Length`.
///
/// # Examples
///
/// ```
/// use basehttp::http::request::Request;
///
/// let raw = b"POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2\r\n\r\nhi";
/// let (request, consumed) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "POST");
/// assert_eq!(request.path(), "/submit");
/// assert_eq!(request.body().map(|b| &b[..]), Some(&b"hi"[..]));
/// assert_eq!(consumed, raw.len());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Option<Bytes>,
    /// The request exactly as received, head and body.
    raw: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parses a raw HTTP/1.x request, including its declared body.
    ///
    /// Returns the parsed `Request` and the number of bytes of `buf` it
    /// occupies (head plus body). The path keeps its query string, since the
    /// hooks receive the request target exactly as sent.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: the head or the declared body has not fully arrived.
    /// - [`RequestError::Parse`]: the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`]: a required field (method, path, version) is absent.
    /// - [`RequestError::InvalidContentLength`]: `Content-Length` is not a decimal length.
    /// - [`RequestError::TooLarge`]: the declared body alone exceeds [`MAX_REQUEST_SIZE`].
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = match raw_req.method {
            Some(m) => m.parse::<Method>().unwrap_or_else(|never| match never {}),
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?
            .to_owned();

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            header_map.insert(header.name, String::from_utf8_lossy(header.value));
        }

        let consumed = match header_map.get("content-length") {
            Some(declared) => {
                let invalid = || RequestError::InvalidContentLength {
                    value: declared.to_owned(),
                };
                let length: usize = declared.trim().parse().map_err(|_| invalid())?;
                if length > MAX_REQUEST_SIZE {
                    return Err(RequestError::TooLarge { length });
                }
                let end = body_offset.checked_add(length).ok_or_else(invalid)?;
                if buf.len() < end {
                    return Err(RequestError::Incomplete);
                }
                end
            }
            None => body_offset,
        };

        let raw = Bytes::copy_from_slice(&buf[..consumed]);
        let body = header_map
            .contains("content-length")
            .then(|| raw.slice(body_offset..));

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                body,
                raw,
            },
            consumed,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request target, query string included.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the protocol version as it appears on the request line.
    pub fn version_str(&self) -> &'static str {
        match self.version {
            0 => "HTTP/1.0",
            _ => "HTTP/1.1",
        }
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request body, if a `Content-Length` was declared.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The bytes this request was parsed from, head and body, unaltered.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Reconstructs the request as text for the access log.
    ///
    /// The request line and headers are newline-separated, followed by a blank
    /// line; a declared body is appended after one more newline.
    pub fn raw_text(&self) -> String {
        let mut text = format!("{} {} {}\n", self.method, self.path, self.version_str());
        for (name, value) in self.headers.iter() {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(value);
            text.push('\n');
        }
        text.push('\n');
        if let Some(body) = &self.body {
            text.push('\n');
            text.push_str(&String::from_utf8_lossy(body));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, consumed) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert!(req.body().is_none());
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn path_keeps_query_string() {
        let raw = b"GET /search?q=rust HTTP/1.0\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/search?q=rust");
        assert_eq!(req.version_str(), "HTTP/1.0");
    }

    #[test]
    fn incomplete_head() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn incomplete_body() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn body_stops_at_content_length() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloEXTRA";
        let (req, consumed) = Request::parse(raw).unwrap();
        assert_eq!(req.body().map(|b| &b[..]), Some(&b"hello"[..]));
        assert_eq!(consumed, raw.len() - 5);
    }

    #[test]
    fn bad_content_length() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
        assert!(matches!(
            Request::parse(raw),
            Err(RequestError::InvalidContentLength { .. })
        ));
    }

    #[test]
    fn malformed_request_line() {
        let raw = b"GET\r\n\r\n";
        assert!(Request::parse(raw).is_err());
    }

    #[test]
    fn raw_text_without_body() {
        let raw = b"GET /a HTTP/1.1\r\nHost: x\r\nAccept: */*\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.raw_text(), "GET /a HTTP/1.1\nHost: x\nAccept: */*\n\n");
    }

    #[test]
    fn raw_text_with_body() {
        let raw = b"POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(
            req.raw_text(),
            "POST /a HTTP/1.1\nContent-Length: 3\n\n\nabc"
        );
    }

    #[test]
    fn content_length_near_usize_max() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\nabc";
        assert!(matches!(
            Request::parse(raw),
            Err(RequestError::TooLarge { .. })
        ));
    }

    #[test]
    fn content_length_beyond_usize() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 99999999999999999999999\r\n\r\n";
        assert!(matches!(
            Request::parse(raw),
            Err(RequestError::InvalidContentLength { .. })
        ));
    }

    #[test]
    fn content_length_at_limit_waits_for_body() {
        let raw = format!("POST / HTTP/1.1\r\nContent-Length: {MAX_REQUEST_SIZE}\r\n\r\n");
        assert!(matches!(
            Request::parse(raw.as_bytes()),
            Err(RequestError::Incomplete)
        ));
    }

    #[test]
    fn raw_bytes_are_unaltered() {
        let mut raw = b"POST /bin HTTP/1.1\r\nContent-Length: 4\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0xff, 0x00, 0xfe, 0x80]);
        let (req, consumed) = Request::parse(&raw).unwrap();
        assert_eq!(&req.raw()[..], &raw[..]);
        assert_eq!(consumed, raw.len());
        assert_eq!(req.body().map(|b| &b[..]), Some(&[0xff, 0x00, 0xfe, 0x80][..]));
    }

    #[test]
    fn non_utf8_header_value_is_kept() {
        let raw = b"GET / HTTP/1.1\r\nX-Tag: a\r\nX-Tag: caf\xe9\r\nX-Tag: b\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        let tags: Vec<_> = req.headers().get_all("x-tag").collect();
        assert_eq!(tags, vec!["a", "caf\u{fffd}", "b"]);
    }
}
