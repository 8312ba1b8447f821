//! Success response assembly: content coding, `Keep-Alive`, `Content-Length`.

use std::io;

use bytes::Bytes;
use tracing::debug;

use crate::codec::{self, Encoding};
use crate::http::Headers;

/// Connections advertised via `Keep-Alive` allow at most this many requests.
pub const KEEP_ALIVE_MAX: u32 = 100;

/// Headers and body ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// Always begins with `Content-Length`.
    pub headers: Headers,
    /// The body after any content coding.
    pub body: Bytes,
}

/// Turns a handler's headers and body into what is actually sent.
///
/// - Each `Content-Encoding: gzip` or `deflate` header compresses the body,
///   in header order. Other codings leave the body untouched.
/// - A `Connection: Keep-Alive` header adds
///   `Keep-Alive: timeout=<timeout>, max=100` after the handler's headers.
/// - `Content-Length` is inserted first and counts the final body bytes.
///
/// # Examples
///
/// ```
/// use basehttp::assemble::ResponseAssembler;
/// use basehttp::http::Headers;
///
/// let assembler = ResponseAssembler::new(5);
/// let out = assembler
///     .assemble(Headers::from([("Content-Type", "text/plain")]), "hello")
///     .unwrap();
///
/// let headers: Vec<_> = out.headers.iter().collect();
/// assert_eq!(headers, vec![("Content-Length", "5"), ("Content-Type", "text/plain")]);
/// assert_eq!(&out.body[..], b"hello");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ResponseAssembler {
    keep_alive_timeout: u64,
}

impl ResponseAssembler {
    /// `keep_alive_timeout` is the per-connection timeout in seconds.
    pub fn new(keep_alive_timeout: u64) -> Self {
        Self { keep_alive_timeout }
    }

    /// Applies the header directives to `body`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the compressor.
    pub fn assemble(&self, mut headers: Headers, body: &str) -> io::Result<Assembled> {
        let mut payload = codec::plain(body);

        let encodings: Vec<Encoding> = headers
            .get_all("content-encoding")
            .filter_map(Encoding::from_token)
            .collect();
        for encoding in encodings {
            let before = payload.len();
            payload = Bytes::from(codec::compress(&payload, encoding)?);
            debug!(%encoding, before, after = payload.len(), "compressed response body");
        }

        if headers.has_value("connection", "keep-alive") {
            headers.insert(
                "Keep-Alive",
                format!("timeout={}, max={KEEP_ALIVE_MAX}", self.keep_alive_timeout),
            );
        }

        headers.prepend("Content-Length", payload.len().to_string());

        Ok(Assembled {
            headers,
            body: payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(headers: &Headers) -> Vec<&str> {
        headers.iter().map(|(n, _)| n).collect()
    }

    #[test]
    fn plain_body() {
        let out = ResponseAssembler::new(5)
            .assemble(Headers::from([("Content-Type", "text/plain")]), "hello")
            .unwrap();
        assert_eq!(out.headers.get("content-length"), Some("5"));
        assert_eq!(names(&out.headers), vec!["Content-Length", "Content-Type"]);
        assert_eq!(&out.body[..], b"hello");
    }

    #[test]
    fn gzip_length_counts_compressed_bytes() {
        let text = "compress me ".repeat(200);
        let out = ResponseAssembler::new(5)
            .assemble(Headers::from([("Content-Encoding", "gzip")]), &text)
            .unwrap();
        assert_ne!(out.body.len(), text.len());
        assert_eq!(
            out.headers.get("Content-Length"),
            Some(out.body.len().to_string().as_str())
        );
        let restored = codec::decompress(&out.body, Encoding::Gzip).unwrap();
        assert_eq!(restored, text.as_bytes());
    }

    #[test]
    fn deflate_body() {
        let out = ResponseAssembler::new(5)
            .assemble(Headers::from([("Content-Encoding", "deflate")]), "abc")
            .unwrap();
        assert_eq!(codec::decompress(&out.body, Encoding::Deflate).unwrap(), b"abc");
        assert_eq!(
            out.headers.get("Content-Length"),
            Some(out.body.len().to_string().as_str())
        );
    }

    #[test]
    fn unknown_encoding_passes_through() {
        let out = ResponseAssembler::new(5)
            .assemble(Headers::from([("Content-Encoding", "br")]), "abc")
            .unwrap();
        assert_eq!(&out.body[..], b"abc");
        assert_eq!(out.headers.get("Content-Length"), Some("3"));
    }

    #[test]
    fn stacked_encodings_apply_in_order() {
        let out = ResponseAssembler::new(5)
            .assemble(
                Headers::from([("Content-Encoding", "deflate"), ("Content-Encoding", "gzip")]),
                "layers",
            )
            .unwrap();
        let outer = codec::decompress(&out.body, Encoding::Gzip).unwrap();
        let inner = codec::decompress(&outer, Encoding::Deflate).unwrap();
        assert_eq!(inner, b"layers");
    }

    #[test]
    fn keep_alive_parameters() {
        let out = ResponseAssembler::new(30)
            .assemble(
                Headers::from([("Connection", "Keep-Alive"), ("X-After", "1")]),
                "",
            )
            .unwrap();
        assert_eq!(
            names(&out.headers),
            vec!["Content-Length", "Connection", "X-After", "Keep-Alive"]
        );
        assert_eq!(out.headers.get("Keep-Alive"), Some("timeout=30, max=100"));
        assert_eq!(out.headers.get("Content-Length"), Some("0"));
    }

    #[test]
    fn no_keep_alive_without_directive() {
        let out = ResponseAssembler::new(30)
            .assemble(Headers::from([("Connection", "close")]), "x")
            .unwrap();
        assert!(!out.headers.contains("Keep-Alive"));
    }

    #[test]
    fn empty_body_gzip() {
        let out = ResponseAssembler::new(5)
            .assemble(Headers::from([("Content-Encoding", "gzip")]), "")
            .unwrap();
        assert!(codec::decompress(&out.body, Encoding::Gzip).unwrap().is_empty());
    }
}
