//! Content codings for response bodies.
//!
//! `gzip` is the gzip container format; `deflate` is the zlib-wrapped stream,
//! which is what `Content-Encoding: deflate` means on the wire.

use std::fmt;
use std::io::{self, Read, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

/// A `Content-Encoding` the assembler knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    /// Recognizes a `Content-Encoding` value, ignoring case and surrounding space.
    ///
    /// Anything other than `gzip` or `deflate` returns `None` and passes the
    /// body through untouched.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("gzip") {
            Some(Self::Gzip)
        } else if token.eq_ignore_ascii_case("deflate") {
            Some(Self::Deflate)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compresses `data` with the given coding.
pub fn compress(data: &[u8], encoding: Encoding) -> io::Result<Vec<u8>> {
    match encoding {
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        Encoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
    }
}

/// Reverses [`compress`].
pub fn decompress(data: &[u8], encoding: Encoding) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    match encoding {
        Encoding::Gzip => GzDecoder::new(data).read_to_end(&mut out)?,
        Encoding::Deflate => ZlibDecoder::new(data).read_to_end(&mut out)?,
    };
    Ok(out)
}

/// Encodes response text as the UTF-8 bytes written to the client.
pub fn plain(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}
