//! Access logging with size-based spillover to disk.
//!
//! Every exchange is turned into one immutable [`LoggedExchange`] and handed to
//! each configured [`AccessSink`] in order. Requests larger than
//! [`SPILLOVER_THRESHOLD`] bytes on the wire are written, byte for byte, to a
//! file under the spillover directory and replaced in the record by a
//! reference to that file.
//!
//! Spillover file names combine the client IP, listening port, a microsecond
//! timestamp and the SHA-256 of the content. They are collision-resistant but
//! not provably unique across concurrent writers.

pub mod sinks;

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

pub use sinks::{JsonLinesSink, TracingSink};

use crate::http::Request;

/// Requests longer than this many bytes are spilled to disk.
pub const SPILLOVER_THRESHOLD: usize = 2048;

/// A request as handed to the access log.
///
/// `raw` is what came off the wire and is what gets measured, hashed and
/// spilled. `text` is the readable form kept inline for small requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCapture {
    pub raw: Bytes,
    pub text: String,
}

impl RequestCapture {
    pub fn new(raw: impl Into<Bytes>, text: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            text: text.into(),
        }
    }

    /// Captures a parsed request: its wire bytes and [`Request::raw_text`].
    pub fn of(request: &Request) -> Self {
        Self::new(request.raw().clone(), request.raw_text())
    }

    /// Nothing usable was received.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One recorded exchange, as seen by every sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggedExchange {
    pub remote_ip: IpAddr,
    pub remote_port: u16,
    pub tls: bool,
    /// The server's listening port.
    pub port: u16,
    /// Readable request text, or a reference to the spillover file.
    pub request: String,
    /// Plain response body for successes, `Error code <n>` for errors.
    pub response: String,
    pub is_large: bool,
}

/// Errors a sink may report. They are logged and never reach the client.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// A destination for access log records.
///
/// Sinks can be shared by runners on several ports at once, hence `Send + Sync`.
/// A sink may block; it runs inline on the runner that owns the exchange.
pub trait AccessSink: Send + Sync {
    fn log(&self, exchange: &LoggedExchange) -> Result<(), SinkError>;
}

/// Fans exchanges out to sinks, spilling large requests to disk first.
#[derive(Clone)]
pub struct AccessLogger {
    sinks: Vec<Arc<dyn AccessSink>>,
    spillover_dir: PathBuf,
}

impl fmt::Debug for AccessLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogger")
            .field("sinks", &self.sinks.len())
            .field("spillover_dir", &self.spillover_dir)
            .finish()
    }
}

impl AccessLogger {
    pub fn new(sinks: Vec<Arc<dyn AccessSink>>, spillover_dir: impl Into<PathBuf>) -> Self {
        Self {
            sinks,
            spillover_dir: spillover_dir.into(),
        }
    }

    pub fn spillover_dir(&self) -> &Path {
        &self.spillover_dir
    }

    /// Records one exchange and returns the record the sinks received.
    ///
    /// A failed spillover write degrades to a placeholder request text; a
    /// failing or panicking sink is reported and skipped. Neither affects the
    /// remaining sinks or the caller.
    pub async fn log(
        &self,
        remote_ip: IpAddr,
        remote_port: u16,
        tls: bool,
        port: u16,
        request: RequestCapture,
        response: String,
    ) -> LoggedExchange {
        let is_large = request.raw.len() > SPILLOVER_THRESHOLD;
        let request = if is_large {
            match self.spill(remote_ip, port, &request.raw).await {
                Ok(path) => format!("Output saved at {}", path.display()),
                Err(e) => {
                    warn!(
                        dir = %self.spillover_dir.display(),
                        error = %e,
                        "failed to spill large request to disk"
                    );
                    format!("Output could not be saved: {e}")
                }
            }
        } else {
            request.text
        };

        let exchange = LoggedExchange {
            remote_ip,
            remote_port,
            tls,
            port,
            request,
            response,
            is_large,
        };

        for (index, sink) in self.sinks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| sink.log(&exchange))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(sink = index, error = %e, "access log sink failed"),
                Err(_) => warn!(sink = index, "access log sink panicked"),
            }
        }

        exchange
    }

    async fn spill(&self, remote_ip: IpAddr, port: u16, data: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.spillover_dir).await?;
        let path = self
            .spillover_dir
            .join(spillover_file_name(remote_ip, port, Utc::now(), data));
        tokio::fs::write(&path, data).await?;
        debug!(path = %path.display(), bytes = data.len(), "spilled large request");
        Ok(path)
    }
}

/// `<ip>-<port>-<unix seconds>.<micros>-<sha256 hex>.large`
pub fn spillover_file_name(remote_ip: IpAddr, port: u16, at: DateTime<Utc>, data: &[u8]) -> String {
    format!(
        "{remote_ip}-{port}-{}.{:06}-{:x}.large",
        at.timestamp(),
        at.timestamp_subsec_micros(),
        Sha256::digest(data)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<LoggedExchange>>,
    }

    impl AccessSink for Recorder {
        fn log(&self, exchange: &LoggedExchange) -> Result<(), SinkError> {
            self.seen.lock().unwrap().push(exchange.clone());
            Ok(())
        }
    }

    struct Failing;

    impl AccessSink for Failing {
        fn log(&self, _exchange: &LoggedExchange) -> Result<(), SinkError> {
            Err(SinkError::Other("disk full".into()))
        }
    }

    struct Panicking;

    impl AccessSink for Panicking {
        fn log(&self, _exchange: &LoggedExchange) -> Result<(), SinkError> {
            panic!("sink exploded")
        }
    }

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn logger(dir: &Path, sinks: Vec<Arc<dyn AccessSink>>) -> AccessLogger {
        AccessLogger::new(sinks, dir.join("large"))
    }

    fn plain(text: &str) -> RequestCapture {
        RequestCapture::new(text.as_bytes().to_vec(), text)
    }

    #[test]
    fn file_name_layout() {
        let at = Utc.timestamp_opt(1_700_000_000, 42_000).unwrap();
        let name = spillover_file_name(IP, 8080, at, b"abc");
        assert_eq!(
            name,
            "127.0.0.1-8080-1700000000.000042-\
             ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.large"
        );
    }

    #[tokio::test]
    async fn small_request_logged_inline() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let logger = logger(dir.path(), vec![recorder.clone()]);

        let text = "x".repeat(SPILLOVER_THRESHOLD);
        let exchange = logger
            .log(IP, 5000, false, 80, plain(&text), "ok".into())
            .await;

        assert!(!exchange.is_large);
        assert_eq!(exchange.request, text);
        assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[exchange]);
        assert!(!dir.path().join("large").exists());
    }

    #[tokio::test]
    async fn large_request_spills_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let logger = logger(dir.path(), vec![recorder.clone()]);

        let text = "y".repeat(SPILLOVER_THRESHOLD + 1);
        let exchange = logger
            .log(IP, 5000, true, 443, plain(&text), "Error code 404".into())
            .await;

        assert!(exchange.is_large);
        let path = exchange.request.strip_prefix("Output saved at ").unwrap();
        assert!(path.ends_with(".large"));
        assert!(path.contains("127.0.0.1-443-"));
        assert_eq!(std::fs::read(path).unwrap(), text.as_bytes());
        assert_eq!(recorder.seen.lock().unwrap()[0].request, exchange.request);
    }

    #[tokio::test]
    async fn spill_failure_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let recorder = Arc::new(Recorder::default());
        let logger = AccessLogger::new(vec![recorder.clone()], blocker.join("large"));

        let exchange = logger
            .log(IP, 1, false, 80, plain(&"z".repeat(4096)), "ok".into())
            .await;

        assert!(exchange.is_large);
        assert!(exchange.request.starts_with("Output could not be saved: "));
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_sinks_do_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(Recorder::default());
        let last = Arc::new(Recorder::default());
        let logger = logger(
            dir.path(),
            vec![first.clone(), Arc::new(Failing), Arc::new(Panicking), last.clone()],
        );

        logger.log(IP, 1, false, 80, plain("GET /"), "hi".into()).await;

        assert_eq!(first.seen.lock().unwrap().len(), 1);
        assert_eq!(last.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn binary_body_spilled_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(dir.path(), Vec::new());

        let body: Vec<u8> = (0..3000).map(|i| i as u8).collect();
        let mut wire = format!("POST /upload HTTP/1.1\r\nContent-Length: {}\r\n\r\n", body.len())
            .into_bytes();
        wire.extend_from_slice(&body);
        let (request, _) = Request::parse(&wire).unwrap();

        let exchange = logger
            .log(IP, 7, false, 80, RequestCapture::of(&request), "ok".into())
            .await;

        assert!(exchange.is_large);
        let path = exchange.request.strip_prefix("Output saved at ").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), wire);
    }

    #[tokio::test]
    async fn threshold_measured_on_wire_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(dir.path(), Vec::new());

        // Each invalid byte widens to three in the lossy text.
        let raw = vec![0xffu8; SPILLOVER_THRESHOLD];
        let text = String::from_utf8_lossy(&raw).into_owned();
        assert!(text.len() > SPILLOVER_THRESHOLD);

        let exchange = logger
            .log(IP, 7, false, 80, RequestCapture::new(raw, text.clone()), "ok".into())
            .await;
        assert!(!exchange.is_large);
        assert_eq!(exchange.request, text);
    }

    #[tokio::test]
    async fn empty_capture_logs_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger(dir.path(), Vec::new());
        let exchange = logger
            .log(IP, 7, false, 80, RequestCapture::empty(), "Error code 400".into())
            .await;
        assert_eq!(exchange.request, "");
        assert!(!exchange.is_large);
    }
}
