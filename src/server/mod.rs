//! Single-port server runner using Tokio.
//!
//! A [`ServerRunner`] binds one port, optionally terminates TLS, reports
//! readiness, waits for privileges to be dropped and then serves forever.
//! Connections are handled strictly one at a time: each is read, dispatched,
//! answered, logged and closed before the next is accepted. Run several
//! runners (one per port) for concurrency across ports.

pub mod privilege;
pub mod ready;
pub mod tls;

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::access_log::{AccessLogger, RequestCapture};
use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error_page::CatalogError;
use crate::hooks::ServerHooks;
use crate::http::StatusCode;
use crate::http::request::{MAX_REQUEST_SIZE, Request, RequestError};

pub use privilege::{PrivilegeDropNotifier, PrivilegeError, PrivilegeGate};
pub use ready::{ReadySignal, Readiness};
pub use tls::TlsError;

/// Errors that stop a runner. None of them occur after readiness except a
/// dropped privilege notifier.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to load TLS certificate {path}: {source}")]
    Tls {
        path: PathBuf,
        #[source]
        source: TlsError,
    },

    #[error("invalid error page configuration: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Privilege(#[from] PrivilegeError),

    #[error("running with elevated privileges and no privilege gate configured")]
    Elevated,
}

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// Serves one port with one set of hooks.
///
/// # Examples
///
/// ```rust,no_run
/// use basehttp::config::ServerConfig;
/// use basehttp::hooks::{HandlerReply, Rejection, ServerHooks};
/// use basehttp::http::{Headers, Request};
/// use basehttp::server::{PrivilegeGate, ServerRunner, ready};
///
/// struct Hello;
///
/// impl ServerHooks for Hello {
///     fn validate(&self, _: &Request) -> Result<(), Rejection> { Ok(()) }
///     fn handle_get(&self, _: &str, _: &Headers) -> HandlerReply {
///         HandlerReply::ok(Headers::from([("Content-Type", "text/plain")]), "Hello!")
///     }
///     fn handle_post(&self, _: &str, _: &Headers, _: &[u8]) -> HandlerReply {
///         HandlerReply::status(405, "read-only")
///     }
///     fn server_identity(&self) -> String { "hello/1.0".into() }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (signal, readiness) = ready::channel();
///     let runner = ServerRunner::new(ServerConfig::new("localhost", 8080), Hello)
///         .notify_ready(signal)
///         .privilege_gate(PrivilegeGate::released());
///     let handle = runner.spawn();
///     if let Some(addr) = readiness.wait().await {
///         println!("listening on {addr}");
///     }
///     handle.await??;
///     Ok(())
/// }
/// ```
pub struct ServerRunner<H> {
    config: ServerConfig,
    hooks: H,
    ready: Option<ReadySignal>,
    gate: Option<PrivilegeGate>,
}

impl<H: ServerHooks> ServerRunner<H> {
    pub fn new(config: ServerConfig, hooks: H) -> Self {
        Self {
            config,
            hooks,
            ready: None,
            gate: None,
        }
    }

    /// Fired once the socket (and TLS, if configured) is ready, before the
    /// first accept.
    #[must_use]
    pub fn notify_ready(mut self, signal: ReadySignal) -> Self {
        self.ready = Some(signal);
        self
    }

    /// Required when the process runs as root; serving starts once the gate opens.
    #[must_use]
    pub fn privilege_gate(mut self, gate: PrivilegeGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Runs the server on its own Tokio task.
    pub fn spawn(self) -> JoinHandle<Result<(), ServerError>> {
        tokio::spawn(self.run())
    }

    /// Binds and serves until the task is dropped.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Elevated`]: elevated process with no gate, checked before binding.
    /// - [`ServerError::Catalog`]: the hooks supplied an invalid error envelope.
    /// - [`ServerError::Bind`] / [`ServerError::Tls`]: startup failures; readiness is never signalled.
    /// - [`ServerError::Privilege`]: the gate's notifier went away while closed.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self {
            config,
            hooks,
            ready,
            gate,
        } = self;

        let elevated = privilege::is_elevated();
        if elevated && gate.is_none() {
            return Err(ServerError::Elevated);
        }

        let dispatcher = Dispatcher::new(hooks, config.port, config.timeout)?;

        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let acceptor = match &config.tls_cert {
            Some(path) => Some(tls::load_acceptor(path).await.map_err(|source| {
                ServerError::Tls {
                    path: path.clone(),
                    source,
                }
            })?),
            None => None,
        };

        info!(
            address = %local_addr,
            domain = %config.domain_name,
            tls = acceptor.is_some(),
            "basehttp listening"
        );
        if let Some(signal) = ready {
            signal.fire(local_addr);
        }

        if let (true, Some(mut gate)) = (elevated, gate) {
            if !gate.is_released() {
                info!(port = local_addr.port(), "waiting for privileges to be dropped");
            }
            gate.wait().await?;
        }

        let exchange = Exchange {
            dispatcher,
            logger: AccessLogger::new(config.sinks.clone(), config.spillover_dir.clone()),
            timeout: config.read_timeout(),
            port: local_addr.port(),
        };

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };
            debug!(peer = %peer_addr, "connection accepted");

            let result = match &acceptor {
                Some(acceptor) => match timeout(exchange.timeout, acceptor.accept(stream)).await {
                    Ok(Ok(tls_stream)) => exchange.serve(tls_stream, peer_addr, true).await,
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(io::ErrorKind::TimedOut.into()),
                },
                None => exchange.serve(stream, peer_addr, false).await,
            };

            if let Err(e) = result {
                warn!(peer = %peer_addr, error = %e, "connection closed with error");
            }
        }
    }
}

/// What arrived on a connection before the response is chosen.
enum Incoming {
    Request(Request),
    Malformed(RequestError),
    TooLarge,
    /// Peer closed without sending anything.
    Closed,
}

/// Per-runner state for handling one connection.
struct Exchange<H> {
    dispatcher: Dispatcher<H>,
    logger: AccessLogger,
    timeout: Duration,
    port: u16,
}

impl<H: ServerHooks> Exchange<H> {
    /// Reads one request, writes one response, logs the exchange and closes.
    async fn serve<S>(&self, mut stream: S, peer_addr: SocketAddr, tls: bool) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let incoming = match timeout(self.timeout, read_request(&mut stream)).await {
            Ok(incoming) => incoming?,
            Err(_) => {
                debug!(peer = %peer_addr, "timed out waiting for request");
                return Ok(());
            }
        };

        let (capture, reply) = match incoming {
            Incoming::Request(request) => {
                debug!(
                    peer = %peer_addr,
                    method = %request.method(),
                    path = %request.path(),
                    "dispatching request"
                );
                (RequestCapture::of(&request), self.dispatcher.dispatch(&request))
            }
            Incoming::Malformed(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                let reply = self.dispatcher.error(
                    StatusCode::BadRequest.as_u16(),
                    &format!("Bad request syntax ({e})"),
                    None,
                );
                (RequestCapture::empty(), reply)
            }
            Incoming::TooLarge => {
                warn!(peer = %peer_addr, "request too large, sending 413");
                let reply = self.dispatcher.error(
                    StatusCode::PayloadTooLarge.as_u16(),
                    "Request entity too large",
                    None,
                );
                (RequestCapture::empty(), reply)
            }
            Incoming::Closed => {
                debug!(peer = %peer_addr, "connection closed by peer");
                return Ok(());
            }
        };

        let bytes = self.dispatcher.response(&reply).into_bytes();
        let written = match timeout(self.timeout, async {
            stream.write_all(&bytes).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await
        {
            Ok(result) => result,
            Err(_) => Err(io::ErrorKind::TimedOut.into()),
        };

        self.logger
            .log(
                peer_addr.ip(),
                peer_addr.port(),
                tls,
                self.port,
                capture,
                reply.summary,
            )
            .await;

        written
    }
}

/// Buffers until a complete request (head plus declared body) has arrived.
async fn read_request<S>(stream: &mut S) -> io::Result<Incoming>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            return Ok(if buf.is_empty() {
                Incoming::Closed
            } else {
                Incoming::Malformed(RequestError::Incomplete)
            });
        }

        match Request::parse(&buf) {
            Ok((request, _)) => return Ok(Incoming::Request(request)),
            Err(RequestError::Incomplete) if buf.len() > MAX_REQUEST_SIZE => {
                return Ok(Incoming::TooLarge);
            }
            Err(RequestError::Incomplete) => continue,
            Err(RequestError::TooLarge { .. }) => return Ok(Incoming::TooLarge),
            Err(e) => return Ok(Incoming::Malformed(e)),
        }
    }
}
