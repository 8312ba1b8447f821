//! # basehttp
//!
//! A base for single-port HTTP(S) servers whose request semantics live in
//! pluggable [`ServerHooks`].
//!
//! The base owns everything around the hooks: parsing the request, running
//! validation before the GET/POST hook, compressing bodies on
//! `Content-Encoding`, rendering templated error pages, writing the response
//! and recording the exchange in an access log that spills large requests to
//! disk. Each [`ServerRunner`] serves one port, one connection at a time.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use basehttp::access_log::TracingSink;
//! use basehttp::config::ServerConfig;
//! use basehttp::hooks::{HandlerReply, Rejection, ServerHooks};
//! use basehttp::http::{Headers, Method, Request};
//! use basehttp::server::{PrivilegeGate, ServerRunner};
//!
//! struct Greeter;
//!
//! impl ServerHooks for Greeter {
//!     fn validate(&self, request: &Request) -> Result<(), Rejection> {
//!         match request.method() {
//!             Method::Post if request.body().is_none() => {
//!                 Err(Rejection::new(411, "POST requires a body"))
//!             }
//!             _ => Ok(()),
//!         }
//!     }
//!
//!     fn handle_get(&self, path: &str, _headers: &Headers) -> HandlerReply {
//!         match path {
//!             "/" => HandlerReply::ok(
//!                 Headers::from([("Content-Type", "text/plain"), ("Content-Encoding", "gzip")]),
//!                 "Hello, World!",
//!             ),
//!             _ => HandlerReply::status(404, "nothing here"),
//!         }
//!     }
//!
//!     fn handle_post(&self, _path: &str, _headers: &Headers, body: &[u8]) -> HandlerReply {
//!         HandlerReply::ok(Headers::new(), String::from_utf8_lossy(body))
//!     }
//!
//!     fn server_identity(&self) -> String {
//!         "greeter/1.0".into()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("localhost", 8080).sink(Arc::new(TracingSink));
//!     ServerRunner::new(config, Greeter)
//!         .privilege_gate(PrivilegeGate::released())
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod access_log;
pub mod assemble;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error_page;
pub mod hooks;
pub mod http;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::ServerConfig;
pub use hooks::{ErrorOverride, HandlerReply, Rejection, ServerHooks};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{ServerError, ServerRunner};
