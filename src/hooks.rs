//! The extension contract a concrete server implements.
//!
//! The base server owns sockets, framing, compression, error pages and access
//! logging. Everything request-specific is delegated to a [`ServerHooks`]
//! implementation handed to each [`ServerRunner`](crate::server::ServerRunner)
//! by value. No hook state is shared between runners unless the implementation
//! chooses to share it.

use std::sync::Arc;

use crate::error_page::{DEFAULT_ENVELOPE, ErrorCatalog};
use crate::http::{Headers, Request};

/// A pre-dispatch refusal from [`ServerHooks::validate`].
///
/// `extra` feeds the `$extra` placeholder of the error description, and
/// doubles as the `Location` value for redirects and the `WWW-Authenticate`
/// challenge for `401`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: u16,
    pub extra: String,
}

impl Rejection {
    pub fn new(code: u16, extra: impl Into<String>) -> Self {
        Self {
            code,
            extra: extra.into(),
        }
    }
}

/// The result of a method hook.
///
/// A `200` reply is assembled into a success response from `headers` and
/// `body`. Any other code is routed to the error page, with `body` used as the
/// `$extra` detail and `headers` discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerReply {
    pub code: u16,
    pub headers: Headers,
    pub body: String,
}

impl HandlerReply {
    /// A `200` reply.
    pub fn ok(headers: Headers, body: impl Into<String>) -> Self {
        Self {
            code: 200,
            headers,
            body: body.into(),
        }
    }

    /// A failure reply; `detail` becomes the error page's `$extra`.
    pub fn status(code: u16, detail: impl Into<String>) -> Self {
        Self {
            code,
            headers: Headers::new(),
            body: detail.into(),
        }
    }
}

/// What [`ServerHooks::on_error`] decides about an outgoing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOverride {
    /// Status actually sent; its spec supplies the description template.
    pub code: u16,
    /// Sent after `Content-Length` and the code-specific header.
    pub headers: Headers,
    /// Reason phrase for the status line and `$message`.
    pub message: String,
}

impl ErrorOverride {
    /// Keeps `code` and `message`, adds no headers.
    pub fn unchanged(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            headers: Headers::new(),
            message: message.into(),
        }
    }
}

/// Hooks that give a base server its behavior.
///
/// Implementations must be `Send + Sync` because several runners (one per
/// port) may run concurrently. Within one runner the hooks are called
/// strictly one exchange at a time, in this order: [`validate`](Self::validate),
/// then [`handle_get`](Self::handle_get) or [`handle_post`](Self::handle_post),
/// then [`on_error`](Self::on_error) if the exchange failed.
///
/// # Examples
///
/// ```
/// use basehttp::hooks::{HandlerReply, Rejection, ServerHooks};
/// use basehttp::http::{Headers, Request};
///
/// struct Hello;
///
/// impl ServerHooks for Hello {
///     fn validate(&self, _request: &Request) -> Result<(), Rejection> {
///         Ok(())
///     }
///
///     fn handle_get(&self, path: &str, _headers: &Headers) -> HandlerReply {
///         match path {
///             "/" => HandlerReply::ok(Headers::from([("Content-Type", "text/plain")]), "hello"),
///             _ => HandlerReply::status(404, "no such page"),
///         }
///     }
///
///     fn handle_post(&self, _path: &str, _headers: &Headers, _body: &[u8]) -> HandlerReply {
///         HandlerReply::status(405, "read-only")
///     }
///
///     fn server_identity(&self) -> String {
///         "hello/1.0".into()
///     }
/// }
/// ```
pub trait ServerHooks: Send + Sync + 'static {
    /// Inspects a `GET` or `POST` request before dispatch.
    ///
    /// Returning a [`Rejection`] sends its error page and skips the method hook.
    fn validate(&self, request: &Request) -> Result<(), Rejection>;

    /// Produces the reply for a `GET`.
    fn handle_get(&self, path: &str, headers: &Headers) -> HandlerReply;

    /// Produces the reply for a `POST`. `body` is empty when no
    /// `Content-Length` was sent.
    fn handle_post(&self, path: &str, headers: &Headers, body: &[u8]) -> HandlerReply;

    /// Adjusts an outgoing error. `message` is the reason phrase of the spec
    /// registered for `code`.
    fn on_error(&self, code: u16, message: String) -> ErrorOverride {
        ErrorOverride::unchanged(code, message)
    }

    /// Status codes this server can describe. Read once when the runner starts.
    fn recognized_errors(&self) -> ErrorCatalog {
        ErrorCatalog::standard()
    }

    /// Value of the `Server` response header.
    fn server_identity(&self) -> String;

    /// Outer error page template with `$code`, `$message` and `$description`
    /// placeholders. Read once when the runner for `port` starts.
    fn error_envelope(&self, _port: u16) -> String {
        DEFAULT_ENVELOPE.to_owned()
    }
}

/// Lets one hook implementation back runners on several ports.
impl<T: ServerHooks> ServerHooks for Arc<T> {
    fn validate(&self, request: &Request) -> Result<(), Rejection> {
        (**self).validate(request)
    }

    fn handle_get(&self, path: &str, headers: &Headers) -> HandlerReply {
        (**self).handle_get(path, headers)
    }

    fn handle_post(&self, path: &str, headers: &Headers, body: &[u8]) -> HandlerReply {
        (**self).handle_post(path, headers, body)
    }

    fn on_error(&self, code: u16, message: String) -> ErrorOverride {
        (**self).on_error(code, message)
    }

    fn recognized_errors(&self) -> ErrorCatalog {
        (**self).recognized_errors()
    }

    fn server_identity(&self) -> String {
        (**self).server_identity()
    }

    fn error_envelope(&self, port: u16) -> String {
        (**self).error_envelope(port)
    }
}
