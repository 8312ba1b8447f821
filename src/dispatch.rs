//! One HTTP exchange: validation, method hook, then success or error page.

use bytes::Bytes;
use tracing::{debug, error};

use crate::assemble::{Assembled, ResponseAssembler};
use crate::error_page::{CatalogError, ErrorFormatter};
use crate::hooks::{Rejection, ServerHooks};
use crate::http::{Headers, Method, Request, Response, StatusCode};

/// Everything needed to answer and log one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub reason: String,
    /// Wire headers; `Content-Length` first.
    pub headers: Headers,
    /// Wire body, after any content coding.
    pub body: Bytes,
    /// Response text for the access log: the plain body, or `Error code <n>`.
    pub summary: String,
}

/// Routes requests through a server's hooks.
///
/// Owns the hooks plus the error formatter and assembler built from them, so
/// each runner carries its own copy and no hook state is global.
#[derive(Debug)]
pub struct Dispatcher<H> {
    hooks: H,
    formatter: ErrorFormatter,
    assembler: ResponseAssembler,
    identity: String,
}

impl<H: ServerHooks> Dispatcher<H> {
    /// Reads the hooks' error catalog, envelope and identity once.
    ///
    /// # Errors
    ///
    /// [`CatalogError`] when the hooks' envelope template is invalid.
    pub fn new(hooks: H, port: u16, keep_alive_timeout: u64) -> Result<Self, CatalogError> {
        let formatter = ErrorFormatter::new(hooks.recognized_errors(), &hooks.error_envelope(port))?;
        let identity = hooks.server_identity();
        Ok(Self {
            hooks,
            formatter,
            assembler: ResponseAssembler::new(keep_alive_timeout),
            identity,
        })
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn formatter(&self) -> &ErrorFormatter {
        &self.formatter
    }

    /// Value sent in the `Server` header.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Produces the reply for a parsed request.
    ///
    /// Verbs other than `GET` and `POST` get `501` without reaching any hook
    /// but `on_error`. Otherwise `validate` runs first; a rejection is served
    /// as an error page. A method hook reply other than `200` is served as an
    /// error page with the reply body as its detail text.
    pub fn dispatch(&self, request: &Request) -> Reply {
        if let Method::Other(verb) = request.method() {
            debug!(method = %verb, path = request.path(), "unsupported method");
            return self.error(
                StatusCode::NotImplemented.as_u16(),
                &format!("Unsupported method ({verb})"),
                Some(request),
            );
        }

        if let Err(Rejection { code, extra }) = self.hooks.validate(request) {
            debug!(code, path = request.path(), "request rejected by validation");
            return self.error(code, &extra, Some(request));
        }

        let path = request.path();
        let headers = request.headers();
        let reply = match request.method() {
            Method::Post => {
                let body = request.body().map_or(&[][..], |b| &b[..]);
                self.hooks.handle_post(path, headers, body)
            }
            _ => self.hooks.handle_get(path, headers),
        };

        if reply.code != 200 {
            debug!(code = reply.code, path, "handler declared failure");
            return self.error(reply.code, &reply.body, Some(request));
        }

        match self.assembler.assemble(reply.headers, &reply.body) {
            Ok(Assembled { headers, body }) => Reply {
                code: 200,
                reason: StatusCode::Ok.canonical_reason().to_owned(),
                headers,
                body,
                summary: reply.body,
            },
            Err(e) => {
                error!(error = %e, path, "failed to encode response body");
                self.error(
                    StatusCode::InternalServerError.as_u16(),
                    "The response could not be encoded.",
                    Some(request),
                )
            }
        }
    }

    /// Produces an error page reply. `request` is `None` when the request
    /// could not be parsed.
    pub fn error(&self, code: u16, extra: &str, request: Option<&Request>) -> Reply {
        let page = self
            .formatter
            .format(code, extra, request, |code, message| {
                self.hooks.on_error(code, message)
            });
        let summary = page.summary();
        Reply {
            code: page.code,
            reason: page.reason,
            headers: page.headers,
            body: page.body,
            summary,
        }
    }

    /// Frames a reply as a wire response carrying this server's identity.
    pub fn response(&self, reply: &Reply) -> Response {
        Response::new(reply.code, reply.reason.clone())
            .server(self.identity.clone())
            .headers(reply.headers.clone())
            .body(reply.body.clone())
    }
}
