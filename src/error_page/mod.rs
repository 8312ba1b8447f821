//! Error responses built from two-level templates.
//!
//! An error body is the server's envelope template rendered with the status
//! code, reason phrase and a description, where the description is itself the
//! per-status template from the [`ErrorCatalog`] rendered with the request
//! path, method and a free-form detail string.

pub mod catalog;
pub mod template;

use bytes::Bytes;
use tracing::warn;

pub use catalog::{CatalogError, ErrorCatalog, ErrorSpec};
pub use template::{Template, TemplateError};

use crate::codec;
use crate::hooks::ErrorOverride;
use crate::http::{Headers, Request, StatusCode};

/// Placeholders the envelope template may use.
pub const ENVELOPE_PLACEHOLDERS: &[&str] = &["code", "message", "description"];

/// Envelope used when a server does not supply its own.
pub const DEFAULT_ENVELOPE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>${code} ${message}</title>
</head>
<body>
<h1>${code} ${message}</h1>
<p>${description}</p>
</body>
</html>
"#;

/// A fully resolved error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPage {
    /// Status sent on the wire, after the `on_error` hook and any fallback.
    pub code: u16,
    /// Reason phrase for the status line.
    pub reason: String,
    /// `Content-Length` first, then the code-specific header, then hook headers.
    pub headers: Headers,
    pub body: Bytes,
}

impl ErrorPage {
    /// Response text recorded in the access log for this page.
    pub fn summary(&self) -> String {
        format!("Error code {}", self.code)
    }
}

/// Renders error pages for one server.
///
/// # Examples
///
/// ```
/// use basehttp::error_page::{ErrorCatalog, ErrorFormatter};
/// use basehttp::hooks::ErrorOverride;
///
/// let catalog = ErrorCatalog::new()
///     .with(404, "Not Found", "${method} ${path}: ${extra}")
///     .unwrap();
/// let formatter = ErrorFormatter::new(catalog, "$code $message: $description").unwrap();
///
/// let page = formatter.format(404, "not found", None, ErrorOverride::unchanged);
/// assert_eq!(&page.body[..], b"404 Not Found: UNKNOWN /: not found");
/// assert_eq!(page.headers.get("Content-Length"), Some("35"));
/// ```
#[derive(Debug, Clone)]
pub struct ErrorFormatter {
    catalog: ErrorCatalog,
    envelope: Template,
}

impl ErrorFormatter {
    /// Checks `envelope` and pairs it with `catalog`.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Envelope`] when the envelope is malformed or uses a
    /// placeholder other than `code`, `message` or `description`.
    pub fn new(catalog: ErrorCatalog, envelope: &str) -> Result<Self, CatalogError> {
        let envelope =
            Template::compile(envelope, ENVELOPE_PLACEHOLDERS).map_err(CatalogError::Envelope)?;
        Ok(Self { catalog, envelope })
    }

    pub fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }

    /// Builds the error page for `code`.
    ///
    /// `extra` is the caller's detail string. `request` supplies `$path` and
    /// `$method`, defaulting to `/` and `UNKNOWN` when the request could not
    /// be parsed. `on_error` may replace the code, the reason phrase, and add
    /// headers. Codes without a registered spec, before or after `on_error`,
    /// are served as `500` with the catalog's fallback spec.
    pub fn format(
        &self,
        code: u16,
        extra: &str,
        request: Option<&Request>,
        on_error: impl FnOnce(u16, String) -> ErrorOverride,
    ) -> ErrorPage {
        let (code, spec) = self.spec_for(code);
        let ErrorOverride {
            code,
            headers: hook_headers,
            message,
        } = on_error(code, spec.reason().to_owned());
        let (code, spec) = self.spec_for(code);

        let path = request.map_or("/", Request::path);
        let method = request.map_or("UNKNOWN", |r| r.method().as_str());
        let description = spec.description().render(|name| match name {
            "path" => path,
            "method" => method,
            _ => extra,
        });

        let code_text = code.to_string();
        let body = self.envelope.render(|name| match name {
            "code" => code_text.as_str(),
            "message" => message.as_str(),
            _ => description.as_str(),
        });
        let body = codec::plain(&body);

        let mut headers = Headers::with_capacity(2 + hook_headers.len());
        headers.insert("Content-Length", body.len().to_string());
        match StatusCode::from_u16(code) {
            Some(status) if status.is_redirect() => headers.insert("Location", extra),
            Some(StatusCode::Unauthorized) => headers.insert("WWW-Authenticate", extra),
            _ => {}
        }
        headers.extend(hook_headers);

        ErrorPage {
            code,
            reason: message,
            headers,
            body,
        }
    }

    fn spec_for(&self, code: u16) -> (u16, &ErrorSpec) {
        match self.catalog.lookup(code) {
            Some(spec) => (code, spec),
            None => {
                warn!(code, "no error spec registered for status; serving 500");
                let fallback = self.catalog.fallback();
                (fallback.code(), fallback)
            }
        }
    }
}
