//! The set of status codes a server knows how to describe.

use std::collections::HashMap;

use thiserror::Error;

use super::template::{Template, TemplateError};
use crate::http::StatusCode;

/// Placeholders a description template may use.
pub const DESCRIPTION_PLACEHOLDERS: &[&str] = &["path", "method", "extra"];

/// Errors raised while registering error specs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("description template for status {code} is invalid: {source}")]
    Description {
        code: u16,
        #[source]
        source: TemplateError,
    },

    #[error("error envelope template is invalid: {0}")]
    Envelope(#[source] TemplateError),

    #[error("status {code} is not an error status")]
    NotAnError { code: u16 },
}

/// Reason phrase and description template for one status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSpec {
    code: u16,
    reason: String,
    description: Template,
}

impl ErrorSpec {
    /// Builds a spec, checking the description template.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Description`] when the template is malformed or uses a
    /// placeholder other than `path`, `method` or `extra`.
    pub fn new(
        code: u16,
        reason: impl Into<String>,
        description: &str,
    ) -> Result<Self, CatalogError> {
        let description = Template::compile(description, DESCRIPTION_PLACEHOLDERS)
            .map_err(|source| CatalogError::Description { code, source })?;
        Ok(Self {
            code,
            reason: reason.into(),
            description,
        })
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Short reason phrase, used on the status line and as `$message`.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn description(&self) -> &Template {
        &self.description
    }

    fn internal_server_error() -> Self {
        let description = Template::compile(
            "The server failed to complete ${method} ${path}.",
            DESCRIPTION_PLACEHOLDERS,
        )
        .unwrap_or_else(|_| Template::plain("The server failed to complete the request."));
        Self {
            code: 500,
            reason: StatusCode::InternalServerError.canonical_reason().to_owned(),
            description,
        }
    }
}

/// Recognized status codes and their [`ErrorSpec`]s.
///
/// Lookup is total: [`ErrorCatalog::resolve`] answers every code, falling back
/// to the catalog's `500` spec for codes nobody registered. A built-in `500`
/// spec is always present and can be replaced with [`ErrorCatalog::insert`].
///
/// # Examples
///
/// ```
/// use basehttp::error_page::ErrorCatalog;
///
/// let catalog = ErrorCatalog::new()
///     .with(404, "Not Found", "${method} ${path}: ${extra}")
///     .unwrap();
///
/// assert_eq!(catalog.lookup(404).map(|s| s.reason()), Some("Not Found"));
/// assert!(catalog.lookup(418).is_none());
/// assert_eq!(catalog.resolve(418).code(), 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCatalog {
    specs: HashMap<u16, ErrorSpec>,
    fallback: ErrorSpec,
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorCatalog {
    /// Creates a catalog holding only the built-in `500` spec.
    pub fn new() -> Self {
        Self {
            specs: HashMap::new(),
            fallback: ErrorSpec::internal_server_error(),
        }
    }

    /// Creates a catalog covering every non-2xx [`StatusCode`] with its
    /// canonical reason and a generic description.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for status in StatusCode::ALL {
            if status.is_success() {
                continue;
            }
            let description = if status.is_redirect() {
                "The document at ${path} has moved to ${extra}."
            } else if status == StatusCode::Unauthorized {
                "${method} ${path} requires authentication."
            } else {
                "${method} ${path}: ${extra}"
            };
            if let Ok(spec) =
                ErrorSpec::new(status.as_u16(), status.canonical_reason(), description)
            {
                catalog.put(spec);
            }
        }
        catalog
    }

    /// Registers (or replaces) a spec.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotAnError`] for 1xx/2xx codes, which never reach the
    /// error path.
    pub fn insert(&mut self, spec: ErrorSpec) -> Result<&mut Self, CatalogError> {
        if spec.code < 300 {
            return Err(CatalogError::NotAnError { code: spec.code });
        }
        self.put(spec);
        Ok(self)
    }

    fn put(&mut self, spec: ErrorSpec) {
        if spec.code == 500 {
            self.fallback = spec;
        } else {
            self.specs.insert(spec.code, spec);
        }
    }

    /// Builder form of [`insert`](Self::insert) that also compiles the template.
    pub fn with(
        mut self,
        code: u16,
        reason: impl Into<String>,
        description: &str,
    ) -> Result<Self, CatalogError> {
        self.insert(ErrorSpec::new(code, reason, description)?)?;
        Ok(self)
    }

    /// Returns the spec registered for `code`, if any.
    pub fn lookup(&self, code: u16) -> Option<&ErrorSpec> {
        match code {
            500 => Some(&self.fallback),
            _ => self.specs.get(&code),
        }
    }

    /// Returns the spec for `code`, or the `500` spec when `code` is unknown.
    pub fn resolve(&self, code: u16) -> &ErrorSpec {
        self.lookup(code).unwrap_or(&self.fallback)
    }

    /// The `500` spec used for unrecognized codes.
    pub fn fallback(&self) -> &ErrorSpec {
        &self.fallback
    }

    /// Returns `true` if `code` has a registered spec.
    pub fn recognizes(&self, code: u16) -> bool {
        self.lookup(code).is_some()
    }

    /// Registered codes in ascending order, `500` included.
    pub fn codes(&self) -> Vec<u16> {
        let mut codes: Vec<u16> = self.specs.keys().copied().collect();
        codes.push(500);
        codes.sort_unstable();
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_catalog_has_fallback() {
        let catalog = ErrorCatalog::new();
        assert_eq!(catalog.codes(), vec![500]);
        assert_eq!(catalog.fallback().reason(), "Internal Server Error");
    }

    #[test]
    fn standard_catalog_covers_error_codes() {
        let catalog = ErrorCatalog::standard();
        for code in [301, 302, 307, 308, 400, 401, 404, 413, 500, 501] {
            assert!(catalog.recognizes(code), "missing {code}");
        }
        assert!(!catalog.recognizes(200));
    }

    #[test]
    fn resolve_falls_back_to_500() {
        let catalog = ErrorCatalog::new().with(404, "Not Found", "$path").unwrap();
        assert_eq!(catalog.resolve(404).code(), 404);
        assert_eq!(catalog.resolve(999).code(), 500);
    }

    #[test]
    fn fallback_can_be_replaced() {
        let catalog = ErrorCatalog::new()
            .with(500, "Oops", "${extra}")
            .unwrap();
        assert_eq!(catalog.resolve(418).reason(), "Oops");
    }

    #[test]
    fn rejects_bad_description() {
        let err = ErrorCatalog::new().with(404, "Not Found", "${host}").unwrap_err();
        assert!(matches!(err, CatalogError::Description { code: 404, .. }));
    }

    #[test]
    fn rejects_success_codes() {
        let err = ErrorCatalog::new().with(200, "OK", "fine").unwrap_err();
        assert_eq!(err, CatalogError::NotAnError { code: 200 });
    }
}
