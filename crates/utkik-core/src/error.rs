//! Core error types for utkik.
//!
//! [`UtkikError`] covers everything the view layer can fail with: name
//! resolution, misconfigured routes and views, rendering, and the errors
//! handler code itself raises. Failures coming out of a view invocation are
//! re-tagged as [`DispatchError`] so they stay attributable to the view that
//! produced them.

use thiserror::Error;

/// A failure raised while a view was executing, attributed to that view.
///
/// The original error is kept as the [`source`](std::error::Error::source) so
/// the full cause chain survives the trip through the generic invoker.
///
/// # Examples
///
/// ```
/// use std::error::Error as _;
/// use utkik_core::error::{DispatchError, UtkikError};
///
/// let err = DispatchError::new("blog.views", "PostListView", UtkikError::MissingKey("slug".into()));
/// assert_eq!(err.kind(), "MissingKey");
/// assert!(err.source().is_some());
/// ```
#[derive(Error, Debug)]
#[error("{module}.{name} raised {kind}: {message}")]
pub struct DispatchError {
    module: String,
    name: String,
    kind: &'static str,
    message: String,
    #[source]
    source: Box<UtkikError>,
}

impl DispatchError {
    /// Wraps `source` with the module and name of the view that raised it.
    pub fn new(module: impl Into<String>, name: impl Into<String>, source: UtkikError) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            kind: source.kind(),
            message: source.to_string(),
            source: Box::new(source),
        }
    }

    /// Module path of the view that failed.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Attribute name of the view that failed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variant name of the original error.
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Display message of the original error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original error.
    pub fn cause(&self) -> &UtkikError {
        &self.source
    }

    /// Consumes the wrapper and returns the original error.
    pub fn into_cause(self) -> UtkikError {
        *self.source
    }
}

/// The primary error type for utkik.
///
/// Each variant maps to an HTTP status code via [`UtkikError::status_code`],
/// and to a stable variant name via [`UtkikError::kind`].
#[derive(Error, Debug)]
pub enum UtkikError {
    // ── Resolution ───────────────────────────────────────────────────

    /// A dotted view name could not be resolved through either the direct
    /// module path or the installed-app fallback.
    #[error("View does not exist: {name} ({reason})")]
    ViewDoesNotExist {
        /// The dotted name as written in the route table.
        name: String,
        /// Why the first lookup attempt failed.
        reason: String,
    },

    /// No route matches the requested path.
    #[error("Not found: {0}")]
    NotFound(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A route or view is wired up incorrectly.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    /// A view fell back to rendering but has no template.
    #[error("View configuration error: {0}")]
    ViewConfiguration(String),

    /// Settings could not be loaded or parsed.
    #[error("Settings error: {0}")]
    Settings(String),

    // ── Dispatch ─────────────────────────────────────────────────────

    /// A view raised while handling a request.
    #[error(transparent)]
    Dispatch(Box<DispatchError>),

    // ── Templates ────────────────────────────────────────────────────

    /// None of the requested templates exist.
    #[error("Template does not exist: {0}")]
    TemplateDoesNotExist(String),

    /// The template engine failed while rendering.
    #[error("Template error: {0}")]
    TemplateError(String),

    // ── Raised by handlers ───────────────────────────────────────────

    /// A required key was missing from a lookup.
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// HTTP 400 Bad Request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP 403 Permission Denied.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ── Plumbing ─────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other error raised by application code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DispatchError> for UtkikError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(Box::new(err))
    }
}

impl UtkikError {
    /// Returns the variant name, used when re-tagging errors for attribution.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ViewDoesNotExist { .. } => "ViewDoesNotExist",
            Self::NotFound(_) => "NotFound",
            Self::ImproperlyConfigured(_) => "ImproperlyConfigured",
            Self::ViewConfiguration(_) => "ViewConfiguration",
            Self::Settings(_) => "Settings",
            Self::Dispatch(_) => "Dispatch",
            Self::TemplateDoesNotExist(_) => "TemplateDoesNotExist",
            Self::TemplateError(_) => "TemplateError",
            Self::MissingKey(_) => "MissingKey",
            Self::BadRequest(_) => "BadRequest",
            Self::PermissionDenied(_) => "PermissionDenied",
            Self::Io(_) => "Io",
            Self::Serialization(_) => "Serialization",
            Self::Other(_) => "Other",
        }
    }

    /// Returns the HTTP status code associated with this error.
    ///
    /// Dispatch errors report the status of the error they wrap.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::PermissionDenied(_) => 403,
            Self::NotFound(_) => 404,
            Self::Dispatch(inner) => inner.cause().status_code(),
            Self::ViewDoesNotExist { .. }
            | Self::ImproperlyConfigured(_)
            | Self::ViewConfiguration(_)
            | Self::Settings(_)
            | Self::TemplateDoesNotExist(_)
            | Self::TemplateError(_)
            | Self::MissingKey(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Other(_) => 500,
        }
    }

    /// Returns the dispatch attribution if this error came out of a view.
    pub fn as_dispatch(&self) -> Option<&DispatchError> {
        match self {
            Self::Dispatch(inner) => Some(inner),
            _ => None,
        }
    }
}

/// A convenience type alias for `Result<T, UtkikError>`.
pub type UtkikResult<T> = Result<T, UtkikError>;
