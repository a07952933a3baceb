//! HTTP request type.
//!
//! [`HttpRequest`] carries what the view layer reads from an incoming request:
//! the method, the path, and the headers the AJAX check looks at. The host
//! framework builds one per request.

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};

/// An incoming HTTP request.
///
/// # Examples
///
/// ```
/// use utkik_http::HttpRequest;
///
/// let request = HttpRequest::builder()
///     .method(http::Method::POST)
///     .path("/posts/")
///     .ajax()
///     .build();
///
/// assert_eq!(request.method(), &http::Method::POST);
/// assert!(request.is_ajax());
/// ```
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
}

impl HttpRequest {
    /// Creates a new [`HttpRequestBuilder`].
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, without query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns `true` if the request carries `X-Requested-With: XMLHttpRequest`.
    pub fn is_ajax(&self) -> bool {
        self.headers
            .get("x-requested-with")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }
}

/// Builds [`HttpRequest`] values.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    method: Method,
    path: String,
    headers: HeaderMap,
}

impl Default for HttpRequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_string(),
            headers: HeaderMap::new(),
        }
    }
}

impl HttpRequestBuilder {
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Marks the request as an AJAX request.
    #[must_use]
    pub fn ajax(self) -> Self {
        self.header("x-requested-with", "XMLHttpRequest")
    }

    pub fn build(self) -> HttpRequest {
        HttpRequest {
            method: self.method,
            path: self.path,
            headers: self.headers,
        }
    }
}
