//! # utkik-http
//!
//! The request and response model the view layer consumes. Requests expose
//! their method, path and an AJAX predicate; responses are opaque values handed back
//! to the host framework.

pub mod request;
pub mod response;

pub use request::{HttpRequest, HttpRequestBuilder};
pub use response::{HttpResponse, JsonResponse};
