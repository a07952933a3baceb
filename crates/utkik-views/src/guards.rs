//! Request guards and their composition.
//!
//! A guard sits in front of a handler and either passes the request inward or
//! answers it itself. Guards are plain values collected in a [`GuardChain`];
//! the chain folds them around a handler so that the first guard in the list
//! is the outermost and sees the request first.
//!
//! ```text
//!   request -> guard 1 -> guard 2 -> ... -> handler
//!                                              |
//!   response <- guard 1 <- guard 2 <- ... <----+
//! ```
//!
//! Views get two guards automatically, appended after their own: the AJAX
//! check (if the view requires it) and then the method filter, innermost.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::Method;

use utkik_core::UtkikResult;
use utkik_http::{HttpRequest, HttpResponse};

use crate::target::BoxFuture;

/// The rest of the chain, from a guard's point of view.
pub type Next<'a> =
    Box<dyn FnOnce(Arc<HttpRequest>) -> BoxFuture<'a, UtkikResult<HttpResponse>> + Send + 'a>;

/// Boxes a closure as a [`Next`].
pub fn next_fn<'a, F>(f: F) -> Next<'a>
where
    F: FnOnce(Arc<HttpRequest>) -> BoxFuture<'a, UtkikResult<HttpResponse>> + Send + 'a,
{
    Box::new(f)
}

/// A user-defined guard.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use utkik_core::UtkikResult;
/// use utkik_http::{HttpRequest, HttpResponse};
/// use utkik_views::guards::{Next, RequestGuard};
///
/// struct StaffOnly;
///
/// #[async_trait]
/// impl RequestGuard for StaffOnly {
///     async fn call<'a>(&'a self, request: Arc<HttpRequest>, next: Next<'a>) -> UtkikResult<HttpResponse> {
///         if request.headers().contains_key("x-staff") {
///             next(request).await
///         } else {
///             Ok(HttpResponse::forbidden("staff only"))
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait RequestGuard: Send + Sync {
    /// Handles the request, calling `next` to pass it inward.
    async fn call<'a>(&'a self, request: Arc<HttpRequest>, next: Next<'a>) -> UtkikResult<HttpResponse>;
}

type Predicate = dyn Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync;

struct PredicateGuard {
    name: String,
    predicate: Box<Predicate>,
}

#[async_trait]
impl RequestGuard for PredicateGuard {
    async fn call<'a>(&'a self, request: Arc<HttpRequest>, next: Next<'a>) -> UtkikResult<HttpResponse> {
        if let Some(response) = (self.predicate)(request.as_ref()) {
            tracing::debug!(guard = %self.name, status = %response.status(), "guard rejected request");
            return Ok(response);
        }
        next(request).await
    }
}

/// One link of a [`GuardChain`].
#[derive(Clone)]
pub enum Guard {
    /// Rejects methods not in the list with 405 Method Not Allowed.
    MethodFilter(Vec<Method>),
    /// Rejects requests that are not AJAX with 403 Forbidden.
    AjaxRequired,
    /// A user-defined guard.
    User(Arc<dyn RequestGuard>),
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MethodFilter(methods) => f.debug_tuple("MethodFilter").field(methods).finish(),
            Self::AjaxRequired => f.write_str("AjaxRequired"),
            Self::User(_) => f.write_str("User(..)"),
        }
    }
}

impl Guard {
    /// Wraps a [`RequestGuard`].
    pub fn user(guard: impl RequestGuard + 'static) -> Self {
        Self::User(Arc::new(guard))
    }

    /// A guard from a predicate: returning `Some(response)` short-circuits
    /// with that response, `None` passes the request on.
    pub fn check(
        name: impl Into<String>,
        predicate: impl Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        Self::user(PredicateGuard {
            name: name.into(),
            predicate: Box::new(predicate),
        })
    }

    /// Runs this guard in front of `next`.
    pub fn apply<'a>(
        &'a self,
        request: Arc<HttpRequest>,
        next: Next<'a>,
    ) -> BoxFuture<'a, UtkikResult<HttpResponse>> {
        match self {
            Self::MethodFilter(methods) => {
                if methods.contains(request.method()) {
                    return next(request);
                }
                let allowed: Vec<&str> = methods.iter().map(Method::as_str).collect();
                tracing::debug!(
                    method = %request.method(),
                    allowed = ?allowed,
                    "method not allowed"
                );
                let response = HttpResponse::not_allowed(&allowed);
                Box::pin(std::future::ready(Ok(response)))
            }
            Self::AjaxRequired => {
                if request.is_ajax() {
                    return next(request);
                }
                tracing::debug!(path = %request.path(), "non-AJAX request refused");
                let response = HttpResponse::forbidden("AJAX request required");
                Box::pin(std::future::ready(Ok(response)))
            }
            Self::User(guard) => guard.call(request, next),
        }
    }
}

/// An ordered list of guards.
#[derive(Debug, Clone, Default)]
pub struct GuardChain {
    guards: Vec<Guard>,
}

impl GuardChain {
    /// Creates a chain running `guards` in order.
    pub fn new(guards: Vec<Guard>) -> Self {
        Self { guards }
    }

    /// Builds the chain for a view: its own guards, then the AJAX check if
    /// required, then the method filter.
    pub fn for_view(user_guards: Vec<Guard>, requires_ajax: bool, allowed: Vec<Method>) -> Self {
        let mut guards = user_guards;
        if requires_ajax {
            guards.push(Guard::AjaxRequired);
        }
        guards.push(Guard::MethodFilter(allowed));
        Self { guards }
    }

    /// The guards, outermost first.
    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    /// Wraps `base` in every guard. The first guard ends up outermost.
    pub fn compose<'a>(&'a self, base: Next<'a>) -> Next<'a> {
        self.guards.iter().rev().fold(base, |next, guard| {
            next_fn(move |request| guard.apply(request, next))
        })
    }

    /// Runs `request` through the chain and into `base`.
    pub async fn run<'a>(&'a self, request: Arc<HttpRequest>, base: Next<'a>) -> UtkikResult<HttpResponse> {
        (self.compose(base))(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use http::StatusCode;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        reject: bool,
    }

    #[async_trait]
    impl RequestGuard for Recorder {
        async fn call<'a>(&'a self, request: Arc<HttpRequest>, next: Next<'a>) -> UtkikResult<HttpResponse> {
            self.log.lock().unwrap().push(self.label.to_string());
            if self.reject {
                return Ok(HttpResponse::forbidden(self.label));
            }
            next(request).await
        }
    }

    fn recorder(label: &'static str, log: &Arc<Mutex<Vec<String>>>, reject: bool) -> Guard {
        Guard::user(Recorder {
            label,
            log: Arc::clone(log),
            reject,
        })
    }

    fn handler<'a>(log: &'a Arc<Mutex<Vec<String>>>) -> Next<'a> {
        next_fn(move |_request| {
            Box::pin(async move {
                log.lock().unwrap().push("handler".to_string());
                Ok(HttpResponse::ok("handled"))
            })
        })
    }

    fn request(method: Method) -> Arc<HttpRequest> {
        Arc::new(HttpRequest::builder().method(method).build())
    }

    #[tokio::test]
    async fn test_guards_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = GuardChain::new(vec![
            recorder("g1", &log, false),
            recorder("g2", &log, false),
            recorder("g3", &log, false),
        ]);
        let response = chain.run(request(Method::GET), handler(&log)).await.unwrap();
        assert_eq!(response.text(), "handled");
        assert_eq!(*log.lock().unwrap(), vec!["g1", "g2", "g3", "handler"]);
    }

    #[tokio::test]
    async fn test_short_circuit_stops_inner_guards() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = GuardChain::new(vec![
            recorder("g1", &log, false),
            recorder("g2", &log, true),
            recorder("g3", &log, false),
        ]);
        let response = chain.run(request(Method::GET), handler(&log)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.text(), "g2");
        assert_eq!(*log.lock().unwrap(), vec!["g1", "g2"]);
    }

    #[tokio::test]
    async fn test_empty_chain_calls_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = GuardChain::default();
        chain.run(request(Method::GET), handler(&log)).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["handler"]);
    }

    #[tokio::test]
    async fn test_method_filter() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = GuardChain::new(vec![Guard::MethodFilter(vec![Method::GET, Method::POST])]);

        let response = chain.run(request(Method::DELETE), handler(&log)).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(http::header::ALLOW).unwrap(), "GET, POST");
        assert!(log.lock().unwrap().is_empty());

        let response = chain.run(request(Method::POST), handler(&log)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ajax_required() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = GuardChain::new(vec![Guard::AjaxRequired]);

        let response = chain.run(request(Method::GET), handler(&log)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(log.lock().unwrap().is_empty());

        let ajax = Arc::new(HttpRequest::builder().ajax().build());
        let response = chain.run(ajax, handler(&log)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_for_view_order() {
        let chain = GuardChain::for_view(
            vec![Guard::check("noop", |_| None)],
            true,
            vec![Method::GET],
        );
        let guards = chain.guards();
        assert_eq!(guards.len(), 3);
        assert!(matches!(guards[0], Guard::User(_)));
        assert!(matches!(guards[1], Guard::AjaxRequired));
        assert!(matches!(guards[2], Guard::MethodFilter(ref m) if m == &[Method::GET]));

        let chain = GuardChain::for_view(Vec::new(), false, vec![Method::GET]);
        assert_eq!(chain.guards().len(), 1);
    }

    #[tokio::test]
    async fn test_user_guard_runs_before_method_filter() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = GuardChain::for_view(vec![recorder("user", &log, false)], false, vec![Method::GET]);
        let response = chain.run(request(Method::PUT), handler(&log)).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(*log.lock().unwrap(), vec!["user"]);
    }

    #[tokio::test]
    async fn test_check_guard() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = GuardChain::new(vec![Guard::check("needs-token", |request| {
            if request.headers().contains_key("x-token") {
                None
            } else {
                Some(HttpResponse::forbidden("token required"))
            }
        })]);

        let response = chain.run(request(Method::GET), handler(&log)).await.unwrap();
        assert_eq!(response.text(), "token required");

        let with_token = Arc::new(HttpRequest::builder().header("x-token", "t").build());
        let response = chain.run(with_token, handler(&log)).await.unwrap();
        assert_eq!(response.text(), "handled");
    }
}
