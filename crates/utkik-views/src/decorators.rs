//! Guards for function views.
//!
//! Class-based views declare their guards; function views get theirs by
//! wrapping. The wrappers run the same [`GuardChain`] class-based views use.

use std::sync::Arc;

use http::Method;

use utkik_http::HttpRequest;

use crate::guards::{next_fn, Guard, GuardChain};
use crate::target::FunctionView;

/// Puts `view` behind `guards`, first guard outermost.
///
/// The wrapped view keeps the name, module and description of the original.
pub fn decorate(view: FunctionView, guards: Vec<Guard>) -> FunctionView {
    let chain = Arc::new(GuardChain::new(guards));
    let inner = view.clone();
    let wrapped = FunctionView::new(view.module(), view.name(), move |request, args| {
        let chain = Arc::clone(&chain);
        let inner = inner.clone();
        async move {
            let base = next_fn(move |request: Arc<HttpRequest>| {
                let request = Arc::try_unwrap(request).unwrap_or_else(|shared| (*shared).clone());
                inner.call(request, args)
            });
            chain.run(Arc::new(request), base).await
        }
    });
    match view.doc() {
        Some(doc) => wrapped.with_doc(doc),
        None => wrapped,
    }
}

/// Refuses non-AJAX requests to `view` with 403.
///
/// # Examples
///
/// ```
/// use utkik_http::HttpResponse;
/// use utkik_views::decorators::require_ajax;
/// use utkik_views::target::FunctionView;
///
/// let view = require_ajax(FunctionView::new("chat.views", "poll", |_r, _a| async {
///     Ok(HttpResponse::ok("[]"))
/// }));
/// assert_eq!(view.name(), "poll");
/// ```
pub fn require_ajax(view: FunctionView) -> FunctionView {
    decorate(view, vec![Guard::AjaxRequired])
}

/// Refuses methods outside `methods` with 405.
pub fn http_methods(methods: &[Method], view: FunctionView) -> FunctionView {
    decorate(view, vec![Guard::MethodFilter(methods.to_vec())])
}
