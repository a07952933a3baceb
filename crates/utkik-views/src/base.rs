//! Class-based views.
//!
//! A view type implements [`View`]: a few configuration methods and a handler
//! per HTTP method it supports. [`ViewBase`] wraps one instance per request
//! and drives it:
//!
//! 1. bind the request (once; an instance never serves two requests),
//! 2. run the guard chain built from the view's configuration,
//! 3. call the handler named after the lower-cased request method, behind any
//!    guards the view declares for that method,
//! 4. if the handler returned no response, render the context bag with the
//!    view's template.
//!
//! # Examples
//!
//! ```
//! use async_trait::async_trait;
//! use http::Method;
//! use utkik_views::base::{HandlerContext, HandlerResult, View};
//!
//! #[derive(Default)]
//! struct PostListView;
//!
//! #[async_trait]
//! impl View for PostListView {
//!     fn implemented_methods(&self) -> Vec<Method> {
//!         vec![Method::GET]
//!     }
//!
//!     fn template_names(&self) -> Vec<String> {
//!         vec!["blog/post_list.html".into()]
//!     }
//!
//!     async fn get(&mut self, cx: &mut HandlerContext<'_>) -> HandlerResult {
//!         cx.set("title", "Posts");
//!         Ok(None)
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};

use utkik_core::{UtkikError, UtkikResult};
use utkik_http::{HttpRequest, HttpResponse};

use crate::guards::{next_fn, Guard, GuardChain};
use crate::render::TemplateRenderer;
use crate::target::{Dispatch, ViewArgs};

/// What a handler returns: a response, or `None` to render the context.
pub type HandlerResult = UtkikResult<Option<HttpResponse>>;

/// The per-request key/value context handed to the template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBag {
    values: Map<String, Value>,
}

impl ContextBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Serializes `value` and stores it under `key`.
    pub fn set_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> UtkikResult<()> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), value);
        Ok(())
    }

    /// Returns a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Returns `true` if `key` is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A plain map of everything in the bag.
    pub fn flatten(&self) -> Map<String, Value> {
        self.values.clone()
    }
}

/// What a handler sees: the request, its URL arguments, and the context bag.
pub struct HandlerContext<'a> {
    request: &'a HttpRequest,
    args: &'a ViewArgs,
    context: &'a mut ContextBag,
}

impl<'a> HandlerContext<'a> {
    /// The request being handled.
    pub const fn request(&self) -> &'a HttpRequest {
        self.request
    }

    /// URL arguments and route defaults.
    pub const fn args(&self) -> &'a ViewArgs {
        self.args
    }

    /// A keyword argument, or [`UtkikError::MissingKey`] if absent.
    pub fn kwarg(&self, key: &str) -> UtkikResult<&'a str> {
        self.args
            .kwarg(key)
            .ok_or_else(|| UtkikError::MissingKey(key.to_string()))
    }

    /// Sets a context value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.set(key, value);
    }

    /// Serializes and sets a context value.
    pub fn set_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> UtkikResult<()> {
        self.context.set_serialized(key, value)
    }

    /// The context bag.
    pub fn context(&self) -> &ContextBag {
        &*self.context
    }

    /// The context bag, mutably.
    pub fn context_mut(&mut self) -> &mut ContextBag {
        &mut *self.context
    }
}

/// A class-based view.
///
/// Only [`implemented_methods`](View::implemented_methods) is required, plus a
/// handler for each method it lists. Requests for methods outside
/// `allowed_methods() ∩ implemented_methods()` are answered with 405 before
/// any handler runs.
#[async_trait]
pub trait View: Send + 'static {
    /// Methods the view accepts. Defaults to GET and POST.
    fn allowed_methods(&self) -> Vec<Method> {
        vec![Method::GET, Method::POST]
    }

    /// Methods the view has handlers for.
    fn implemented_methods(&self) -> Vec<Method>;

    /// Whether non-AJAX requests are refused with 403.
    fn requires_ajax(&self) -> bool {
        false
    }

    /// Extra guards, run before the AJAX check and method filter.
    fn guards(&self) -> Vec<Guard> {
        Vec::new()
    }

    /// Guards wrapped around the handler for `method` only. They run after
    /// the view-wide chain has let the request through.
    fn handler_guards(&self, _method: &Method) -> Vec<Guard> {
        Vec::new()
    }

    /// Templates tried in order when rendering.
    fn template_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Content type for rendered responses.
    fn content_type(&self) -> Option<&str> {
        None
    }

    /// Status for rendered responses.
    fn status(&self) -> Option<StatusCode> {
        None
    }

    /// Handles GET requests. Return `Ok(None)` to render the context.
    async fn get(&mut self, _cx: &mut HandlerContext<'_>) -> HandlerResult {
        Err(missing_handler::<Self>("get"))
    }

    /// Handles POST requests.
    async fn post(&mut self, _cx: &mut HandlerContext<'_>) -> HandlerResult {
        Err(missing_handler::<Self>("post"))
    }

    /// Handles PUT requests.
    async fn put(&mut self, _cx: &mut HandlerContext<'_>) -> HandlerResult {
        Err(missing_handler::<Self>("put"))
    }

    /// Handles PATCH requests.
    async fn patch(&mut self, _cx: &mut HandlerContext<'_>) -> HandlerResult {
        Err(missing_handler::<Self>("patch"))
    }

    /// Handles DELETE requests.
    async fn delete(&mut self, _cx: &mut HandlerContext<'_>) -> HandlerResult {
        Err(missing_handler::<Self>("delete"))
    }

    /// Handles HEAD requests.
    async fn head(&mut self, _cx: &mut HandlerContext<'_>) -> HandlerResult {
        Err(missing_handler::<Self>("head"))
    }

    /// Handles OPTIONS requests.
    async fn options(&mut self, _cx: &mut HandlerContext<'_>) -> HandlerResult {
        Err(missing_handler::<Self>("options"))
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn missing_handler<T: ?Sized>(handler: &str) -> UtkikError {
    UtkikError::ImproperlyConfigured(format!(
        "{} has no '{handler}' handler",
        short_type_name::<T>()
    ))
}

/// Where a [`ViewBase`] is in its one-request life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Not yet dispatched.
    Created,
    /// Request bound, guards running.
    Dispatching,
    /// A handler is running.
    Handling,
    /// A guard or handler produced the response.
    Responded,
    /// The response was rendered from the context.
    Rendered,
    /// Dispatch ended in an error.
    Failed,
}

/// Drives one [`View`] instance through one request.
pub struct ViewBase<V> {
    view: V,
    request: Option<Arc<HttpRequest>>,
    context: ContextBag,
    renderer: Arc<dyn TemplateRenderer>,
    state: ViewState,
}

impl<V: View> ViewBase<V> {
    /// Wraps `view`; rendering goes through `renderer`.
    pub fn new(view: V, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            view,
            request: None,
            context: ContextBag::new(),
            renderer,
            state: ViewState::Created,
        }
    }

    /// The wrapped view.
    pub const fn view(&self) -> &V {
        &self.view
    }

    /// The bound request, once dispatched.
    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_deref()
    }

    /// The context bag.
    pub const fn context(&self) -> &ContextBag {
        &self.context
    }

    /// The current lifecycle state.
    pub const fn state(&self) -> ViewState {
        self.state
    }

    /// Allowed methods the view has a handler for.
    fn usable_methods(&self) -> Vec<Method> {
        let implemented = self.view.implemented_methods();
        self.view
            .allowed_methods()
            .into_iter()
            .filter(|method| implemented.contains(method))
            .collect()
    }

    /// The guards this view runs behind.
    pub fn guard_chain(&self) -> GuardChain {
        GuardChain::for_view(
            self.view.guards(),
            self.view.requires_ajax(),
            self.usable_methods(),
        )
    }

    /// Handles `request`. May only be called once per instance.
    pub async fn dispatch(&mut self, request: HttpRequest, args: ViewArgs) -> UtkikResult<HttpResponse> {
        if self.request.is_some() {
            return Err(UtkikError::ImproperlyConfigured(format!(
                "{} instance has already handled a request",
                short_type_name::<V>()
            )));
        }
        if self.usable_methods().is_empty() {
            self.state = ViewState::Failed;
            let allowed = self.view.allowed_methods();
            let allowed: Vec<&str> = allowed.iter().map(Method::as_str).collect();
            return Err(UtkikError::ImproperlyConfigured(format!(
                "{} declares no handler for any allowed method ({})",
                short_type_name::<V>(),
                allowed.join(", ")
            )));
        }
        let request = Arc::new(request);
        self.request = Some(Arc::clone(&request));
        self.state = ViewState::Dispatching;

        let chain = self.guard_chain();
        let result = {
            let this = &mut *self;
            let base = next_fn(move |request| {
                Box::pin(async move { this.get_response(request, &args).await })
            });
            chain.run(request, base).await
        };

        match &result {
            Ok(_) if self.state == ViewState::Dispatching => self.state = ViewState::Responded,
            Ok(_) => {}
            Err(_) => self.state = ViewState::Failed,
        }
        result
    }

    /// Calls the handler for the request method behind its handler guards,
    /// rendering if it returns no response.
    pub async fn get_response(
        &mut self,
        request: Arc<HttpRequest>,
        args: &ViewArgs,
    ) -> UtkikResult<HttpResponse> {
        let method = request.method().clone();
        if !self.view.implemented_methods().contains(&method) {
            return Err(missing_handler::<V>(&method.as_str().to_ascii_lowercase()));
        }

        let chain = GuardChain::new(self.view.handler_guards(&method));
        let this = &mut *self;
        let base = next_fn(move |request| {
            Box::pin(async move { this.handle(&request, args).await })
        });
        chain.run(request, base).await
    }

    async fn handle(&mut self, request: &HttpRequest, args: &ViewArgs) -> UtkikResult<HttpResponse> {
        self.state = ViewState::Handling;

        let handler = request.method().as_str().to_ascii_lowercase();
        let mut cx = HandlerContext {
            request,
            args,
            context: &mut self.context,
        };
        let outcome = match handler.as_str() {
            "get" => self.view.get(&mut cx).await,
            "post" => self.view.post(&mut cx).await,
            "put" => self.view.put(&mut cx).await,
            "patch" => self.view.patch(&mut cx).await,
            "delete" => self.view.delete(&mut cx).await,
            "head" => self.view.head(&mut cx).await,
            "options" => self.view.options(&mut cx).await,
            other => Err(missing_handler::<V>(other)),
        }?;

        match outcome {
            Some(response) => {
                self.state = ViewState::Responded;
                Ok(response)
            }
            None => self.render(request),
        }
    }

    /// Renders the context bag with the view's templates.
    pub fn render(&mut self, request: &HttpRequest) -> UtkikResult<HttpResponse> {
        let templates = self.view.template_names();
        if templates.is_empty() {
            return Err(UtkikError::ViewConfiguration(format!(
                "{} does not define a template to render to.",
                short_type_name::<V>()
            )));
        }

        let mut response = self
            .renderer
            .render(request, &templates, &self.context.flatten())?;
        if let Some(content_type) = self.view.content_type() {
            response.set_content_type(content_type);
        }
        if let Some(status) = self.view.status() {
            response.set_status(status);
        }
        self.state = ViewState::Rendered;
        Ok(response)
    }
}

#[async_trait]
impl<V: View> Dispatch for ViewBase<V> {
    async fn dispatch(&mut self, request: HttpRequest, args: ViewArgs) -> UtkikResult<HttpResponse> {
        Self::dispatch(self, request, args).await
    }
}
