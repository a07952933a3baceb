//! What a view reference resolves to.
//!
//! A module exports named values ([`Export`]). Only two kinds of export can be
//! invoked for a request, and the distinction is made once, when the export is
//! resolved, rather than probed on every call:
//!
//! - [`ViewClass`]: a factory for per-request objects implementing [`Dispatch`]
//!   (class-based views). Anything implementing `Dispatch` qualifies, not only
//!   [`ViewBase`](crate::base::ViewBase).
//! - [`FunctionView`]: a plain async function of request and arguments.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use utkik_core::{UtkikError, UtkikResult};
use utkik_http::{HttpRequest, HttpResponse};

use crate::base::{View, ViewBase};
use crate::render::TemplateRenderer;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Arguments captured from the URL plus route defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewArgs {
    /// Positional arguments (unnamed regex groups).
    pub args: Vec<String>,
    /// Keyword arguments (named regex groups and route defaults).
    pub kwargs: HashMap<String, String>,
}

impl ViewArgs {
    /// Creates empty arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a keyword argument.
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Adds a positional argument.
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Returns a keyword argument by name.
    pub fn kwarg(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).map(String::as_str)
    }
}

/// The entry point of a dispatchable (class-based) view instance.
#[async_trait]
pub trait Dispatch: Send {
    /// Handles one request. Each instance sees exactly one call.
    async fn dispatch(&mut self, request: HttpRequest, args: ViewArgs) -> UtkikResult<HttpResponse>;
}

type Factory = dyn Fn(&Arc<dyn TemplateRenderer>) -> Box<dyn Dispatch> + Send + Sync;

type ViewFn = dyn Fn(HttpRequest, ViewArgs) -> BoxFuture<'static, UtkikResult<HttpResponse>> + Send + Sync;

/// A class-based view: a factory producing a fresh [`Dispatch`] per request.
#[derive(Clone)]
pub struct ViewClass {
    module: String,
    name: String,
    doc: Option<String>,
    factory: Arc<Factory>,
}

impl fmt::Debug for ViewClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewClass")
            .field("module", &self.module)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ViewClass {
    /// Creates a class from an arbitrary factory.
    pub fn new(
        module: impl Into<String>,
        name: impl Into<String>,
        factory: impl Fn(&Arc<dyn TemplateRenderer>) -> Box<dyn Dispatch> + Send + Sync + 'static,
    ) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            doc: None,
            factory: Arc::new(factory),
        }
    }

    /// Creates a class for a [`View`] type, wrapping each instance in a
    /// [`ViewBase`]. Module and name come from the Rust type path.
    pub fn of<V: View + Default>() -> Self {
        let (module, name) = split_type_name(std::any::type_name::<V>());
        Self::new(
            module,
            name,
            |renderer: &Arc<dyn TemplateRenderer>| -> Box<dyn Dispatch> {
                Box::new(ViewBase::new(V::default(), Arc::clone(renderer)))
            },
        )
    }

    /// Replaces the module and name used for diagnostics.
    #[must_use]
    pub fn named(mut self, module: impl Into<String>, name: impl Into<String>) -> Self {
        self.module = module.into();
        self.name = name.into();
        self
    }

    /// Attaches a description shown by diagnostics.
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Builds a fresh instance for one request.
    pub fn instantiate(&self, renderer: &Arc<dyn TemplateRenderer>) -> Box<dyn Dispatch> {
        (self.factory)(renderer)
    }

    /// Returns the module path.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Returns the class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description, if any.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

/// A function-based view.
///
/// # Examples
///
/// ```
/// use utkik_views::target::FunctionView;
/// use utkik_http::HttpResponse;
///
/// let view = FunctionView::new("blog.views", "ping", |_request, _args| async {
///     Ok(HttpResponse::ok("pong"))
/// });
/// assert_eq!(view.name(), "ping");
/// ```
#[derive(Clone)]
pub struct FunctionView {
    module: String,
    name: String,
    doc: Option<String>,
    func: Arc<ViewFn>,
}

impl fmt::Debug for FunctionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionView")
            .field("module", &self.module)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FunctionView {
    /// Wraps an async function taking the request and its arguments.
    pub fn new<F, Fut>(module: impl Into<String>, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(HttpRequest, ViewArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UtkikResult<HttpResponse>> + Send + 'static,
    {
        let func: Arc<ViewFn> = Arc::new(
            move |request: HttpRequest, args: ViewArgs| -> BoxFuture<'static, UtkikResult<HttpResponse>> {
                Box::pin(func(request, args))
            },
        );
        Self {
            module: module.into(),
            name: name.into(),
            doc: None,
            func,
        }
    }

    /// Attaches a description shown by diagnostics.
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Calls the function.
    pub fn call(&self, request: HttpRequest, args: ViewArgs) -> BoxFuture<'static, UtkikResult<HttpResponse>> {
        (self.func)(request, args)
    }

    /// Returns the module path.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Returns the function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description, if any.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

/// A named value exported by a module.
#[derive(Debug, Clone)]
pub enum Export {
    /// A class-based view.
    Class(ViewClass),
    /// A function-based view.
    Function(FunctionView),
    /// Anything else. Routing to one of these is a configuration error.
    Value {
        /// Module path.
        module: String,
        /// Attribute name.
        name: String,
        /// The exported value.
        value: serde_json::Value,
    },
}

impl Export {
    /// Returns the module path of the export.
    pub fn module(&self) -> &str {
        match self {
            Self::Class(class) => class.module(),
            Self::Function(func) => func.module(),
            Self::Value { module, .. } => module,
        }
    }

    /// Returns the attribute name of the export.
    pub fn name(&self) -> &str {
        match self {
            Self::Class(class) => class.name(),
            Self::Function(func) => func.name(),
            Self::Value { name, .. } => name,
        }
    }

    /// Returns the description, if any.
    pub fn doc(&self) -> Option<&str> {
        match self {
            Self::Class(class) => class.doc(),
            Self::Function(func) => func.doc(),
            Self::Value { .. } => None,
        }
    }
}

impl From<ViewClass> for Export {
    fn from(class: ViewClass) -> Self {
        Self::Class(class)
    }
}

impl From<FunctionView> for Export {
    fn from(func: FunctionView) -> Self {
        Self::Function(func)
    }
}

/// An export classified as invokable.
#[derive(Debug, Clone)]
pub enum ViewTarget {
    /// Instantiate per request and call [`Dispatch::dispatch`].
    Dispatchable(ViewClass),
    /// Call directly with request and arguments.
    DirectCallable(FunctionView),
}

impl ViewTarget {
    /// Classifies an export found at `module.name`.
    ///
    /// Fails with [`UtkikError::ImproperlyConfigured`] if the export is neither
    /// a view class nor a view function.
    pub fn classify(export: &Export, module: &str, name: &str) -> UtkikResult<Self> {
        match export {
            Export::Class(class) => Ok(Self::Dispatchable(class.clone())),
            Export::Function(func) => Ok(Self::DirectCallable(func.clone())),
            Export::Value { .. } => Err(UtkikError::ImproperlyConfigured(format!(
                "{module}.{name} does not define a view function or class."
            ))),
        }
    }

    /// Returns `true` for class-based targets.
    pub const fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Dispatchable(_))
    }
}

/// Splits a Rust type path into a dotted module path and the type name.
fn split_type_name(type_name: &str) -> (String, String) {
    // Drop generic parameters; they never appear in diagnostics.
    let base = type_name.split('<').next().unwrap_or(type_name);
    match base.rsplit_once("::") {
        Some((module, name)) => (module.replace("::", "."), name.to_string()),
        None => (String::new(), base.to_string()),
    }
}
