//! URL routing.
//!
//! A [`RouteTable`] maps request paths to lazily resolved views. Build one with
//! [`RouteTable::builder`] and [`url`]:
//!
//! ```
//! use std::sync::Arc;
//! use utkik_views::resolver::{NameResolver, ViewRegistry};
//! use utkik_views::urls::{url, RouteTable};
//!
//! let resolver = Arc::new(NameResolver::new(
//!     Arc::new(ViewRegistry::new()),
//!     Arc::new(vec!["blog".to_string()]),
//! ));
//!
//! let table = RouteTable::builder(resolver)
//!     .prefix("blog")
//!     .route(url(r"^posts/$", "PostListView"))
//!     .route(url(r"^posts/(?P<slug>[\w-]+)/$", "PostDetailView").name("post"))
//!     .build()
//!     .unwrap();
//!
//! let matched = table.resolve("/posts/hello/").unwrap();
//! assert_eq!(matched.view_name(), "post");
//! assert_eq!(matched.args.kwarg("slug"), Some("hello"));
//!
//! // Nothing is resolved until a request is dispatched.
//! assert!(!matched.entry.handle().is_resolved());
//! ```
//!
//! Patterns are searched, not anchored, so write `^` and `$` where they
//! matter. A leading `/` is stripped from the path before matching.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::{Captures, Regex};

use utkik_core::utils::text::uncamel;
use utkik_core::{UtkikError, UtkikResult};
use utkik_http::{HttpRequest, HttpResponse};

use crate::handle::LazyHandle;
use crate::invoke::ViewInvoker;
use crate::resolver::NameResolver;
use crate::target::{Export, FunctionView, ViewArgs, ViewClass};

/// How a route names its view.
#[derive(Debug, Clone)]
pub enum ViewRef {
    /// A dotted name, resolved on first use.
    Name(String),
    /// A view at hand.
    Export(Export),
}

impl From<&str> for ViewRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ViewRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Export> for ViewRef {
    fn from(export: Export) -> Self {
        Self::Export(export)
    }
}

impl From<ViewClass> for ViewRef {
    fn from(class: ViewClass) -> Self {
        Self::Export(Export::Class(class))
    }
}

impl From<FunctionView> for ViewRef {
    fn from(func: FunctionView) -> Self {
        Self::Export(Export::Function(func))
    }
}

/// An unbuilt route: pattern, view, default kwargs and an optional name.
#[derive(Debug, Clone)]
pub struct UrlSpec {
    pattern: String,
    view: ViewRef,
    kwargs: HashMap<String, String>,
    name: Option<String>,
}

impl UrlSpec {
    /// Names the route. Unnamed routes take the uncameled view name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds default keyword arguments. They override captured values.
    #[must_use]
    pub fn kwargs<K, V>(mut self, kwargs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.kwargs
            .extend(kwargs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Adds one default keyword argument.
    #[must_use]
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}

/// Declares a route from `pattern` to `view`.
pub fn url(pattern: impl Into<String>, view: impl Into<ViewRef>) -> UrlSpec {
    UrlSpec {
        pattern: pattern.into(),
        view: view.into(),
        kwargs: HashMap::new(),
        name: None,
    }
}

/// A built route.
pub struct RouteEntry {
    regex: Regex,
    handle: LazyHandle,
    default_args: HashMap<String, String>,
    name: String,
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("pattern", &self.regex.as_str())
            .field("name", &self.name)
            .field("view", &self.handle)
            .finish_non_exhaustive()
    }
}

impl RouteEntry {
    /// The route's pattern.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// The view handle.
    pub const fn handle(&self) -> &LazyHandle {
        &self.handle
    }

    /// Default keyword arguments.
    pub const fn default_args(&self) -> &HashMap<String, String> {
        &self.default_args
    }

    /// The route name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

enum RouteNode {
    Entry(RouteEntry),
    Include {
        regex: Regex,
        table: RouteTable,
        namespace: Option<String>,
        default_args: HashMap<String, String>,
    },
}

/// The result of matching a path.
#[derive(Debug)]
pub struct ResolverMatch<'a> {
    /// The matched route.
    pub entry: &'a RouteEntry,
    /// Captured arguments with the route's defaults applied.
    pub args: ViewArgs,
    /// Namespaces of the includes traversed, outermost first.
    pub namespaces: Vec<String>,
}

impl ResolverMatch<'_> {
    /// The route name, qualified by its namespaces (`ns:name`).
    pub fn view_name(&self) -> String {
        let mut parts: Vec<&str> = self.namespaces.iter().map(String::as_str).collect();
        parts.push(self.entry.name());
        parts.join(":")
    }
}

/// An ordered list of routes and included tables.
#[derive(Default)]
pub struct RouteTable {
    nodes: Vec<RouteNode>,
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.nodes.len())
            .finish()
    }
}

impl RouteTable {
    /// Starts building a table whose string view names resolve through
    /// `resolver`.
    pub fn builder(resolver: Arc<NameResolver>) -> RouteTableBuilder {
        RouteTableBuilder {
            resolver,
            prefix: String::new(),
            nodes: Vec::new(),
            error: None,
        }
    }

    /// Number of direct routes and includes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct routes of this table, in order. Included tables are skipped.
    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.nodes.iter().filter_map(|node| match node {
            RouteNode::Entry(entry) => Some(entry),
            RouteNode::Include { .. } => None,
        })
    }

    /// Finds the first route matching `path`.
    pub fn resolve(&self, path: &str) -> Option<ResolverMatch<'_>> {
        let path = path.strip_prefix('/').unwrap_or(path);
        self.resolve_from(path, &[], &HashMap::new())
    }

    fn resolve_from(
        &self,
        path: &str,
        namespaces: &[String],
        inherited: &HashMap<String, String>,
    ) -> Option<ResolverMatch<'_>> {
        for node in &self.nodes {
            match node {
                RouteNode::Entry(entry) => {
                    let Some(caps) = entry.regex.captures(path) else {
                        continue;
                    };
                    let mut args = captured_args(&entry.regex, &caps);
                    let mut kwargs = inherited.clone();
                    kwargs.extend(args.kwargs);
                    kwargs.extend(entry.default_args.clone());
                    args.kwargs = kwargs;
                    return Some(ResolverMatch {
                        entry,
                        args,
                        namespaces: namespaces.to_vec(),
                    });
                }
                RouteNode::Include {
                    regex,
                    table,
                    namespace,
                    default_args,
                } => {
                    let Some(caps) = regex.captures(path) else {
                        continue;
                    };
                    let Some(whole) = caps.get(0) else {
                        continue;
                    };
                    let mut kwargs = inherited.clone();
                    kwargs.extend(captured_args(regex, &caps).kwargs);
                    kwargs.extend(default_args.clone());
                    let mut nested = namespaces.to_vec();
                    nested.extend(namespace.iter().cloned());
                    if let Some(found) = table.resolve_from(&path[whole.end()..], &nested, &kwargs) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// Routes `request` to its view and invokes it.
    ///
    /// Fails with [`UtkikError::NotFound`] if no route matches.
    pub async fn dispatch(&self, invoker: &ViewInvoker, request: HttpRequest) -> UtkikResult<HttpResponse> {
        let Some(matched) = self.resolve(request.path()) else {
            tracing::debug!(path = %request.path(), "no route matched");
            return Err(UtkikError::NotFound(request.path().to_string()));
        };
        tracing::debug!(
            path = %request.path(),
            route = %matched.view_name(),
            view = %matched.entry.handle.qualified_name(),
            "route matched"
        );
        invoker
            .invoke(&matched.entry.handle, request, matched.args)
            .await
    }
}

/// Named groups become kwargs. Unnamed groups become positional args, but
/// only when the pattern has no named groups at all.
fn captured_args(regex: &Regex, caps: &Captures<'_>) -> ViewArgs {
    let mut args = ViewArgs::new();
    let mut named = regex.capture_names().flatten().peekable();
    if named.peek().is_some() {
        for name in named {
            if let Some(value) = caps.name(name) {
                args.kwargs.insert(name.to_string(), value.as_str().to_string());
            }
        }
    } else {
        args.args = caps
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().to_string())
            .collect();
    }
    args
}

/// Builds a [`RouteTable`]. The first error is kept and returned by
/// [`build`](Self::build).
pub struct RouteTableBuilder {
    resolver: Arc<NameResolver>,
    prefix: String,
    nodes: Vec<RouteNode>,
    error: Option<UtkikError>,
}

impl fmt::Debug for RouteTableBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTableBuilder")
            .field("prefix", &self.prefix)
            .field("routes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl RouteTableBuilder {
    /// Prepends `prefix` to string view names of the routes added after it.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Adds a route.
    #[must_use]
    pub fn route(mut self, spec: UrlSpec) -> Self {
        if self.error.is_none() {
            match self.entry(spec) {
                Ok(entry) => self.nodes.push(RouteNode::Entry(entry)),
                Err(err) => self.error = Some(err),
            }
        }
        self
    }

    /// Delegates paths matching `pattern` to `table`, with the matched part
    /// stripped. Route names inside it are qualified by `namespace`.
    #[must_use]
    pub fn include(self, pattern: &str, table: RouteTable, namespace: Option<&str>) -> Self {
        self.include_with(pattern, table, namespace, std::iter::empty::<(String, String)>())
    }

    /// Like [`include`](Self::include), passing `kwargs` to every route in
    /// `table`. A nested route's own captures and defaults take precedence.
    #[must_use]
    pub fn include_with<K, V>(
        mut self,
        pattern: &str,
        table: RouteTable,
        namespace: Option<&str>,
        kwargs: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        if self.error.is_none() {
            match compile(pattern) {
                Ok(regex) => self.nodes.push(RouteNode::Include {
                    regex,
                    table,
                    namespace: namespace.map(str::to_string),
                    default_args: kwargs
                        .into_iter()
                        .map(|(k, v)| (k.into(), v.into()))
                        .collect(),
                }),
                Err(err) => self.error = Some(err),
            }
        }
        self
    }

    /// Finishes the table, or returns the first error met while building.
    pub fn build(self) -> UtkikResult<RouteTable> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(RouteTable { nodes: self.nodes }),
        }
    }

    fn entry(&self, spec: UrlSpec) -> UtkikResult<RouteEntry> {
        let handle = match spec.view {
            ViewRef::Name(name) => {
                if name.is_empty() {
                    return Err(UtkikError::ImproperlyConfigured(format!(
                        "Empty URL pattern view name not permitted (for pattern '{}')",
                        spec.pattern
                    )));
                }
                let full = if self.prefix.is_empty() {
                    name
                } else {
                    format!("{}.{name}", self.prefix)
                };
                LazyHandle::named(full, Arc::clone(&self.resolver))
            }
            ViewRef::Export(export) => LazyHandle::concrete(export),
        };
        let regex = compile(&spec.pattern)?;
        let name = spec
            .name
            .unwrap_or_else(|| uncamel(handle.display_name()));
        Ok(RouteEntry {
            regex,
            handle,
            default_args: spec.kwargs,
            name,
        })
    }
}

fn compile(pattern: &str) -> UtkikResult<Regex> {
    Regex::new(pattern).map_err(|e| {
        UtkikError::ImproperlyConfigured(format!("invalid URL pattern '{pattern}': {e}"))
    })
}
