//! Lazily resolved view references.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use utkik_core::UtkikResult;

use crate::resolver::NameResolver;
use crate::target::{Export, ViewTarget};

/// A classified view, ready to invoke.
#[derive(Debug, Clone)]
pub struct ResolvedView {
    /// Module the view was found in.
    pub module: String,
    /// Attribute name of the view.
    pub name: String,
    /// Description of the view, if it has one.
    pub doc: Option<String>,
    /// How to invoke it.
    pub target: ViewTarget,
}

enum Origin {
    Named {
        import_name: String,
        resolver: Arc<NameResolver>,
    },
    Concrete(Export),
}

/// A reference to a view that is resolved on first use and then reused.
///
/// Construction never resolves anything, so a route table can name views
/// that do not exist yet. The identity methods ([`module`](Self::module),
/// [`display_name`](Self::display_name)) never force resolution either.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use utkik_views::handle::LazyHandle;
/// use utkik_views::resolver::{NameResolver, ViewRegistry};
///
/// let resolver = Arc::new(NameResolver::new(
///     Arc::new(ViewRegistry::new()),
///     Arc::new(Vec::<String>::new()),
/// ));
/// let handle = LazyHandle::named("blog.views.PostListView", resolver);
///
/// assert_eq!(handle.module(), "blog.views");
/// assert_eq!(handle.display_name(), "PostListView");
/// assert!(!handle.is_resolved());
/// ```
pub struct LazyHandle {
    origin: Origin,
    module: String,
    name: String,
    slot: OnceCell<ResolvedView>,
}

impl fmt::Debug for LazyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyHandle")
            .field("view", &self.qualified_name())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl LazyHandle {
    /// Creates a handle for a dotted name, resolved later through `resolver`.
    pub fn named(import_name: impl Into<String>, resolver: Arc<NameResolver>) -> Self {
        let import_name = import_name.into();
        let (module, name) = match import_name
            .rsplit_once(':')
            .or_else(|| import_name.rsplit_once('.'))
        {
            Some((module, name)) => (module.to_string(), name.to_string()),
            None => (String::new(), import_name.clone()),
        };
        Self {
            origin: Origin::Named {
                import_name,
                resolver,
            },
            module,
            name,
            slot: OnceCell::new(),
        }
    }

    /// Creates a handle for an export that is already at hand.
    pub fn concrete(export: impl Into<Export>) -> Self {
        let export = export.into();
        Self {
            module: export.module().to_string(),
            name: export.name().to_string(),
            origin: Origin::Concrete(export),
            slot: OnceCell::new(),
        }
    }

    /// Returns the dotted name this handle was created from, if any.
    pub fn import_name(&self) -> Option<&str> {
        match &self.origin {
            Origin::Named { import_name, .. } => Some(import_name),
            Origin::Concrete(_) => None,
        }
    }

    /// Module path as written, or the export's own module.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The view's attribute name.
    pub fn display_name(&self) -> &str {
        &self.name
    }

    /// `module.name`, or just the name when there is no module.
    pub fn qualified_name(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.module, self.name)
        }
    }

    /// Returns `true` once the target has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Description of the view. Available once resolved.
    pub fn doc(&self) -> Option<&str> {
        self.slot.get().and_then(|view| view.doc.as_deref())
    }

    /// Resolves and classifies the target on first call; later calls return
    /// the cached result. Failures are not cached.
    pub fn target(&self) -> UtkikResult<&ResolvedView> {
        self.slot.get_or_try_init(|| match &self.origin {
            Origin::Named {
                import_name,
                resolver,
            } => {
                let resolved = resolver.resolve(import_name)?;
                let target = ViewTarget::classify(&resolved.export, &resolved.module, &resolved.attr)?;
                Ok(ResolvedView {
                    module: resolved.module.clone(),
                    name: resolved.attr.clone(),
                    doc: resolved.export.doc().map(str::to_string),
                    target,
                })
            }
            Origin::Concrete(export) => {
                let target = ViewTarget::classify(export, export.module(), export.name())?;
                Ok(ResolvedView {
                    module: export.module().to_string(),
                    name: export.name().to_string(),
                    doc: export.doc().map(str::to_string),
                    target,
                })
            }
        })
    }
}

impl From<Export> for LazyHandle {
    fn from(export: Export) -> Self {
        Self::concrete(export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ViewModule, ViewRegistry};
    use crate::target::FunctionView;
    use utkik_core::UtkikError;
    use utkik_http::HttpResponse;

    fn resolver(apps: &[&str]) -> Arc<NameResolver> {
        let registry = ViewRegistry::new().with_module(
            ViewModule::new("blog.views")
                .function("index", |_r, _a| async { Ok(HttpResponse::ok("")) })
                .value("PAGE_SIZE", serde_json::json!(10)),
        );
        let apps: Vec<String> = apps.iter().map(ToString::to_string).collect();
        Arc::new(NameResolver::new(Arc::new(registry), Arc::new(apps)))
    }

    #[test]
    fn test_named_identity_without_resolving() {
        let handle = LazyHandle::named("shop.views:Cart", resolver(&[]));
        assert_eq!(handle.module(), "shop.views");
        assert_eq!(handle.display_name(), "Cart");
        assert_eq!(handle.qualified_name(), "shop.views.Cart");
        assert_eq!(handle.import_name(), Some("shop.views:Cart"));
        assert!(!handle.is_resolved());
    }

    #[test]
    fn test_named_resolves_once() {
        let resolver = resolver(&["blog"]);
        let handle = LazyHandle::named("blog.index", Arc::clone(&resolver));

        let first = handle.target().unwrap() as *const ResolvedView;
        assert!(handle.is_resolved());
        assert_eq!(handle.target().unwrap().module, "blog.views");
        let second = handle.target().unwrap() as *const ResolvedView;
        assert_eq!(first, second);
        assert_eq!(resolver.cache_len(), 1);
    }

    #[test]
    fn test_named_resolution_failure_is_retried() {
        let handle = LazyHandle::named("blog.views.missing", resolver(&[]));
        assert!(matches!(
            handle.target().unwrap_err(),
            UtkikError::ViewDoesNotExist { .. }
        ));
        assert!(!handle.is_resolved());
    }

    #[test]
    fn test_value_target_is_improperly_configured() {
        let handle = LazyHandle::named("blog.views.PAGE_SIZE", resolver(&[]));
        let err = handle.target().unwrap_err();
        assert!(matches!(err, UtkikError::ImproperlyConfigured(_)));
        assert!(err.to_string().contains("blog.views.PAGE_SIZE does not define a view"));
    }

    #[test]
    fn test_concrete_handle() {
        let func = FunctionView::new("pages.views", "about", |_r, _a| async {
            Ok(HttpResponse::ok("about"))
        })
        .with_doc("The about page.");
        let handle = LazyHandle::concrete(func);
        assert_eq!(handle.import_name(), None);
        assert_eq!(handle.qualified_name(), "pages.views.about");
        assert_eq!(handle.doc(), None);

        let view = handle.target().unwrap();
        assert!(!view.target.is_dispatchable());
        assert_eq!(handle.doc(), Some("The about page."));
    }
}
