//! Dotted-name resolution.
//!
//! Routes may name their view as a string (`"blog.views.PostListView"`) so the
//! view is only looked up when first needed. [`NameResolver`] turns such a
//! name into the [`Export`] it refers to, going through a [`ModuleLoader`]
//! that plays the role of an import system.
//!
//! A name whose module is an installed application is also tried against
//! that application's views module, so `blog.PostListView` finds
//! `blog.views.PostListView`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use utkik_core::{InstalledApps, Settings, UtkikError, UtkikResult};
use utkik_http::{HttpRequest, HttpResponse};

use crate::base::View;
use crate::target::{Export, FunctionView, ViewArgs, ViewClass};

/// Loads modules by dotted path.
pub trait ModuleLoader: Send + Sync {
    /// Returns the module at `module_path`, or `None` if there is none.
    fn load(&self, module_path: &str) -> Option<Arc<ViewModule>>;
}

/// A module: a dotted path and the named values it exports.
///
/// # Examples
///
/// ```
/// use utkik_views::resolver::ViewModule;
/// use utkik_http::HttpResponse;
///
/// let module = ViewModule::new("blog.views")
///     .function("ping", |_request, _args| async { Ok(HttpResponse::ok("pong")) })
///     .value("PAGE_SIZE", serde_json::json!(20));
///
/// assert!(module.get("ping").is_some());
/// assert!(module.get("missing").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ViewModule {
    path: String,
    exports: HashMap<String, Export>,
}

impl ViewModule {
    /// Creates an empty module.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exports: HashMap::new(),
        }
    }

    /// Exports the class-based view `V` under `name`.
    #[must_use]
    pub fn view<V: View + Default>(self, name: &str) -> Self {
        let class = ViewClass::of::<V>().named(self.path.clone(), name);
        self.class(name, class)
    }

    /// Exports a view class under `name`.
    #[must_use]
    pub fn class(mut self, name: &str, class: ViewClass) -> Self {
        self.exports.insert(name.to_string(), Export::Class(class));
        self
    }

    /// Exports an async view function under `name`.
    #[must_use]
    pub fn function<F, Fut>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(HttpRequest, ViewArgs) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = UtkikResult<HttpResponse>> + Send + 'static,
    {
        let func = FunctionView::new(self.path.clone(), name, func);
        self.exports.insert(name.to_string(), Export::Function(func));
        self
    }

    /// Exports an arbitrary export under `name`.
    #[must_use]
    pub fn export(mut self, name: &str, export: impl Into<Export>) -> Self {
        self.exports.insert(name.to_string(), export.into());
        self
    }

    /// Exports a plain value under `name`.
    #[must_use]
    pub fn value(mut self, name: &str, value: serde_json::Value) -> Self {
        let export = Export::Value {
            module: self.path.clone(),
            name: name.to_string(),
            value,
        };
        self.exports.insert(name.to_string(), export);
        self
    }

    /// Looks up an export by attribute name.
    pub fn get(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    /// Returns the dotted module path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// An in-process [`ModuleLoader`] holding registered modules.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    modules: RwLock<HashMap<String, Arc<ViewModule>>>,
}

impl ViewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module, replacing any module already at its path.
    pub fn register(&self, module: ViewModule) {
        tracing::debug!(module = %module.path(), "registered view module");
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(module.path().to_string(), Arc::new(module));
    }

    /// Registers a module, builder style.
    #[must_use]
    pub fn with_module(self, module: ViewModule) -> Self {
        self.register(module);
        self
    }
}

impl ModuleLoader for ViewRegistry {
    fn load(&self, module_path: &str) -> Option<Arc<ViewModule>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module_path)
            .cloned()
    }
}

/// An export found by name, with the module path and attribute it was found
/// under.
#[derive(Debug, Clone)]
pub struct ResolvedExport {
    /// The module the export was actually found in.
    pub module: String,
    /// The attribute name.
    pub attr: String,
    /// The export itself.
    pub export: Export,
}

/// Resolves dotted names to exports, memoizing every success.
///
/// The cache is keyed by the exact input string and never evicted, so the
/// same name always yields the same [`Arc`].
pub struct NameResolver {
    loader: Arc<dyn ModuleLoader>,
    apps: Arc<dyn InstalledApps>,
    views_module: String,
    cache: RwLock<HashMap<String, Arc<ResolvedExport>>>,
}

impl fmt::Debug for NameResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameResolver")
            .field("views_module", &self.views_module)
            .field("cached", &self.cache_len())
            .finish_non_exhaustive()
    }
}

impl NameResolver {
    /// Creates a resolver over `loader`, using `apps` to decide when to try
    /// the `views` submodule.
    pub fn new(loader: Arc<dyn ModuleLoader>, apps: Arc<dyn InstalledApps>) -> Self {
        Self {
            loader,
            apps,
            views_module: "views".to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a resolver whose installed apps and views module name come
    /// from settings.
    pub fn from_settings(loader: Arc<dyn ModuleLoader>, settings: &Settings) -> Self {
        Self::new(loader, Arc::new(settings.installed_apps.clone()))
            .with_views_module(settings.views_module.clone())
    }

    /// Sets the submodule name tried for installed apps.
    #[must_use]
    pub fn with_views_module(mut self, views_module: impl Into<String>) -> Self {
        self.views_module = views_module.into();
        self
    }

    /// Resolves `name` to an export.
    ///
    /// The name is split on its last `:` if it has one, else its last `.`.
    /// If the direct lookup fails and the module part is an installed app, the
    /// lookup is retried in that app's views module. When both fail, the
    /// error describes the direct attempt.
    pub fn resolve(&self, name: &str) -> UtkikResult<Arc<ResolvedExport>> {
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            tracing::trace!(name, "resolver cache hit");
            return Ok(Arc::clone(hit));
        }

        let (module_path, attr) = split_import_name(name)?;
        let resolved = match self.lookup(module_path, attr) {
            Ok(export) => ResolvedExport {
                module: module_path.to_string(),
                attr: attr.to_string(),
                export,
            },
            Err(reason) if self.apps.is_installed(module_path) => {
                let fallback = format!("{module_path}.{}", self.views_module);
                tracing::debug!(name, fallback = %fallback, "retrying in app views module");
                match self.lookup(&fallback, attr) {
                    Ok(export) => ResolvedExport {
                        module: fallback,
                        attr: attr.to_string(),
                        export,
                    },
                    Err(_) => return Err(not_found(name, reason)),
                }
            }
            Err(reason) => return Err(not_found(name, reason)),
        };

        tracing::debug!(name, module = %resolved.module, "resolved view name");
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(resolved));
        Ok(Arc::clone(entry))
    }

    /// Returns `true` if `name` has already been resolved.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Returns the number of memoized names.
    pub fn cache_len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lookup(&self, module_path: &str, attr: &str) -> Result<Export, String> {
        let module = self
            .loader
            .load(module_path)
            .ok_or_else(|| format!("no module named '{module_path}'"))?;
        module
            .get(attr)
            .cloned()
            .ok_or_else(|| format!("module '{module_path}' has no attribute '{attr}'"))
    }
}

/// Splits an import name into module path and attribute.
fn split_import_name(name: &str) -> UtkikResult<(&str, &str)> {
    let split = name.rsplit_once(':').or_else(|| name.rsplit_once('.'));
    match split {
        Some((module, attr)) if !module.is_empty() && !attr.is_empty() => Ok((module, attr)),
        _ => Err(UtkikError::ViewDoesNotExist {
            name: name.to_string(),
            reason: format!("'{name}' is not a dotted module path"),
        }),
    }
}

fn not_found(name: &str, reason: String) -> UtkikError {
    UtkikError::ViewDoesNotExist {
        name: name.to_string(),
        reason,
    }
}
