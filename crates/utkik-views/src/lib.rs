//! # utkik-views
//!
//! The view layer for utkik: lazy view references, uniform invocation of
//! class-based and function views, guarded class-based views, and routing.
//!
//! ## Modules
//!
//! - [`resolver`] - Dotted-name resolution with app-aware fallback and memoization
//! - [`handle`] - Lazily resolved view references
//! - [`target`] - View classes, view functions, and module exports
//! - [`invoke`] - Uniform invocation with error attribution
//! - [`guards`] - Request guards and the guard chain
//! - [`base`] - The `View` trait and the per-request `ViewBase`
//! - [`render`] - The template rendering seam and its Tera implementation
//! - [`decorators`] - Guards for function views
//! - [`urls`] - Route tables

pub mod base;
pub mod decorators;
pub mod guards;
pub mod handle;
pub mod invoke;
pub mod render;
pub mod resolver;
pub mod target;
pub mod urls;

pub use base::{ContextBag, HandlerContext, HandlerResult, View, ViewBase, ViewState};
pub use guards::{Guard, GuardChain, Next, RequestGuard};
pub use handle::{LazyHandle, ResolvedView};
pub use invoke::ViewInvoker;
pub use render::{TemplateRenderer, TeraRenderer};
pub use resolver::{ModuleLoader, NameResolver, ResolvedExport, ViewModule, ViewRegistry};
pub use target::{Dispatch, Export, FunctionView, ViewArgs, ViewClass, ViewTarget};
pub use urls::{url, ResolverMatch, RouteEntry, RouteTable, RouteTableBuilder, UrlSpec, ViewRef};
