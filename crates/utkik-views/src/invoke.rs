//! Uniform view invocation.

use std::sync::Arc;

use tracing::Instrument;

use utkik_core::logging::dispatch_span;
use utkik_core::{DispatchError, UtkikResult};
use utkik_http::{HttpRequest, HttpResponse};

use crate::handle::LazyHandle;
use crate::render::TemplateRenderer;
use crate::target::{ViewArgs, ViewTarget};

/// Invokes any [`LazyHandle`] the same way, whatever kind of view it names.
///
/// Class-based views get a fresh instance per call; function views are called
/// directly. Errors raised while the view runs come back as
/// [`UtkikError::Dispatch`](utkik_core::UtkikError::Dispatch), naming the view.
/// Errors from resolving the handle are returned as they are.
#[derive(Clone)]
pub struct ViewInvoker {
    renderer: Arc<dyn TemplateRenderer>,
}

impl std::fmt::Debug for ViewInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewInvoker").finish_non_exhaustive()
    }
}

impl ViewInvoker {
    /// Creates an invoker whose class-based views render through `renderer`.
    pub fn new(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { renderer }
    }

    /// The renderer handed to class-based views.
    pub fn renderer(&self) -> &Arc<dyn TemplateRenderer> {
        &self.renderer
    }

    /// Resolves `handle` if needed and runs the view.
    pub async fn invoke(
        &self,
        handle: &LazyHandle,
        request: HttpRequest,
        args: ViewArgs,
    ) -> UtkikResult<HttpResponse> {
        let view = handle.target()?;
        let qualified = format!("{}.{}", view.module, view.name);
        let span = dispatch_span(&qualified, request.method().as_str());

        let result = async {
            match &view.target {
                ViewTarget::Dispatchable(class) => {
                    let mut instance = class.instantiate(&self.renderer);
                    instance.dispatch(request, args).await
                }
                ViewTarget::DirectCallable(func) => func.call(request, args).await,
            }
        }
        .instrument(span)
        .await;

        result.map_err(|err| {
            tracing::warn!(view = %qualified, error = %err, "view raised an error");
            DispatchError::new(view.module.as_str(), view.name.as_str(), err).into()
        })
    }
}
