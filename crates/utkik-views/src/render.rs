//! The template rendering seam.
//!
//! Views that only populate context fall back to rendering it. The view layer
//! does not own a template engine; it talks to a [`TemplateRenderer`]. The
//! shipped implementation, [`TeraRenderer`], renders with Tera.

use std::path::Path;

use serde_json::{Map, Value};
use tera::Tera;

use utkik_core::{Settings, UtkikError, UtkikResult};
use utkik_http::{HttpRequest, HttpResponse};

/// Renders a template with a context into a response.
pub trait TemplateRenderer: Send + Sync {
    /// Renders the first template in `template_names` that exists.
    ///
    /// Fails with [`UtkikError::TemplateDoesNotExist`] if none of them do.
    fn render(
        &self,
        request: &HttpRequest,
        template_names: &[String],
        context: &Map<String, Value>,
    ) -> UtkikResult<HttpResponse>;
}

/// A [`TemplateRenderer`] backed by a Tera instance.
///
/// The request path is available to templates as `request_path`.
///
/// # Examples
///
/// ```
/// use utkik_views::render::{TemplateRenderer, TeraRenderer};
/// use utkik_http::HttpRequest;
///
/// let mut renderer = TeraRenderer::default();
/// renderer.add_raw_template("hello.html", "Hello {{ name }}").unwrap();
///
/// let mut context = serde_json::Map::new();
/// context.insert("name".into(), "world".into());
/// let request = HttpRequest::builder().build();
/// let response = renderer.render(&request, &["hello.html".into()], &context).unwrap();
/// assert_eq!(response.text(), "Hello world");
/// ```
#[derive(Debug, Default)]
pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    /// Wraps an existing Tera instance.
    pub const fn new(tera: Tera) -> Self {
        Self { tera }
    }

    /// Loads every template under `dir`, named by their path relative to it.
    pub fn from_dir(dir: impl AsRef<Path>) -> UtkikResult<Self> {
        let mut renderer = Self::default();
        renderer.load_dir(dir)?;
        Ok(renderer)
    }

    /// Loads templates from each directory in `settings.template_dirs`.
    /// On name clashes the earlier directory wins.
    pub fn from_settings(settings: &Settings) -> UtkikResult<Self> {
        let mut renderer = Self::default();
        for dir in &settings.template_dirs {
            renderer.load_dir(dir)?;
        }
        Ok(renderer)
    }

    fn load_dir(&mut self, dir: impl AsRef<Path>) -> UtkikResult<()> {
        let glob = format!("{}/**/*", dir.as_ref().display());
        let loaded = Tera::new(&glob).map_err(template_error)?;
        tracing::debug!(
            dir = %dir.as_ref().display(),
            count = loaded.get_template_names().count(),
            "loaded templates"
        );
        self.tera.extend(&loaded).map_err(template_error)
    }

    /// Adds a template from a string.
    pub fn add_raw_template(&mut self, name: &str, content: &str) -> UtkikResult<()> {
        self.tera
            .add_raw_template(name, content)
            .map_err(template_error)
    }

    /// Returns `true` if a template with this name is loaded.
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }
}

impl TemplateRenderer for TeraRenderer {
    fn render(
        &self,
        request: &HttpRequest,
        template_names: &[String],
        context: &Map<String, Value>,
    ) -> UtkikResult<HttpResponse> {
        let name = template_names
            .iter()
            .find(|name| self.has_template(name))
            .ok_or_else(|| UtkikError::TemplateDoesNotExist(template_names.join(", ")))?;

        let mut tera_context = tera::Context::from_serialize(context).map_err(template_error)?;
        tera_context.insert("request_path", request.path());

        tracing::debug!(template = %name, "rendering template");
        let html = self.tera.render(name, &tera_context).map_err(template_error)?;
        Ok(HttpResponse::ok(html))
    }
}

fn template_error(err: tera::Error) -> UtkikError {
    use std::error::Error as _;

    // Tera keeps the useful detail in the source chain.
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    UtkikError::TemplateError(message)
}
