//! Integration tests for the view layer.
//!
//! Walks the full path: route table -> lazy handle -> name resolution with
//! app fallback -> invoker -> guarded `ViewBase` -> render.

use std::error::Error as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde_json::{Map, Value};

use utkik_core::{Settings, UtkikError, UtkikResult};
use utkik_http::{HttpRequest, HttpResponse, JsonResponse};
use utkik_views::guards::Next;
use utkik_views::{
    url, Guard, HandlerContext, HandlerResult, LazyHandle, ModuleLoader, NameResolver,
    RequestGuard, ResolvedView, RouteTable, TemplateRenderer, TeraRenderer, View, ViewArgs,
    ViewInvoker, ViewModule, ViewRegistry,
};

// ── Fixtures ────────────────────────────────────────────────────────

type RenderLog = Arc<Mutex<Vec<(Vec<String>, Map<String, Value>)>>>;

#[derive(Default)]
struct RecordingRenderer {
    calls: RenderLog,
}

impl TemplateRenderer for RecordingRenderer {
    fn render(
        &self,
        _request: &HttpRequest,
        template_names: &[String],
        context: &Map<String, Value>,
    ) -> UtkikResult<HttpResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((template_names.to_vec(), context.clone()));
        Ok(HttpResponse::ok("rendered"))
    }
}

struct CountingLoader {
    registry: ViewRegistry,
    loads: AtomicUsize,
}

impl ModuleLoader for CountingLoader {
    fn load(&self, module_path: &str) -> Option<Arc<ViewModule>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.registry.load(module_path)
    }
}

#[derive(Default)]
struct PostListView;

#[async_trait]
impl View for PostListView {
    fn implemented_methods(&self) -> Vec<Method> {
        vec![Method::GET, Method::DELETE]
    }

    fn template_names(&self) -> Vec<String> {
        vec!["blog/post_list.html".into()]
    }

    async fn get(&mut self, cx: &mut HandlerContext<'_>) -> HandlerResult {
        let category = cx.kwarg("category")?;
        cx.set("category", category);
        cx.set("posts", serde_json::json!(["first", "second"]));
        Ok(None)
    }

    async fn delete(&mut self, cx: &mut HandlerContext<'_>) -> HandlerResult {
        cx.set("deleted", true);
        Ok(Some(HttpResponse::ok("deleted")))
    }
}

fn blog_module() -> ViewModule {
    ViewModule::new("blog.views")
        .view::<PostListView>("PostListView")
        .function("feed", |_request, _args| async {
            Ok(JsonResponse::new(&serde_json::json!(["first", "second"])))
        })
        .value("PAGE_SIZE", serde_json::json!(25))
}

struct Fixture {
    loader: Arc<CountingLoader>,
    resolver: Arc<NameResolver>,
    renderer: Arc<RecordingRenderer>,
    invoker: ViewInvoker,
}

fn fixture() -> Fixture {
    let loader = Arc::new(CountingLoader {
        registry: ViewRegistry::new().with_module(blog_module()),
        loads: AtomicUsize::new(0),
    });
    let settings = Settings {
        installed_apps: vec!["blog".to_string()],
        ..Settings::default()
    };
    let resolver = Arc::new(NameResolver::from_settings(loader.clone(), &settings));
    let renderer = Arc::new(RecordingRenderer::default());
    let invoker = ViewInvoker::new(renderer.clone());
    Fixture {
        loader,
        resolver,
        renderer,
        invoker,
    }
}

fn get(path: &str) -> HttpRequest {
    HttpRequest::builder().method(Method::GET).path(path).build()
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_app_name_falls_back_to_views_and_renders() {
    let fx = fixture();
    let handle = LazyHandle::named("blog.PostListView", Arc::clone(&fx.resolver));

    let response = fx
        .invoker
        .invoke(
            &handle,
            get("/posts/"),
            ViewArgs::new().with_kwarg("category", "rust"),
        )
        .await
        .unwrap();
    assert_eq!(response.text(), "rendered");
    assert_eq!(handle.target().unwrap().module, "blog.views");

    let calls = fx.renderer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (templates, context) = &calls[0];
    assert_eq!(templates, &vec!["blog/post_list.html".to_string()]);
    assert_eq!(context.len(), 2);
    assert_eq!(context["category"], "rust");
    assert_eq!(context["posts"], serde_json::json!(["first", "second"]));
}

#[tokio::test]
async fn test_disallowed_method_is_405_without_handler() {
    let fx = fixture();
    let handle = LazyHandle::named("blog.PostListView", Arc::clone(&fx.resolver));

    // DELETE is implemented but not in the default allowed methods.
    let request = HttpRequest::builder().method(Method::DELETE).path("/posts/").build();
    let response = fx
        .invoker
        .invoke(&handle, request, ViewArgs::new())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get(http::header::ALLOW).unwrap(), "GET");
    assert!(fx.renderer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_key_is_attributed_to_view() {
    let fx = fixture();
    let handle = LazyHandle::named("blog.PostListView", Arc::clone(&fx.resolver));

    let err = fx
        .invoker
        .invoke(&handle, get("/posts/"), ViewArgs::new())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("blog.views.PostListView raised MissingKey"));
    let dispatch = err.as_dispatch().unwrap();
    assert_eq!(dispatch.module(), "blog.views");
    assert_eq!(dispatch.name(), "PostListView");
    assert_eq!(dispatch.kind(), "MissingKey");
    assert!(matches!(dispatch.cause(), UtkikError::MissingKey(key) if key == "category"));
    assert_eq!(err.source().unwrap().to_string(), "Missing key: category");
    assert!(fx.renderer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_resolution_is_memoized_across_handles() {
    let fx = fixture();
    let first = LazyHandle::named("blog.PostListView", Arc::clone(&fx.resolver));
    let second = LazyHandle::named("blog.PostListView", Arc::clone(&fx.resolver));

    first.target().unwrap();
    let loads = fx.loader.loads.load(Ordering::SeqCst);
    // "blog" misses, "blog.views" hits.
    assert_eq!(loads, 2);

    second.target().unwrap();
    first.target().unwrap();
    assert_eq!(fx.loader.loads.load(Ordering::SeqCst), loads);
    assert_eq!(fx.resolver.cache_len(), 1);
}

#[tokio::test]
async fn test_handle_is_reused_across_requests() {
    let fx = fixture();
    let handle = LazyHandle::named("blog.views.feed", Arc::clone(&fx.resolver));
    for _ in 0..3 {
        let response = fx
            .invoker
            .invoke(&handle, get("/feed/"), ViewArgs::new())
            .await
            .unwrap();
        assert_eq!(response.text(), r#"["first","second"]"#);
    }
    assert_eq!(fx.loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_value_export_fails_on_first_invocation() {
    let fx = fixture();
    // Building the table does not resolve anything.
    let table = RouteTable::builder(Arc::clone(&fx.resolver))
        .route(url(r"^size/$", "blog.views.PAGE_SIZE"))
        .build()
        .unwrap();
    assert_eq!(fx.loader.loads.load(Ordering::SeqCst), 0);

    let err = table.dispatch(&fx.invoker, get("/size/")).await.unwrap_err();
    assert!(matches!(err, UtkikError::ImproperlyConfigured(_)));
    assert!(err.to_string().contains("blog.views.PAGE_SIZE"));
}

#[tokio::test]
async fn test_unknown_view_name() {
    let fx = fixture();
    let handle = LazyHandle::named("blog.NoSuchView", Arc::clone(&fx.resolver));
    let err = fx
        .invoker
        .invoke(&handle, get("/"), ViewArgs::new())
        .await
        .unwrap_err();
    match err {
        UtkikError::ViewDoesNotExist { name, reason } => {
            assert_eq!(name, "blog.NoSuchView");
            assert!(reason.contains("'blog'"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── Concurrent first resolution ─────────────────────────────────────

#[test]
fn test_concurrent_first_resolution_is_shared() {
    const WORKERS: usize = 8;

    let fx = fixture();
    let resolver = &fx.resolver;
    let handle = LazyHandle::named("blog.PostListView", Arc::clone(&fx.resolver));
    let handle = &handle;
    let barrier = Barrier::new(WORKERS);
    let barrier = &barrier;

    let (exports, views): (Vec<_>, Vec<&ResolvedView>) = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..WORKERS)
            .map(|_| {
                scope.spawn(move || {
                    barrier.wait();
                    let export = resolver.resolve("blog.PostListView").unwrap();
                    let view = handle.target().unwrap();
                    (export, view)
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).unzip()
    });

    assert_eq!(exports.len(), WORKERS);
    assert!(exports.iter().all(|e| Arc::ptr_eq(e, &exports[0])));
    assert_eq!(exports[0].module, "blog.views");
    assert!(views.iter().all(|v| std::ptr::eq(*v, views[0])));
    assert_eq!(views[0].name, "PostListView");
    assert_eq!(fx.resolver.cache_len(), 1);
    assert!(handle.is_resolved());
}

// ── Guard ordering through a view ───────────────────────────────────

struct Tag {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl RequestGuard for Tag {
    async fn call<'a>(&'a self, request: Arc<HttpRequest>, next: Next<'a>) -> UtkikResult<HttpResponse> {
        self.log.lock().unwrap().push(self.label);
        next(request).await
    }
}

struct GuardedView {
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl View for GuardedView {
    fn implemented_methods(&self) -> Vec<Method> {
        vec![Method::GET]
    }

    fn requires_ajax(&self) -> bool {
        true
    }

    fn guards(&self) -> Vec<Guard> {
        vec![
            Guard::user(Tag {
                label: "g1",
                log: Arc::clone(&self.log),
            }),
            Guard::user(Tag {
                label: "g2",
                log: Arc::clone(&self.log),
            }),
        ]
    }

    async fn get(&mut self, _cx: &mut HandlerContext<'_>) -> HandlerResult {
        self.log.lock().unwrap().push("handler");
        Ok(Some(HttpResponse::ok("guarded")))
    }
}

#[tokio::test]
async fn test_user_guards_run_before_ajax_and_method_checks() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let renderer: Arc<dyn TemplateRenderer> = Arc::new(RecordingRenderer::default());

    let mut view = utkik_views::ViewBase::new(GuardedView { log: Arc::clone(&log) }, Arc::clone(&renderer));
    let response = view.dispatch(get("/"), ViewArgs::new()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(*log.lock().unwrap(), vec!["g1", "g2"]);

    log.lock().unwrap().clear();
    let mut view = utkik_views::ViewBase::new(GuardedView { log: Arc::clone(&log) }, Arc::clone(&renderer));
    let request = HttpRequest::builder().method(Method::POST).ajax().build();
    let response = view.dispatch(request, ViewArgs::new()).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(*log.lock().unwrap(), vec!["g1", "g2"]);

    log.lock().unwrap().clear();
    let mut view = utkik_views::ViewBase::new(GuardedView { log: Arc::clone(&log) }, renderer);
    let request = HttpRequest::builder().ajax().build();
    let response = view.dispatch(request, ViewArgs::new()).await.unwrap();
    assert_eq!(response.text(), "guarded");
    assert_eq!(*log.lock().unwrap(), vec!["g1", "g2", "handler"]);
}

// ── Routing with Tera templates on disk ─────────────────────────────

#[tokio::test]
async fn test_route_table_with_tera_templates() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("blog")).unwrap();
    std::fs::write(
        dir.path().join("blog/post_list.html"),
        "{{ category }}:{% for p in posts %}{{ p }};{% endfor %}",
    )
    .unwrap();

    let settings = Settings {
        installed_apps: vec!["blog".to_string()],
        template_dirs: vec![dir.path().to_path_buf()],
        ..Settings::default()
    };
    let registry = Arc::new(ViewRegistry::new().with_module(blog_module()));
    let resolver = Arc::new(NameResolver::from_settings(registry, &settings));
    let renderer = TeraRenderer::from_settings(&settings).unwrap();
    let invoker = ViewInvoker::new(Arc::new(renderer));

    let blog = RouteTable::builder(Arc::clone(&resolver))
        .prefix("blog")
        .route(url(r"^feed/$", "views:feed").name("feed"))
        .route(url(r"^(?P<category>[a-z]+)/$", "PostListView"))
        .build()
        .unwrap();
    let table = RouteTable::builder(resolver)
        .include(r"^blog/", blog, Some("blog"))
        .build()
        .unwrap();

    let matched = table.resolve("/blog/feed/").unwrap();
    assert_eq!(matched.view_name(), "blog:feed");
    let matched = table.resolve("/blog/rust/").unwrap();
    assert_eq!(matched.view_name(), "blog:post_list_view");

    let response = table.dispatch(&invoker, get("/blog/feed/")).await.unwrap();
    assert_eq!(response.text(), r#"["first","second"]"#);

    let response = table.dispatch(&invoker, get("/blog/rust/")).await.unwrap();
    assert_eq!(response.text(), "rust:first;second;");

    let err = table.dispatch(&invoker, get("/shop/")).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}
