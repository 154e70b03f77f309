//! Application Shell
//!
//! 持有服务容器、Web 引擎、路由器与资源处理器表。启动阶段以 `&mut App`
//! 装配（设置引擎、导入资源），之后通过 `run` 交给引擎监听。

use axum::Router;
use futures_util::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use super::container::Container;
use super::error::{AppError, LoadError};
use super::middleware::{MiddlewareFactory, MiddlewareRegistry};
use super::ports::{MiddlewareCallback, ResourceLoader, RouterEngine, ServerHandle, WebEngine};
use super::resource::{
    middleware_handler, router_handler, Imported, Resource, ResourceHandler, ResourceKind,
};
use crate::config::ServerConfig;

/// 兜底处理器的标签
pub const DEFAULT_TAG: &str = "default";

/// 未配置加载器时使用：任何路径都找不到
struct NoLoader;

impl ResourceLoader for NoLoader {
    fn load(&self, path: &str) -> Result<Resource, LoadError> {
        Err(LoadError::NotFound(path.to_string()))
    }
}

/// 应用
pub struct App {
    config: ServerConfig,
    di: Arc<Container>,
    engine: Option<Box<dyn WebEngine>>,
    router: Option<Box<dyn RouterEngine>>,
    handlers: Vec<(String, ResourceHandler)>,
    middlewares: MiddlewareRegistry,
    loader: Arc<dyn ResourceLoader>,
    native: Option<ServerHandle>,
}

impl App {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            di: Arc::new(Container::new()),
            engine: None,
            router: None,
            handlers: Vec::new(),
            middlewares: MiddlewareRegistry::new(),
            loader: Arc::new(NoLoader),
            native: None,
        }
    }

    /// 注册内置的 Middleware / Router 处理器
    pub fn with_default_handlers(mut self) -> Self {
        self.add_default_handlers();
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn add_default_handlers(&mut self) -> &mut Self {
        self.add_handler(ResourceKind::MIDDLEWARE, middleware_handler);
        self.add_handler(ResourceKind::ROUTER, router_handler)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // ========================================================================
    // Engine
    // ========================================================================

    /// 设置 Web 引擎，只能设置一次
    pub fn set_engine(&mut self, engine: impl WebEngine + 'static) -> Result<&mut Self, AppError> {
        if self.engine.is_some() {
            return Err(AppError::EngineAlreadySet);
        }
        self.engine = Some(Box::new(engine));
        Ok(self)
    }

    /// 设置路由器，只能设置一次
    pub fn set_router(&mut self, router: impl RouterEngine + 'static) -> Result<&mut Self, AppError> {
        if self.router.is_some() {
            return Err(AppError::RouterAlreadySet);
        }
        self.router = Some(Box::new(router));
        Ok(self)
    }

    pub fn engine(&self) -> Option<&dyn WebEngine> {
        self.engine.as_deref()
    }

    pub fn router(&self) -> Option<&dyn RouterEngine> {
        self.router.as_deref()
    }

    pub fn router_mut(&mut self) -> Option<&mut (dyn RouterEngine + 'static)> {
        self.router.as_deref_mut()
    }

    /// 挂载全局中间件
    pub fn use_middleware(&mut self, middleware: MiddlewareCallback) -> Result<&mut Self, AppError> {
        self.engine
            .as_mut()
            .ok_or(AppError::EngineMissing)?
            .use_middleware(middleware);
        Ok(self)
    }

    // ========================================================================
    // Handlers & import
    // ========================================================================

    /// 注册资源处理器，同一标签重复注册时替换原处理器
    pub fn add_handler<F>(&mut self, tag: impl Into<String>, handler: F) -> &mut Self
    where
        F: for<'a> Fn(Resource, &'a mut App) -> BoxFuture<'a, Result<Imported, AppError>>
            + Send
            + Sync
            + 'static,
    {
        let tag = tag.into();
        let handler: ResourceHandler = Arc::new(handler);

        match self.handlers.iter_mut().find(|(existing, _)| *existing == tag) {
            Some(entry) => entry.1 = handler,
            None => self.handlers.push((tag, handler)),
        }
        self
    }

    /// 已注册的处理器标签（按注册顺序）
    pub fn handler_tags(&self) -> Vec<&str> {
        self.handlers.iter().map(|(tag, _)| tag.as_str()).collect()
    }

    fn handler_for(&self, tag: &str) -> Option<ResourceHandler> {
        self.handlers
            .iter()
            .find(|(existing, _)| existing == tag)
            .map(|(_, handler)| handler.clone())
    }

    /// 按路径加载资源并交给匹配的处理器
    pub async fn import(&mut self, path: &str) -> Result<Imported, AppError> {
        let resource = self.loader.load(path).map_err(|source| AppError::Load {
            path: path.to_string(),
            source,
        })?;

        tracing::debug!(path = %path, name = %resource.name(), kind = %resource.kind(), "Resource loaded");
        self.import_resource(resource).await
    }

    /// 分派已加载的资源：同标签处理器优先，其次 `default`
    pub async fn import_resource(&mut self, resource: Resource) -> Result<Imported, AppError> {
        let handler = self
            .handler_for(resource.kind().tag())
            .or_else(|| self.handler_for(DEFAULT_TAG))
            .ok_or_else(|| AppError::NoHandler(resource.name().to_string()))?;

        handler(resource, self).await
    }

    pub fn middlewares(&self) -> &MiddlewareRegistry {
        &self.middlewares
    }

    pub(crate) fn register_middleware(&mut self, name: String, factory: MiddlewareFactory) {
        self.middlewares.insert(name, factory);
    }

    // ========================================================================
    // Container
    // ========================================================================

    pub fn container(&self) -> &Arc<Container> {
        &self.di
    }

    /// 向容器提供依赖
    pub fn provide<T>(&self, name: impl Into<String>, value: T) -> &Self
    where
        T: Any + Send + Sync,
    {
        self.di.set(name, value);
        self
    }

    pub fn provide_arc<T>(&self, name: impl Into<String>, value: Arc<T>) -> &Self
    where
        T: Any + Send + Sync,
    {
        self.di.set_arc(name, value);
        self
    }

    /// 从容器解析依赖
    pub fn resolve<T>(&self, name: &str) -> Result<Arc<T>, AppError>
    where
        T: Any + Send + Sync,
    {
        Ok(self.di.resolve::<T>(name)?)
    }

    // ========================================================================
    // Serving
    // ========================================================================

    /// 路由器导出的路由（未设置路由器时为空）
    pub fn routes(&self) -> Router {
        self.router
            .as_ref()
            .map(|router| router.routes())
            .unwrap_or_else(Router::new)
    }

    /// 组装完整服务，便于不经监听直接测试
    pub fn service(&self) -> Result<Router, AppError> {
        let engine = self.engine.as_ref().ok_or(AppError::EngineMissing)?;
        Ok(engine.build(self.routes()))
    }

    /// 启动监听，`port` 为空时使用配置端口，返回实际监听地址
    pub async fn run(&mut self, port: Option<u16>) -> Result<SocketAddr, AppError> {
        let engine = self.engine.as_ref().ok_or(AppError::EngineMissing)?;
        let addr = format!("{}:{}", self.config.host, port.unwrap_or(self.config.port));

        let handle = engine.listen(&addr, self.routes()).await?;
        let local_addr = handle.local_addr();
        tracing::info!(addr = %local_addr, "Application listening");

        if let Some(previous) = self.native.replace(handle) {
            previous.shutdown().await?;
        }
        Ok(local_addr)
    }

    /// 运行直到 `signal` 完成，然后优雅关闭
    pub async fn run_with_shutdown<F>(&mut self, port: Option<u16>, signal: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send,
    {
        self.run(port).await?;
        signal.await;
        tracing::info!("Shutdown signal received");
        self.shutdown().await
    }

    /// 原生服务器句柄
    pub fn native(&self) -> Option<&ServerHandle> {
        self.native.as_ref()
    }

    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        if let Some(handle) = self.native.take() {
            handle.shutdown().await?;
            tracing::info!("Application stopped");
        }
        Ok(())
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("engine", &self.engine.is_some())
            .field("router", &self.router.is_some())
            .field("handlers", &self.handler_tags())
            .field("middlewares", &self.middlewares)
            .field("native", &self.native)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::middleware::{Context, Middleware};
    use crate::application::router::{Controller, RouteTable};
    use crate::infrastructure::catalog::ResourceCatalog;
    use crate::infrastructure::http::{
        AxumEngine, AxumRouter, ErrorCatalog, ErrorDefinition, ErrorFormatter,
        ErrorFormatterOptions,
    };
    use crate::application::HttpError;
    use serde_json::Value;
    use axum::{body::Body, extract::Request, http::StatusCode};
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::util::ServiceExt;

    fn app() -> App {
        App::new(ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        })
    }

    struct CountingMiddleware(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Middleware for CountingMiddleware {
        async fn create(&self, _app: &App) -> Result<(), axum::BoxError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("token missing")]
    struct Denied;

    /// 缺少 `x-token` 时在 before 阶段拒绝
    struct TokenGuardMiddleware;

    #[async_trait::async_trait]
    impl Middleware for TokenGuardMiddleware {
        async fn before(&self, ctx: &mut Context, _params: &[Value]) -> Result<(), HttpError> {
            let has_token = ctx
                .request()
                .is_some_and(|request| request.headers().contains_key("x-token"));
            if has_token {
                Ok(())
            } else {
                Err(HttpError::wrap(Denied))
            }
        }
    }

    struct Echo;

    impl Controller for Echo {
        fn new(_app: &App) -> Self {
            Echo
        }

        fn base() -> &'static str {
            "/prefix"
        }

        fn routes(table: RouteTable<Self>) -> RouteTable<Self> {
            table
                .get("/foo", |_, _| async { "get" })
                .post("/foo", |_, _| async { "post" })
        }
    }

    #[test]
    fn test_set_engine_twice_keeps_first() {
        let mut app = app();
        app.set_engine(AxumEngine::new()).unwrap();

        let err = app.set_engine(AxumEngine::new()).unwrap_err();
        assert!(matches!(err, AppError::EngineAlreadySet));
        assert_eq!(err.to_string(), "Cannot override engine");
        assert!(app.engine().is_some());
    }

    #[test]
    fn test_use_middleware_requires_engine() {
        let mut app = app();
        let callback: MiddlewareCallback =
            Arc::new(|request: Request, next: axum::middleware::Next| {
                async move { Ok::<_, crate::application::HttpError>(next.run(request).await) }.boxed()
            });

        assert!(matches!(
            app.use_middleware(callback),
            Err(AppError::EngineMissing)
        ));
    }

    #[test]
    fn test_same_tag_replaces_handler() {
        let mut app = app();
        app.add_handler("Job", |_, _| async { Ok(Imported::Unit) }.boxed());
        app.add_handler("Other", |_, _| async { Ok(Imported::Unit) }.boxed());
        app.add_handler("Job", |_, _| async { Ok(Imported::Unit) }.boxed());

        assert_eq!(app.handler_tags(), vec!["Job", "Other"]);
    }

    #[tokio::test]
    async fn test_import_dispatches_matching_tag_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let fallback = Arc::new(AtomicUsize::new(0));

        let mut app = app();
        let counter = hits.clone();
        app.add_handler("Job", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Imported::Unit) }.boxed()
        });
        let counter = fallback.clone();
        app.add_handler(DEFAULT_TAG, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Imported::Unit) }.boxed()
        });

        app.import_resource(Resource::custom("Job", "Cleanup", ()))
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_import_falls_back_to_default() {
        let mut app = app();
        app.add_handler(DEFAULT_TAG, |resource, _| {
            let name = resource.name().to_string();
            async move { Ok(Imported::Value(Arc::new(name))) }.boxed()
        });

        let imported = app
            .import_resource(Resource::custom("Job", "Cleanup", ()))
            .await
            .unwrap();

        match imported {
            Imported::Value(value) => {
                assert_eq!(value.downcast_ref::<String>().unwrap(), "Cleanup")
            }
            other => panic!("unexpected import result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_import_without_handler_names_resource() {
        let mut app = app();
        let err = app
            .import_resource(Resource::custom("Job", "Cleanup", ()))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "No handler defined for Cleanup");
    }

    #[tokio::test]
    async fn test_import_unknown_path_is_load_error() {
        let mut app = app().with_default_handlers();
        let err = app.import("resources/Missing").await.unwrap_err();

        assert!(matches!(err, AppError::Load { ref path, .. } if path == "resources/Missing"));
    }

    #[tokio::test]
    async fn test_middleware_create_runs_once_at_import() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();

        let mut catalog = ResourceCatalog::new();
        catalog.register("middleware/Counting", move || {
            let counter = counter.clone();
            Resource::middleware(move |_| CountingMiddleware(counter))
        });

        let mut app = app()
            .with_loader(Arc::new(catalog))
            .with_default_handlers();
        app.set_engine(AxumEngine::new()).unwrap();

        let imported = app.import("middleware/Counting").await.unwrap();
        assert!(matches!(imported, Imported::Middleware { ref name, .. } if name == "Counting"));
        assert!(app.middlewares().contains("Counting"));

        let callback = app.middlewares().build("Counting", vec![]).unwrap();
        app.use_middleware(callback).unwrap();

        let service = app.service().unwrap();
        for _ in 0..3 {
            let request = http::Request::builder().uri("/").body(Body::empty()).unwrap();
            service.clone().oneshot(request).await.unwrap();
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_router_import_requires_router() {
        let mut app = app().with_default_handlers();
        let err = app.import_resource(Resource::router::<Echo>()).await.unwrap_err();
        assert!(matches!(err, AppError::RouterMissing));
    }

    #[tokio::test]
    async fn test_router_import_registers_routes() {
        let mut app = app().with_default_handlers();
        app.set_engine(AxumEngine::new()).unwrap();
        app.set_router(AxumRouter::new()).unwrap();

        let imported = app.import_resource(Resource::router::<Echo>()).await.unwrap();
        assert!(matches!(imported, Imported::Router { routes: 2, .. }));

        let request = http::Request::builder()
            .method("POST")
            .uri("/prefix/foo")
            .body(Body::empty())
            .unwrap();
        let response = app.service().unwrap().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_before_error_is_formatted_by_engine() {
        let mut catalog = ErrorCatalog::new();
        catalog.define::<Denied>(
            ErrorDefinition::new()
                .code(4031)
                .status(StatusCode::FORBIDDEN)
                .message("Access denied"),
        );
        let formatter = ErrorFormatter::new(
            catalog,
            ErrorFormatterOptions {
                expose_developer_message: false,
                ..ErrorFormatterOptions::default()
            },
        );

        let mut resources = ResourceCatalog::new();
        resources.register("middleware/TokenGuard", || {
            Resource::middleware(|_| TokenGuardMiddleware)
        });

        let mut app = app()
            .with_loader(Arc::new(resources))
            .with_default_handlers();
        app.set_engine(AxumEngine::new().with_error_formatter(formatter))
            .unwrap();
        app.set_router(AxumRouter::new()).unwrap();
        app.import("middleware/TokenGuard").await.unwrap();
        app.import_resource(Resource::router::<Echo>()).await.unwrap();

        let callback = app.middlewares().build("TokenGuard", vec![]).unwrap();
        app.use_middleware(callback).unwrap();
        let service = app.service().unwrap();

        let denied = service
            .clone()
            .oneshot(http::Request::get("/prefix/foo").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert!(denied.extensions().get::<HttpError>().is_some());

        let body = axum::body::to_bytes(denied.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], 403);
        assert_eq!(body["errorCode"], 4031);
        assert_eq!(body["userMessage"], "Access denied");
        assert!(body["developerMessage"].is_null());

        let allowed = service
            .oneshot(
                http::Request::get("/prefix/foo")
                    .header("x-token", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[test]
    fn test_provide_and_resolve() {
        let app = app();
        app.provide("app.name", "inra".to_string());

        assert_eq!(*app.resolve::<String>("app.name").unwrap(), "inra");
        assert!(matches!(
            app.resolve::<u32>("app.name"),
            Err(AppError::Container(_))
        ));
    }

    #[tokio::test]
    async fn test_run_requires_engine() {
        let mut app = app();
        assert!(matches!(app.run(None).await, Err(AppError::EngineMissing)));
    }
}
