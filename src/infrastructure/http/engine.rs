//! Axum Engine
//!
//! `WebEngine` 与 `RouterEngine` 的 axum 实现

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::routing::{any, on, MethodRouter};
use axum::Router;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::{format_errors, ErrorFormatter};
use super::middleware::error_logging_middleware;
use crate::application::{AppError, MiddlewareCallback, RouteHandler, RouterEngine, Verb, WebEngine};

const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// 把中间件回调包装为 axum 层
fn callback_layer(router: MethodRouter, callback: MiddlewareCallback) -> MethodRouter {
    router.layer(middleware::from_fn(move |request: Request, next: Next| {
        let callback = callback.clone();
        async move { callback(request, next).await }
    }))
}

/// axum Web 引擎
pub struct AxumEngine {
    middlewares: Vec<MiddlewareCallback>,
    formatter: Option<Arc<ErrorFormatter>>,
    body_limit: usize,
    cors: bool,
}

impl AxumEngine {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
            formatter: None,
            body_limit: DEFAULT_BODY_LIMIT,
            cors: false,
        }
    }

    /// 启用 CORS 层。开启后预检 OPTIONS 请求不会到达路由
    pub fn with_cors(mut self) -> Self {
        self.cors = true;
        self
    }

    /// 启用错误格式化
    pub fn with_error_formatter(mut self, formatter: ErrorFormatter) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }
}

impl Default for AxumEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WebEngine for AxumEngine {
    fn use_middleware(&mut self, middleware: MiddlewareCallback) {
        self.middlewares.push(middleware);
    }

    fn build(&self, routes: Router) -> Router {
        // 后注册的在内层，先注册的先执行
        let mut router = routes;
        for callback in self.middlewares.iter().rev() {
            let callback = callback.clone();
            router = router.layer(middleware::from_fn(move |request: Request, next: Next| {
                let callback = callback.clone();
                async move { callback(request, next).await }
            }));
        }

        if let Some(formatter) = &self.formatter {
            router = router.layer(middleware::from_fn_with_state(
                formatter.clone(),
                format_errors,
            ));
        }

        let router = router
            .layer(DefaultBodyLimit::max(self.body_limit))
            .layer(middleware::from_fn(error_logging_middleware))
            .layer(TraceLayer::new_for_http());

        if !self.cors {
            return router;
        }

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .expose_headers(Any)
            .max_age(std::time::Duration::from_secs(3600));
        router.layer(cors)
    }
}

/// axum 路由器
pub struct AxumRouter {
    router: Router,
    /// 与 axum 内部相同的路径树，注册前校验路径
    paths: matchit::Router<()>,
    registered: Vec<(Verb, String)>,
}

impl AxumRouter {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            paths: matchit::Router::new(),
            registered: Vec::new(),
        }
    }

    fn knows_path(&self, path: &str) -> bool {
        self.registered.iter().any(|(_, existing)| existing == path)
    }

    /// 新路径先插入路径树；参数名冲突、非法通配等在此转为错误
    fn validate_path(&mut self, path: &str) -> Result<(), AppError> {
        if !path.starts_with('/') {
            return Err(AppError::InvalidRoute {
                path: path.to_string(),
                reason: "path must start with `/`".to_string(),
            });
        }
        if self.knows_path(path) {
            return Ok(());
        }
        self.paths
            .insert(path, ())
            .map_err(|e| AppError::InvalidRoute {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// 同一路径上同一动词，或 `All` 与任意动词，视为冲突
    fn conflicts(&self, verb: Verb, path: &str) -> bool {
        self.registered.iter().any(|(existing, existing_path)| {
            existing_path == path
                && (*existing == verb || *existing == Verb::All || verb == Verb::All)
        })
    }
}

impl Default for AxumRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterEngine for AxumRouter {
    fn register(
        &mut self,
        verb: Verb,
        path: &str,
        handler: RouteHandler,
        middleware: Option<MiddlewareCallback>,
    ) -> Result<(), AppError> {
        if self.conflicts(verb, path) {
            return Err(AppError::DuplicateRoute {
                verb,
                path: path.to_string(),
            });
        }
        self.validate_path(path)?;

        let endpoint = move |request: Request| {
            let handler = handler.clone();
            async move { handler(request).await }
        };

        let mut method_router = match verb.method_filter() {
            Some(filter) => on(filter, endpoint),
            None => any(endpoint),
        };
        if let Some(callback) = middleware {
            method_router = callback_layer(method_router, callback);
        }

        let router = std::mem::replace(&mut self.router, Router::new());
        self.router = router.route(path, method_router);
        self.registered.push((verb, path.to_string()));

        Ok(())
    }

    fn registered(&self) -> Vec<(Verb, String)> {
        self.registered.clone()
    }

    fn routes(&self) -> Router {
        self.router.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::HttpError;
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        response::IntoResponse,
    };
    use futures_util::FutureExt;
    use tower::util::ServiceExt;

    fn handler(body: &'static str) -> RouteHandler {
        Arc::new(move |_request: Request| async move { body.into_response() }.boxed())
    }

    fn header_callback(name: &'static str) -> MiddlewareCallback {
        Arc::new(move |request: Request, next: Next| {
            async move {
                let mut response = next.run(request).await;
                let order = response
                    .headers()
                    .get("x-order")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| format!("{name},{v}"))
                    .unwrap_or_else(|| name.to_string());
                response.headers_mut().insert("x-order", order.parse().unwrap());
                Ok::<_, HttpError>(response)
            }
            .boxed()
        })
    }

    async fn send(router: Router, method: &str, uri: &str) -> axum::response::Response {
        let request = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router.oneshot(request).await.unwrap()
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let mut router = AxumRouter::new();
        router.register(Verb::Get, "/foo", handler("a"), None).unwrap();
        router.register(Verb::Post, "/foo", handler("b"), None).unwrap();

        assert!(matches!(
            router.register(Verb::Get, "/foo", handler("c"), None),
            Err(AppError::DuplicateRoute { verb: Verb::Get, .. })
        ));
        assert!(router.register(Verb::All, "/foo", handler("d"), None).is_err());
        assert_eq!(router.registered().len(), 2);
    }

    #[tokio::test]
    async fn test_methods_on_same_path() {
        let mut router = AxumRouter::new();
        router.register(Verb::Get, "/foo", handler("get"), None).unwrap();
        router.register(Verb::Delete, "/foo", handler("delete"), None).unwrap();
        router.register(Verb::All, "/any", handler("any"), None).unwrap();

        let routes = router.routes();
        assert_eq!(send(routes.clone(), "DELETE", "/foo").await.status(), StatusCode::OK);
        assert_eq!(send(routes.clone(), "PUT", "/foo").await.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(send(routes, "PATCH", "/any").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_route_middleware_only_wraps_its_route() {
        let mut router = AxumRouter::new();
        router
            .register(Verb::Get, "/a", handler("a"), Some(header_callback("route")))
            .unwrap();
        router.register(Verb::Get, "/b", handler("b"), None).unwrap();

        let routes = router.routes();
        let wrapped = send(routes.clone(), "GET", "/a").await;
        assert_eq!(wrapped.headers()["x-order"], "route");

        let plain = send(routes, "GET", "/b").await;
        assert!(plain.headers().get("x-order").is_none());
    }

    #[tokio::test]
    async fn test_options_reaches_route_without_cors() {
        let mut router = AxumRouter::new();
        router.register(Verb::Options, "/foo", handler("options"), None).unwrap();

        let request = || {
            http::Request::builder()
                .method("OPTIONS")
                .uri("/foo")
                .header("origin", "http://example.com")
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap()
        };

        let plain = AxumEngine::new().build(router.routes());
        let response = plain.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("access-control-allow-origin").is_none());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"options");

        // 开启 CORS 后预检由该层应答
        let cors = AxumEngine::new().with_cors().build(router.routes());
        let response = cors.oneshot(request()).await.unwrap();
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn test_conflicting_parameter_names_are_rejected() {
        let mut router = AxumRouter::new();
        router.register(Verb::Get, "/items/:id", handler("a"), None).unwrap();

        let err = router
            .register(Verb::Post, "/items/:name", handler("b"), None)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRoute { ref path, .. } if path == "/items/:name"));

        // 同一路径上的其他动词不受影响
        router.register(Verb::Post, "/items/:id", handler("c"), None).unwrap();
        assert_eq!(router.registered().len(), 2);
    }

    #[test]
    fn test_relative_path_is_rejected() {
        let mut router = AxumRouter::new();
        assert!(matches!(
            router.register(Verb::Get, "items", handler("a"), None),
            Err(AppError::InvalidRoute { .. })
        ));
        assert!(router.registered().is_empty());
    }

    #[tokio::test]
    async fn test_global_middlewares_run_in_registration_order() {
        let mut engine = AxumEngine::new();
        engine.use_middleware(header_callback("first"));
        engine.use_middleware(header_callback("second"));

        let mut router = AxumRouter::new();
        router.register(Verb::Get, "/", handler("ok"), None).unwrap();

        let response = send(engine.build(router.routes()), "GET", "/").await;

        // 外层最后写入 header，所以先执行的在最前
        assert_eq!(response.headers()["x-order"], "first,second");
        assert_eq!(engine.middleware_count(), 2);
    }
}
