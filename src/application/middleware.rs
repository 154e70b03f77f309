//! Middleware Adapter
//!
//! 把实现了生命周期阶段（`create`、`before`、`handle`、`after`）的类型
//! 适配成 Web 引擎调用约定下的单个回调：
//!
//! 1. `create(app)`：导入时执行一次
//! 2. `before(ctx, params)`
//! 3. `handle(ctx, params)`
//! 4. `after(ctx, params)`
//!
//! 2~4 按请求顺序执行并逐个 await，任一阶段出错则后续阶段不再执行，
//! 错误原样交给 Web 引擎。

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    BoxError,
};
use futures_util::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::app::App;
use super::error::{AppError, HttpError};
use super::ports::MiddlewareCallback;

/// 中间件绑定参数
pub type Params = Vec<Value>;

/// 由绑定参数生成回调的工厂
pub type MiddlewareFactory = Arc<dyn Fn(Params) -> MiddlewareCallback + Send + Sync>;

/// 去掉类型名中的 `Middleware` 标记
pub fn normalize_name(name: &str) -> String {
    name.replacen("Middleware", "", 1)
}

/// 单次请求的中间件上下文
///
/// 持有引擎传入的两个位置参数（请求与后续链），以及目前为止产生的响应。
pub struct Context {
    request: Option<Request>,
    next: Option<Next>,
    response: Option<Response>,
}

impl Context {
    pub fn new(request: Request, next: Next) -> Self {
        Self {
            request: Some(request),
            next: Some(next),
            response: None,
        }
    }

    /// 尚未交给后续链的请求
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_mut()
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    /// 直接给出响应（短路，后续链不再执行）
    pub fn respond(&mut self, response: impl IntoResponse) {
        self.response = Some(response.into_response());
    }

    /// 后续链是否已经执行
    pub fn is_forwarded(&self) -> bool {
        self.next.is_none()
    }

    /// 执行后续链并保存其响应
    pub async fn next(&mut self) -> Result<(), HttpError> {
        match (self.request.take(), self.next.take()) {
            (Some(request), Some(next)) => {
                self.response = Some(next.run(request).await);
                Ok(())
            }
            _ => Err(HttpError::internal("middleware chain already advanced")),
        }
    }

    /// 结束本次调用：若各阶段既没有响应也没有推进后续链，则透传
    async fn finish(mut self) -> Response {
        if let Some(response) = self.response.take() {
            return response;
        }

        match (self.request.take(), self.next.take()) {
            (Some(request), Some(next)) => next.run(request).await,
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("forwarded", &self.is_forwarded())
            .field("responded", &self.response.is_some())
            .finish()
    }
}

/// 中间件生命周期
///
/// 每个阶段都是可选的：未实现的阶段什么也不做。
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn create(&self, _app: &App) -> Result<(), BoxError> {
        Ok(())
    }

    async fn before(&self, _ctx: &mut Context, _params: &[Value]) -> Result<(), HttpError> {
        Ok(())
    }

    async fn handle(&self, _ctx: &mut Context, _params: &[Value]) -> Result<(), HttpError> {
        Ok(())
    }

    async fn after(&self, _ctx: &mut Context, _params: &[Value]) -> Result<(), HttpError> {
        Ok(())
    }
}

/// 把中间件实例适配为回调工厂
pub fn adapt<M: Middleware>(instance: Arc<M>) -> MiddlewareFactory {
    Arc::new(move |params: Params| {
        let instance = instance.clone();
        let params: Arc<[Value]> = params.into();

        let callback: MiddlewareCallback = Arc::new(move |request: Request, next: Next| {
            let instance = instance.clone();
            let params = params.clone();

            async move {
                let mut ctx = Context::new(request, next);
                instance.before(&mut ctx, &params[..]).await?;
                instance.handle(&mut ctx, &params[..]).await?;
                instance.after(&mut ctx, &params[..]).await?;
                Ok::<_, HttpError>(ctx.finish().await)
            }
            .boxed()
        });

        callback
    })
}

/// 已初始化中间件的注册表（规范化名称 -> 工厂）
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, MiddlewareFactory>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, factory: MiddlewareFactory) {
        self.entries.insert(name.into(), factory);
    }

    /// 用绑定参数生成中间件回调
    pub fn build(&self, name: &str, params: Params) -> Result<MiddlewareCallback, AppError> {
        self.entries
            .get(name)
            .map(|factory| factory(params))
            .ok_or_else(|| AppError::MiddlewareNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use std::sync::Mutex;
    use tower::util::ServiceExt;

    /// 记录各阶段调用顺序
    #[derive(Default)]
    struct Journal(Mutex<Vec<&'static str>>);

    impl Journal {
        fn push(&self, stage: &'static str) {
            self.0.lock().unwrap().push(stage);
        }

        fn entries(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    struct HandleOnly(Arc<Journal>);

    #[async_trait]
    impl Middleware for HandleOnly {
        async fn handle(&self, ctx: &mut Context, _params: &[Value]) -> Result<(), HttpError> {
            self.0.push("handle");
            ctx.next().await
        }
    }

    struct FullLifecycle(Arc<Journal>);

    #[async_trait]
    impl Middleware for FullLifecycle {
        async fn before(&self, _ctx: &mut Context, params: &[Value]) -> Result<(), HttpError> {
            if params.first() == Some(&Value::from("deny")) {
                self.0.push("before:deny");
                return Err(HttpError::unauthorized("denied"));
            }
            self.0.push("before");
            Ok(())
        }

        async fn handle(&self, ctx: &mut Context, _params: &[Value]) -> Result<(), HttpError> {
            self.0.push("handle");
            ctx.next().await
        }

        async fn after(&self, ctx: &mut Context, _params: &[Value]) -> Result<(), HttpError> {
            self.0.push("after");
            if let Some(response) = ctx.response_mut() {
                response
                    .headers_mut()
                    .insert("x-after", "1".parse().unwrap());
            }
            Ok(())
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn before(&self, ctx: &mut Context, _params: &[Value]) -> Result<(), HttpError> {
            ctx.respond((StatusCode::IM_A_TEAPOT, "short"));
            Ok(())
        }
    }

    struct Noop;

    impl Middleware for Noop {}

    fn router_with(callback: MiddlewareCallback) -> Router {
        Router::new().route("/", get(|| async { "downstream" })).layer(
            axum::middleware::from_fn(move |request: Request, next: Next| {
                let callback = callback.clone();
                async move { callback(request, next).await }
            }),
        )
    }

    async fn call(router: Router) -> Response {
        let request = http::Request::builder().uri("/").body(Body::empty()).unwrap();
        router.oneshot(request).await.unwrap()
    }

    #[test]
    fn test_normalize_name_strips_suffix() {
        assert_eq!(normalize_name("BasicMiddleware"), "Basic");
        assert_eq!(normalize_name("Timing"), "Timing");
    }

    #[tokio::test]
    async fn test_handle_only_skips_other_stages() {
        let journal = Arc::new(Journal::default());
        let factory = adapt(Arc::new(HandleOnly(journal.clone())));

        let response = call(router_with(factory(vec![]))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(journal.entries(), vec!["handle"]);
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let journal = Arc::new(Journal::default());
        let factory = adapt(Arc::new(FullLifecycle(journal.clone())));

        let response = call(router_with(factory(vec![]))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-after"], "1");
        assert_eq!(journal.entries(), vec!["before", "handle", "after"]);
    }

    #[tokio::test]
    async fn test_before_error_stops_pipeline() {
        let journal = Arc::new(Journal::default());
        let factory = adapt(Arc::new(FullLifecycle(journal.clone())));

        let response = call(router_with(factory(vec![Value::from("deny")]))).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(journal.entries(), vec!["before:deny"]);
    }

    #[tokio::test]
    async fn test_short_circuit_response_is_returned() {
        let factory = adapt(Arc::new(ShortCircuit));
        let response = call(router_with(factory(vec![]))).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_empty_middleware_passes_through() {
        let factory = adapt(Arc::new(Noop));
        let response = call(router_with(factory(vec![]))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_registry_build_unknown_name() {
        let mut registry = MiddlewareRegistry::new();
        registry.insert("Noop", adapt(Arc::new(Noop)));

        assert!(registry.build("Noop", vec![]).is_ok());
        assert!(matches!(
            registry.build("Auth", vec![]),
            Err(AppError::MiddlewareNotFound(name)) if name == "Auth"
        ));
        assert_eq!(registry.names(), vec!["Noop"]);
    }
}
