//! Router Adapter
//!
//! 控制器用 `RouteTable` 流式声明路由：
//!
//! ```ignore
//! impl Controller for UsersController {
//!     fn base() -> &'static str { "/users" }
//!     fn routes(table: RouteTable<Self>) -> RouteTable<Self> {
//!         table
//!             .get("/:id", Self::show)
//!             .using("Auth", vec![json!("admin")])
//!     }
//! }
//! ```
//!
//! 注册时所有路由共享同一个控制器实例。

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::Arc;

use super::app::App;
use super::error::AppError;
use super::middleware::{MiddlewareRegistry, Params};
use super::ports::{MiddlewareCallback, RouteHandler, Verb};
use super::resource::short_type_name;

/// 路由级中间件的组合函数，注册时对照中间件注册表求值
pub type MiddlewareComposer =
    Arc<dyn Fn(&MiddlewareRegistry) -> Result<MiddlewareCallback, AppError> + Send + Sync>;

type Action<C> = Arc<dyn Fn(Arc<C>, Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// 控制器
pub trait Controller: Send + Sync + Sized + 'static {
    fn new(app: &App) -> Self;

    /// 路由前缀
    fn base() -> &'static str {
        "/"
    }

    fn routes(table: RouteTable<Self>) -> RouteTable<Self>;
}

/// 单条路由声明
pub struct RouteDescriptor<C> {
    pub verb: Verb,
    pub path: String,
    action: Action<C>,
    middleware: Option<MiddlewareComposer>,
}

impl<C> RouteDescriptor<C> {
    pub fn has_middleware(&self) -> bool {
        self.middleware.is_some()
    }
}

/// 控制器的路由表
pub struct RouteTable<C> {
    routes: Vec<RouteDescriptor<C>>,
}

impl<C: Send + Sync + 'static> RouteTable<C> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn route<F, Fut, R>(mut self, verb: Verb, path: &str, action: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        let action: Action<C> = Arc::new(move |instance: Arc<C>, request: Request| {
            let fut = action(instance, request);
            async move { fut.await.into_response() }.boxed()
        });

        self.routes.push(RouteDescriptor {
            verb,
            path: path.to_string(),
            action,
            middleware: None,
        });
        self
    }

    pub fn all<F, Fut, R>(self, path: &str, action: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Verb::All, path, action)
    }

    pub fn get<F, Fut, R>(self, path: &str, action: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Verb::Get, path, action)
    }

    pub fn put<F, Fut, R>(self, path: &str, action: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Verb::Put, path, action)
    }

    pub fn delete<F, Fut, R>(self, path: &str, action: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Verb::Delete, path, action)
    }

    pub fn post<F, Fut, R>(self, path: &str, action: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Verb::Post, path, action)
    }

    pub fn head<F, Fut, R>(self, path: &str, action: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Verb::Head, path, action)
    }

    pub fn patch<F, Fut, R>(self, path: &str, action: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Verb::Patch, path, action)
    }

    pub fn options<F, Fut, R>(self, path: &str, action: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Verb::Options, path, action)
    }

    /// 给上一条路由绑定已注册的中间件
    pub fn using(self, name: &str, params: Params) -> Self {
        let name = name.to_string();
        self.using_with(move |registry| registry.build(&name, params.clone()))
    }

    /// 给上一条路由绑定自定义的中间件组合
    pub fn using_with<F>(mut self, composer: F) -> Self
    where
        F: Fn(&MiddlewareRegistry) -> Result<MiddlewareCallback, AppError> + Send + Sync + 'static,
    {
        if let Some(last) = self.routes.last_mut() {
            last.middleware = Some(Arc::new(composer));
        }
        self
    }

    pub fn descriptors(&self) -> &[RouteDescriptor<C>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<C: Send + Sync + 'static> Default for RouteTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// 拼接路径段
///
/// 每段去掉首尾空白和各一个首尾 `/`，丢弃空段，以 `/` 连接并加前导 `/`。
pub fn join_paths(segments: &[&str]) -> String {
    let parts: Vec<&str> = segments
        .iter()
        .map(|segment| {
            let segment = segment.trim();
            let segment = segment.strip_prefix('/').unwrap_or(segment);
            segment.strip_suffix('/').unwrap_or(segment)
        })
        .filter(|segment| !segment.is_empty())
        .collect();

    format!("/{}", parts.join("/"))
}

/// 把控制器的路由注册到 App 的路由器，返回注册的路由数
pub fn register_controller<C: Controller>(instance: C, app: &mut App) -> Result<usize, AppError> {
    let table = C::routes(RouteTable::new());
    let instance = Arc::new(instance);
    let controller = short_type_name::<C>();
    let mut count = 0;

    for descriptor in table.routes {
        let path = join_paths(&[C::base(), &descriptor.path]);
        let middleware = descriptor
            .middleware
            .map(|compose| compose(app.middlewares()))
            .transpose()?;

        let bound = instance.clone();
        let action = descriptor.action;
        let handler: RouteHandler = Arc::new(move |request: Request| action(bound.clone(), request));

        app.router_mut()
            .ok_or(AppError::RouterMissing)?
            .register(descriptor.verb, &path, handler, middleware)?;

        tracing::debug!(
            controller,
            verb = %descriptor.verb,
            path = %path,
            "Route registered"
        );
        count += 1;
    }

    Ok(count)
}
