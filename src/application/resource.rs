//! Resource - 可导入资源与资源处理器
//!
//! 资源携带显式的类型标签（`ResourceKind`），`App::import` 按标签把资源
//! 分派给已注册的处理器。内置两种处理器：
//!
//! - `middleware_handler`：执行 `create`，把中间件适配后登记到注册表
//! - `router_handler`：实例化控制器并把它的路由注册到路由器

use axum::BoxError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::app::App;
use super::error::AppError;
use super::middleware::{adapt, normalize_name, Middleware, MiddlewareFactory};
use super::router::{register_controller, Controller};

/// 资源类型标签
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Middleware,
    Router,
    Custom(String),
}

impl ResourceKind {
    pub const MIDDLEWARE: &'static str = "Middleware";
    pub const ROUTER: &'static str = "Router";

    pub fn tag(&self) -> &str {
        match self {
            ResourceKind::Middleware => Self::MIDDLEWARE,
            ResourceKind::Router => Self::ROUTER,
            ResourceKind::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 延迟构造的中间件
pub trait MiddlewareInstaller: Send {
    /// 构造实例、执行一次 `create`，并返回适配后的工厂
    fn install<'a>(self: Box<Self>, app: &'a App) -> BoxFuture<'a, Result<MiddlewareFactory, BoxError>>;
}

/// 延迟构造的控制器
pub trait ControllerMount: Send {
    /// 构造实例并注册路由，返回注册的路由数
    fn mount(self: Box<Self>, app: &mut App) -> Result<usize, AppError>;
}

struct MiddlewareSource<M, F> {
    factory: F,
    _marker: PhantomData<fn() -> M>,
}

impl<M, F> MiddlewareInstaller for MiddlewareSource<M, F>
where
    M: Middleware,
    F: FnOnce(&App) -> M + Send + 'static,
{
    fn install<'a>(self: Box<Self>, app: &'a App) -> BoxFuture<'a, Result<MiddlewareFactory, BoxError>> {
        let instance = Arc::new((self.factory)(app));
        async move {
            instance.create(app).await?;
            Ok(adapt(instance))
        }
        .boxed()
    }
}

struct ControllerSource<C>(PhantomData<fn() -> C>);

impl<C: Controller> ControllerMount for ControllerSource<C> {
    fn mount(self: Box<Self>, app: &mut App) -> Result<usize, AppError> {
        let instance = C::new(app);
        register_controller(instance, app)
    }
}

/// 资源内容
pub enum Payload {
    Middleware(Box<dyn MiddlewareInstaller>),
    Router(Box<dyn ControllerMount>),
    Value(Arc<dyn Any + Send + Sync>),
}

/// 一个可导入的资源
pub struct Resource {
    name: String,
    kind: ResourceKind,
    payload: Payload,
}

impl Resource {
    /// 中间件资源，名称取类型名
    pub fn middleware<M, F>(factory: F) -> Self
    where
        M: Middleware,
        F: FnOnce(&App) -> M + Send + 'static,
    {
        Self {
            name: short_type_name::<M>().to_string(),
            kind: ResourceKind::Middleware,
            payload: Payload::Middleware(Box::new(MiddlewareSource {
                factory,
                _marker: PhantomData,
            })),
        }
    }

    /// 控制器资源，名称取类型名
    pub fn router<C: Controller>() -> Self {
        Self {
            name: short_type_name::<C>().to_string(),
            kind: ResourceKind::Router,
            payload: Payload::Router(Box::new(ControllerSource::<C>(PhantomData))),
        }
    }

    /// 自定义标签的资源，交给同标签的处理器
    pub fn custom<T>(tag: impl Into<String>, name: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            name: name.into(),
            kind: ResourceKind::Custom(tag.into()),
            payload: Payload::Value(Arc::new(value)),
        }
    }

    /// 覆盖资源名称
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn into_parts(self) -> (String, ResourceKind, Payload) {
        (self.name, self.kind, self.payload)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// 处理器返回值
pub enum Imported {
    Middleware {
        name: String,
        factory: MiddlewareFactory,
    },
    Router {
        name: String,
        routes: usize,
    },
    Value(Arc<dyn Any + Send + Sync>),
    Unit,
}

impl fmt::Debug for Imported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imported::Middleware { name, .. } => {
                f.debug_struct("Middleware").field("name", name).finish()
            }
            Imported::Router { name, routes } => f
                .debug_struct("Router")
                .field("name", name)
                .field("routes", routes)
                .finish(),
            Imported::Value(_) => f.write_str("Value(..)"),
            Imported::Unit => f.write_str("Unit"),
        }
    }
}

/// 资源处理器
pub type ResourceHandler = Arc<
    dyn for<'a> Fn(Resource, &'a mut App) -> BoxFuture<'a, Result<Imported, AppError>>
        + Send
        + Sync,
>;

/// 中间件处理器
pub fn middleware_handler(
    resource: Resource,
    app: &mut App,
) -> BoxFuture<'_, Result<Imported, AppError>> {
    async move {
        let (name, _, payload) = resource.into_parts();
        let Payload::Middleware(installer) = payload else {
            return Err(AppError::InvalidResource {
                name,
                expected: ResourceKind::MIDDLEWARE,
            });
        };

        let factory = installer
            .install(&*app)
            .await
            .map_err(|source| AppError::MiddlewareCreate {
                name: name.clone(),
                source,
            })?;

        let name = normalize_name(&name);
        app.register_middleware(name.clone(), factory.clone());
        tracing::info!(middleware = %name, "Middleware registered");

        Ok(Imported::Middleware { name, factory })
    }
    .boxed()
}

/// 路由处理器
pub fn router_handler(
    resource: Resource,
    app: &mut App,
) -> BoxFuture<'_, Result<Imported, AppError>> {
    async move {
        if app.router().is_none() {
            return Err(AppError::RouterMissing);
        }

        let (name, _, payload) = resource.into_parts();
        let Payload::Router(mount) = payload else {
            return Err(AppError::InvalidResource {
                name,
                expected: ResourceKind::ROUTER,
            });
        };

        let routes = mount.mount(app)?;
        tracing::info!(controller = %name, routes, "Controller mounted");

        Ok(Imported::Router { name, routes })
    }
    .boxed()
}

/// 类型名的最后一段（去掉模块路径与泛型参数）
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BasicMiddleware;

    impl Middleware for BasicMiddleware {}

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<BasicMiddleware>(), "BasicMiddleware");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_resource_kind_tags() {
        let resource = Resource::middleware(|_| BasicMiddleware);
        assert_eq!(resource.kind().tag(), "Middleware");
        assert_eq!(resource.name(), "BasicMiddleware");

        let custom = Resource::custom("Job", "Cleanup", 3_u32).named("NightlyCleanup");
        assert_eq!(custom.kind(), &ResourceKind::Custom("Job".to_string()));
        assert_eq!(custom.name(), "NightlyCleanup");
    }
}
