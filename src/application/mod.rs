//! 应用层
//!
//! 包含：
//! - container: 依赖注入容器
//! - middleware: 中间件生命周期适配
//! - router: 控制器路由声明与注册
//! - resource: 可导入资源与内置处理器
//! - app: 应用外壳
//! - ports: Web 引擎、路由器、资源/模型加载等端口
//! - error: 应用层错误定义

pub mod app;
pub mod container;
pub mod error;
pub mod middleware;
pub mod ports;
pub mod resource;
pub mod router;

pub use app::{App, DEFAULT_TAG};
pub use container::{Container, ContainerError};
pub use error::{AppError, ErrorBody, HttpError, LoadError};
pub use middleware::{
    adapt, normalize_name, Context, Middleware, MiddlewareFactory, MiddlewareRegistry, Params,
};
pub use ports::{
    Association, AssociationKind, Dialect, MiddlewareCallback, Model, ModelLoader, Models,
    ResourceLoader, RouteHandler, RouterEngine, ServerHandle, Verb, WebEngine,
};
pub use resource::{
    middleware_handler, router_handler, Imported, Payload, Resource, ResourceHandler, ResourceKind,
};
pub use router::{join_paths, register_controller, Controller, MiddlewareComposer, RouteTable};
