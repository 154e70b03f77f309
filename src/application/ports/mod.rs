//! Application Ports - 出站端口定义
//!
//! 定义应用层与外部引擎（Web 框架、数据库、资源加载）之间的抽象接口

mod model;
mod resource_loader;
mod web_engine;

pub use model::{Association, AssociationKind, Dialect, Model, ModelLoader, Models};
pub use resource_loader::ResourceLoader;
pub use web_engine::{
    MiddlewareCallback, RouteHandler, RouterEngine, ServerHandle, Verb, WebEngine,
};
