//! Inra - 可插拔的 Web 应用骨架
//!
//! 分层结构:
//!
//! 应用层 (application/):
//! - Container: 依赖注入容器
//! - Middleware / Router 适配器：生命周期中间件、控制器路由表
//! - App: 资源导入、处理器分派、引擎与路由器组装
//! - Ports: WebEngine, RouterEngine, ResourceLoader, ModelLoader
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: axum 引擎、路由器与错误格式化
//! - Catalog: 资源与模型目录
//! - Persistence: sqlx 数据库外壳
//! - Socket: WebSocket 命名空间与事件
//!
//! 内置资源 (resources/): timing 中间件、echo / ping 控制器、示例模型

pub mod application;
pub mod config;
pub mod infrastructure;
pub mod resources;

pub use application::{App, AppError, Container, HttpError};
pub use config::{load_config, AppConfig};
