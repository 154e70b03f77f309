//! Infrastructure Layer - 基础设施层
//!
//! 端口的具体实现：axum 引擎与路由器、资源目录、sqlx 数据库、WebSocket 服务

pub mod catalog;
pub mod http;
pub mod persistence;
pub mod socket;

pub use catalog::{Catalog, ModelCatalog, ResourceCatalog};
pub use http::{AxumEngine, AxumRouter, ErrorDefinition, ErrorFormatter};
pub use persistence::{Database, DatabaseError, SyncOptions};
pub use socket::{Connection, Namespace, SocketServer};
