//! Bundled Resources
//!
//! 随二进制一起注册的中间件、控制器和模型：
//! - `middlewares/timing`: 响应耗时头
//! - `routers/echo`: `/prefix/foo` 动词回显
//! - `routers/ping`: 健康检查
//! - `models/user`, `models/blog_post`

pub mod echo;
pub mod models;
pub mod ping;
pub mod timing;

pub use echo::EchoRouter;
pub use models::{BlogPostModel, UserModel};
pub use ping::{PingResponse, PingRouter, APP_NAME_KEY};
pub use timing::{TimingMiddleware, RESPONSE_TIME_HEADER};

use std::sync::Arc;

use crate::application::{Model, Resource};
use crate::infrastructure::{ModelCatalog, ResourceCatalog};

/// 资源导入顺序：中间件需先于引用它的控制器
pub const RESOURCE_PATHS: [&str; 3] = ["middlewares/timing", "routers/echo", "routers/ping"];

pub const MODEL_PATHS: [&str; 2] = ["models/user", "models/blog_post"];

pub fn catalog() -> ResourceCatalog {
    let mut catalog = ResourceCatalog::new();
    catalog
        .register("middlewares/timing", || {
            Resource::middleware(|_| TimingMiddleware)
        })
        .register("routers/echo", Resource::router::<EchoRouter>)
        .register("routers/ping", Resource::router::<PingRouter>);
    catalog
}

pub fn models() -> ModelCatalog {
    let mut catalog = ModelCatalog::new();
    catalog
        .register("models/user", || Arc::new(UserModel) as Arc<dyn Model>)
        .register("models/blog_post", || Arc::new(BlogPostModel) as Arc<dyn Model>);
    catalog
}
