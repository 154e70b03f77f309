//! Ping Router
//!
//! 健康检查：`GET /api/ping`

use std::sync::Arc;

use axum::{extract::Request, Json};
use serde::Serialize;

use crate::application::{App, Controller, RouteTable};

/// 容器中应用名的键
pub const APP_NAME_KEY: &str = "app.name";

/// Ping 响应
#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub name: String,
    pub version: &'static str,
}

pub struct PingRouter {
    name: String,
}

impl PingRouter {
    async fn ping(self: Arc<Self>, _request: Request) -> Json<PingResponse> {
        Json(PingResponse {
            status: "ok",
            name: self.name.clone(),
            version: env!("CARGO_PKG_VERSION"),
        })
    }
}

impl Controller for PingRouter {
    fn new(app: &App) -> Self {
        Self {
            name: app
                .container()
                .get(APP_NAME_KEY, env!("CARGO_PKG_NAME").to_string()),
        }
    }

    fn base() -> &'static str {
        "/api"
    }

    fn routes(table: RouteTable<Self>) -> RouteTable<Self> {
        table.get("/ping", Self::ping)
    }
}
