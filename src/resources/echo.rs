//! Echo Router
//!
//! `/prefix/foo` 上每个动词各一条路由，返回命中的动词名。

use axum::Json;
use serde_json::{json, Value};

use crate::application::{App, Controller, RouteTable, Verb};

pub struct EchoRouter;

fn echo(verb: Verb) -> Json<Value> {
    Json(json!({ "verb": verb.as_str() }))
}

impl Controller for EchoRouter {
    fn new(_app: &App) -> Self {
        EchoRouter
    }

    fn base() -> &'static str {
        "/prefix"
    }

    fn routes(table: RouteTable<Self>) -> RouteTable<Self> {
        table
            .get("/foo", |_, _| async { echo(Verb::Get) })
            .using("Timing", Vec::new())
            .put("/foo", |_, _| async { echo(Verb::Put) })
            .delete("/foo", |_, _| async { echo(Verb::Delete) })
            .post("/foo", |_, _| async { echo(Verb::Post) })
            .head("/foo", |_, _| async { echo(Verb::Head) })
            .patch("/foo", |_, _| async { echo(Verb::Patch) })
            .options("/foo", |_, _| async { echo(Verb::Options) })
    }
}
