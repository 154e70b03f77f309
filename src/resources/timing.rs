//! Timing Middleware
//!
//! 给响应加上 `x-response-time` 头（毫秒）。

use std::time::Instant;

use async_trait::async_trait;
use axum::http::HeaderValue;
use serde_json::Value;

use crate::application::{Context, HttpError, Middleware};

pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

pub struct TimingMiddleware;

#[async_trait]
impl Middleware for TimingMiddleware {
    async fn handle(&self, ctx: &mut Context, _params: &[Value]) -> Result<(), HttpError> {
        let started = Instant::now();
        ctx.next().await?;

        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        if let (Some(response), Ok(value)) = (
            ctx.response_mut(),
            HeaderValue::from_str(&format!("{elapsed:.3}ms")),
        ) {
            response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
        }
        Ok(())
    }
}
