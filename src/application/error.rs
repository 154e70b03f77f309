//! 应用层错误定义
//!
//! - `AppError`: 启动/装配阶段的配置错误
//! - `LoadError`: 资源加载错误
//! - `HttpError`: 请求阶段由中间件或路由抛出、交给 Web 引擎处理的错误

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    BoxError, Json,
};
use serde::Serialize;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

use super::container::ContainerError;
use super::ports::Verb;

/// 资源加载错误
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource factory failed: {0}")]
    Factory(String),
}

/// 应用层错误
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cannot override engine")]
    EngineAlreadySet,

    #[error("Cannot override router")]
    RouterAlreadySet,

    #[error("Server engine not specified")]
    EngineMissing,

    #[error("Router engine not specified")]
    RouterMissing,

    /// 没有任何 handler（包括 default）能处理该资源
    #[error("No handler defined for {0}")]
    NoHandler(String),

    /// 加载失败，保留底层原因
    #[error("Could not load file {path}")]
    Load {
        path: String,
        #[source]
        source: LoadError,
    },

    #[error("Middleware not registered: {0}")]
    MiddlewareNotFound(String),

    #[error("Middleware {name} failed to initialise: {source}")]
    MiddlewareCreate {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Resource {name} cannot be handled as {expected}")]
    InvalidResource { name: String, expected: &'static str },

    #[error("Route already registered: {verb} {path}")]
    DuplicateRoute { verb: Verb, path: String },

    /// 路径无法插入路由树（参数名冲突、非法通配符等）
    #[error("Invalid route {path}: {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("Unknown verb: {0}")]
    UnknownVerb(String),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 统一错误响应体
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: u16,
    pub error_code: Option<i64>,
    pub user_message: String,
    pub developer_message: Option<String>,
}

/// 请求错误
///
/// 中间件阶段或路由处理函数返回的错误。转换为响应时会把自身放入
/// 响应 extensions，供错误格式化中间件按错误类型重新渲染。
///
/// 错误本身可携带 `errorCode` 与 `userMessage`，错误目录中的定义优先。
#[derive(Debug, Clone, Error)]
#[error("{inner}")]
pub struct HttpError {
    status: Option<StatusCode>,
    error_code: Option<i64>,
    user_message: Option<String>,
    #[source]
    inner: Arc<dyn StdError + Send + Sync>,
}

impl HttpError {
    /// 带明确状态码的错误
    pub fn new(status: StatusCode, error: impl Into<BoxError>) -> Self {
        Self {
            status: Some(status),
            error_code: None,
            user_message: None,
            inner: Arc::from(error.into()),
        }
    }

    /// 未指定状态码的错误，状态码由错误格式化配置决定
    pub fn wrap(error: impl Into<BoxError>) -> Self {
        Self {
            status: None,
            error_code: None,
            user_message: None,
            inner: Arc::from(error.into()),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.error_code = Some(code);
        self
    }

    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    pub fn error_code(&self) -> Option<i64> {
        self.error_code
    }

    pub fn user_message(&self) -> Option<&str> {
        self.user_message.as_deref()
    }

    /// 明确指定的状态码
    pub fn explicit_status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    /// 判断底层错误类型
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.inner.is::<E>()
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.inner.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let body = ErrorBody {
            status: status.as_u16(),
            error_code: self.error_code,
            user_message: self.user_message.clone().unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Internal error")
                    .to_string()
            }),
            developer_message: Some(message),
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}
