//! HTTP Error Formatting
//!
//! 中间件或路由返回的 `HttpError` 会被记录在响应 extensions 中。
//! `format_errors` 按错误类型查找 `ErrorCatalog` 中的定义，把响应重写为：
//!
//! ```json
//! { "status": 400, "errorCode": 12, "userMessage": "...", "developerMessage": "..." }
//! ```
//!
//! 字段优先级：错误定义 > 错误自带的状态码、errorCode、userMessage > 全局默认值。
//! 重写后的响应仍在 extensions 中保留原 `HttpError`。

use std::any::TypeId;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::application::{ErrorBody, HttpError};
use crate::config::ErrorsConfig;

/// 渲染后的回调，可以修改响应体
pub type ErrorCallback = Arc<dyn Fn(&mut ErrorBody) + Send + Sync>;

/// 某类错误的响应定义
#[derive(Clone, Default)]
pub struct ErrorDefinition {
    pub error_code: Option<i64>,
    pub http_status: Option<StatusCode>,
    pub user_message: Option<String>,
    pub callback: Option<ErrorCallback>,
}

impl ErrorDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(mut self, error_code: i64) -> Self {
        self.error_code = Some(error_code);
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = Some(user_message.into());
        self
    }

    pub fn callback(mut self, callback: impl Fn(&mut ErrorBody) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for ErrorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorDefinition")
            .field("error_code", &self.error_code)
            .field("http_status", &self.http_status)
            .field("user_message", &self.user_message)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

struct CatalogEntry {
    type_id: TypeId,
    matches: fn(&HttpError) -> bool,
    definition: ErrorDefinition,
}

fn matches_type<E: StdError + 'static>(error: &HttpError) -> bool {
    error.is::<E>()
}

/// 错误类型到响应定义的映射
#[derive(Default)]
pub struct ErrorCatalog {
    entries: Vec<CatalogEntry>,
}

impl ErrorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为错误类型 `E` 定义响应，重复定义时替换
    pub fn define<E: StdError + 'static>(&mut self, definition: ErrorDefinition) -> &mut Self {
        let type_id = TypeId::of::<E>();
        match self.entries.iter_mut().find(|entry| entry.type_id == type_id) {
            Some(entry) => entry.definition = definition,
            None => self.entries.push(CatalogEntry {
                type_id,
                matches: matches_type::<E>,
                definition,
            }),
        }
        self
    }

    pub fn find(&self, error: &HttpError) -> Option<&ErrorDefinition> {
        self.entries
            .iter()
            .find(|entry| (entry.matches)(error))
            .map(|entry| &entry.definition)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 全局默认值
#[derive(Debug, Clone)]
pub struct ErrorFormatterOptions {
    pub http_status: StatusCode,
    pub user_message: String,
    pub expose_developer_message: bool,
}

impl Default for ErrorFormatterOptions {
    fn default() -> Self {
        Self {
            http_status: StatusCode::INTERNAL_SERVER_ERROR,
            user_message: "Internal error".to_string(),
            expose_developer_message: true,
        }
    }
}

impl From<&ErrorsConfig> for ErrorFormatterOptions {
    fn from(config: &ErrorsConfig) -> Self {
        Self {
            http_status: StatusCode::from_u16(config.http_status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            user_message: config.user_message.clone(),
            expose_developer_message: config.expose_developer_message,
        }
    }
}

/// 错误格式化器
#[derive(Default)]
pub struct ErrorFormatter {
    catalog: ErrorCatalog,
    options: ErrorFormatterOptions,
}

impl ErrorFormatter {
    pub fn new(catalog: ErrorCatalog, options: ErrorFormatterOptions) -> Self {
        Self { catalog, options }
    }

    pub fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }

    /// 生成响应体
    pub fn body(&self, error: &HttpError) -> ErrorBody {
        let definition = self.catalog.find(error);

        let status = definition
            .and_then(|d| d.http_status)
            .or_else(|| error.explicit_status())
            .unwrap_or(self.options.http_status);

        let mut body = ErrorBody {
            status: status.as_u16(),
            error_code: definition
                .and_then(|d| d.error_code)
                .or_else(|| error.error_code()),
            user_message: definition
                .and_then(|d| d.user_message.clone())
                .or_else(|| error.user_message().map(str::to_string))
                .unwrap_or_else(|| self.options.user_message.clone()),
            developer_message: Some(error.to_string()),
        };

        if let Some(callback) = definition.and_then(|d| d.callback.as_ref()) {
            callback(&mut body);
        }

        if !self.options.expose_developer_message {
            body.developer_message = None;
        }

        body
    }

    pub fn render(&self, error: &HttpError) -> Response {
        let body = self.body(error);
        let status = StatusCode::from_u16(body.status).unwrap_or(self.options.http_status);
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(error.clone());
        response
    }
}

/// 错误格式化中间件
pub async fn format_errors(
    State(formatter): State<Arc<ErrorFormatter>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    match response.extensions().get::<HttpError>().cloned() {
        Some(error) => {
            tracing::debug!(error = %error, "Formatting error response");
            formatter.render(&error)
        }
        None => response,
    }
}
