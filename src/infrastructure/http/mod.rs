//! HTTP Layer - axum 引擎适配
//!
//! - engine: `WebEngine` / `RouterEngine` 实现
//! - error: 按错误类型格式化错误响应
//! - middleware: 状态码日志

pub mod engine;
pub mod error;
pub mod middleware;

pub use engine::{AxumEngine, AxumRouter};
pub use error::{
    format_errors, ErrorCallback, ErrorCatalog, ErrorDefinition, ErrorFormatter,
    ErrorFormatterOptions,
};
pub use middleware::error_logging_middleware;
