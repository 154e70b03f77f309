//! Socket Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocketError {
    /// 连接中间件拒绝握手
    #[error("Connection rejected: {0}")]
    Rejected(String),

    #[error("Invalid frame: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
