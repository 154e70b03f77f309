//! Wire Frame
//!
//! 实时通道上的 JSON 文本帧：`{"event": "...", "data": ...}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SocketError;

/// 客户端触发服务端事件时使用的保留事件名，事件名取自 `data.action`
pub const EVENT_FRAME: &str = "event";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn parse(text: &str) -> Result<Self, SocketError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_text(&self) -> Result<String, SocketError> {
        Ok(serde_json::to_string(self)?)
    }

    /// `event` 帧携带的动作名
    pub fn action(&self) -> Option<&str> {
        if self.event != EVENT_FRAME {
            return None;
        }
        self.data.get("action").and_then(Value::as_str)
    }
}
