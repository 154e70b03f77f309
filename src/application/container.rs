//! Service Container - 依赖注入根
//!
//! 以字符串为键、任意值为值的服务定位容器。所有 Shell（App、Database）
//! 各自持有一个实例，中间件和控制器通过它获取共享依赖。

use dashmap::DashMap;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 容器错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("Dependency not found: {0}")]
    NotFound(String),

    #[error("Dependency {key} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

type Entry = Arc<dyn Any + Send + Sync>;

/// 服务容器
///
/// 读取时只区分「存在」与「不存在」：存入的 `0`、`""`、`false` 等值
/// 都会被原样返回，不会回落到默认值。
#[derive(Default)]
pub struct Container {
    entries: DashMap<String, Entry>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 存入（或覆盖）一个依赖
    pub fn set<T>(&self, key: impl Into<String>, value: T) -> &Self
    where
        T: Any + Send + Sync,
    {
        self.set_arc(key, Arc::new(value))
    }

    /// 存入一个已共享的依赖
    pub fn set_arc<T>(&self, key: impl Into<String>, value: Arc<T>) -> &Self
    where
        T: Any + Send + Sync,
    {
        let key = key.into();
        tracing::trace!(key = %key, ty = type_name::<T>(), "Dependency registered");
        self.entries.insert(key, value);
        self
    }

    /// 读取依赖，不存在或类型不符时返回 `default`
    pub fn get<T>(&self, key: &str, default: T) -> T
    where
        T: Any + Send + Sync + Clone,
    {
        self.resolve::<T>(key)
            .map(|value| value.as_ref().clone())
            .unwrap_or(default)
    }

    /// 按类型解析依赖
    pub fn resolve<T>(&self, key: &str) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
    {
        let entry = self
            .entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ContainerError::NotFound(key.to_string()))?;

        entry
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 删除依赖，返回删除前是否存在
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// 当前键数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("keys", &self.keys())
            .finish()
    }
}
