//! Catalog - 按路径注册的资源/模型工厂
//!
//! `ResourceLoader` 与 `ModelLoader` 的实现：工厂在启动前显式注册，
//! `load(path)` 每次调用都生成一个新实例。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::application::{LoadError, Model, ModelLoader, Resource, ResourceLoader};

type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// 路径 -> 工厂
pub struct Catalog<T> {
    factories: HashMap<String, Factory<T>>,
}

impl<T> Catalog<T> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// 注册工厂，同一路径覆盖
    pub fn register<F>(&mut self, path: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factories.insert(path.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.factories.contains_key(path)
    }

    /// 已注册路径（排序后）
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn produce(&self, path: &str) -> Result<T, LoadError> {
        self.factories
            .get(path)
            .map(|factory| factory())
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Catalog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("paths", &self.paths())
            .finish()
    }
}

/// 资源目录
pub type ResourceCatalog = Catalog<Resource>;

/// 模型目录
pub type ModelCatalog = Catalog<Arc<dyn Model>>;

impl ResourceLoader for ResourceCatalog {
    fn load(&self, path: &str) -> Result<Resource, LoadError> {
        self.produce(path)
    }
}

impl ModelLoader for ModelCatalog {
    fn load(&self, path: &str) -> Result<Arc<dyn Model>, LoadError> {
        self.produce(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ResourceKind;

    #[test]
    fn test_load_registered_resource() {
        let mut catalog = ResourceCatalog::new();
        catalog.register("jobs/Cleanup", || Resource::custom("Job", "Cleanup", 1_u8));

        let resource = catalog.load("jobs/Cleanup").unwrap();
        assert_eq!(resource.name(), "Cleanup");
        assert_eq!(resource.kind(), &ResourceKind::Custom("Job".to_string()));
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        let catalog = ResourceCatalog::new();
        assert!(matches!(
            catalog.load("jobs/Missing"),
            Err(LoadError::NotFound(path)) if path == "jobs/Missing"
        ));
    }

    #[test]
    fn test_register_overrides_same_path() {
        let mut catalog = ResourceCatalog::new();
        catalog
            .register("a", || Resource::custom("Job", "First", ()))
            .register("a", || Resource::custom("Job", "Second", ()));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.load("a").unwrap().name(), "Second");
    }
}
