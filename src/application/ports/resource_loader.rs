//! Resource Loader Port - 资源加载抽象
//!
//! `App::import(path)` 通过该端口把路径解析成资源。

use crate::application::error::LoadError;
use crate::application::resource::Resource;

/// 资源加载器
pub trait ResourceLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Resource, LoadError>;
}
