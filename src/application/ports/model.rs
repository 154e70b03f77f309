//! Model Port - 数据模型抽象
//!
//! 模型只声明表结构与关联，SQL 执行交给外部数据库引擎（sqlx）。

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::application::error::LoadError;

/// SQL 方言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            Dialect::Sqlite => None,
            Dialect::Postgres => Some(5432),
            Dialect::Mysql => Some(3306),
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Sqlite
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 关联类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    BelongsTo,
    HasOne,
    HasMany,
}

/// 模型间关联
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub source: String,
    pub target: String,
    pub kind: AssociationKind,
    pub foreign_key: String,
}

impl Association {
    pub fn belongs_to(source: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(AssociationKind::BelongsTo, source, target, foreign_key)
    }

    pub fn has_one(source: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(AssociationKind::HasOne, source, target, foreign_key)
    }

    pub fn has_many(source: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(AssociationKind::HasMany, source, target, foreign_key)
    }

    fn new(kind: AssociationKind, source: &str, target: &str, foreign_key: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind,
            foreign_key: foreign_key.to_string(),
        }
    }
}

/// 已加载的模型集合，保持导入顺序
#[derive(Clone, Default)]
pub struct Models {
    entries: Vec<(String, Arc<dyn Model>)>,
}

impl Models {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入模型，同名覆盖并保留原位置
    pub fn insert(&mut self, name: String, model: Arc<dyn Model>) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = model,
            None => self.entries.push((name, model)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Model>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, model)| model)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &Arc<dyn Model>)> {
        self.entries
            .iter()
            .map(|(name, model)| (name.as_str(), model))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 数据模型
pub trait Model: Send + Sync + 'static {
    /// 模型原始名称（导入时转换为 PascalCase 作为键）
    fn name(&self) -> &str;

    /// 表名
    fn table(&self) -> &str {
        self.name()
    }

    /// 建表语句
    fn definition(&self, dialect: Dialect) -> String;

    /// 关联钩子，在连接建立后调用
    fn associate(&self, _models: &Models) -> Vec<Association> {
        Vec::new()
    }
}

/// 模型加载器
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Arc<dyn Model>, LoadError>;
}
