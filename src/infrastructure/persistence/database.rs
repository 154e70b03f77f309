//! Database Shell - SQL 数据库连接与模型初始化
//!
//! 通过 sqlx `Any` 驱动支持 sqlite / postgres / mysql。模型以 PascalCase
//! 名称登记，连接建立后调用各模型的关联钩子，`sync` 执行建表语句。

use std::any::Any;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use heck::ToUpperCamelCase;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions};
use thiserror::Error;

use crate::application::{
    Association, Container, ContainerError, Dialect, LoadError, Model, ModelLoader, Models,
};
use crate::config::DatabaseConfig;

const DEFAULT_CHARSET: &str = "utf8";
const DEFAULT_COLLATE: &str = "utf8_general_ci";

/// URL userinfo 中保留 RFC 3986 非保留字符，其余全部编码
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// 数据库错误
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database is not connected")]
    NotConnected,

    #[error("Could not load model {path}")]
    Load {
        path: String,
        #[source]
        source: LoadError,
    },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// 同步选项
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// 建表前先删除已有表
    pub force: bool,
}

/// 未配置模型加载器时使用
struct NoModels;

impl ModelLoader for NoModels {
    fn load(&self, path: &str) -> Result<Arc<dyn Model>, LoadError> {
        Err(LoadError::NotFound(path.to_string()))
    }
}

/// 数据库
pub struct Database {
    config: DatabaseConfig,
    di: Arc<Container>,
    pool: Option<AnyPool>,
    models: Models,
    associations: Vec<Association>,
    loader: Arc<dyn ModelLoader>,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            di: Arc::new(Container::new()),
            pool: None,
            models: Models::new(),
            associations: Vec::new(),
            loader: Arc::new(NoModels),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ModelLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    /// 由配置生成连接 URL
    pub fn connection_url(&self) -> String {
        let config = &self.config;

        match config.dialect {
            Dialect::Sqlite => {
                if config.database == ":memory:" {
                    "sqlite::memory:".to_string()
                } else {
                    format!("sqlite:{}?mode=rwc", config.database)
                }
            }
            Dialect::Postgres | Dialect::Mysql => {
                let mut url = format!("{}://", config.dialect);
                if !config.username.is_empty() {
                    url.push_str(&encode_userinfo(&config.username));
                    if !config.password.is_empty() {
                        url.push(':');
                        url.push_str(&encode_userinfo(&config.password));
                    }
                    url.push('@');
                }
                url.push_str(&config.host);
                if let Some(port) = config.port.or(config.dialect.default_port()) {
                    url.push_str(&format!(":{port}"));
                }
                url.push('/');
                url.push_str(&config.database);

                if config.dialect == Dialect::Mysql {
                    url.push_str(&format!(
                        "?charset={}&collation={}",
                        config.charset.as_deref().unwrap_or(DEFAULT_CHARSET),
                        config.collate.as_deref().unwrap_or(DEFAULT_COLLATE),
                    ));
                }
                url
            }
        }
    }

    /// 建立连接、验证连通性，然后建立模型关联
    pub async fn connect(&mut self) -> Result<(), DatabaseError> {
        sqlx::any::install_default_drivers();

        let mut options = AnyConnectOptions::from_str(&self.connection_url())?;
        if !self.config.logging {
            options = options.disable_statement_logging();
        }

        let memory = self.config.dialect == Dialect::Sqlite && self.config.database == ":memory:";
        let pool_options = if memory {
            // 每个内存连接都是独立的数据库，只保留一个且不回收
            AnyPoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            AnyPoolOptions::new().max_connections(self.config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        sqlx::query("SELECT 1").execute(&pool).await?;

        tracing::info!(
            dialect = %self.config.dialect,
            database = %self.config.database,
            "Database connected"
        );

        self.pool = Some(pool);
        self.associate();
        Ok(())
    }

    /// 调用每个模型的关联钩子并记录结果
    pub fn associate(&mut self) -> &[Association] {
        self.associations = self
            .models
            .iter()
            .flat_map(|(_, model)| model.associate(&self.models))
            .collect();

        for association in &self.associations {
            tracing::debug!(
                source = %association.source,
                target = %association.target,
                kind = ?association.kind,
                "Model association"
            );
        }
        &self.associations
    }

    /// 按模型定义建表，`force` 时先按相反顺序删表
    pub async fn sync(&self, options: SyncOptions) -> Result<(), DatabaseError> {
        let pool = self.pool()?;
        let dialect = self.dialect();

        if options.force {
            for (name, model) in self.models.iter().rev() {
                let sql = format!("DROP TABLE IF EXISTS {}", model.table());
                sqlx::query(&sql).execute(pool).await?;
                tracing::debug!(model = %name, table = %model.table(), "Table dropped");
            }
        }

        for (name, model) in self.models.iter() {
            let sql = model.definition(dialect);
            sqlx::query(&sql).execute(pool).await?;
            tracing::debug!(model = %name, table = %model.table(), "Table synced");
        }

        tracing::info!(models = self.models.len(), force = options.force, "Database synced");
        Ok(())
    }

    /// 通过加载器导入模型，返回登记名（PascalCase）
    pub fn import(&mut self, path: &str) -> Result<String, DatabaseError> {
        let model = self.loader.load(path).map_err(|source| DatabaseError::Load {
            path: path.to_string(),
            source,
        })?;
        Ok(self.define(model))
    }

    /// 直接登记模型，返回登记名（PascalCase）
    pub fn define(&mut self, model: Arc<dyn Model>) -> String {
        let name = model.name().to_upper_camel_case();
        tracing::debug!(model = %name, table = %model.table(), "Model imported");
        self.models.insert(name.clone(), model);
        name
    }

    pub fn model(&self, name: &str) -> Option<Arc<dyn Model>> {
        self.models.get(name).cloned()
    }

    pub fn models(&self) -> &Models {
        &self.models
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    /// 连接池，未连接时返回 `NotConnected`
    pub fn pool(&self) -> Result<&AnyPool, DatabaseError> {
        self.pool.as_ref().ok_or(DatabaseError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.di
    }

    /// 向数据库容器提供自定义数据
    pub fn provide<T>(&self, name: impl Into<String>, value: T) -> &Self
    where
        T: Any + Send + Sync,
    {
        self.di.set(name, value);
        self
    }

    pub fn resolve<T>(&self, name: &str) -> Result<Arc<T>, DatabaseError>
    where
        T: Any + Send + Sync,
    {
        Ok(self.di.resolve::<T>(name)?)
    }

    pub async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            tracing::info!("Database connection closed");
        }
    }
}

/// 对 URL userinfo 中的保留字符做百分号编码
fn encode_userinfo(value: &str) -> String {
    utf8_percent_encode(value, USERINFO).to_string()
}
