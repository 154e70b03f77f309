//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

use crate::application::ports::Dialect;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP 服务配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 实时（WebSocket）服务配置
    #[serde(default)]
    pub socket: SocketConfig,

    /// 错误格式化配置
    #[serde(default)]
    pub errors: ErrorsConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 是否启用跨域（CORS）层；开启后 OPTIONS 预检由该层直接应答
    #[serde(default)]
    pub cors: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: false,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub dialect: Dialect,

    /// 数据库名；sqlite 下为文件路径，`:memory:` 表示内存库
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_db_host")]
    pub host: String,

    /// 为空时使用方言默认端口
    #[serde(default)]
    pub port: Option<u16>,

    /// 字符集（MySQL），默认 utf8
    #[serde(default)]
    pub charset: Option<String>,

    /// 排序规则（MySQL），默认 utf8_general_ci
    #[serde(default)]
    pub collate: Option<String>,

    /// 是否记录 SQL 语句
    #[serde(default)]
    pub logging: bool,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database() -> String {
    "data/inra.db".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            database: default_database(),
            username: String::new(),
            password: String::new(),
            host: default_db_host(),
            port: None,
            charset: None,
            collate: None,
            logging: false,
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 内存中的 sqlite 数据库
    pub fn in_memory() -> Self {
        Self {
            database: ":memory:".to_string(),
            ..Self::default()
        }
    }
}

/// `broadcast` 是否跳过发起方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// 与 `emit` 相同：发给所有连接
    #[default]
    Global,
    /// 跳过发起方连接
    ExcludeOrigin,
}

/// 实时服务配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocketConfig {
    /// 为空时为 `localhost`
    #[serde(default)]
    pub host: Option<String>,

    /// 为空时为 8082
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub broadcast_mode: BroadcastMode,
}

/// 错误格式化配置
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorsConfig {
    /// 未定义错误的状态码
    #[serde(default = "default_error_status")]
    pub http_status: u16,

    /// 未定义错误的用户提示
    #[serde(default = "default_user_message")]
    pub user_message: String,

    /// 是否在响应中返回 developerMessage
    #[serde(default = "default_expose")]
    pub expose_developer_message: bool,
}

fn default_error_status() -> u16 {
    500
}

fn default_user_message() -> String {
    "Internal error".to_string()
}

fn default_expose() -> bool {
    true
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            http_status: default_error_status(),
            user_message: default_user_message(),
            expose_developer_message: default_expose(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
