//! Configuration Loader
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml / config.local.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::application::ports::Dialect;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// # 环境变量示例
/// - `INRA_SERVER__PORT=8080`
/// - `INRA_DATABASE__DIALECT=postgres`
/// - `INRA_DATABASE__DATABASE=inra`
/// - `INRA_SOCKET__BROADCAST_MODE=exclude_origin`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置，`None` 时搜索默认文件
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("server.cors", false)?
        .set_default("database.dialect", "sqlite")?
        .set_default("database.database", "data/inra.db")?
        .set_default("database.host", "localhost")?
        .set_default("database.logging", false)?
        .set_default("database.max_connections", 5)?
        .set_default("socket.broadcast_mode", "global")?
        .set_default("errors.http_status", 500)?
        .set_default("errors.user_message", "Internal error")?
        .set_default("errors.expose_developer_message", true)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 例如: INRA_DATABASE__HOST=db.internal
    builder = builder.add_source(
        Environment::with_prefix("INRA")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.socket.port == Some(0) {
        return Err(ConfigError::ValidationError(
            "Socket port cannot be 0".to_string(),
        ));
    }

    if config.database.database.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Database name cannot be empty".to_string(),
        ));
    }

    if config.database.dialect != Dialect::Sqlite && config.database.username.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Database username is required for {}",
            config.database.dialect
        )));
    }

    if config.database.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "Database max_connections cannot be 0".to_string(),
        ));
    }

    if !(400..=599).contains(&config.errors.http_status) {
        return Err(ConfigError::ValidationError(format!(
            "Default error status must be 4xx or 5xx, got {}",
            config.errors.http_status
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("CORS: {}", config.server.cors);
    tracing::info!(
        "Database: {} ({})",
        config.database.database,
        config.database.dialect
    );
    tracing::info!("Database Max Connections: {}", config.database.max_connections);
    tracing::info!(
        "Socket: {}:{} ({:?})",
        config.socket.host.as_deref().unwrap_or("localhost"),
        config.socket.port.unwrap_or(8082),
        config.socket.broadcast_mode
    );
    tracing::info!("Expose Developer Message: {}", config.errors.expose_developer_message);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BroadcastMode;
    use std::io::Write;

    #[test]
    fn test_load_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert!(!config.server.cors);
        assert_eq!(config.database.dialect, Dialect::Sqlite);
        assert_eq!(config.socket.broadcast_mode, BroadcastMode::Global);
        assert_eq!(config.errors.http_status, 500);
        assert_eq!(config.errors.user_message, "Internal error");
    }

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.socket.port = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_database() {
        let mut config = AppConfig::default();
        config.database.database = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_requires_username_for_servers() {
        let mut config = AppConfig::default();
        config.database.dialect = Dialect::Postgres;
        assert!(validate_config(&config).is_err());

        config.database.username = "inra".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inra.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nport = 9100\ncors = true\n\n[socket]\nport = 9200\nbroadcast_mode = \"exclude_origin\"\n\n[database]\ndialect = \"mysql\"\nusername = \"root\"\ndatabase = \"inra\""
        )
        .unwrap();

        let config = load_config_from_path(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9100);
        assert!(config.server.cors);
        assert_eq!(config.socket.port, Some(9200));
        assert_eq!(config.socket.broadcast_mode, BroadcastMode::ExcludeOrigin);
        assert_eq!(config.database.dialect, Dialect::Mysql);
        assert_eq!(config.database.port, None);
    }
}
