//! Inra - 应用入口
//!
//! 加载配置 -> 初始化日志 -> 组装 App 并导入内置资源 -> 连接数据库 ->
//! 启动实时通信服务 -> 监听 HTTP，ctrl-c 时依次关闭。

use std::sync::Arc;

use inra::application::{App, Dialect};
use inra::config::{load_config, print_config};
use inra::infrastructure::{
    AxumEngine, AxumRouter, Database, ErrorFormatter, SocketServer, SyncOptions,
};
use inra::infrastructure::http::{ErrorCatalog, ErrorFormatterOptions};
use inra::resources::{self, APP_NAME_KEY, MODEL_PATHS, RESOURCE_PATHS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},inra={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));
    if config.log.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Inra v{}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    // 组装应用
    let formatter = ErrorFormatter::new(
        ErrorCatalog::new(),
        ErrorFormatterOptions::from(&config.errors),
    );
    let mut app = App::new(config.server.clone())
        .with_default_handlers()
        .with_loader(Arc::new(resources::catalog()));
    let mut engine = AxumEngine::new().with_error_formatter(formatter);
    if config.server.cors {
        engine = engine.with_cors();
    }
    app.set_engine(engine)?;
    app.set_router(AxumRouter::new())?;
    app.provide(APP_NAME_KEY, env!("CARGO_PKG_NAME").to_string());

    for path in RESOURCE_PATHS {
        app.import(path).await?;
        tracing::info!(path = %path, "Resource imported");
    }

    // 数据库
    let mut db = Database::new(config.database.clone()).with_loader(Arc::new(resources::models()));
    for path in MODEL_PATHS {
        db.import(path)?;
    }
    // 确保 sqlite 文件目录存在
    if db.dialect() == Dialect::Sqlite && config.database.database != ":memory:" {
        if let Some(parent) = std::path::Path::new(&config.database.database).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    db.connect().await?;
    db.sync(SyncOptions::default()).await?;

    // 实时通信
    let sockets = SocketServer::new(config.socket.clone());
    sockets.create("/").listen();
    let socket_addr = sockets.serve().await?;
    tracing::info!(addr = %socket_addr, "Socket server started");

    // 运行直到 ctrl-c
    app.run_with_shutdown(None, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await?;

    sockets.close().await?;
    db.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
