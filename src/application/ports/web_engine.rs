//! Web Engine Port - Web 引擎与路由器抽象
//!
//! App 只通过这里的接口与外部 Web 框架交互：`use_middleware`、`listen`
//! 以及按 HTTP 动词注册路由。具体实现在 infrastructure/http 层。

use async_trait::async_trait;
use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
    routing::MethodFilter,
    Router,
};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::application::error::{AppError, HttpError};

/// HTTP 动词
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    All,
    Get,
    Put,
    Delete,
    Post,
    Head,
    Patch,
    Options,
}

impl Verb {
    pub const EVERY: [Verb; 8] = [
        Verb::All,
        Verb::Get,
        Verb::Put,
        Verb::Delete,
        Verb::Post,
        Verb::Head,
        Verb::Patch,
        Verb::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::All => "all",
            Verb::Get => "get",
            Verb::Put => "put",
            Verb::Delete => "delete",
            Verb::Post => "post",
            Verb::Head => "head",
            Verb::Patch => "patch",
            Verb::Options => "options",
        }
    }

    /// 对应的 axum 方法过滤器，`All` 没有单一过滤器
    pub fn method_filter(&self) -> Option<MethodFilter> {
        match self {
            Verb::All => None,
            Verb::Get => Some(MethodFilter::GET),
            Verb::Put => Some(MethodFilter::PUT),
            Verb::Delete => Some(MethodFilter::DELETE),
            Verb::Post => Some(MethodFilter::POST),
            Verb::Head => Some(MethodFilter::HEAD),
            Verb::Patch => Some(MethodFilter::PATCH),
            Verb::Options => Some(MethodFilter::OPTIONS),
        }
    }
}

/// 解析动词名称，`del` 视为 `delete`
impl FromStr for Verb {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Verb::All),
            "get" => Ok(Verb::Get),
            "put" => Ok(Verb::Put),
            "del" | "delete" => Ok(Verb::Delete),
            "post" => Ok(Verb::Post),
            "head" => Ok(Verb::Head),
            "patch" => Ok(Verb::Patch),
            "options" => Ok(Verb::Options),
            _ => Err(AppError::UnknownVerb(s.to_string())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// 已绑定实例的路由处理函数
pub type RouteHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// 引擎调用约定下的中间件回调：(request, next)
pub type MiddlewareCallback =
    Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Result<Response, HttpError>> + Send + Sync>;

/// Web 引擎端口
#[async_trait]
pub trait WebEngine: Send + Sync {
    /// 挂载全局中间件，按注册顺序由外向内执行
    fn use_middleware(&mut self, middleware: MiddlewareCallback);

    /// 组装最终服务
    fn build(&self, routes: Router) -> Router;

    /// 在指定地址监听，返回原生句柄
    async fn listen(&self, addr: &str, routes: Router) -> Result<ServerHandle, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        ServerHandle::spawn(listener, self.build(routes))
    }
}

/// 路由器端口
pub trait RouterEngine: Send + Sync {
    /// 注册一条路由，可选地组合一个路由级中间件
    fn register(
        &mut self,
        verb: Verb,
        path: &str,
        handler: RouteHandler,
        middleware: Option<MiddlewareCallback>,
    ) -> Result<(), AppError>;

    /// 已注册的 (动词, 路径)
    fn registered(&self) -> Vec<(Verb, String)>;

    /// 导出为 axum Router
    fn routes(&self) -> Router;
}

/// 运行中服务器的原生句柄
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), std::io::Error>>,
}

impl ServerHandle {
    /// 在后台任务中启动 axum 服务（支持优雅关闭）
    pub fn spawn(listener: TcpListener, router: Router) -> Result<Self, std::io::Error> {
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tracing::info!("Starting HTTP server on {}", local_addr);

        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 通知服务器关闭并等待退出
    pub async fn shutdown(mut self) -> Result<(), std::io::Error> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.wait().await
    }

    /// 等待服务器退出
    pub async fn wait(self) -> Result<(), std::io::Error> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
        }
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
