//! Socket Server - 实时通信服务
//!
//! 持有命名空间、服务端事件回调和所有连接。命名空间由 `create` 创建，
//! 其 connect / disconnect / event 信号被接到服务器的连接表与回调上。

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use serde_json::Value;
use tokio::net::TcpListener;

use super::bus::EventBus;
use super::connection::{Connection, SocketHandle};
use super::error::SocketError;
use super::frame::Frame;
use super::handler::{upgrade_namespace, upgrade_root};
use super::namespace::{Namespace, Signal, CONNECT, DISCONNECT, EVENT};
use crate::application::{join_paths, ServerHandle};
use crate::config::{BroadcastMode, SocketConfig};

pub const DEFAULT_PORT: u16 = 8082;
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// 服务端事件回调：(data, connection, namespace)
pub type EventCallback = dyn Fn(&Value, &Arc<Connection>, &Arc<Namespace>) + Send + Sync;

pub struct SocketServer {
    config: SocketConfig,
    me: Weak<SocketServer>,
    namespaces: DashMap<String, Arc<Namespace>>,
    callbacks: EventBus<EventCallback>,
    connections: DashMap<String, Arc<Connection>>,
    native: Mutex<Option<ServerHandle>>,
}

impl SocketServer {
    pub fn new(config: SocketConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            config,
            me: me.clone(),
            namespaces: DashMap::new(),
            callbacks: EventBus::new(),
            connections: DashMap::new(),
            native: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn port(&self) -> u16 {
        self.config.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn hostname(&self) -> &str {
        self.config.host.as_deref().unwrap_or(DEFAULT_HOSTNAME)
    }

    pub fn host(&self) -> String {
        format!("ws://{}:{}", self.hostname(), self.port())
    }

    // ========================================================================
    // Namespaces
    // ========================================================================

    /// 创建绑定到 `room` 的命名空间，并把它的信号接到服务器
    pub fn create(&self, room: &str) -> Arc<Namespace> {
        let id = join_paths(&[room]);
        let namespace = Arc::new(Namespace::new(id.clone()));

        let server = self.me.clone();
        namespace.on(CONNECT, move |namespace, signal| {
            if let (Some(server), Signal::Connect(socket)) = (server.upgrade(), signal) {
                server.add_connection(socket.clone(), namespace);
            }
        });

        let server = self.me.clone();
        namespace.on(DISCONNECT, move |_, signal| {
            if let (Some(server), Signal::Disconnect(socket)) = (server.upgrade(), signal) {
                server.remove_connection(socket.id());
            }
        });

        let server = self.me.clone();
        namespace.on(EVENT, move |namespace, signal| {
            let Some(server) = server.upgrade() else {
                return;
            };
            if let Signal::Event {
                action,
                data,
                socket,
            } = signal
            {
                if let Some(connection) = server.connection(socket.id()) {
                    server.trigger(action, data, &connection, namespace);
                }
            }
        });

        if self.namespaces.insert(id.clone(), namespace.clone()).is_some() {
            tracing::warn!(namespace = %id, "Namespace replaced");
        }
        tracing::info!(namespace = %id, "Namespace created");
        namespace
    }

    pub fn namespace(&self, id: &str) -> Option<Arc<Namespace>> {
        self.namespaces.get(id).map(|entry| entry.value().clone())
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// 订阅服务端事件
    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> &Self
    where
        F: Fn(&Value, &Arc<Connection>, &Arc<Namespace>) + Send + Sync + 'static,
    {
        self.callbacks.on(event, Arc::new(callback));
        self
    }

    /// 按注册顺序调用 `event` 的所有回调，未知事件不做任何事
    pub fn trigger(
        &self,
        event: &str,
        data: &Value,
        connection: &Arc<Connection>,
        namespace: &Arc<Namespace>,
    ) {
        let callbacks = self.callbacks.listeners(event);
        tracing::trace!(event = %event, callbacks = callbacks.len(), "Triggering event");

        for callback in callbacks {
            callback(data, connection, namespace);
        }
    }

    /// 只发给指定连接，未知 id 时不做任何事
    pub fn send(&self, id: &str, event: &str, data: Value) -> bool {
        match self.connection(id) {
            Some(connection) => connection.emit(event, data),
            None => false,
        }
    }

    /// 发给所有命名空间的所有连接
    pub fn emit(&self, event: &str, data: Value) -> usize {
        self.deliver(Frame::new(event, data), None)
    }

    /// 全局广播；`ExcludeOrigin` 模式下跳过 `origin`
    pub fn broadcast(&self, event: &str, data: Value, origin: Option<&str>) -> usize {
        let except = match self.config.broadcast_mode {
            BroadcastMode::Global => None,
            BroadcastMode::ExcludeOrigin => origin,
        };
        self.deliver(Frame::new(event, data), except)
    }

    fn deliver(&self, frame: Frame, except: Option<&str>) -> usize {
        self.connections
            .iter()
            .filter(|entry| Some(entry.key().as_str()) != except)
            .filter(|entry| entry.value().socket().send(frame.clone()))
            .count()
    }

    // ========================================================================
    // Connections
    // ========================================================================

    pub fn add_connection(&self, socket: SocketHandle, namespace: &Arc<Namespace>) -> Arc<Connection> {
        let connection = Arc::new(Connection::new(socket, namespace.clone(), self.me.clone()));
        self.connections
            .insert(connection.id().to_string(), connection.clone());

        tracing::info!(
            connection = %connection.id(),
            namespace = %namespace.id(),
            total = self.connections.len(),
            "Socket connected"
        );
        connection
    }

    pub fn remove_connection(&self, id: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.remove(id).map(|(_, connection)| connection);
        if removed.is_some() {
            tracing::info!(connection = %id, total = self.connections.len(), "Socket disconnected");
        }
        removed
    }

    pub fn connection(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ========================================================================
    // Serving
    // ========================================================================

    /// 升级路由：`/` 与 `/*namespace`
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/", get(upgrade_root))
            .route("/*namespace", get(upgrade_namespace))
            .with_state(self.clone())
    }

    /// 在 `hostname:port` 上监听，返回实际地址
    pub async fn serve(self: &Arc<Self>) -> Result<SocketAddr, SocketError> {
        let listener = TcpListener::bind((self.hostname(), self.port())).await?;
        let handle = ServerHandle::spawn(listener, self.router())?;
        let addr = handle.local_addr();
        tracing::info!(addr = %addr, "Socket server listening");

        let previous = self
            .native
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.shutdown().await?;
        }
        Ok(addr)
    }

    /// 断开所有连接并停止监听
    pub async fn close(&self) -> Result<(), SocketError> {
        for entry in self.connections.iter() {
            entry.value().disconnect();
        }

        let handle = self
            .native
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.shutdown().await?;
            tracing::info!("Socket server stopped");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SocketServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketServer")
            .field("host", &self.host())
            .field("namespaces", &self.namespaces.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}
