//! Socket Connection
//!
//! `SocketHandle` 是底层 WebSocket 的发送端（由写任务消费）；
//! `Connection` 在其上加上所属命名空间、服务器与按连接的事件订阅。

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::mpsc;

use super::bus::EventBus;
use super::frame::Frame;
use super::namespace::Namespace;
use super::server::SocketServer;

/// 写任务的指令
#[derive(Debug, Clone)]
pub enum Outbound {
    Frame(Frame),
    Close,
}

/// 底层连接的发送端
#[derive(Clone)]
pub struct SocketHandle {
    id: String,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl SocketHandle {
    pub fn new(id: impl Into<String>, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { id: id.into(), tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 排队发送，连接已关闭时返回 false
    pub fn send(&self, frame: Frame) -> bool {
        self.tx.send(Outbound::Frame(frame)).is_ok()
    }

    pub fn close(&self) -> bool {
        self.tx.send(Outbound::Close).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub type ConnectionListener = dyn Fn(&Value) + Send + Sync;

/// 已登记的连接
pub struct Connection {
    id: String,
    socket: SocketHandle,
    namespace: Arc<Namespace>,
    server: Weak<SocketServer>,
    listeners: EventBus<ConnectionListener>,
}

impl Connection {
    pub(crate) fn new(
        socket: SocketHandle,
        namespace: Arc<Namespace>,
        server: Weak<SocketServer>,
    ) -> Self {
        Self {
            id: socket.id().to_string(),
            socket,
            namespace,
            server,
            listeners: EventBus::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn server(&self) -> Option<Arc<SocketServer>> {
        self.server.upgrade()
    }

    pub fn socket(&self) -> &SocketHandle {
        &self.socket
    }

    /// 订阅该连接上收到的事件
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.listeners.on(event, Arc::new(listener));
    }

    /// 只发给自己
    pub fn emit(&self, event: &str, data: Value) -> bool {
        self.socket.send(Frame::new(event, data))
    }

    /// 发给同一命名空间的其他连接
    pub fn broadcast(&self, event: &str, data: Value) -> usize {
        self.namespace.broadcast_except(event, data, &self.id)
    }

    pub fn disconnect(&self) {
        tracing::debug!(connection = %self.id, "Disconnecting");
        self.socket.close();
    }

    pub(crate) fn dispatch(&self, event: &str, data: &Value) {
        for listener in self.listeners.listeners(event) {
            listener(data);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("namespace", &self.namespace.id())
            .finish()
    }
}
