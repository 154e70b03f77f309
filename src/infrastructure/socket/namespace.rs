//! Socket Namespace
//!
//! 按 URL 路径区分的一组连接。命名空间本身是一个信号源：
//!
//! - `connect` / `disconnect`：连接加入、离开
//! - `event`：客户端发送 `{"event":"event","data":{"action":...}}`
//! - 其他事件名：客户端发送的同名帧，只有注册过监听的事件才会转发

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::HeaderMap;
use dashmap::DashMap;
use serde_json::Value;

use super::bus::EventBus;
use super::connection::SocketHandle;
use super::error::SocketError;
use super::frame::Frame;

pub const CONNECT: &str = "connect";
pub const DISCONNECT: &str = "disconnect";
pub const EVENT: &str = "event";

/// 连接中间件在总线上的键
const HANDSHAKE: &str = "handshake";

/// 命名空间信号
#[derive(Debug, Clone)]
pub enum Signal {
    Connect(SocketHandle),
    Disconnect(SocketHandle),
    Event {
        action: String,
        data: Value,
        socket: SocketHandle,
    },
    Custom {
        event: String,
        data: Value,
        socket: SocketHandle,
    },
}

impl Signal {
    pub fn name(&self) -> &str {
        match self {
            Signal::Connect(_) => CONNECT,
            Signal::Disconnect(_) => DISCONNECT,
            Signal::Event { .. } => EVENT,
            Signal::Custom { event, .. } => event,
        }
    }

    pub fn socket(&self) -> &SocketHandle {
        match self {
            Signal::Connect(socket) | Signal::Disconnect(socket) => socket,
            Signal::Event { socket, .. } | Signal::Custom { socket, .. } => socket,
        }
    }
}

/// 握手信息，交给连接中间件判断
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub namespace: String,
    pub headers: HeaderMap,
    pub query: Option<String>,
}

pub type SignalListener = dyn Fn(&Arc<Namespace>, &Signal) + Send + Sync;
pub type Guard = dyn Fn(&Handshake) -> Result<(), SocketError> + Send + Sync;

/// 命名空间
pub struct Namespace {
    id: String,
    listeners: EventBus<SignalListener>,
    guards: EventBus<Guard>,
    members: DashMap<String, SocketHandle>,
    listening: AtomicBool,
}

impl Namespace {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            listeners: EventBus::new(),
            guards: EventBus::new(),
            members: DashMap::new(),
            listening: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 订阅信号或自定义事件
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> &Self
    where
        F: Fn(&Arc<Namespace>, &Signal) + Send + Sync + 'static,
    {
        self.listeners.on(event, Arc::new(listener));
        self
    }

    /// 添加连接中间件，返回错误即拒绝握手
    pub fn use_guard<F>(&self, guard: F) -> &Self
    where
        F: Fn(&Handshake) -> Result<(), SocketError> + Send + Sync + 'static,
    {
        self.guards.on(HANDSHAKE, Arc::new(guard));
        self
    }

    /// 开始接受连接
    pub fn listen(&self) -> &Self {
        self.listening.store(true, Ordering::SeqCst);
        tracing::info!(namespace = %self.id, "Namespace listening");
        self
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// 发给命名空间内所有连接，返回送达数
    pub fn broadcast(&self, event: &str, data: Value) -> usize {
        self.deliver(Frame::new(event, data), None)
    }

    /// 发给命名空间内除 `except` 外的所有连接
    pub fn broadcast_except(&self, event: &str, data: Value, except: &str) -> usize {
        self.deliver(Frame::new(event, data), Some(except))
    }

    fn deliver(&self, frame: Frame, except: Option<&str>) -> usize {
        self.members
            .iter()
            .filter(|member| Some(member.key().as_str()) != except)
            .filter(|member| member.value().send(frame.clone()))
            .count()
    }

    /// 依次执行连接中间件
    pub fn authorize(&self, handshake: &Handshake) -> Result<(), SocketError> {
        self.guards
            .listeners(HANDSHAKE)
            .iter()
            .try_for_each(|guard| guard(handshake))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// 已订阅的事件名
    pub fn event_names(&self) -> Vec<String> {
        self.listeners.event_names()
    }

    fn signal(self: &Arc<Self>, signal: Signal) {
        for listener in self.listeners.listeners(signal.name()) {
            listener(self, &signal);
        }
    }

    pub(crate) fn join(self: &Arc<Self>, socket: SocketHandle) {
        self.members.insert(socket.id().to_string(), socket.clone());
        tracing::debug!(namespace = %self.id, socket = %socket.id(), "Socket joined");
        self.signal(Signal::Connect(socket));
    }

    /// 分派客户端帧
    pub(crate) fn receive(self: &Arc<Self>, socket: &SocketHandle, frame: Frame) {
        if frame.event == EVENT {
            let action = frame.action().unwrap_or_default().to_string();
            self.signal(Signal::Event {
                action,
                data: frame.data,
                socket: socket.clone(),
            });
            return;
        }

        if frame.event == CONNECT || frame.event == DISCONNECT {
            tracing::debug!(namespace = %self.id, event = %frame.event, "Reserved event ignored");
            return;
        }

        if self.listeners.has(&frame.event) {
            self.signal(Signal::Custom {
                event: frame.event,
                data: frame.data,
                socket: socket.clone(),
            });
        }
    }

    pub(crate) fn leave(self: &Arc<Self>, socket: &SocketHandle) {
        if self.members.remove(socket.id()).is_some() {
            tracing::debug!(namespace = %self.id, socket = %socket.id(), "Socket left");
            self.signal(Signal::Disconnect(socket.clone()));
        }
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("id", &self.id)
            .field("members", &self.members.len())
            .field("listening", &self.is_listening())
            .finish()
    }
}
