//! Socket - 基于 WebSocket 的实时通信

pub mod bus;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handler;
pub mod namespace;
pub mod server;

pub use bus::EventBus;
pub use connection::{Connection, Outbound, SocketHandle};
pub use error::SocketError;
pub use frame::{Frame, EVENT_FRAME};
pub use namespace::{Guard, Handshake, Namespace, Signal, CONNECT, DISCONNECT, EVENT};
pub use server::{EventCallback, SocketServer, DEFAULT_HOSTNAME, DEFAULT_PORT};
