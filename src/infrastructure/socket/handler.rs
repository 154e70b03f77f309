//! WebSocket Upgrade Handler
//!
//! 每个命名空间对应一个 URL 路径。握手前先执行命名空间的连接中间件，
//! 升级后一个任务负责写出帧，一个任务负责读取并分派客户端帧。

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, RawQuery, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::connection::{Outbound, SocketHandle};
use super::frame::Frame;
use super::namespace::{Handshake, Namespace};
use super::server::SocketServer;
use crate::application::join_paths;

/// `/` 上的升级请求
pub async fn upgrade_root(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    State(server): State<Arc<SocketServer>>,
) -> Response {
    upgrade(ws, server, "/".to_string(), headers, query)
}

/// `/{namespace}` 上的升级请求
pub async fn upgrade_namespace(
    ws: WebSocketUpgrade,
    Path(namespace): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    State(server): State<Arc<SocketServer>>,
) -> Response {
    upgrade(ws, server, join_paths(&[&namespace]), headers, query)
}

fn upgrade(
    ws: WebSocketUpgrade,
    server: Arc<SocketServer>,
    id: String,
    headers: HeaderMap,
    query: Option<String>,
) -> Response {
    let namespace = match server.namespace(&id) {
        Some(namespace) if namespace.is_listening() => namespace,
        _ => {
            tracing::debug!(namespace = %id, "WebSocket rejected: unknown namespace");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let handshake = Handshake {
        namespace: id,
        headers,
        query,
    };
    if let Err(e) = namespace.authorize(&handshake) {
        tracing::warn!(namespace = %handshake.namespace, error = %e, "WebSocket rejected");
        return (StatusCode::FORBIDDEN, e.to_string()).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, namespace, server))
}

async fn handle_socket(socket: WebSocket, namespace: Arc<Namespace>, server: Arc<SocketServer>) {
    let id = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = SocketHandle::new(id.clone(), tx);

    namespace.join(handle.clone());

    let (mut sender, mut receiver) = socket.split();

    // 写任务
    let forward_id = id.clone();
    let mut forward_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let message = match outbound {
                Outbound::Frame(frame) => match frame.to_text() {
                    Ok(text) => Message::Text(text),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize frame");
                        continue;
                    }
                },
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = sender.send(message).await {
                tracing::debug!(connection = %forward_id, error = %e, "Failed to send frame");
                break;
            }
        }
    });

    // 读任务
    let receive_namespace = namespace.clone();
    let receive_handle = handle.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(connection = %receive_handle.id(), error = %e, "WebSocket error");
                    break;
                }
            };

            let frame = match Frame::parse(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(connection = %receive_handle.id(), error = %e, "Dropping frame");
                    continue;
                }
            };

            if let Some(connection) = server.connection(receive_handle.id()) {
                connection.dispatch(&frame.event, &frame.data);
            }
            receive_namespace.receive(&receive_handle, frame);
        }
    });

    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => forward_task.abort(),
    }

    namespace.leave(&handle);
}
