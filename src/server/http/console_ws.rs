// src/server/http/console_ws.rs

//! `GET /api/{vm,jail}/:id/console`: upgrades to a WebSocket and
//! pumps bytes between it and the guest's interactive console process
//! using the binary framing in `core::adapters::console`.

use crate::core::adapters::console::ClientFrame;
use crate::server::context::ServerState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::warn;

pub async fn console(
    State(state): State<Arc<ServerState>>,
    Path(guest_id): Path<u32>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle(state, guest_id, socket))
}

async fn handle(state: Arc<ServerState>, guest_id: u32, mut socket: WebSocket) {
    let mut child = match state.guests.console(guest_id) {
        Ok(child) => child,
        Err(e) => {
            let _ = socket
                .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                    code: 1011,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };

    let mut stdin = match child.stdin.take() {
        Some(s) => s,
        None => return,
    };
    let mut stdout = match child.stdout.take() {
        Some(s) => s,
        None => return,
    };

    let mut read_buf = [0u8; 8192];
    loop {
        tokio::select! {
            n = stdout.read(&mut read_buf) => {
                match n {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = crate::core::adapters::console::encode_server_chunk(&read_buf[..n]);
                        if socket.send(Message::Binary(chunk.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Binary(bytes) => match ClientFrame::decode(&bytes) {
                        Some(ClientFrame::Input(data)) => {
                            if stdin.write_all(&data).await.is_err() {
                                break;
                            }
                        }
                        Some(ClientFrame::Resize { .. }) => {
                            // No PTY resize ioctl plumbed through the adapter yet; the
                            // remote console process inherits its initial size.
                        }
                        Some(ClientFrame::Control { .. }) | None => {}
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            status = child.wait() => {
                if let Err(e) = status {
                    warn!(guest_id, error = %e, "console process wait failed");
                }
                break;
            }
        }
    }

    let _ = child.start_kill();
}
