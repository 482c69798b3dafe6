// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Client listener for rigsyncd.
//!
//! Accepts client control connections and forwards their feature lines
//! to the hub task over an event channel. Each client gets a reader
//! task; the hub drains the channel once per tick, so state stays
//! owned by a single logical thread.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

use rigsync_core::router::ClientId;

/// One event from the client side, drained by the hub per tick.
#[derive(Debug)]
pub enum ClientEvent {
    Connected {
        id: ClientId,
        /// UDP destination: the TCP peer address with the configured
        /// broadcast port.
        udp_dest: SocketAddr,
    },
    Line {
        id: ClientId,
        line: String,
    },
    Disconnected {
        id: ClientId,
    },
}

/// Run the accept loop, spawning one reader task per client.
pub async fn run_listener(
    listener: TcpListener,
    client_udp_port: u16,
    events_tx: mpsc::Sender<ClientEvent>,
) -> std::io::Result<()> {
    let mut next_id: ClientId = 1;
    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        let id = next_id;
        next_id += 1;
        info!("Client #{} connected: {}", id, peer);

        let udp_dest = SocketAddr::new(peer.ip(), client_udp_port);
        if events_tx
            .send(ClientEvent::Connected { id, udp_dest })
            .await
            .is_err()
        {
            // Hub is gone; nothing left to serve.
            return Ok(());
        }
        let tx = events_tx.clone();
        tokio::spawn(async move {
            read_client(socket, id, peer, tx).await;
        });
    }
}

async fn read_client(
    socket: TcpStream,
    id: ClientId,
    peer: SocketAddr,
    tx: mpsc::Sender<ClientEvent>,
) {
    let mut reader = BufReader::new(socket);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("Client #{} ({}) disconnected", id, peer);
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "quit" {
                    info!("Client #{} ({}) quit", id, peer);
                    break;
                }
                let event = ClientEvent::Line {
                    id,
                    line: trimmed.to_string(),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("Client #{} ({}) read error: {}", id, peer, e);
                break;
            }
        }
    }
    let _ = tx.send(ClientEvent::Disconnected { id }).await;
}
