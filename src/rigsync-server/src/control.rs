// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Client side of the rigserve control channel.
//!
//! The channel is a strict request/response line stream: exactly one
//! command may be outstanding, and the reply must be fully read before
//! the next command is sent. The channel is owned by the hub tick loop
//! and only touched during the per-tick poll and write steps.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use rigsync_core::DynResult;
use rigsync_protocol::codec::{format_get, format_put, parse_reply};
use rigsync_protocol::types::ControlReply;

pub struct ControlChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    rig: String,
    timeout: Duration,
}

impl ControlChannel {
    /// Connect to the rigserve server, retrying once per second up to
    /// the attempt bound, and consume the welcome line.
    pub async fn connect(
        addr: &str,
        rig: String,
        round_trip_timeout: Duration,
        attempts: u32,
    ) -> DynResult<Self> {
        let mut last_err: Option<std::io::Error> = None;
        for attempt in 1..=attempts {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    let (reader, writer) = stream.into_split();
                    let mut chan = Self {
                        reader: BufReader::new(reader),
                        writer,
                        rig,
                        timeout: round_trip_timeout,
                    };
                    let welcome = timeout(chan.timeout, chan.read_line()).await??;
                    info!("Control channel connected: {}", welcome.trim());
                    return Ok(chan);
                }
                Err(e) => {
                    warn!("Control connect {} failed (attempt {}): {}", addr, attempt, e);
                    last_err = Some(e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
        Err(last_err
            .map(|e| e.into())
            .unwrap_or_else(|| "control connect retries exhausted".into()))
    }

    async fn read_line(&mut self) -> DynResult<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err("control connection closed".into());
        }
        Ok(line)
    }

    async fn round_trip(&mut self, command: String) -> DynResult<ControlReply> {
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.flush().await?;
        let line = timeout(self.timeout, self.read_line())
            .await
            .map_err(|_| "control channel timeout")??;
        Ok(parse_reply(&line))
    }

    /// Read one feature path. `vfo` resolves the path placeholder.
    pub async fn get(&mut self, path: &str, vfo: &str) -> DynResult<ControlReply> {
        let command = format_get(&self.rig, path, vfo);
        self.round_trip(command).await
    }

    /// Write one feature path.
    pub async fn put(&mut self, path: &str, vfo: &str, value: &str) -> DynResult<ControlReply> {
        let command = format_put(&self.rig, path, vfo, value);
        self.round_trip(command).await
    }

    /// Tell the server to end the session. Errors are ignored; the
    /// connection is going away either way.
    pub async fn quit(&mut self) {
        let _ = self.writer.write_all(b"quit\n").await;
        let _ = self.writer.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Minimal scripted rigserve peer: welcome, then canned replies.
    async fn spawn_peer(replies: Vec<&'static str>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut reader = BufReader::new(reader);
            writer.write_all(b"rigserved test ready\n").await.unwrap();
            let mut received = Vec::new();
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                received.push(line.trim().to_string());
                writer.write_all(reply.as_bytes()).await.unwrap();
                writer.write_all(b"\n").await.unwrap();
            }
            received
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_get_and_put_round_trip() {
        let (addr, peer) = spawn_peer(vec!["01 42 50 00 01", "OK"]).await;
        let mut chan = ControlChannel::connect(
            &addr,
            "ft897d".to_string(),
            Duration::from_secs(2),
            1,
        )
        .await
        .unwrap();

        let reply = chan.get("CONTROL.raw_freq_and_mode_hex", "VFOA").await.unwrap();
        assert_eq!(reply, ControlReply::Ack("01 42 50 00 01".to_string()));

        let reply = chan.put("CONTROL.freq", "VFOA", "7100000").await.unwrap();
        assert_eq!(reply, ControlReply::Ack("OK".to_string()));

        chan.quit().await;
        drop(chan);
        let received = peer.await.unwrap();
        assert_eq!(received[0], "get ft897d.CONTROL.raw_freq_and_mode_hex");
        assert_eq!(received[1], "put ft897d.CONTROL.freq 7100000");
    }

    #[tokio::test]
    async fn test_nak_reply_is_parsed() {
        let (addr, _peer) = spawn_peer(vec!["? Operation not defined."]).await;
        let mut chan = ControlChannel::connect(
            &addr,
            "ft897d".to_string(),
            Duration::from_secs(2),
            1,
        )
        .await
        .unwrap();
        let reply = chan.get("CONTROL.bogus", "VFOA").await.unwrap();
        assert!(reply.is_nak());
    }

    #[tokio::test]
    async fn test_vfo_placeholder_resolved_in_command() {
        let (addr, peer) = spawn_peer(vec!["OFF"]).await;
        let mut chan = ControlChannel::connect(
            &addr,
            "ft897d".to_string(),
            Duration::from_secs(2),
            1,
        )
        .await
        .unwrap();
        chan.get("<vfo>.atten", "VFOB").await.unwrap();
        drop(chan);
        let received = peer.await.unwrap();
        assert_eq!(received[0], "get ft897d.VFOB.atten");
    }
}
