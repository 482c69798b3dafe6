// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The synchronization hub tick loop.
//!
//! One iteration = one tick. The hub task exclusively owns the device
//! state, every client entity and the control channel; client reader
//! tasks only feed events into the channel drained at the tick start.
//! Within a tick: poll, decode, proactive writes, diffs, routing,
//! device writes, then the full UDP broadcast, so a client write
//! accepted this tick is visible in this tick's broadcast.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use rigsync_core::diff::{client_diff, device_diff, Diff};
use rigsync_core::router::{route, stale_unpolled_writes, ClientId};
use rigsync_core::{decode, sched, Catalog, ClientState, DeviceState, DynResult, LinkState, Value};
use rigsync_protocol::codec::{format_snapshot, parse_feature_line};
use rigsync_protocol::types::ControlReply;

use crate::control::ControlChannel;
use crate::listener::ClientEvent;

const TICK_RATE_WINDOW: u64 = 512;

struct Client {
    state: ClientState,
    udp_dest: SocketAddr,
    pending: Vec<String>,
}

pub struct Hub {
    catalog: Catalog,
    control: ControlChannel,
    udp: UdpSocket,
    tick_wait: Duration,
    dev: DeviceState,
    link: LinkState,
    clients: BTreeMap<ClientId, Client>,
    tick: u64,
    rng: StdRng,
}

impl Hub {
    pub fn new(
        catalog: Catalog,
        control: ControlChannel,
        udp: UdpSocket,
        tick_wait: Duration,
    ) -> Self {
        let dev = DeviceState::new(&catalog);
        Self {
            catalog,
            control,
            udp,
            tick_wait,
            dev,
            link: LinkState::default(),
            clients: BTreeMap::new(),
            tick: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Run the tick loop until shutdown is signalled.
    pub async fn run(
        mut self,
        mut events_rx: mpsc::Receiver<ClientEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> DynResult<()> {
        info!("Hub running ({} features)", self.catalog.features().len());
        let mut window_start = Instant::now();

        loop {
            tokio::select! {
                _ = sleep(self.tick_wait) => {}
                _ = shutdown_rx.changed() => {}
            }
            if *shutdown_rx.borrow() {
                break;
            }

            let new_clients = self.drain_events(&mut events_rx);
            self.run_tick(new_clients).await;

            if self.tick % TICK_RATE_WINDOW == 0 {
                let elapsed = window_start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    debug!("{:.1} ticks/s over last window", TICK_RATE_WINDOW as f64 / elapsed);
                }
                window_start = Instant::now();
            }
        }

        info!("Hub shutting down");
        self.control.quit().await;
        Ok(())
    }

    /// Apply queued client events; returns the clients accepted this
    /// tick.
    fn drain_events(&mut self, events_rx: &mut mpsc::Receiver<ClientEvent>) -> Vec<ClientId> {
        let mut new_clients = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            match event {
                ClientEvent::Connected { id, udp_dest } => {
                    self.clients.insert(
                        id,
                        Client {
                            state: ClientState::new(&self.catalog),
                            udp_dest,
                            pending: Vec::new(),
                        },
                    );
                    new_clients.push(id);
                }
                ClientEvent::Line { id, line } => {
                    if let Some(client) = self.clients.get_mut(&id) {
                        client.pending.push(line);
                    }
                }
                ClientEvent::Disconnected { id } => {
                    self.clients.remove(&id);
                    new_clients.retain(|&n| n != id);
                }
            }
        }
        new_clients
    }

    async fn run_tick(&mut self, new_clients: Vec<ClientId>) {
        let now = Instant::now();

        // Roll every entity's snapshot, then apply this tick's input.
        self.dev.begin_tick();
        for client in self.clients.values_mut() {
            client.state.begin_tick();
            for line in client.pending.drain(..) {
                match parse_feature_line(&line) {
                    Some((name, value)) => client.state.apply_line(name, value),
                    None => warn!("Ignoring malformed client line: {}", line),
                }
            }
        }

        self.poll_device(now).await;
        decode::propagate_device(&self.catalog, &mut self.dev, &mut self.link);
        self.refresh_non_readable(now).await;

        let dev_diff = device_diff(&self.catalog, &self.dev);
        let mut client_diffs: BTreeMap<ClientId, Diff> = BTreeMap::new();
        for (&id, client) in &self.clients {
            client_diffs.insert(id, client_diff(&self.catalog, &client.state));
        }

        let routed = route(
            &self.catalog,
            &self.dev,
            &dev_diff,
            &client_diffs,
            &new_clients,
        );
        for (id, updates) in &routed.client_updates {
            if !updates.is_empty() {
                debug!("Tick {}: {} updates for client #{}", self.tick, updates.len(), id);
            }
        }

        self.write_device(&routed.device_writes, now).await;
        self.broadcast().await;
        self.tick += 1;
    }

    /// At most one device round trip; the response (or its absence) is
    /// recorded before decode runs.
    async fn poll_device(&mut self, now: Instant) {
        sched::gate_paths(&self.catalog, &mut self.dev, &self.link);
        let Some(path) =
            sched::choose_poll(&self.catalog, &self.dev, &self.link, now, &mut self.rng)
        else {
            return;
        };

        match self.control.get(path, &self.link.active_vfo).await {
            Ok(ControlReply::Ack(value)) => {
                self.dev.record_poll(path, Some(&value), now);
            }
            Ok(ControlReply::Nak(text)) => {
                warn!("Poll of {} refused: {}", path, text);
                self.dev.record_poll(path, None, now);
            }
            Err(e) => {
                warn!("Poll of {} failed: {}", path, e);
                self.dev.record_poll(path, None, now);
            }
        }
    }

    /// Re-send every non-readable writable feature whose last write is
    /// older than its TTL, guarding against unobserved drift on the
    /// device side.
    async fn refresh_non_readable(&mut self, now: Instant) {
        let stale = stale_unpolled_writes(&self.catalog, &self.dev, now);
        for (name, value) in stale {
            let Some((path, ext)) = decode::encode_write(&self.catalog, &self.dev, name, &value)
            else {
                continue;
            };
            match self.control.put(path, &self.link.active_vfo, &ext).await {
                Ok(reply) => {
                    if let ControlReply::Nak(text) = reply {
                        warn!("Refresh of {} refused: {}", name, text);
                    }
                    // The timestamp advances either way so a dead
                    // feature cannot hot-loop the control channel.
                    self.dev.touch_internal(&self.catalog, name, now);
                }
                Err(e) => warn!("Refresh of {} failed: {}", name, e),
            }
        }
    }

    /// Push routed client writes to the device, synchronously, in
    /// order. The in-memory value is applied optimistically before the
    /// reply is known and is not rolled back on NAK; a readable
    /// feature converges to device truth on its next poll.
    async fn write_device(&mut self, writes: &[(&'static str, Value)], now: Instant) {
        for (name, value) in writes {
            let Some((path, ext)) = decode::encode_write(&self.catalog, &self.dev, name, value)
            else {
                continue;
            };

            let readable = self
                .catalog
                .feature(name)
                .map(|f| f.readable)
                .unwrap_or(true);
            if readable {
                self.dev.set_internal(name, value.clone(), Some(now));
            } else {
                // No poll will ever converge this one; record the
                // write in both namespaces.
                self.dev
                    .record_unpolled_write(&self.catalog, name, value.clone(), now);
            }

            match self.control.put(path, &self.link.active_vfo, &ext).await {
                Ok(ControlReply::Nak(text)) => {
                    warn!("Write {} = {} not applied: {}", name, ext, text);
                }
                Ok(_) => {}
                Err(e) => warn!("Write {} failed: {}", name, e),
            }
        }
    }

    /// Broadcast the full internal state, tagged with the tick number,
    /// to every client's UDP destination.
    async fn broadcast(&self) {
        if self.clients.is_empty() {
            return;
        }
        let entries = self
            .catalog
            .features()
            .iter()
            .map(|f| (f.name, &self.dev.internal_sample(f.name).value));
        let datagram = format_snapshot(self.tick, entries);
        for (id, client) in &self.clients {
            if let Err(e) = self.udp.send_to(datagram.as_bytes(), client.udp_dest).await {
                debug!("UDP send to client #{} ({}) failed: {}", id, client.udp_dest, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigsync_protocol::codec::parse_snapshot;
    use rigsync_protocol::types::SnapshotTracker;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Scripted rigserve peer answering every catalog path.
    async fn spawn_device() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut reader = BufReader::new(reader);
            writer.write_all(b"rigserved test ready\n").await.unwrap();
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    break;
                }
                let cmd = line.trim();
                if cmd == "quit" {
                    break;
                }
                let reply = if cmd.starts_with("put ") {
                    "OK"
                } else if cmd.contains("raw_freq_and_mode_hex") {
                    "01 42 50 00 01"
                } else if cmd.contains("vfo_select") {
                    "VFOA"
                } else if cmd.contains("tx_status") {
                    "PTT FALSE HIGH-SWR FALSE"
                } else if cmd.contains("rx_status") {
                    "SQL FALSE TONE FALSE DISC TRUE STR 7"
                } else if cmd.contains("tx_metering") {
                    "PWR 0 ALC 0 SWR 0 MOD 0"
                } else if cmd.contains("bandpass_filter_band") {
                    "200 2800"
                } else {
                    "0"
                };
                writer.write_all(reply.as_bytes()).await.unwrap();
                writer.write_all(b"\n").await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_tick_cycle_against_scripted_device() {
        let addr = spawn_device().await;
        let control = ControlChannel::connect(
            &addr,
            "ft897d".to_string(),
            Duration::from_secs(2),
            1,
        )
        .await
        .unwrap();

        let udp_rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let udp_dest = udp_rx.local_addr().unwrap();
        let udp_tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let (events_tx, events_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let hub = Hub::new(
            Catalog::ft897d(),
            control,
            udp_tx,
            Duration::from_millis(1),
        );
        let handle = tokio::spawn(hub.run(events_rx, shutdown_rx));

        events_tx
            .send(ClientEvent::Connected { id: 1, udp_dest })
            .await
            .unwrap();
        events_tx
            .send(ClientEvent::Line {
                id: 1,
                line: "mic-gain: 0.7".to_string(),
            })
            .await
            .unwrap();

        // Snapshots must arrive with strictly increasing ticks and
        // eventually carry both the polled frequency and the client's
        // own write.
        let mut buf = vec![0u8; 16384];
        let mut tracker = SnapshotTracker::new();
        let mut seen_freq = false;
        let mut seen_gain = false;
        for _ in 0..500 {
            let n = tokio::time::timeout(Duration::from_secs(2), udp_rx.recv(&mut buf))
                .await
                .expect("no broadcast within timeout")
                .unwrap();
            let text = std::str::from_utf8(&buf[..n]).unwrap();
            let snapshot = parse_snapshot(text).expect("malformed snapshot");
            assert!(tracker.accept(&snapshot), "tick went backwards");
            for (name, value) in &snapshot.entries {
                if name == "freq" && value == "14250000" {
                    seen_freq = true;
                }
                if name == "mic-gain" && value == "0.7" {
                    seen_gain = true;
                }
            }
            if seen_freq && seen_gain {
                break;
            }
        }
        assert!(seen_freq, "polled frequency never broadcast");
        assert!(seen_gain, "client write not visible in broadcast");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
