// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Line-oriented control server.
//!
//! Commands are dispatched through an explicit registry of handler
//! functions; open rig sessions live in a session registry shared by
//! all connections. Replies are a single line: the value, `OK`, or a
//! `? `-prefixed negative response.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use rigsync_backend::{BackendRegistry, RigSession};
use rigsync_protocol::types::NAK_PREFIX;

const WELCOME: &str = concat!("rigserved ", env!("CARGO_PKG_VERSION"), " ready");

/// Open rig sessions, keyed by session name.
#[derive(Default)]
pub struct SessionRegistry {
    rigs: HashMap<String, Box<dyn RigSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, backends: &BackendRegistry, model: &str, name: &str) -> Result<(), String> {
        if self.rigs.contains_key(name) {
            return Err(format!("rig '{}' already open", name));
        }
        let rig = backends.build_rig(model)?;
        info!("Opened rig '{}' (model {})", name, rig.model());
        self.rigs.insert(name.to_string(), rig);
        Ok(())
    }

    pub fn close(&mut self, name: &str) -> Result<(), String> {
        match self.rigs.remove(name) {
            Some(_) => {
                info!("Closed rig '{}'", name);
                Ok(())
            }
            None => Err(format!("rig '{}' not open", name)),
        }
    }

    pub fn rig_mut(&mut self, name: &str) -> Option<&mut Box<dyn RigSession>> {
        self.rigs.get_mut(name)
    }
}

struct Dispatcher {
    backends: BackendRegistry,
    sessions: Mutex<SessionRegistry>,
}

type CommandHandler = fn(&Dispatcher, &str) -> String;

/// The explicit command registry: verb to handler, no runtime
/// evaluation of any kind.
fn command_registry() -> HashMap<&'static str, CommandHandler> {
    let mut registry: HashMap<&'static str, CommandHandler> = HashMap::new();
    registry.insert("open", cmd_open);
    registry.insert("close", cmd_close);
    registry.insert("get", cmd_get);
    registry.insert("put", cmd_put);
    registry.insert("test", cmd_test);
    registry
}

fn nak(text: impl AsRef<str>) -> String {
    format!("{}{}", NAK_PREFIX, text.as_ref())
}

/// Split a `<rig>.<path>` target at the first dot.
fn split_target(target: &str) -> Result<(&str, &str), String> {
    target
        .split_once('.')
        .ok_or_else(|| format!("expected <rig>.<path>, got '{}'", target))
}

fn cmd_open(ctx: &Dispatcher, args: &str) -> String {
    let mut parts = args.split_whitespace();
    let (Some(model), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
        return nak("usage: open <model> <name>");
    };
    let mut sessions = ctx.sessions.lock().unwrap_or_else(|e| e.into_inner());
    match sessions.open(&ctx.backends, model, name) {
        Ok(()) => "OK".to_string(),
        Err(e) => nak(e),
    }
}

fn cmd_close(ctx: &Dispatcher, args: &str) -> String {
    let name = args.trim();
    if name.is_empty() {
        return nak("usage: close <name>");
    }
    let mut sessions = ctx.sessions.lock().unwrap_or_else(|e| e.into_inner());
    match sessions.close(name) {
        Ok(()) => "OK".to_string(),
        Err(e) => nak(e),
    }
}

fn cmd_get(ctx: &Dispatcher, args: &str) -> String {
    let target = args.trim();
    let (rig_name, path) = match split_target(target) {
        Ok(t) => t,
        Err(e) => return nak(e),
    };
    let mut sessions = ctx.sessions.lock().unwrap_or_else(|e| e.into_inner());
    let Some(rig) = sessions.rig_mut(rig_name) else {
        return nak(format!("rig '{}' not open", rig_name));
    };
    match rig.get(path) {
        Ok(value) => value,
        Err(e) => nak(e),
    }
}

fn cmd_put(ctx: &Dispatcher, args: &str) -> String {
    let Some((target, value)) = args.trim().split_once(' ') else {
        return nak("usage: put <rig>.<path> <value>");
    };
    let (rig_name, path) = match split_target(target) {
        Ok(t) => t,
        Err(e) => return nak(e),
    };
    let mut sessions = ctx.sessions.lock().unwrap_or_else(|e| e.into_inner());
    let Some(rig) = sessions.rig_mut(rig_name) else {
        return nak(format!("rig '{}' not open", rig_name));
    };
    match rig.put(path, value) {
        Ok(reply) => reply,
        Err(e) => nak(e),
    }
}

fn cmd_test(ctx: &Dispatcher, args: &str) -> String {
    let (rig_name, path) = match split_target(args.trim()) {
        Ok(t) => t,
        Err(e) => return nak(e),
    };
    let mut sessions = ctx.sessions.lock().unwrap_or_else(|e| e.into_inner());
    let Some(rig) = sessions.rig_mut(rig_name) else {
        return nak(format!("rig '{}' not open", rig_name));
    };
    match rig.test(path) {
        Ok(reply) => reply,
        Err(e) => nak(e),
    }
}

/// Dispatch one command line to its handler.
fn dispatch(ctx: &Dispatcher, registry: &HashMap<&'static str, CommandHandler>, line: &str) -> String {
    let line = line.trim();
    let (verb, args) = line.split_once(' ').unwrap_or((line, ""));
    match registry.get(verb) {
        Some(handler) => handler(ctx, args),
        None => nak(format!("unknown command '{}'", verb)),
    }
}

/// Run the control server until the listener fails.
pub async fn run_server(
    listener: TcpListener,
    backends: BackendRegistry,
    preopened: SessionRegistry,
) -> std::io::Result<()> {
    let ctx = Arc::new(Dispatcher {
        backends,
        sessions: Mutex::new(preopened),
    });

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Control client connected: {}", peer);
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, peer, ctx).await {
                error!("Control client {} error: {:?}", peer, e);
            }
        });
    }
}

async fn handle_client(
    socket: TcpStream,
    peer: SocketAddr,
    ctx: Arc<Dispatcher>,
) -> std::io::Result<()> {
    let registry = command_registry();
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    writer.write_all(WELCOME.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            info!("Control client {} disconnected", peer);
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" {
            info!("Control client {} quit", peer);
            break;
        }

        let reply = dispatch(&ctx, &registry, trimmed);
        if reply.starts_with(NAK_PREFIX) {
            warn!("{} <- {} (for '{}')", peer, reply, trimmed);
        }
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}
