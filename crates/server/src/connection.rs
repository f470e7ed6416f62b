// Copyright 2022-2026 SwiftDB developers.
// This file is part of SwiftDB.

// SwiftDB is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// SwiftDB is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with SwiftDB.  If not, see <http://www.gnu.org/licenses/>.

//! Per-connection state and the worker loop. Each accepted socket gets a
//! registry entry and an OS thread that runs the handshake and then the
//! frame/dispatch loop until error, cancellation or orderly close.
//!
//! The keepalive sweeper never kills threads: it raises the cancel flag
//! and shuts the socket down, which can only disturb a worker blocked in
//! a socket read, never one holding a table mutex.

use std::{
    collections::HashMap,
    io,
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::{Mutex, RwLock};

use crate::codes::ErrorCode;
use crate::context::ServerContext;
use crate::dialect::error_response;
use crate::dispatch;
use crate::framing::{self, Frame, FrameError};
use crate::session::{self, Session};

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is past the unix epoch; qed")
        .as_millis() as u64
}

/// Shared state of one client connection. The worker owns the reading
/// half; responses and keepalive beats serialize on the writer lock.
pub struct Connection {
    id: u64,
    peer: SocketAddr,
    writer: Mutex<TcpStream>,
    control: TcpStream,
    last_activity: AtomicU64,
    cancelled: AtomicBool,
}

impl Connection {
    pub(crate) fn new(id: u64, peer: SocketAddr, stream: &TcpStream) -> io::Result<Connection> {
        Ok(Connection {
            id,
            peer,
            writer: Mutex::new(stream.try_clone()?),
            control: stream.try_clone()?,
            last_activity: AtomicU64::new(now_millis()),
            cancelled: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Marks traffic as seen; any received frame header counts.
    pub fn touch(&self) {
        self.last_activity.store(now_millis(), Ordering::Relaxed);
    }

    pub fn idle_millis(&self) -> u64 {
        now_millis().saturating_sub(self.last_activity.load(Ordering::Relaxed))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Raises the cancel flag and shuts the socket down so a worker
    /// blocked in `read` unblocks and exits.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        let _ = self.control.shutdown(Shutdown::Both);
    }

    /// Sends one framed payload.
    pub fn send_frame(&self, payload: &[u8]) -> io::Result<()> {
        framing::write_frame(&mut *self.writer.lock(), payload)
    }

    /// Sends a zero-length keepalive beat.
    pub fn send_keepalive(&self) -> io::Result<()> {
        framing::write_keepalive(&mut *self.writer.lock())
    }
}

/// Registry of live connections keyed by connection id.
pub struct Connections {
    map: RwLock<HashMap<u64, Arc<Connection>>>,
}

impl Connections {
    pub fn new() -> Connections {
        Connections {
            map: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, connection: Arc<Connection>) {
        self.map.write().insert(connection.id(), connection);
    }

    pub fn remove(&self, id: u64) {
        self.map.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.map.read().values().cloned().collect()
    }
}

impl Default for Connections {
    fn default() -> Self {
        Connections::new()
    }
}

/// Serializes and (for encrypted sessions) seals a response, then frames
/// it onto the wire.
fn send_response(
    connection: &Connection,
    session: &Session,
    response: &serde_json::Value,
) -> io::Result<()> {
    let plaintext = serde_json::to_vec(response).expect("responses are valid JSON trees; qed");
    let payload = match session.cipher {
        Some(ref cipher) => cipher
            .encrypt(&plaintext)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?,
        None => plaintext,
    };
    connection.send_frame(&payload)
}

/// The per-connection worker: handshake, then read/dispatch/respond until
/// the session ends. Removes the connection from the registry on exit.
pub(crate) fn serve_connection(
    ctx: Arc<ServerContext>,
    connection: Arc<Connection>,
    mut stream: TcpStream,
) {
    let id = connection.id();

    if let Ok(session) = session::perform_handshake(&mut stream, &ctx) {
        run_session(&ctx, &connection, &session, &mut stream);
    }

    ctx.connections().remove(id);
    let _ = stream.shutdown(Shutdown::Both);
    trace!(target: "net", "connection {id} closed");
}

fn run_session(
    ctx: &ServerContext,
    connection: &Connection,
    session: &Session,
    stream: &mut TcpStream,
) {
    let id = connection.id();
    let error_text = session.options.error_text;

    loop {
        if connection.is_cancelled() {
            info!("Connection {id} has been cancelled by the keepalive monitor");
            return;
        }

        match framing::read_frame(stream) {
            Ok(Frame::Keepalive) => {
                connection.touch();
            }
            Ok(Frame::Message(payload)) => {
                connection.touch();

                let plaintext = match session.cipher {
                    Some(ref cipher) => match cipher.decrypt(&payload) {
                        Ok(plaintext) => plaintext,
                        Err(_) => {
                            warn!("Connection {id} sent an undecryptable frame");
                            let response = error_response(
                                session.dialect,
                                None,
                                ErrorCode::JsonInvalid,
                                error_text,
                            );
                            if send_response(connection, session, &response).is_err() {
                                return;
                            }
                            continue;
                        }
                    },
                    None => payload,
                };

                let response = dispatch::handle_message(ctx, session, &plaintext);
                if let Err(e) = send_response(connection, session, &response) {
                    warn!("Connection {id} write failed, treating as disconnect: {e}");
                    return;
                }
            }
            Err(FrameError::PacketSizeExceeded) => {
                error!("Connection {id} has been terminated due to a packet exceeding the size limit");
                let response = error_response(
                    session.dialect,
                    None,
                    ErrorCode::PacketSizeExceeded,
                    error_text,
                );
                let _ = send_response(connection, session, &response);
                return;
            }
            Err(FrameError::OverflowProtectionTriggered) => {
                error!("Buffer overrun protection triggered by connection {id}");
                let response = error_response(
                    session.dialect,
                    None,
                    ErrorCode::OverflowProtectionTriggered,
                    error_text,
                );
                let _ = send_response(connection, session, &response);
                return;
            }
            Err(FrameError::Disconnected) => {
                if connection.is_cancelled() {
                    info!("Connection {id} has been cancelled by the keepalive monitor");
                } else {
                    info!("Received terminate signal from connection {id} - closing connection");
                }
                return;
            }
            Err(FrameError::Io(e)) => {
                if connection.is_cancelled() {
                    info!("Connection {id} has been cancelled by the keepalive monitor");
                } else {
                    error!("Connection {id} has been terminated due to an error during transmission: {e}");
                }
                return;
            }
        }
    }
}
