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

//! The accept loop: one listener, one worker thread per connection, a
//! connection cap and the keepalive sweeper.

use std::{
    io::Write,
    net::{Ipv4Addr, SocketAddr, TcpListener},
    sync::Arc,
    thread,
};

use serde_json::json;

use crate::codes::ErrorCode;
use crate::connection::{serve_connection, Connection};
use crate::context::ServerContext;
use crate::keepalive;

/// A bound server ready to accept connections.
pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
}

impl Server {
    /// Binds the listening socket on the configured port.
    pub fn bind(ctx: Arc<ServerContext>) -> std::io::Result<Server> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, ctx.config().port))?;
        info!("Created SwiftDB server socket");
        Ok(Server { listener, ctx })
    }

    /// The bound address; useful when port 0 was configured.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the process exits. Each accepted socket
    /// gets a registry entry and a named worker thread.
    pub fn run(self) -> std::io::Result<()> {
        let port = self.local_addr()?.port();
        info!("SwiftDB is now listening for connections at TCP port {port}");

        let _sweeper = keepalive::spawn_sweeper(self.ctx.clone());
        info!("Socket keep-alive monitoring thread has been started");

        let mut next_id: u64 = 0;

        loop {
            let (mut stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Connection attempt has failed: {e}");
                    continue;
                }
            };

            let max = self.ctx.config().max_connections;
            if max != 0 && self.ctx.connections().len() >= max as usize {
                error!("A connection attempt has been refused due to no more connection slots");
                let refusal = json!({
                    "error": 1,
                    "data": {
                        "code": ErrorCode::TooManyConnections.as_u32(),
                        "text": ErrorCode::TooManyConnections.text(),
                    },
                });
                let _ = stream.write_all(refusal.to_string().as_bytes());
                continue;
            }

            next_id += 1;
            let id = next_id;

            let connection = match Connection::new(id, peer, &stream) {
                Ok(connection) => Arc::new(connection),
                Err(e) => {
                    error!("Could not set up connection state for {peer}: {e}");
                    continue;
                }
            };

            info!("A connection has been established with id {id} and address {peer}");
            self.ctx.connections().insert(connection.clone());

            let ctx = self.ctx.clone();
            let spawned = thread::Builder::new()
                .name(format!("conn-{id}"))
                .spawn(move || serve_connection(ctx, connection, stream));

            if let Err(e) = spawned {
                error!("Could not spawn a worker thread for connection {id}: {e}");
                self.ctx.connections().remove(id);
            }
        }
    }
}
