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

//! Idle-connection sweeper. Once a minute every connection is probed:
//! quiet ones get a zero-length beat, and ones that have missed roughly
//! two beats are cancelled via their cancel flag plus a socket shutdown.

use std::{sync::Arc, thread, time::Duration};

use crate::context::ServerContext;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Idle time after which a beat is sent.
const PROBE_AFTER_MS: u64 = 60_000;
/// Idle time after which the connection is presumed dead.
const DROP_AFTER_MS: u64 = 110_000;

pub(crate) fn spawn_sweeper(ctx: Arc<ServerContext>) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("keepalive".into())
        .spawn(move || loop {
            thread::sleep(SWEEP_INTERVAL);

            for connection in ctx.connections().snapshot() {
                let idle = connection.idle_millis();

                if idle > DROP_AFTER_MS {
                    error!(
                        "Connection {} has been terminated as it has not replied to multiple keep-alive packets",
                        connection.id()
                    );
                    connection.cancel();
                } else if idle > PROBE_AFTER_MS {
                    // A failing probe write means the peer is gone.
                    if connection.send_keepalive().is_err() {
                        connection.cancel();
                    }
                }
            }
        })
        .expect("thread spawning only fails on resource exhaustion at startup; qed")
}
