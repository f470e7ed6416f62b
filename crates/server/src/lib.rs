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

//! The SwiftDB network layer: length-prefixed framing over TCP, the
//! handshake/session state machine with optional Diffie-Hellman AES-256
//! encryption, per-connection worker threads, the keepalive sweeper and
//! the query dispatcher tying the wire protocol to the storage engine.

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde_derive;

mod codes;
mod connection;
mod context;
mod dialect;
mod dispatch;
pub mod framing;
mod keepalive;
mod server;
mod session;

pub use codes::ErrorCode;
pub use connection::{Connection, Connections};
pub use context::{
    ServerConfig, ServerContext, INTERNAL_PERMISSIONS_TABLE, RESERVED_TABLE_PREFIX,
};
pub use dialect::FieldDialect;
pub use server::Server;
pub use session::{Session, SessionOptions, PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR};
