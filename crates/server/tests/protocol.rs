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

//! Full protocol tests against a live server on a loopback port.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;

use serde_json::{json, Value};
use tempdir::TempDir;

use swiftdb_crypto::{DhSession, FrameCipher};
use swiftdb_server::framing::{read_frame, write_frame, Frame};
use swiftdb_server::{Server, ServerConfig, ServerContext};

const ROOT_PASSWORD: &str = "test-root-password";

fn start_server(force_encrypted: bool, max_connections: u32) -> (SocketAddr, TempDir) {
    let dir = TempDir::new("swiftdb-proto").unwrap();
    let config = ServerConfig {
        port: 0,
        max_connections,
        data_directory: dir.path().join("data"),
        force_encrypted_traffic: force_encrypted,
    };

    let ctx = ServerContext::bootstrap(config).unwrap();
    ctx.accounts().install_root(ROOT_PASSWORD).unwrap();

    let server = Server::bind(ctx).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || {
        let _ = server.run();
    });

    (addr, dir)
}

struct Client {
    stream: TcpStream,
    cipher: Option<FrameCipher>,
    next_nonce: u64,
}

impl Client {
    fn connect_raw(addr: SocketAddr) -> Client {
        Client {
            stream: TcpStream::connect(addr).unwrap(),
            cipher: None,
            next_nonce: 100,
        }
    }

    /// Writes one unframed handshake message and reads the raw reply.
    fn exchange_raw(&mut self, body: &Value) -> Value {
        self.stream
            .write_all(body.to_string().as_bytes())
            .unwrap();
        self.read_raw()
    }

    fn read_raw(&mut self) -> Value {
        let mut buf = [0u8; 8192];
        let n = self.stream.read(&mut buf).unwrap();
        assert!(n > 0, "server closed before replying");
        serde_json::from_slice(&buf[..n]).unwrap()
    }

    /// Connects and performs a plaintext handshake bound to the implicit
    /// root account.
    fn connect(addr: SocketAddr) -> Client {
        let mut client = Client::connect_raw(addr);
        let reply = client.exchange_raw(&json!({ "version": { "major": 7, "minor": 3 } }));
        assert_eq!(reply["version"]["major"], json!(7));
        client
    }

    /// Connects with explicit credentials.
    fn connect_as(addr: SocketAddr, username: &str, password: &str) -> Client {
        let mut client = Client::connect_raw(addr);
        let reply = client.exchange_raw(&json!({
            "version": { "major": 7, "minor": 3 },
            "auth": { "username": username, "password": password },
        }));
        assert_eq!(reply["version"]["major"], json!(7), "handshake failed: {reply}");
        client
    }

    /// Connects and negotiates the Diffie-Hellman AES-256-CBC cipher.
    fn connect_encrypted(addr: SocketAddr) -> Client {
        let mut client = Client::connect_raw(addr);
        let reply = client.exchange_raw(&json!({
            "version": { "major": 7, "minor": 3 },
            "cipher": { "algorithm": "diffie-hellman-aes256-cbc" },
        }));
        assert_eq!(reply["version"]["major"], json!(7));
        assert_eq!(reply["cipher"]["generator"], json!(2));
        assert!(reply["cipher"]["initial_iv"].is_string());

        let server_public = reply["cipher"]["public_key"].as_str().unwrap();
        let dh = DhSession::new();
        let key = dh.derive_key(server_public).unwrap();

        let confirm = client.exchange_raw(&json!({ "public_key": dh.public_key_b64() }));
        assert_eq!(confirm, json!({}));

        client.cipher = Some(FrameCipher::new(key));
        client
    }

    fn send_value(&mut self, value: &Value) {
        let plain = serde_json::to_vec(value).unwrap();
        let payload = match &self.cipher {
            Some(cipher) => cipher.encrypt(&plain).unwrap(),
            None => plain,
        };
        write_frame(&mut self.stream, &payload).unwrap();
    }

    fn recv_value(&mut self) -> Value {
        loop {
            match read_frame(&mut self.stream).unwrap() {
                Frame::Keepalive => continue,
                Frame::Message(payload) => {
                    let plain = match &self.cipher {
                        Some(cipher) => cipher.decrypt(&payload).unwrap(),
                        None => payload,
                    };
                    return serde_json::from_slice(&plain).unwrap();
                }
            }
        }
    }

    /// Sends one query and returns `(nonce, response)`.
    fn query(&mut self, op: u64, data: Value) -> (u64, Value) {
        let nonce = self.next_nonce;
        self.next_nonce += 1;
        self.send_value(&json!({ "op": op, "nonce": nonce, "data": data }));
        (nonce, self.recv_value())
    }

    /// Sends a query and asserts a success response, returning its data.
    fn expect_ok(&mut self, op: u64, data: Value) -> Value {
        let (nonce, response) = self.query(op, data);
        assert_eq!(response.get("nonce"), Some(&json!(nonce)), "error: {response}");
        assert!(response.get("error").is_none(), "unexpected error: {response}");
        response.get("data").cloned().unwrap_or(Value::Null)
    }

    /// Sends a query and asserts an error response with the given code.
    fn expect_error(&mut self, op: u64, data: Value, code: u32) {
        let (nonce, response) = self.query(op, data);
        assert_eq!(response.get("nonce"), Some(&json!(nonce)));
        assert_eq!(response.get("error"), Some(&json!(1)), "expected error: {response}");
        assert_eq!(response["data"]["code"], json!(code), "wrong code: {response}");
    }
}

// Operation codes.
const OP_CREATE_TABLE: u64 = 0;
const OP_OPEN_TABLE: u64 = 1;
const OP_FETCH_TABLE_META: u64 = 2;
const OP_INSERT: u64 = 3;
const OP_FIND_ONE: u64 = 4;
const OP_FIND_ALL: u64 = 5;
const OP_ERASE_ALL: u64 = 6;
const OP_UPDATE_ALL: u64 = 7;
const OP_REBUILD: u64 = 9;
const OP_CREATE_ACCOUNT: u64 = 10;
const OP_SET_TABLE_PRIVILEGES: u64 = 12;
const OP_FETCH_TABLES: u64 = 14;
const OP_NO_OP: u64 = 17;

fn users_columns() -> Value {
    json!({
        "id": { "type": "long" },
        "name": { "type": "string" },
    })
}

fn create_and_open_users(client: &mut Client) {
    client.expect_ok(OP_CREATE_TABLE, json!({ "name": "users", "columns": users_columns() }));
    client.expect_ok(OP_OPEN_TABLE, json!({ "table": "users" }));
}

#[test]
fn handshake_minimal_reports_server_version() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect_raw(addr);
    let reply = client.exchange_raw(&json!({ "version": { "major": 7, "minor": 3 } }));
    assert_eq!(reply["version"]["major"], json!(7));
    assert_eq!(reply["version"]["minor"], json!(3));
}

#[test]
fn handshake_rejects_version_skew() {
    let (addr, _dir) = start_server(false, 0);

    let mut old = Client::connect_raw(addr);
    let reply = old.exchange_raw(&json!({ "version": { "major": 6, "minor": 0 } }));
    assert_eq!(reply["data"]["code"], json!(6));

    let mut new = Client::connect_raw(addr);
    let reply = new.exchange_raw(&json!({ "version": { "major": 8, "minor": 0 } }));
    assert_eq!(reply["data"]["code"], json!(7));
}

#[test]
fn handshake_rejects_garbage() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect_raw(addr);
    client.stream.write_all(b"not json at all").unwrap();
    let reply = client.read_raw();
    assert_eq!(reply["data"]["code"], json!(5));
}

#[test]
fn plaintext_refused_when_encryption_forced() {
    let (addr, _dir) = start_server(true, 0);
    let mut client = Client::connect_raw(addr);
    let reply = client.exchange_raw(&json!({ "version": { "major": 7, "minor": 3 } }));
    assert_eq!(reply["data"]["code"], json!(20));
}

#[test]
fn create_insert_find_round_trip() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    create_and_open_users(&mut client);
    client.expect_ok(
        OP_INSERT,
        json!({ "table": "users", "columns": { "id": 42, "name": "ada" } }),
    );

    let row = client.expect_ok(
        OP_FIND_ONE,
        json!({ "table": "users", "where": { "id": 42 } }),
    );
    assert_eq!(row, json!({ "id": 42, "name": "ada" }));

    // A miss is null, not an error.
    let miss = client.expect_ok(
        OP_FIND_ONE,
        json!({ "table": "users", "where": { "id": 43 } }),
    );
    assert_eq!(miss, Value::Null);
}

#[test]
fn substring_match_returns_scan_order() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    create_and_open_users(&mut client);
    client.expect_ok(
        OP_INSERT,
        json!({ "table": "users", "columns": { "id": 1, "name": "alphabet" } }),
    );
    client.expect_ok(
        OP_INSERT,
        json!({ "table": "users", "columns": { "id": 2, "name": "beta" } }),
    );

    let rows = client.expect_ok(
        OP_FIND_ALL,
        json!({ "table": "users", "where": { "name": { "contains": "bet" } } }),
    );
    assert_eq!(
        rows,
        json!([{ "id": 1, "name": "alphabet" }, { "id": 2, "name": "beta" }])
    );
}

#[test]
fn update_in_place_then_relocate() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    create_and_open_users(&mut client);
    client.expect_ok(
        OP_INSERT,
        json!({ "table": "users", "columns": { "id": 1, "name": "ada" } }),
    );

    // Shorter value: stays in place.
    let counted = client.expect_ok(
        OP_UPDATE_ALL,
        json!({ "table": "users", "where": { "id": 1 }, "changes": { "name": "a" } }),
    );
    assert_eq!(counted, json!({ "count": 1 }));
    let row = client.expect_ok(OP_FIND_ONE, json!({ "table": "users", "where": { "id": 1 } }));
    assert_eq!(row["name"], json!("a"));

    // Much longer value: relocates.
    let big = "x".repeat(500);
    client.expect_ok(
        OP_UPDATE_ALL,
        json!({ "table": "users", "where": { "id": 1 }, "changes": { "name": big } }),
    );
    let row = client.expect_ok(OP_FIND_ONE, json!({ "table": "users", "where": { "id": 1 } }));
    assert_eq!(row["name"], json!("x".repeat(500)));
}

#[test]
fn erase_then_rebuild_compacts() {
    let _ = env_logger::try_init();

    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    create_and_open_users(&mut client);
    for id in 0..1000 {
        client.expect_ok(
            OP_INSERT,
            json!({ "table": "users", "columns": { "id": id, "name": "row" } }),
        );
    }

    let counted = client.expect_ok(
        OP_ERASE_ALL,
        json!({ "table": "users", "where": { "id": { "less_than": 500 } } }),
    );
    assert_eq!(counted, json!({ "count": 500 }));

    let stats = client.expect_ok(OP_REBUILD, json!({ "table": "users" }));
    assert_eq!(stats["record_count"], json!(500));
    assert_eq!(stats["dead_record_count"], json!(500));

    let rows = client.expect_ok(OP_FIND_ALL, json!({ "table": "users", "where": {} }));
    assert_eq!(rows.as_array().unwrap().len(), 500);
}

#[test]
fn view_denied_reads_as_table_not_found() {
    let (addr, _dir) = start_server(false, 0);
    let mut root = Client::connect(addr);

    create_and_open_users(&mut root);
    root.expect_ok(
        OP_CREATE_ACCOUNT,
        json!({
            "username": "viewer",
            "password": "secret",
            "hierarchy_index": 5,
            "permissions": {},
        }),
    );

    let mut viewer = Client::connect_as(addr, "viewer", "secret");
    viewer.expect_error(
        OP_FIND_ONE,
        json!({ "table": "users", "where": { "id": 1 } }),
        9,
    );

    // Granting view+read turns the table visible.
    root.expect_ok(
        OP_SET_TABLE_PRIVILEGES,
        json!({
            "username": "viewer",
            "table": "users",
            "permissions": { "VIEW": true, "READ": true },
        }),
    );
    let miss = viewer.expect_ok(
        OP_FIND_ONE,
        json!({ "table": "users", "where": { "id": 1 } }),
    );
    assert_eq!(miss, Value::Null);

    // Still not writable.
    viewer.expect_error(
        OP_INSERT,
        json!({ "table": "users", "columns": { "id": 1, "name": "n" } }),
        25,
    );
}

#[test]
fn account_creation_guards() {
    let (addr, _dir) = start_server(false, 0);
    let mut root = Client::connect(addr);

    root.expect_error(
        OP_CREATE_ACCOUNT,
        json!({ "username": "root", "password": "pw", "hierarchy_index": 5, "permissions": {} }),
        22,
    );
    root.expect_error(
        OP_CREATE_ACCOUNT,
        json!({ "username": "zero", "password": "pw", "hierarchy_index": 0, "permissions": {} }),
        23,
    );
    root.expect_error(
        OP_CREATE_ACCOUNT,
        json!({ "username": "big", "password": "pw", "hierarchy_index": 1000001, "permissions": {} }),
        23,
    );

    root.expect_ok(
        OP_CREATE_ACCOUNT,
        json!({
            "username": "creator",
            "password": "pw",
            "hierarchy_index": 5,
            "permissions": { "CREATE_ACCOUNTS": true },
        }),
    );
    root.expect_error(
        OP_CREATE_ACCOUNT,
        json!({ "username": "creator", "password": "pw", "hierarchy_index": 6, "permissions": {} }),
        21,
    );

    // A creator cannot grant bits it does not hold, nor rank above
    // itself.
    let mut creator = Client::connect_as(addr, "creator", "pw");
    creator.expect_error(
        OP_CREATE_ACCOUNT,
        json!({
            "username": "minion",
            "password": "pw",
            "hierarchy_index": 9,
            "permissions": { "TABLE_ADMINISTRATOR": true },
        }),
        25,
    );
    creator.expect_error(
        OP_CREATE_ACCOUNT,
        json!({ "username": "minion", "password": "pw", "hierarchy_index": 5, "permissions": {} }),
        25,
    );
    creator.expect_ok(
        OP_CREATE_ACCOUNT,
        json!({
            "username": "minion",
            "password": "pw",
            "hierarchy_index": 9,
            "permissions": { "CREATE_ACCOUNTS": true },
        }),
    );
}

#[test]
fn reserved_table_names_are_rejected() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    client.expect_error(
        OP_CREATE_TABLE,
        json!({ "name": "--internal-sneaky", "columns": users_columns() }),
        22,
    );
    client.expect_error(OP_OPEN_TABLE, json!({ "table": "--internal-table-permissions" }), 22);
    client.expect_error(
        OP_FIND_ONE,
        json!({ "table": "--internal-table-permissions", "where": {} }),
        22,
    );
}

#[test]
fn too_many_columns_is_rejected() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    let mut columns = serde_json::Map::new();
    for i in 0..21 {
        columns.insert(format!("col_{}", ('a'..='z').nth(i).unwrap()), json!({ "type": "byte" }));
    }
    client.expect_error(
        OP_CREATE_TABLE,
        json!({ "name": "wide", "columns": columns }),
        26,
    );
}

#[test]
fn open_twice_reports_already_open() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    create_and_open_users(&mut client);
    client.expect_error(OP_OPEN_TABLE, json!({ "table": "users" }), 15);

    let tables = client.expect_ok(OP_FETCH_TABLES, json!({}));
    assert_eq!(tables, json!(["users"]));
}

#[test]
fn fetch_table_meta_describes_columns() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    create_and_open_users(&mut client);
    let meta = client.expect_ok(OP_FETCH_TABLE_META, json!({ "table": "users" }));
    assert_eq!(meta["name"], json!("users"));
    assert_eq!(meta["column_count"], json!(2));
    assert_eq!(meta["columns"]["id"]["type"], json!("long"));
    assert_eq!(meta["columns"]["id"]["size"], json!(8));
    assert_eq!(meta["columns"]["name"]["type"], json!("string"));
    assert_eq!(meta["columns"]["name"]["size"], json!(0));
    assert_eq!(meta["columns"]["name"]["physical_index"], json!(1));
}

#[test]
fn nonce_is_echoed_and_required() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    let (nonce, response) = client.query(OP_NO_OP, json!({}));
    assert_eq!(response, json!({ "nonce": nonce }));

    // Missing nonce: error with no nonce echoed.
    client.send_value(&json!({ "op": OP_NO_OP, "data": {} }));
    let response = client.recv_value();
    assert!(response.get("nonce").is_none());
    assert_eq!(response["data"]["code"], json!(13));

    // Unknown op.
    client.expect_error(99, json!({}), 10);
}

#[test]
fn keepalive_beat_keeps_the_session_alive() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    client.stream.write_all(&0u32.to_le_bytes()).unwrap();
    let (_, response) = client.query(OP_NO_OP, json!({}));
    assert!(response.get("error").is_none());
}

#[test]
fn oversize_packet_is_fatal() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    let too_big: u32 = 100 * 1024 * 1024 + 1;
    client.stream.write_all(&too_big.to_le_bytes()).unwrap();

    let response = client.recv_value();
    assert_eq!(response["data"]["code"], json!(1));

    // The server closes the session afterwards.
    let mut rest = Vec::new();
    assert_eq!(client.stream.read_to_end(&mut rest).unwrap(), 0);
}

#[test]
fn missing_terminator_is_fatal() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect(addr);

    client.stream.write_all(&3u32.to_le_bytes()).unwrap();
    client.stream.write_all(b"ab\x01").unwrap();

    let response = client.recv_value();
    assert_eq!(response["data"]["code"], json!(2));
}

#[test]
fn short_attributes_shape_responses() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect_raw(addr);
    let reply = client.exchange_raw(&json!({
        "version": { "major": 7, "minor": 3 },
        "options": { "short_attributes": true, "error_text": false },
    }));
    assert_eq!(reply["version"]["major"], json!(7));

    // Requests stay long-form; responses shrink.
    client.send_value(&json!({ "op": OP_NO_OP, "nonce": 5, "data": {} }));
    let response = client.recv_value();
    assert_eq!(response, json!({ "n": 5 }));

    client.send_value(&json!({ "op": OP_FIND_ONE, "nonce": 6, "data": { "table": "nope", "where": {} } }));
    let response = client.recv_value();
    assert_eq!(response["n"], json!(6));
    assert_eq!(response["e"], json!(1));
    assert_eq!(response["d"]["c"], json!(16));
    assert!(response["d"].get("t").is_none());
}

#[test]
fn encrypted_session_round_trip() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect_encrypted(addr);

    create_and_open_users(&mut client);
    client.expect_ok(
        OP_INSERT,
        json!({ "table": "users", "columns": { "id": 7, "name": "cipher" } }),
    );
    let row = client.expect_ok(OP_FIND_ONE, json!({ "table": "users", "where": { "id": 7 } }));
    assert_eq!(row, json!({ "id": 7, "name": "cipher" }));
}

#[test]
fn connection_cap_refuses_politely() {
    let (addr, _dir) = start_server(false, 1);

    let _first = Client::connect(addr);

    let mut second = Client::connect_raw(addr);
    let refusal = second.read_raw();
    assert_eq!(refusal["data"]["code"], json!(19));
}

#[test]
fn bad_credentials_close_the_handshake() {
    let (addr, _dir) = start_server(false, 0);
    let mut client = Client::connect_raw(addr);
    let reply = client.exchange_raw(&json!({
        "version": { "major": 7, "minor": 3 },
        "auth": { "username": "root", "password": "wrong" },
    }));
    assert_eq!(reply["data"]["code"], json!(18));
}
