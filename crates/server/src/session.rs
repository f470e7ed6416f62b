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

//! The session state machine. A connection starts with an unframed
//! configuration handshake (one read of at most 1000 bytes, one reply),
//! optionally negotiates the Diffie-Hellman AES-256-CBC cipher with a
//! second exchange, and only then switches to framed traffic.
//!
//! Handshake-phase errors are always long-form JSON with error text and
//! end the connection.

use std::{
    io::{Read, Write},
    net::TcpStream,
    sync::Arc,
    thread,
    time::Duration,
};

use serde_json::json;
use swiftdb_accounts::DatabaseAccount;
use swiftdb_crypto::{DhSession, FrameCipher, DH_GENERATOR, AES_IV_SIZE};

use crate::codes::ErrorCode;
use crate::context::ServerContext;
use crate::dialect::FieldDialect;

/// Protocol version advertised and enforced in the handshake.
pub const PROTOCOL_VERSION_MAJOR: u32 = 7;
pub const PROTOCOL_VERSION_MINOR: u32 = 3;

/// A handshake message must arrive whole within this many bytes.
const MAX_HANDSHAKE_BYTES: usize = 1000;

/// Penalty delay before closing on a too-new client, rate-limiting
/// reconnect storms from incompatible clients.
const VERSION_REJECT_DELAY: Duration = Duration::from_secs(2);

/// Per-session response-shaping options, fixed at handshake time.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub short_attributes: bool,
    pub error_text: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            short_attributes: false,
            error_text: true,
        }
    }
}

/// An established session: the bound account, negotiated options and the
/// payload cipher when one was agreed.
pub struct Session {
    pub account: Arc<DatabaseAccount>,
    pub options: SessionOptions,
    pub dialect: FieldDialect,
    pub cipher: Option<FrameCipher>,
    pub client_version: (u32, u32),
}

#[derive(Deserialize)]
struct HandshakeRequest {
    version: VersionInfo,
    cipher: Option<CipherRequest>,
    options: Option<OptionsRequest>,
    auth: Option<AuthRequest>,
}

#[derive(Deserialize)]
struct VersionInfo {
    major: u32,
    minor: u32,
}

#[derive(Deserialize)]
struct CipherRequest {
    algorithm: String,
}

#[derive(Deserialize, Default)]
struct OptionsRequest {
    short_attributes: Option<bool>,
    error_text: Option<bool>,
}

#[derive(Deserialize)]
struct AuthRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ClientKeyMessage {
    public_key: String,
}

/// Reads one unframed handshake message. `None` means the peer closed.
fn read_handshake_message(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = [0u8; MAX_HANDSHAKE_BYTES];
    let n = stream.read(&mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(buf[..n].to_vec()))
}

/// Sends an unframed long-form handshake error.
fn send_handshake_error(stream: &mut TcpStream, code: ErrorCode) {
    let body = json!({
        "error": 1,
        "data": { "code": code.as_u32(), "text": code.text() },
    });
    let _ = stream.write_all(body.to_string().as_bytes());
}

fn send_handshake_json(stream: &mut TcpStream, body: &serde_json::Value) -> Result<(), ()> {
    stream
        .write_all(body.to_string().as_bytes())
        .map_err(|_| ())
}

/// Runs the configuration handshake. Any failure has already been
/// reported to the peer when this returns `Err`.
pub(crate) fn perform_handshake(
    stream: &mut TcpStream,
    ctx: &ServerContext,
) -> Result<Session, ()> {
    let raw = match read_handshake_message(stream) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            info!("Peer closed the connection during the handshake");
            return Err(());
        }
        Err(e) => {
            error!("Socket error during the handshake: {e}");
            send_handshake_error(stream, ErrorCode::HandshakeConfigJsonInvalid);
            return Err(());
        }
    };

    let request: HandshakeRequest = match serde_json::from_slice(&raw) {
        Ok(request) => request,
        Err(_) => {
            error!("Connection terminated due to an invalid handshake");
            send_handshake_error(stream, ErrorCode::HandshakeConfigJsonInvalid);
            return Err(());
        }
    };

    match request.version.major {
        major if major > PROTOCOL_VERSION_MAJOR => {
            error!("Connection terminated: client version {major} is newer than the server");
            send_handshake_error(stream, ErrorCode::OutdatedServerVersion);
            thread::sleep(VERSION_REJECT_DELAY);
            return Err(());
        }
        major if major < PROTOCOL_VERSION_MAJOR => {
            error!("Connection terminated: client version {major} is no longer supported");
            send_handshake_error(stream, ErrorCode::OutdatedClientVersion);
            return Err(());
        }
        _ => {}
    }

    // Cipher negotiation. The reply carries our key material; the secret
    // is derived from the client's follow-up message.
    let mut dh: Option<DhSession> = None;
    let mut cipher_reply = None;

    if let Some(cipher_request) = request.cipher {
        if cipher_request.algorithm != "diffie-hellman-aes256-cbc" {
            send_handshake_error(stream, ErrorCode::HandshakeConfigJsonInvalid);
            return Err(());
        }

        let mut initial_iv = [0u8; AES_IV_SIZE];
        if swiftdb_crypto::random_bytes(&mut initial_iv).is_err() {
            error!("CSPRNG failure during cipher negotiation");
            send_handshake_error(stream, ErrorCode::Internal);
            return Err(());
        }

        let session = DhSession::new();
        cipher_reply = Some(json!({
            "public_key": session.public_key_b64(),
            "prime": session.prime_b64(),
            "generator": DH_GENERATOR,
            "initial_iv": base64_iv(&initial_iv),
        }));
        dh = Some(session);
    } else if ctx.config().force_encrypted_traffic {
        error!("Connection terminated: plaintext session refused by server policy");
        send_handshake_error(stream, ErrorCode::TrafficEncryptionMandatory);
        return Err(());
    }

    let options_request = request.options.unwrap_or_default();
    let options = SessionOptions {
        short_attributes: options_request.short_attributes.unwrap_or(false),
        error_text: options_request.error_text.unwrap_or(true),
    };

    // Session accounts: explicit credentials when supplied, the implicit
    // root account otherwise.
    let account = match request.auth {
        Some(auth) => match ctx.accounts().verify(&auth.username, &auth.password) {
            Some(account) => account,
            None => {
                error!("Connection terminated due to failed authentication");
                send_handshake_error(stream, ErrorCode::InvalidAccountCredentials);
                return Err(());
            }
        },
        None => match ctx.accounts().get(swiftdb_accounts::ROOT_USERNAME) {
            Some(account) => account,
            None => {
                error!("Connection terminated: no credentials and the root account is disabled");
                send_handshake_error(stream, ErrorCode::InvalidAccountCredentials);
                return Err(());
            }
        },
    };

    let mut reply = json!({
        "version": {
            "major": PROTOCOL_VERSION_MAJOR,
            "minor": PROTOCOL_VERSION_MINOR,
        },
    });
    if let Some(cipher) = cipher_reply {
        reply["cipher"] = cipher;
    }
    send_handshake_json(stream, &reply)?;

    // Key exchange round: import the client public value, confirm with an
    // empty object once both sides hold the session key.
    let cipher = match dh {
        Some(dh) => {
            let raw = match read_handshake_message(stream) {
                Ok(Some(raw)) => raw,
                _ => {
                    info!("Peer closed the connection during the key exchange");
                    return Err(());
                }
            };

            let message: ClientKeyMessage = match serde_json::from_slice(&raw) {
                Ok(message) => message,
                Err(_) => {
                    send_handshake_error(stream, ErrorCode::HandshakeConfigJsonInvalid);
                    return Err(());
                }
            };

            let key = match dh.derive_key(&message.public_key) {
                Ok(key) => key,
                Err(_) => {
                    send_handshake_error(stream, ErrorCode::HandshakeConfigJsonInvalid);
                    return Err(());
                }
            };

            send_handshake_json(stream, &json!({}))?;
            Some(FrameCipher::new(key))
        }
        None => None,
    };

    info!(
        "Successful handshake for account {:?} with client version {}.{}{}",
        account.username,
        request.version.major,
        request.version.minor,
        if cipher.is_some() { " (encrypted)" } else { "" },
    );

    Ok(Session {
        account,
        options,
        dialect: FieldDialect::from_short_attributes(options.short_attributes),
        cipher,
        client_version: (request.version.major, request.version.minor),
    })
}

fn base64_iv(iv: &[u8; AES_IV_SIZE]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine};
    STANDARD.encode(iv)
}
