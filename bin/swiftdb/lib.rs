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

//! SwiftDB server startup: configuration, bootstrap, the temporary root
//! account and signal handling around the accept loop.

#[macro_use]
extern crate log;

mod config;
mod logger;

pub use config::Config;
pub use logger::setup_log;

use std::sync::Arc;

use swiftdb_server::{Server, ServerContext};

const ROOT_PASSWORD_LEN: usize = 20;

/// Derives a printable one-session root password from CSPRNG bytes.
fn generate_root_password() -> Result<String, String> {
    let mut bytes = [0u8; ROOT_PASSWORD_LEN];
    swiftdb_crypto::random_bytes(&mut bytes)
        .map_err(|e| format!("could not generate the root password: {e}"))?;

    // Map each byte onto the ASCII range '0'..='Y'.
    Ok(bytes.iter().map(|b| (48 + b % 42) as char).collect())
}

/// Boots the server and blocks in the accept loop until the process is
/// terminated.
pub fn start(config: Config) -> Result<(), String> {
    if config.enable_root_account {
        warn!("The root account is enabled with the temporary password being printed to the logs which is unsafe");
        warn!("Make sure to disable the root account after creating a user account");
    }

    let ctx = ServerContext::bootstrap(config.server_config())?;

    if config.enable_root_account {
        let password = generate_root_password()?;
        ctx.accounts()
            .install_root(&password)
            .map_err(|e| format!("could not install the root account: {e}"))?;
        info!("The session password for the root account is {password} with the username being 'root'");
    } else if ctx.accounts().is_empty() {
        warn!("Did not find any database user accounts - root account is also not enabled");
        warn!("You will be unable to connect and perform any queries, including addition of new user accounts");
        warn!("Enable the root account with the enable-root-account argument, connect as 'root' with the generated password, then create a user account");
    }

    install_signal_handlers(ctx.clone())?;

    let server = Server::bind(ctx).map_err(|e| {
        format!(
            "unable to bind to port {} ({e}) - is it already in use?",
            config.port
        )
    })?;

    server.run().map_err(|e| format!("accept loop failed: {e}"))
}

/// SIGINT/SIGTERM flush persistent state and exit cleanly. SIGPIPE is
/// already ignored by the runtime; socket write failures surface as
/// errors instead.
fn install_signal_handlers(ctx: Arc<ServerContext>) -> Result<(), String> {
    ctrlc::set_handler(move || {
        info!("Killing socket and exiting");
        ctx.shutdown();
        std::process::exit(0);
    })
    .map_err(|e| format!("could not install the termination handler: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_passwords_are_printable_and_distinct() {
        let a = generate_root_password().unwrap();
        let b = generate_root_password().unwrap();

        assert_eq!(a.len(), ROOT_PASSWORD_LEN);
        assert!(a.bytes().all(|b| (48..48 + 42).contains(&b)));
        assert_ne!(a, b);
    }
}
