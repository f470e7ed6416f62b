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

//! Command-line configuration. Arguments are bare flags
//! (`force-encrypted-traffic`, `enable-root-account`) or `name=value`
//! pairs (`port=4546`, `max-connections=10`, `data-directory=./data/`).

use std::path::PathBuf;

use swiftdb_server::ServerConfig;

/// Fully parsed process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub max_connections: u32,
    pub data_directory: PathBuf,
    pub force_encrypted_traffic: bool,
    pub enable_root_account: bool,
}

impl Default for Config {
    fn default() -> Self {
        let server = ServerConfig::default();
        Config {
            port: server.port,
            max_connections: server.max_connections,
            data_directory: server.data_directory,
            force_encrypted_traffic: false,
            enable_root_account: false,
        }
    }
}

impl Config {
    /// Parses process arguments (program name excluded). Any malformed
    /// argument is an error; the caller exits with status 1.
    pub fn parse(args: &[String]) -> Result<Config, String> {
        let mut config = Config::default();

        for arg in args {
            match arg.split_once('=') {
                None => match arg.as_str() {
                    "force-encrypted-traffic" => config.force_encrypted_traffic = true,
                    "enable-root-account" => config.enable_root_account = true,
                    other => return Err(format!("unknown argument {other:?}")),
                },
                Some((name, value)) => match name {
                    "max-connections" => {
                        config.max_connections = value
                            .parse()
                            .map_err(|_| format!("invalid max-connections value {value:?}"))?;
                    }
                    "port" => {
                        config.port = value
                            .parse()
                            .map_err(|_| format!("invalid port value {value:?}"))?;
                    }
                    "data-directory" => {
                        if value.is_empty() {
                            return Err("data-directory requires a path".into());
                        }
                        config.data_directory = PathBuf::from(value);
                    }
                    other => return Err(format!("unknown argument {other:?}")),
                },
            }
        }

        Ok(config)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            max_connections: self.max_connections,
            data_directory: self.data_directory.clone(),
            force_encrypted_traffic: self.force_encrypted_traffic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, String> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Config::parse(&owned)
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.port, 4546);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.data_directory, PathBuf::from("./data/"));
        assert!(!config.force_encrypted_traffic);
        assert!(!config.enable_root_account);
    }

    #[test]
    fn parses_flags_and_pairs() {
        let config = parse(&[
            "force-encrypted-traffic",
            "enable-root-account",
            "port=9000",
            "max-connections=0",
            "data-directory=/var/lib/swiftdb",
        ])
        .unwrap();

        assert!(config.force_encrypted_traffic);
        assert!(config.enable_root_account);
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.data_directory, PathBuf::from("/var/lib/swiftdb"));
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert!(parse(&["unknown-flag"]).is_err());
        assert!(parse(&["port=abc"]).is_err());
        assert!(parse(&["port=70000"]).is_err());
        assert!(parse(&["max-connections=-1"]).is_err());
        assert!(parse(&["data-directory="]).is_err());
        assert!(parse(&["frobnicate=1"]).is_err());
    }
}
