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

//! Process-wide server state. One `ServerContext` owns the table store,
//! the account store and the connection map, each behind its own lock,
//! and is passed explicitly to every operation.

use std::{
    fs::{self, File},
    path::PathBuf,
    sync::Arc,
};

use serde_json::{json, Value};
use swiftdb_accounts::{AccountStore, DatabaseAccount, TablePermissions};
use swiftdb_storage::{
    compile_changes, compile_insert, compile_where, ActiveTable, ColumnKind, SeekDirection,
    TableStore,
};

use crate::connection::Connections;

/// Reserved table holding per-account table permissions as records of
/// `{ index: long, table: string, permissions: byte }`.
pub const INTERNAL_PERMISSIONS_TABLE: &str = "--internal-table-permissions";

/// Prefix reserved for system tables; rejected on every client path.
pub const RESERVED_TABLE_PREFIX: &str = "--internal";

/// Startup configuration, assembled from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// 0 means unbounded.
    pub max_connections: u32,
    pub data_directory: PathBuf,
    pub force_encrypted_traffic: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 4546,
            max_connections: 10,
            data_directory: PathBuf::from("./data/"),
            force_encrypted_traffic: false,
        }
    }
}

/// Shared server state.
pub struct ServerContext {
    config: ServerConfig,
    tables: TableStore,
    accounts: AccountStore,
    connections: Connections,
}

impl ServerContext {
    /// Prepares the data directory (scaffolding it on first boot), opens
    /// the reserved permissions table and loads the account file.
    pub fn bootstrap(config: ServerConfig) -> Result<Arc<ServerContext>, String> {
        let accounts_path = config.data_directory.join("accounts.bin");

        let first_boot = !config.data_directory.is_dir() || !accounts_path.is_file();
        if first_boot {
            info!("First boot detected - welcome to SwiftDB");
            fs::create_dir_all(&config.data_directory)
                .map_err(|e| format!("could not create data directory: {e}"))?;
            File::create(&accounts_path)
                .map_err(|e| format!("could not create the accounts file: {e}"))?;
        }

        let tables = TableStore::new(&config.data_directory);

        if !tables.exists(INTERNAL_PERMISSIONS_TABLE) {
            tables
                .create(
                    INTERNAL_PERMISSIONS_TABLE,
                    vec![
                        ("index".to_owned(), ColumnKind::Long),
                        ("table".to_owned(), ColumnKind::String),
                        ("permissions".to_owned(), ColumnKind::Byte),
                    ],
                )
                .map_err(|e| format!("could not create the permissions table: {e}"))?;
        }

        tables
            .open(INTERNAL_PERMISSIONS_TABLE, true)
            .map_err(|e| format!("could not open the permissions table: {e}"))?;

        let accounts = AccountStore::open(&accounts_path)
            .map_err(|e| format!("could not open the database accounts file: {e}"))?;

        Ok(Arc::new(ServerContext {
            config,
            tables,
            accounts,
            connections: Connections::new(),
        }))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    fn internal_table(&self) -> Arc<ActiveTable> {
        self.tables
            .get(INTERNAL_PERMISSIONS_TABLE)
            .expect("permissions table is opened during bootstrap and never closed; qed")
    }

    /// Effective per-table permissions for an account: table admins see
    /// everything, otherwise the cached override row decides, and no row
    /// means no access.
    pub fn table_permissions_for(
        &self,
        table: &ActiveTable,
        account: &DatabaseAccount,
    ) -> TablePermissions {
        if account.permissions.table_administrator {
            return TablePermissions::all();
        }
        match table.permission_byte(account.internal_index) {
            Some(byte) => TablePermissions::from_byte(byte),
            None => TablePermissions::none(),
        }
    }

    /// Reads this table's permission rows from the reserved table into
    /// the table's cache; called once per open.
    pub fn load_table_permissions(
        &self,
        table: &ActiveTable,
    ) -> Result<(), swiftdb_storage::Error> {
        let internal = self.internal_table();
        let conditions = compile_where(
            internal.schema(),
            as_object(&json!({ "table": table.name() })),
        )?;
        let rows = internal.find_many(&conditions, None, SeekDirection::Forward, 0, None)?;

        for row in rows {
            let index = row.get("index").and_then(Value::as_i64);
            let byte = row.get("permissions").and_then(Value::as_u64);
            if let (Some(index), Some(byte)) = (index, byte) {
                table.cache_permission(index as u64, byte as u8);
            }
        }
        Ok(())
    }

    /// Persists a permission override for `(account, table)` and updates
    /// the table's cache.
    pub fn set_table_permissions(
        &self,
        table: &ActiveTable,
        account: &DatabaseAccount,
        permissions: TablePermissions,
    ) -> Result<(), swiftdb_storage::Error> {
        let internal = self.internal_table();
        let byte = permissions.to_byte();
        let index = account.internal_index as i64;

        if table.permission_byte(account.internal_index).is_some() {
            let conditions = compile_where(
                internal.schema(),
                as_object(&json!({ "table": table.name(), "index": index })),
            )?;
            let changes = compile_changes(
                internal.schema(),
                as_object(&json!({ "permissions": byte })),
            )?;
            internal.update_many(&conditions, &changes, 1)?;
        } else {
            let values = compile_insert(
                internal.schema(),
                as_object(&json!({
                    "index": index,
                    "table": table.name(),
                    "permissions": byte,
                })),
            )?;
            internal.insert(&values)?;
        }

        table.cache_permission(account.internal_index, byte);
        Ok(())
    }

    /// Drops every permission row and cache entry of a deleted account.
    pub fn erase_account_permissions(
        &self,
        internal_index: u64,
    ) -> Result<(), swiftdb_storage::Error> {
        // The root account never owns rows.
        if internal_index == u64::MAX {
            return Ok(());
        }

        let internal = self.internal_table();
        let conditions = compile_where(
            internal.schema(),
            as_object(&json!({ "index": internal_index as i64 })),
        )?;
        internal.erase_many(&conditions, 0)?;

        for table in self.tables.open_tables() {
            table.drop_cached_permission(internal_index);
        }
        Ok(())
    }

    /// Flushes persistent state; called on orderly shutdown.
    pub fn shutdown(&self) {
        if let Err(e) = self.accounts.sync() {
            warn!("could not sync the accounts file during shutdown: {e}");
        }
        for table in self.tables.open_tables() {
            self.tables.close(table.name());
        }
    }
}

fn as_object(value: &Value) -> &serde_json::Map<String, Value> {
    value
        .as_object()
        .expect("json! object literals always decode as objects; qed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use swiftdb_accounts::GlobalPermissions;
    use tempdir::TempDir;

    fn context(dir: &TempDir) -> Arc<ServerContext> {
        let config = ServerConfig {
            data_directory: dir.path().join("data"),
            ..Default::default()
        };
        ServerContext::bootstrap(config).unwrap()
    }

    #[test]
    fn bootstrap_scaffolds_first_boot() {
        let dir = TempDir::new("ctx").unwrap();
        let ctx = context(&dir);

        assert!(dir.path().join("data").join("accounts.bin").is_file());
        assert!(ctx.tables().is_open(INTERNAL_PERMISSIONS_TABLE));
        assert!(ctx.accounts().is_empty());

        // Bootstrapping again over the same directory is a no-op restart.
        drop(ctx);
    }

    #[test]
    fn permission_rows_survive_reopen() {
        let dir = TempDir::new("ctx").unwrap();
        let ctx = context(&dir);

        ctx.tables()
            .create("users", vec![("id".to_owned(), ColumnKind::Long)])
            .unwrap();
        let table = ctx.tables().open("users", false).unwrap();

        let account = ctx
            .accounts()
            .create("alice", "pw", GlobalPermissions::none(5))
            .unwrap();

        let grant = TablePermissions {
            view: true,
            read: true,
            ..TablePermissions::none()
        };
        ctx.set_table_permissions(&table, &account, grant).unwrap();
        assert_eq!(
            ctx.table_permissions_for(&table, &account),
            grant
        );

        // Re-open the table and reload rows from the reserved table.
        ctx.tables().close("users");
        let table = ctx.tables().open("users", false).unwrap();
        assert_eq!(ctx.table_permissions_for(&table, &account), TablePermissions::none());
        ctx.load_table_permissions(&table).unwrap();
        assert_eq!(ctx.table_permissions_for(&table, &account), grant);

        // Updating overwrites the row rather than stacking a second one.
        let wider = TablePermissions::all();
        ctx.set_table_permissions(&table, &account, wider).unwrap();
        ctx.tables().close("users");
        let table = ctx.tables().open("users", false).unwrap();
        ctx.load_table_permissions(&table).unwrap();
        assert_eq!(ctx.table_permissions_for(&table, &account), wider);

        // Deleting the account erases its rows and cache entries.
        ctx.accounts().delete("alice").unwrap();
        ctx.erase_account_permissions(account.internal_index).unwrap();
        ctx.tables().close("users");
        let table = ctx.tables().open("users", false).unwrap();
        ctx.load_table_permissions(&table).unwrap();
        assert_eq!(
            ctx.table_permissions_for(&table, &account),
            TablePermissions::none()
        );
    }

    #[test]
    fn table_admin_bypasses_overrides() {
        let dir = TempDir::new("ctx").unwrap();
        let ctx = context(&dir);

        ctx.tables()
            .create("users", vec![("id".to_owned(), ColumnKind::Long)])
            .unwrap();
        let table = ctx.tables().open("users", false).unwrap();

        let mut admin_grant = GlobalPermissions::none(3);
        admin_grant.table_administrator = true;
        let admin = ctx.accounts().create("admin", "pw", admin_grant).unwrap();

        assert_eq!(
            ctx.table_permissions_for(&table, &admin),
            TablePermissions::all()
        );
    }
}
