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

//! Permission bitsets. Global permissions gate account and table
//! management; per-table permissions gate record access and persist as a
//! single byte in the reserved permissions table.

use serde_json::{json, Map, Value};

/// Hierarchy index reserved for the root account.
pub const ROOT_HIERARCHY_INDEX: u32 = 0;
/// Largest assignable hierarchy index; everything above is reserved.
pub const HIERARCHY_INDEX_MAX: u32 = 1_000_000;

const OPEN_CLOSE_TABLES: u8 = 1 << 0;
const CREATE_TABLES: u8 = 1 << 1;
const DELETE_TABLES: u8 = 1 << 2;
const CREATE_ACCOUNTS: u8 = 1 << 3;
const UPDATE_ACCOUNTS: u8 = 1 << 4;
const DELETE_ACCOUNTS: u8 = 1 << 5;
const TABLE_ADMINISTRATOR: u8 = 1 << 6;

/// Account-wide permissions plus the authorization rank. A lower
/// hierarchy index outranks a higher one; equal ranks cannot manage each
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalPermissions {
    pub hierarchy_index: u32,
    pub open_close_tables: bool,
    pub create_tables: bool,
    pub delete_tables: bool,
    pub create_accounts: bool,
    pub update_accounts: bool,
    pub delete_accounts: bool,
    /// Full access to every table regardless of per-table overrides.
    pub table_administrator: bool,
}

impl GlobalPermissions {
    /// All bits denied at the given rank.
    pub fn none(hierarchy_index: u32) -> GlobalPermissions {
        GlobalPermissions {
            hierarchy_index,
            open_close_tables: false,
            create_tables: false,
            delete_tables: false,
            create_accounts: false,
            update_accounts: false,
            delete_accounts: false,
            table_administrator: false,
        }
    }

    /// The root grant: every bit at rank zero.
    pub fn root() -> GlobalPermissions {
        GlobalPermissions {
            hierarchy_index: ROOT_HIERARCHY_INDEX,
            open_close_tables: true,
            create_tables: true,
            delete_tables: true,
            create_accounts: true,
            update_accounts: true,
            delete_accounts: true,
            table_administrator: true,
        }
    }

    pub fn to_bits(&self) -> u8 {
        let mut bits = 0;
        if self.open_close_tables {
            bits |= OPEN_CLOSE_TABLES;
        }
        if self.create_tables {
            bits |= CREATE_TABLES;
        }
        if self.delete_tables {
            bits |= DELETE_TABLES;
        }
        if self.create_accounts {
            bits |= CREATE_ACCOUNTS;
        }
        if self.update_accounts {
            bits |= UPDATE_ACCOUNTS;
        }
        if self.delete_accounts {
            bits |= DELETE_ACCOUNTS;
        }
        if self.table_administrator {
            bits |= TABLE_ADMINISTRATOR;
        }
        bits
    }

    pub fn from_bits(hierarchy_index: u32, bits: u8) -> GlobalPermissions {
        GlobalPermissions {
            hierarchy_index,
            open_close_tables: bits & OPEN_CLOSE_TABLES != 0,
            create_tables: bits & CREATE_TABLES != 0,
            delete_tables: bits & DELETE_TABLES != 0,
            create_accounts: bits & CREATE_ACCOUNTS != 0,
            update_accounts: bits & UPDATE_ACCOUNTS != 0,
            delete_accounts: bits & DELETE_ACCOUNTS != 0,
            table_administrator: bits & TABLE_ADMINISTRATOR != 0,
        }
    }

    /// Whether every bit granted in `other` is also granted here; rank is
    /// not part of the comparison.
    pub fn covers(&self, other: &GlobalPermissions) -> bool {
        other.to_bits() & !self.to_bits() == 0
    }

    /// Reads the uppercase grant keys of a request object; absent keys
    /// deny. The caller has already verified every value is a boolean.
    pub fn from_grant_object(hierarchy_index: u32, object: &Map<String, Value>) -> GlobalPermissions {
        let get = |key: &str| object.get(key).and_then(Value::as_bool).unwrap_or(false);
        GlobalPermissions {
            hierarchy_index,
            open_close_tables: get("OPEN_CLOSE_TABLES"),
            create_tables: get("CREATE_TABLES"),
            delete_tables: get("DELETE_TABLES"),
            create_accounts: get("CREATE_ACCOUNTS"),
            update_accounts: get("UPDATE_ACCOUNTS"),
            delete_accounts: get("DELETE_ACCOUNTS"),
            table_administrator: get("TABLE_ADMINISTRATOR"),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "CREATE_ACCOUNTS": self.create_accounts,
            "DELETE_ACCOUNTS": self.delete_accounts,
            "UPDATE_ACCOUNTS": self.update_accounts,
            "CREATE_TABLES": self.create_tables,
            "DELETE_TABLES": self.delete_tables,
            "OPEN_CLOSE_TABLES": self.open_close_tables,
            "TABLE_ADMINISTRATOR": self.table_administrator,
            "HIERARCHY_INDEX": self.hierarchy_index,
        })
    }
}

const VIEW: u8 = 1 << 0;
const READ: u8 = 1 << 1;
const WRITE: u8 = 1 << 2;
const UPDATE: u8 = 1 << 3;
const ERASE: u8 = 1 << 4;

/// Per-table access for one account. With `view` denied the table must be
/// indistinguishable from an absent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePermissions {
    pub view: bool,
    pub read: bool,
    pub write: bool,
    pub update: bool,
    pub erase: bool,
}

impl TablePermissions {
    pub fn all() -> TablePermissions {
        TablePermissions {
            view: true,
            read: true,
            write: true,
            update: true,
            erase: true,
        }
    }

    pub fn none() -> TablePermissions {
        TablePermissions {
            view: false,
            read: false,
            write: false,
            update: false,
            erase: false,
        }
    }

    pub fn to_byte(&self) -> u8 {
        let mut bits = 0;
        if self.view {
            bits |= VIEW;
        }
        if self.read {
            bits |= READ;
        }
        if self.write {
            bits |= WRITE;
        }
        if self.update {
            bits |= UPDATE;
        }
        if self.erase {
            bits |= ERASE;
        }
        bits
    }

    pub fn from_byte(bits: u8) -> TablePermissions {
        TablePermissions {
            view: bits & VIEW != 0,
            read: bits & READ != 0,
            write: bits & WRITE != 0,
            update: bits & UPDATE != 0,
            erase: bits & ERASE != 0,
        }
    }

    /// Reads the uppercase grant keys of a request object; absent keys
    /// deny.
    pub fn from_grant_object(object: &Map<String, Value>) -> TablePermissions {
        let get = |key: &str| object.get(key).and_then(Value::as_bool).unwrap_or(false);
        TablePermissions {
            view: get("VIEW"),
            read: get("READ"),
            write: get("WRITE"),
            update: get("UPDATE"),
            erase: get("ERASE"),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "VIEW": self.view,
            "READ": self.read,
            "WRITE": self.write,
            "UPDATE": self.update,
            "ERASE": self.erase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_bits_round_trip() {
        let root = GlobalPermissions::root();
        assert_eq!(GlobalPermissions::from_bits(0, root.to_bits()), root);

        let none = GlobalPermissions::none(5);
        assert_eq!(none.to_bits(), 0);
        assert_eq!(GlobalPermissions::from_bits(5, 0), none);

        let mut one = GlobalPermissions::none(9);
        one.table_administrator = true;
        let restored = GlobalPermissions::from_bits(9, one.to_bits());
        assert!(restored.table_administrator);
        assert!(!restored.create_tables);
    }

    #[test]
    fn covers_is_bit_subset() {
        let root = GlobalPermissions::root();
        let mut weak = GlobalPermissions::none(3);
        weak.create_tables = true;

        assert!(root.covers(&weak));
        assert!(!weak.covers(&root));
        assert!(weak.covers(&GlobalPermissions::none(1)));
        // Rank never factors into coverage.
        assert!(weak.covers(&weak));
    }

    #[test]
    fn table_byte_round_trip() {
        let all = TablePermissions::all();
        assert_eq!(all.to_byte(), 0b1_1111);
        assert_eq!(TablePermissions::from_byte(0b1_1111), all);
        assert_eq!(TablePermissions::from_byte(0), TablePermissions::none());

        let read_only = TablePermissions {
            view: true,
            read: true,
            ..TablePermissions::none()
        };
        assert_eq!(
            TablePermissions::from_byte(read_only.to_byte()),
            read_only
        );
    }

    #[test]
    fn grant_objects_default_to_deny() {
        let object = serde_json::from_str::<Map<String, Value>>(
            r#"{ "VIEW": true, "READ": true, "unrelated": true }"#,
        )
        .unwrap();
        let perms = TablePermissions::from_grant_object(&object);
        assert!(perms.view && perms.read);
        assert!(!perms.write && !perms.update && !perms.erase);

        let global = GlobalPermissions::from_grant_object(
            7,
            &serde_json::from_str::<Map<String, Value>>(r#"{ "CREATE_TABLES": true }"#).unwrap(),
        );
        assert!(global.create_tables);
        assert!(!global.table_administrator);
        assert_eq!(global.hierarchy_index, 7);
    }
}
