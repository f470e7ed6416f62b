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

//! Immutable table schemas. Column order is fixed at creation time and
//! determines the binary record layout.

use std::collections::HashMap;

use crate::record::HASHED_ENTRY_SIZE;
use crate::Error;

pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 32;

/// The closed set of column kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Long,
    Byte,
    String,
}

impl ColumnKind {
    /// On-record payload width.
    pub fn payload_size(self) -> u32 {
        match self {
            ColumnKind::Byte => 1,
            ColumnKind::Integer | ColumnKind::Float => 4,
            ColumnKind::Long => 8,
            ColumnKind::String => HASHED_ENTRY_SIZE as u32,
        }
    }

    /// Width reported in metadata; strings report 0 as their payload lives
    /// out of line.
    pub fn declared_size(self) -> u32 {
        match self {
            ColumnKind::String => 0,
            other => other.payload_size(),
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ColumnKind::String)
    }

    /// Stable on-disk identifier.
    pub fn id(self) -> u32 {
        match self {
            ColumnKind::Integer => 0,
            ColumnKind::Float => 1,
            ColumnKind::Long => 2,
            ColumnKind::Byte => 3,
            ColumnKind::String => 4,
        }
    }

    pub fn from_id(id: u32) -> Option<ColumnKind> {
        match id {
            0 => Some(ColumnKind::Integer),
            1 => Some(ColumnKind::Float),
            2 => Some(ColumnKind::Long),
            3 => Some(ColumnKind::Byte),
            4 => Some(ColumnKind::String),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Long => "long",
            ColumnKind::Byte => "byte",
            ColumnKind::String => "string",
        }
    }

    pub fn from_str(s: &str) -> Option<ColumnKind> {
        match s {
            "integer" => Some(ColumnKind::Integer),
            "float" => Some(ColumnKind::Float),
            "long" => Some(ColumnKind::Long),
            "byte" => Some(ColumnKind::Byte),
            "string" => Some(ColumnKind::String),
            _ => None,
        }
    }
}

/// One column of a schema. `offset` is the byte position of the payload
/// within the record's data area (the 1-byte flag prefix excluded).
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub index: u32,
    pub offset: u32,
}

/// An ordered, validated column list with the derived record layout.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnDef>,
    by_name: HashMap<String, u32>,
    record_size: u32,
}

/// Table, column and account names share one shape: 2-32 chars drawn from
/// lowercase letters and underscore.
pub fn valid_name(name: &str) -> bool {
    (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name.len())
        && name.bytes().all(|b| b == b'_' || b.is_ascii_lowercase())
}

impl Schema {
    pub fn new(columns: Vec<(String, ColumnKind)>) -> Result<Schema, Error> {
        if columns.is_empty() {
            return Err(Error::ParamsInvalid);
        }

        let mut defs = Vec::with_capacity(columns.len());
        let mut by_name = HashMap::with_capacity(columns.len());
        let mut offset = 0u32;

        for (index, (name, kind)) in columns.into_iter().enumerate() {
            if !valid_name(&name) {
                return Err(Error::ParamsInvalid);
            }
            if by_name.insert(name.clone(), index as u32).is_some() {
                return Err(Error::ParamsInvalid);
            }
            defs.push(ColumnDef {
                name,
                kind,
                index: index as u32,
                offset,
            });
            offset += kind.payload_size();
        }

        Ok(Schema {
            columns: defs,
            by_name,
            record_size: 1 + offset,
        })
    }

    /// Full record width including the flag byte.
    pub fn record_size(&self) -> u32 {
        self.record_size
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.by_name.get(name).map(|&i| &self.columns[i as usize])
    }

    pub fn column_at(&self, index: u32) -> &ColumnDef {
        &self.columns[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, kind: ColumnKind) -> (String, ColumnKind) {
        (name.to_owned(), kind)
    }

    #[test]
    fn layout_follows_column_order() {
        let schema = Schema::new(vec![
            col("id", ColumnKind::Long),
            col("name", ColumnKind::String),
            col("age", ColumnKind::Byte),
            col("score", ColumnKind::Float),
        ])
        .unwrap();

        assert_eq!(schema.record_size(), 1 + 8 + 20 + 1 + 4);
        assert_eq!(schema.column("id").unwrap().offset, 0);
        assert_eq!(schema.column("name").unwrap().offset, 8);
        assert_eq!(schema.column("age").unwrap().offset, 28);
        assert_eq!(schema.column("score").unwrap().offset, 29);
        assert_eq!(schema.column("score").unwrap().index, 3);
    }

    #[test]
    fn rejects_bad_names() {
        for bad in ["a", "UPPER", "with-dash", "with space", "x", ""] {
            assert!(
                Schema::new(vec![col(bad, ColumnKind::Byte)]).is_err(),
                "{bad:?} should be rejected"
            );
        }
        let long = "a".repeat(33);
        assert!(Schema::new(vec![col(&long, ColumnKind::Byte)]).is_err());
    }

    #[test]
    fn rejects_duplicates_and_empty() {
        assert!(Schema::new(vec![]).is_err());
        assert!(Schema::new(vec![
            col("dup", ColumnKind::Byte),
            col("dup", ColumnKind::Long),
        ])
        .is_err());
    }

    #[test]
    fn kind_ids_round_trip() {
        for kind in [
            ColumnKind::Integer,
            ColumnKind::Float,
            ColumnKind::Long,
            ColumnKind::Byte,
            ColumnKind::String,
        ] {
            assert_eq!(ColumnKind::from_id(kind.id()), Some(kind));
            assert_eq!(ColumnKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ColumnKind::from_id(5), None);
        assert_eq!(ColumnKind::from_str("double"), None);
    }
}
