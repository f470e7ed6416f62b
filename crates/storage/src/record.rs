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

//! Binary record layout. A record is one flag byte followed by column
//! payloads in index order, all little-endian. String columns store a
//! packed hashed entry pointing at a dynamic record in `dynamic.bin`.

use serde_json::{Number, Value};

use crate::schema::ColumnKind;

/// Record has been written to at some point.
pub const FLAG_DIRTY: u8 = 1;
/// Record holds live data; cleared on erase.
pub const FLAG_ACTIVE: u8 = 2;
/// Record (or its dynamic storage) would benefit from a rebuild.
pub const FLAG_AVAILABLE_OPTIMISATION: u8 = 4;

/// Packed width of a hashed entry: u64 hash, u32 size, u64 location.
pub const HASHED_ENTRY_SIZE: usize = 20;
/// Packed width of a dynamic record header: u64 back-pointer, u32 size.
pub const DYNAMIC_HEADER_SIZE: usize = 12;

/// Inline reference to a string stored out of line. `size` counts the NUL
/// terminator; `hash` covers the bytes without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashedEntry {
    pub hash: u64,
    pub size: u32,
    pub location: u64,
}

impl HashedEntry {
    pub fn decode(buf: &[u8]) -> HashedEntry {
        HashedEntry {
            hash: u64::from_le_bytes(buf[0..8].try_into().expect("slice is 8 bytes; qed")),
            size: u32::from_le_bytes(buf[8..12].try_into().expect("slice is 4 bytes; qed")),
            location: u64::from_le_bytes(buf[12..20].try_into().expect("slice is 8 bytes; qed")),
        }
    }

    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.hash.to_le_bytes());
        buf[8..12].copy_from_slice(&self.size.to_le_bytes());
        buf[12..20].copy_from_slice(&self.location.to_le_bytes());
    }
}

/// Header preceding every dynamic record. `physical_size` counts header
/// plus payload capacity, so a record may hold fewer live bytes than it
/// owns after an in-place shortening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicHeader {
    pub back_pointer: u64,
    pub physical_size: u32,
}

impl DynamicHeader {
    pub fn decode(buf: &[u8]) -> DynamicHeader {
        DynamicHeader {
            back_pointer: u64::from_le_bytes(buf[0..8].try_into().expect("slice is 8 bytes; qed")),
            physical_size: u32::from_le_bytes(buf[8..12].try_into().expect("slice is 4 bytes; qed")),
        }
    }

    pub fn encode(&self) -> [u8; DYNAMIC_HEADER_SIZE] {
        let mut out = [0u8; DYNAMIC_HEADER_SIZE];
        out[0..8].copy_from_slice(&self.back_pointer.to_le_bytes());
        out[8..12].copy_from_slice(&self.physical_size.to_le_bytes());
        out
    }

    /// Payload capacity behind this header.
    pub fn capacity(&self) -> u32 {
        self.physical_size - DYNAMIC_HEADER_SIZE as u32
    }
}

/// A typed column value, already narrowed to its column's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Byte(u8),
    Integer(i32),
    Float(f32),
    Long(i64),
    Text(String),
}

impl ColumnValue {
    pub fn kind(&self) -> ColumnKind {
        match *self {
            ColumnValue::Byte(_) => ColumnKind::Byte,
            ColumnValue::Integer(_) => ColumnKind::Integer,
            ColumnValue::Float(_) => ColumnKind::Float,
            ColumnValue::Long(_) => ColumnKind::Long,
            ColumnValue::Text(_) => ColumnKind::String,
        }
    }

    pub fn to_json(&self) -> Value {
        match *self {
            ColumnValue::Byte(v) => Value::Number(v.into()),
            ColumnValue::Integer(v) => Value::Number(v.into()),
            ColumnValue::Long(v) => Value::Number(v.into()),
            ColumnValue::Float(v) => Number::from_f64(v as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ColumnValue::Text(ref s) => Value::String(s.clone()),
        }
    }
}

/// Reads a numeric payload from a record data area.
pub(crate) fn read_numeric(data: &[u8], kind: ColumnKind) -> ColumnValue {
    match kind {
        ColumnKind::Byte => ColumnValue::Byte(data[0]),
        ColumnKind::Integer => ColumnValue::Integer(i32::from_le_bytes(
            data[0..4].try_into().expect("slice is 4 bytes; qed"),
        )),
        ColumnKind::Float => ColumnValue::Float(f32::from_le_bytes(
            data[0..4].try_into().expect("slice is 4 bytes; qed"),
        )),
        ColumnKind::Long => ColumnValue::Long(i64::from_le_bytes(
            data[0..8].try_into().expect("slice is 8 bytes; qed"),
        )),
        ColumnKind::String => unreachable!("numeric accessor used on a string column"),
    }
}

/// Writes a numeric payload into a record data area.
pub(crate) fn write_numeric(data: &mut [u8], value: &ColumnValue) {
    match *value {
        ColumnValue::Byte(v) => data[0] = v,
        ColumnValue::Integer(v) => data[0..4].copy_from_slice(&v.to_le_bytes()),
        ColumnValue::Float(v) => data[0..4].copy_from_slice(&v.to_le_bytes()),
        ColumnValue::Long(v) => data[0..8].copy_from_slice(&v.to_le_bytes()),
        ColumnValue::Text(_) => unreachable!("numeric writer used on a string value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_entry_round_trip() {
        let entry = HashedEntry {
            hash: 0xDEAD_BEEF_CAFE_F00D,
            size: 42,
            location: 1 << 40,
        };
        let mut buf = [0u8; HASHED_ENTRY_SIZE];
        entry.encode_into(&mut buf);
        assert_eq!(HashedEntry::decode(&buf), entry);
    }

    #[test]
    fn dynamic_header_round_trip() {
        let header = DynamicHeader {
            back_pointer: 987654321,
            physical_size: 4 + DYNAMIC_HEADER_SIZE as u32,
        };
        assert_eq!(DynamicHeader::decode(&header.encode()), header);
        assert_eq!(header.capacity(), 4);
    }

    #[test]
    fn numerics_round_trip_little_endian() {
        let mut buf = [0u8; 8];

        write_numeric(&mut buf, &ColumnValue::Long(-7));
        assert_eq!(read_numeric(&buf, ColumnKind::Long), ColumnValue::Long(-7));

        write_numeric(&mut buf, &ColumnValue::Integer(0x0102_0304));
        assert_eq!(buf[0], 0x04, "layout must be little-endian");
        assert_eq!(
            read_numeric(&buf, ColumnKind::Integer),
            ColumnValue::Integer(0x0102_0304)
        );

        write_numeric(&mut buf, &ColumnValue::Float(1.5));
        assert_eq!(read_numeric(&buf, ColumnKind::Float), ColumnValue::Float(1.5));

        write_numeric(&mut buf, &ColumnValue::Byte(255));
        assert_eq!(read_numeric(&buf, ColumnKind::Byte), ColumnValue::Byte(255));
    }
}
