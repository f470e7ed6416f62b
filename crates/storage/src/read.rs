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

//! Read-side executor: full scans with compiled conditions, the string
//! fast path and row assembly.

use std::cmp::Ordering;
use std::os::unix::fs::FileExt;

use serde_json::Value;

use crate::query::{Condition, NumericBounds, Predicate, SeekDirection};
use crate::record::{
    read_numeric, ColumnValue, HashedEntry, DYNAMIC_HEADER_SIZE, FLAG_ACTIVE, HASHED_ENTRY_SIZE,
};
use crate::schema::{ColumnKind, Schema};
use crate::table::{ActiveTable, TableFiles};
use crate::Error;

/// One assembled result row, keyed by column name in physical order.
pub type Row = serde_json::Map<String, Value>;

/// Record-offset cursor over `data.bin` in either direction.
pub(crate) struct ScanRange {
    next: i64,
    step: i64,
    end: i64,
}

impl ScanRange {
    pub fn new(file_len: u64, record_size: u32, direction: SeekDirection) -> ScanRange {
        let record_size = i64::from(record_size);
        let end = file_len as i64;
        match direction {
            SeekDirection::Forward => ScanRange {
                next: 0,
                step: record_size,
                end,
            },
            SeekDirection::Backward => ScanRange {
                next: end - record_size,
                step: -record_size,
                end,
            },
        }
    }

    /// Restarts the cursor at `offset` (inclusive), keeping direction.
    pub fn resume_at(&mut self, offset: u64) {
        self.next = offset as i64;
    }

    pub fn next_offset(&mut self) -> Option<u64> {
        if self.next < 0 || self.next + self.step.abs() > self.end {
            return None;
        }
        let current = self.next;
        self.next += self.step;
        Some(current as u64)
    }
}

fn compare_same_kind(lhs: &ColumnValue, rhs: &ColumnValue) -> Option<Ordering> {
    match (lhs, rhs) {
        (ColumnValue::Byte(a), ColumnValue::Byte(b)) => Some(a.cmp(b)),
        (ColumnValue::Integer(a), ColumnValue::Integer(b)) => Some(a.cmp(b)),
        (ColumnValue::Long(a), ColumnValue::Long(b)) => Some(a.cmp(b)),
        (ColumnValue::Float(a), ColumnValue::Float(b)) => a.partial_cmp(b),
        _ => unreachable!("query compilation pins predicate values to the column kind"),
    }
}

fn bounds_hold(actual: &ColumnValue, bounds: &NumericBounds) -> bool {
    let check = |bound: &Option<ColumnValue>, ok: &[Ordering]| match bound {
        Some(b) => compare_same_kind(actual, b).is_some_and(|o| ok.contains(&o)),
        None => true,
    };

    check(&bounds.greater_than, &[Ordering::Greater])
        && check(&bounds.greater_than_equal_to, &[Ordering::Greater, Ordering::Equal])
        && check(&bounds.less_than, &[Ordering::Less])
        && check(&bounds.less_than_equal_to, &[Ordering::Less, Ordering::Equal])
}

/// Reads the live bytes (terminator included) behind a hashed entry.
pub(crate) fn load_dynamic(files: &TableFiles, entry: &HashedEntry) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; entry.size as usize];
    files
        .dynamic
        .read_exact_at(&mut buf, entry.location + DYNAMIC_HEADER_SIZE as u64)?;
    Ok(buf)
}

/// Tests a record buffer against every compiled condition.
///
/// String equality is staged: length, then stored hash, and only then the
/// dynamic bytes, so most non-matches never touch `dynamic.bin`.
pub(crate) fn record_matches(
    files: &TableFiles,
    schema: &Schema,
    record: &[u8],
    conditions: &[Condition],
) -> Result<bool, Error> {
    for condition in conditions {
        let column = schema.column_at(condition.column);
        let at = 1 + column.offset as usize;

        match &condition.predicate {
            Predicate::Equals(expected) => {
                let actual = read_numeric(&record[at..], column.kind);
                if compare_same_kind(&actual, expected) != Some(Ordering::Equal) {
                    return Ok(false);
                }
            }
            Predicate::Bounds(bounds) => {
                let actual = read_numeric(&record[at..], column.kind);
                if !bounds_hold(&actual, bounds) {
                    return Ok(false);
                }
            }
            Predicate::TextEquals { text, hash } => {
                let entry = HashedEntry::decode(&record[at..at + HASHED_ENTRY_SIZE]);
                if entry.size as usize != text.len() + 1 {
                    return Ok(false);
                }
                if entry.hash != *hash {
                    return Ok(false);
                }
                let bytes = load_dynamic(files, &entry)?;
                if &bytes[..bytes.len() - 1] != text.as_bytes() {
                    return Ok(false);
                }
            }
            Predicate::TextContains(needle) => {
                let entry = HashedEntry::decode(&record[at..at + HASHED_ENTRY_SIZE]);
                let haystack_len = entry.size as usize - 1;
                if needle.len() > haystack_len {
                    return Ok(false);
                }
                if needle.is_empty() {
                    continue;
                }
                let bytes = load_dynamic(files, &entry)?;
                let needle = needle.as_bytes();
                if !bytes[..haystack_len]
                    .windows(needle.len())
                    .any(|window| window == needle)
                {
                    return Ok(false);
                }
            }
        }
    }

    Ok(true)
}

/// Materialises the requested columns of a record buffer into a row.
pub(crate) fn assemble_row(
    files: &TableFiles,
    schema: &Schema,
    record: &[u8],
    returned: Option<&[u32]>,
) -> Result<Row, Error> {
    let mut row = Row::new();

    let mut emit = |index: u32| -> Result<(), Error> {
        let column = schema.column_at(index);
        let at = 1 + column.offset as usize;
        let value = match column.kind {
            ColumnKind::String => {
                let entry = HashedEntry::decode(&record[at..at + HASHED_ENTRY_SIZE]);
                let bytes = load_dynamic(files, &entry)?;
                Value::String(String::from_utf8_lossy(&bytes[..bytes.len() - 1]).into_owned())
            }
            _ => read_numeric(&record[at..], column.kind).to_json(),
        };
        row.insert(column.name.clone(), value);
        Ok(())
    };

    match returned {
        Some(indices) => {
            for &index in indices {
                emit(index)?;
            }
        }
        None => {
            for column in schema.columns() {
                emit(column.index)?;
            }
        }
    }

    Ok(row)
}

/// Reads the record at `offset` into `buf` and reports whether it holds a
/// live record.
pub(crate) fn read_record(files: &TableFiles, buf: &mut [u8], offset: u64) -> Result<bool, Error> {
    files.data.read_exact_at(buf, offset)?;
    Ok(buf[0] & FLAG_ACTIVE != 0)
}

impl ActiveTable {
    /// Scans for the first record matching `conditions`; `None` when no
    /// live record matches.
    pub fn find_one(
        &self,
        conditions: &[Condition],
        direction: SeekDirection,
        returned: Option<&[u32]>,
    ) -> Result<Option<Row>, Error> {
        let files = self.files.lock();
        let record_size = self.schema().record_size();
        let len = files.data.metadata()?.len();

        let mut buf = vec![0u8; record_size as usize];
        let mut range = ScanRange::new(len, record_size, direction);

        while let Some(offset) = range.next_offset() {
            if !read_record(&files, &mut buf, offset)? {
                continue;
            }
            if record_matches(&files, self.schema(), &buf, conditions)? {
                return assemble_row(&files, self.schema(), &buf, returned).map(Some);
            }
        }

        Ok(None)
    }

    /// Locates the offset of the first record matching `conditions` in the
    /// given direction.
    pub(crate) fn locate_record(
        files: &TableFiles,
        schema: &Schema,
        conditions: &[Condition],
        direction: SeekDirection,
    ) -> Result<Option<u64>, Error> {
        let record_size = schema.record_size();
        let len = files.data.metadata()?.len();

        let mut buf = vec![0u8; record_size as usize];
        let mut range = ScanRange::new(len, record_size, direction);

        while let Some(offset) = range.next_offset() {
            if !read_record(files, &mut buf, offset)? {
                continue;
            }
            if record_matches(files, schema, &buf, conditions)? {
                return Ok(Some(offset));
            }
        }

        Ok(None)
    }

    /// Scans for every record matching `conditions`, in scan order.
    ///
    /// `seek_where` moves the scan start to the first record matching it
    /// (that record included); when nothing matches, the scan runs from
    /// its normal start. `limit == 0` means unlimited.
    pub fn find_many(
        &self,
        conditions: &[Condition],
        seek_where: Option<&[Condition]>,
        direction: SeekDirection,
        limit: u64,
        returned: Option<&[u32]>,
    ) -> Result<Vec<Row>, Error> {
        let files = self.files.lock();
        let record_size = self.schema().record_size();
        let len = files.data.metadata()?.len();

        let mut buf = vec![0u8; record_size as usize];
        let mut range = ScanRange::new(len, record_size, direction);

        if let Some(pivot_conditions) = seek_where {
            if let Some(pivot) =
                Self::locate_record(&files, self.schema(), pivot_conditions, direction)?
            {
                range.resume_at(pivot);
            }
        }

        let mut rows = Vec::new();
        while let Some(offset) = range.next_offset() {
            if !read_record(&files, &mut buf, offset)? {
                continue;
            }
            if !record_matches(&files, self.schema(), &buf, conditions)? {
                continue;
            }

            rows.push(assemble_row(&files, self.schema(), &buf, returned)?);
            if limit != 0 && rows.len() as u64 == limit {
                break;
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_range_walks_forward() {
        let mut range = ScanRange::new(30, 10, SeekDirection::Forward);
        assert_eq!(range.next_offset(), Some(0));
        assert_eq!(range.next_offset(), Some(10));
        assert_eq!(range.next_offset(), Some(20));
        assert_eq!(range.next_offset(), None);
    }

    #[test]
    fn scan_range_walks_backward() {
        let mut range = ScanRange::new(30, 10, SeekDirection::Backward);
        assert_eq!(range.next_offset(), Some(20));
        assert_eq!(range.next_offset(), Some(10));
        assert_eq!(range.next_offset(), Some(0));
        assert_eq!(range.next_offset(), None);
    }

    #[test]
    fn scan_range_handles_empty_file() {
        assert_eq!(ScanRange::new(0, 10, SeekDirection::Forward).next_offset(), None);
        assert_eq!(ScanRange::new(0, 10, SeekDirection::Backward).next_offset(), None);
    }

    #[test]
    fn scan_range_resumes_inclusively() {
        let mut range = ScanRange::new(50, 10, SeekDirection::Backward);
        range.resume_at(20);
        assert_eq!(range.next_offset(), Some(20));
        assert_eq!(range.next_offset(), Some(10));
    }

    #[test]
    fn bounds_check_combinations() {
        let actual = ColumnValue::Integer(10);

        let mut bounds = NumericBounds::default();
        assert!(bounds_hold(&actual, &bounds));

        bounds.greater_than = Some(ColumnValue::Integer(9));
        bounds.less_than_equal_to = Some(ColumnValue::Integer(10));
        assert!(bounds_hold(&actual, &bounds));

        bounds.less_than = Some(ColumnValue::Integer(10));
        assert!(!bounds_hold(&actual, &bounds));
    }

    #[test]
    fn float_bounds_reject_nan() {
        let bounds = NumericBounds {
            greater_than: Some(ColumnValue::Float(0.0)),
            ..Default::default()
        };
        assert!(!bounds_hold(&ColumnValue::Float(f32::NAN), &bounds));
        assert!(bounds_hold(&ColumnValue::Float(0.5), &bounds));
    }
}
