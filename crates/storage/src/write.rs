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

//! Write-side executor: insert, bulk update and bulk erase.

use std::os::unix::fs::FileExt;

use crate::query::{Condition, SeekDirection};
use crate::read::{read_record, record_matches, ScanRange};
use crate::record::{
    write_numeric, ColumnValue, DynamicHeader, HashedEntry, DYNAMIC_HEADER_SIZE, FLAG_ACTIVE,
    FLAG_AVAILABLE_OPTIMISATION, FLAG_DIRTY, HASHED_ENTRY_SIZE,
};
use crate::table::{ActiveTable, TableFiles};
use crate::{string_hash, Error};

/// Appends a dynamic record (`header | bytes | NUL`) at the end of
/// `dynamic.bin` and returns the hashed entry pointing at it.
fn append_dynamic(
    files: &TableFiles,
    owner_offset: u64,
    text: &str,
) -> Result<HashedEntry, Error> {
    let location = files.dynamic.metadata()?.len();
    let size = text.len() as u32 + 1;

    let header = DynamicHeader {
        back_pointer: owner_offset,
        physical_size: size + DYNAMIC_HEADER_SIZE as u32,
    };

    let mut block = Vec::with_capacity(header.physical_size as usize);
    block.extend_from_slice(&header.encode());
    block.extend_from_slice(text.as_bytes());
    block.push(0);
    files.dynamic.write_all_at(&block, location)?;

    Ok(HashedEntry {
        hash: string_hash(text.as_bytes()),
        size,
        location,
    })
}

impl ActiveTable {
    /// Appends one record assembled from `values` (one per column, in
    /// physical order). String payloads get fresh dynamic records.
    pub fn insert(&self, values: &[ColumnValue]) -> Result<(), Error> {
        debug_assert_eq!(values.len(), self.schema().len());

        let files = self.files.lock();
        let record_offset = files.data.metadata()?.len();

        let mut record = vec![0u8; self.schema().record_size() as usize];
        record[0] = FLAG_ACTIVE | FLAG_DIRTY;

        for (column, value) in self.schema().columns().iter().zip(values) {
            let at = 1 + column.offset as usize;
            match value {
                ColumnValue::Text(text) => {
                    let entry = append_dynamic(&files, record_offset, text)?;
                    entry.encode_into(&mut record[at..at + HASHED_ENTRY_SIZE]);
                }
                numeric => write_numeric(&mut record[at..], numeric),
            }
        }

        files.data.write_all_at(&record, record_offset)?;
        Ok(())
    }

    /// Applies `changes` to every record matching `conditions`, up to
    /// `limit` (0 = unlimited). Returns the number of records updated.
    ///
    /// A string change rewrites in place when the existing dynamic record
    /// has capacity, flagging the record for optimisation when it shrinks;
    /// otherwise the value is relocated to a fresh dynamic record and the
    /// old region is orphaned until the next rebuild.
    pub fn update_many(
        &self,
        conditions: &[Condition],
        changes: &[(u32, ColumnValue)],
        limit: u64,
    ) -> Result<u64, Error> {
        let files = self.files.lock();
        let record_size = self.schema().record_size();
        let len = files.data.metadata()?.len();

        let mut buf = vec![0u8; record_size as usize];
        let mut range = ScanRange::new(len, record_size, SeekDirection::Forward);
        let mut count = 0u64;

        while let Some(offset) = range.next_offset() {
            if !read_record(&files, &mut buf, offset)? {
                continue;
            }
            if !record_matches(&files, self.schema(), &buf, conditions)? {
                continue;
            }

            for (index, value) in changes {
                let column = self.schema().column_at(*index);
                let at = 1 + column.offset as usize;

                match value {
                    ColumnValue::Text(text) => {
                        let mut entry = HashedEntry::decode(&buf[at..at + HASHED_ENTRY_SIZE]);
                        let new_size = text.len() as u32 + 1;

                        let mut header_buf = [0u8; DYNAMIC_HEADER_SIZE];
                        files.dynamic.read_exact_at(&mut header_buf, entry.location)?;
                        let header = DynamicHeader::decode(&header_buf);

                        if new_size <= header.capacity() {
                            let mut bytes = Vec::with_capacity(new_size as usize);
                            bytes.extend_from_slice(text.as_bytes());
                            bytes.push(0);
                            files
                                .dynamic
                                .write_all_at(&bytes, entry.location + DYNAMIC_HEADER_SIZE as u64)?;

                            if new_size != header.capacity() {
                                buf[0] |= FLAG_AVAILABLE_OPTIMISATION;
                            }

                            entry.hash = string_hash(text.as_bytes());
                            entry.size = new_size;
                        } else {
                            entry = append_dynamic(&files, offset, text)?;
                        }

                        entry.encode_into(&mut buf[at..at + HASHED_ENTRY_SIZE]);
                    }
                    numeric => write_numeric(&mut buf[at..], numeric),
                }
            }

            files.data.write_all_at(&buf, offset)?;
            count += 1;

            if limit != 0 && count == limit {
                break;
            }
        }

        Ok(count)
    }

    /// Tombstones every record matching `conditions`, up to `limit`
    /// (0 = unlimited). Only the flag byte is rewritten; dynamic bytes
    /// stay behind for rebuild to reclaim.
    pub fn erase_many(&self, conditions: &[Condition], limit: u64) -> Result<u64, Error> {
        let files = self.files.lock();
        let record_size = self.schema().record_size();
        let len = files.data.metadata()?.len();

        let mut buf = vec![0u8; record_size as usize];
        let mut range = ScanRange::new(len, record_size, SeekDirection::Forward);
        let mut count = 0u64;

        while let Some(offset) = range.next_offset() {
            if !read_record(&files, &mut buf, offset)? {
                continue;
            }
            if !record_matches(&files, self.schema(), &buf, conditions)? {
                continue;
            }

            let flags = (buf[0] & !FLAG_ACTIVE) | FLAG_AVAILABLE_OPTIMISATION;
            files.data.write_all_at(&[flags], offset)?;
            count += 1;

            if limit != 0 && count == limit {
                break;
            }
        }

        Ok(count)
    }
}
