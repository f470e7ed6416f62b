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

//! Offline compaction: copy live records and their dynamic data into
//! fresh files, then swap the files in under the table mutex.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::read::ScanRange;
use crate::record::{
    DynamicHeader, HashedEntry, DYNAMIC_HEADER_SIZE, FLAG_ACTIVE, HASHED_ENTRY_SIZE,
};
use crate::schema::ColumnKind;
use crate::table::{ActiveTable, TableFiles, DATA_FILE, DYNAMIC_FILE};
use crate::query::SeekDirection;
use crate::Error;

const NEW_DATA_FILE: &str = "data.new.bin";
const NEW_DYNAMIC_FILE: &str = "dynamic.new.bin";

/// Counters reported by a completed rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Live records copied into the new files.
    pub record_count: u32,
    /// Tombstoned records dropped.
    pub dead_record_count: u32,
    /// Dynamic records whose capacity exceeded their live size.
    pub short_dynamic_count: u32,
}

fn copy_records(
    files: &TableFiles,
    table: &ActiveTable,
    new_data: &File,
    new_dynamic: &File,
) -> Result<RebuildStats, Error> {
    let mut stats = RebuildStats::default();
    let record_size = table.schema().record_size();
    let len = files.data.metadata()?.len();

    let mut buf = vec![0u8; record_size as usize];
    let mut range = ScanRange::new(len, record_size, SeekDirection::Forward);
    let mut new_data_offset = 0u64;
    let mut new_dynamic_offset = 0u64;

    while let Some(offset) = range.next_offset() {
        files.data.read_exact_at(&mut buf, offset)?;
        if buf[0] & FLAG_ACTIVE == 0 {
            stats.dead_record_count += 1;
            continue;
        }
        stats.record_count += 1;

        for column in table.schema().columns() {
            if column.kind != ColumnKind::String {
                continue;
            }
            let at = 1 + column.offset as usize;
            let mut entry = HashedEntry::decode(&buf[at..at + HASHED_ENTRY_SIZE]);

            let mut header_buf = [0u8; DYNAMIC_HEADER_SIZE];
            files.dynamic.read_exact_at(&mut header_buf, entry.location)?;
            let header = DynamicHeader::decode(&header_buf);
            if header.capacity() != entry.size {
                stats.short_dynamic_count += 1;
            }

            let mut bytes = vec![0u8; entry.size as usize];
            files
                .dynamic
                .read_exact_at(&mut bytes, entry.location + DYNAMIC_HEADER_SIZE as u64)?;

            // Tight copy: capacity equals live size, back-pointer tracks
            // the record's position in the new data file.
            let new_header = DynamicHeader {
                back_pointer: new_data_offset,
                physical_size: entry.size + DYNAMIC_HEADER_SIZE as u32,
            };
            let mut block = Vec::with_capacity(new_header.physical_size as usize);
            block.extend_from_slice(&new_header.encode());
            block.extend_from_slice(&bytes);
            new_dynamic.write_all_at(&block, new_dynamic_offset)?;

            entry.location = new_dynamic_offset;
            entry.encode_into(&mut buf[at..at + HASHED_ENTRY_SIZE]);
            new_dynamic_offset += u64::from(new_header.physical_size);
        }

        new_data.write_all_at(&buf, new_data_offset)?;
        new_data_offset += u64::from(record_size);
    }

    Ok(stats)
}

fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(target: "table", "could not remove {}: {e}", path.display());
        }
    }
}

impl ActiveTable {
    /// Copy-compacts the table into `data.new.bin`/`dynamic.new.bin`,
    /// then replaces the live files and handles. Runs to completion under
    /// the table mutex; a failure removes the new files and leaves the
    /// original files untouched.
    pub fn rebuild(&self) -> Result<RebuildStats, Error> {
        let mut files = self.files.lock();

        let new_data_path = files.dir.join(NEW_DATA_FILE);
        let new_dynamic_path = files.dir.join(NEW_DYNAMIC_FILE);

        let result = (|| {
            let new_data = File::create(&new_data_path)?;
            let new_dynamic = File::create(&new_dynamic_path)?;
            copy_records(&files, self, &new_data, &new_dynamic)
        })();

        let stats = match result {
            Ok(stats) => stats,
            Err(e) => {
                remove_if_present(&new_data_path);
                remove_if_present(&new_dynamic_path);
                return Err(e);
            }
        };

        let data_path = files.dir.join(DATA_FILE);
        let dynamic_path = files.dir.join(DYNAMIC_FILE);

        let swap = (|| {
            fs::remove_file(&data_path)?;
            fs::remove_file(&dynamic_path)?;
            fs::rename(&new_data_path, &data_path)?;
            fs::rename(&new_dynamic_path, &dynamic_path)?;
            files.data = OpenOptions::new().read(true).write(true).open(&data_path)?;
            files.dynamic = OpenOptions::new().read(true).write(true).open(&dynamic_path)?;
            Ok::<(), Error>(())
        })();

        match swap {
            Ok(()) => Ok(stats),
            Err(e) => {
                error!(target: "table", "file swap failed while rebuilding {}: {e}", self.name());
                Err(e)
            }
        }
    }
}
