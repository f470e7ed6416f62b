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

//! Table lifecycle: on-disk layout under `<data>/<name>/`, the open-table
//! map and the per-table handles every executor operation runs against.

use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};

use crate::schema::{ColumnDef, ColumnKind, Schema, MAX_NAME_LEN};
use crate::Error;

/// Magic number opening every `meta.bin`.
pub const TABLE_MAGIC: u32 = 0xE428_6A24;

/// NUL-padded name field width (32 chars + terminator).
const NAME_FIELD: usize = 33;
/// magic + name + num_columns + record_size + options.
const META_HEADER_SIZE: usize = 4 + NAME_FIELD + 4 + 4 + 1;
/// name + kind id + declared size.
const COLUMN_DESCRIPTOR_SIZE: usize = NAME_FIELD + 4 + 4;

pub(crate) const DATA_FILE: &str = "data.bin";
pub(crate) const DYNAMIC_FILE: &str = "dynamic.bin";
const META_FILE: &str = "meta.bin";

/// An open table: immutable schema plus the mutable file state guarded by
/// the per-table mutex. All reads and writes on the table serialize on
/// `files`; distinct tables proceed independently.
pub struct ActiveTable {
    name: String,
    schema: Schema,
    is_internal: bool,
    /// Per-account permission bytes loaded from the reserved permissions
    /// table, keyed by account internal index.
    permissions: RwLock<HashMap<u64, u8>>,
    pub(crate) files: Mutex<TableFiles>,
}

pub(crate) struct TableFiles {
    pub data: File,
    pub dynamic: File,
    pub dir: PathBuf,
}

impl ActiveTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_internal(&self) -> bool {
        self.is_internal
    }

    pub fn permission_byte(&self, account_index: u64) -> Option<u8> {
        self.permissions.read().get(&account_index).copied()
    }

    pub fn cache_permission(&self, account_index: u64, byte: u8) {
        self.permissions.write().insert(account_index, byte);
    }

    pub fn drop_cached_permission(&self, account_index: u64) {
        self.permissions.write().remove(&account_index);
    }

    /// Current length of `data.bin`; always a record-size multiple.
    pub fn data_file_len(&self) -> Result<u64, Error> {
        Ok(self.files.lock().data.metadata()?.len())
    }
}

/// Process-wide table registry. Opening and closing serialize on one lock
/// so a create/open race cannot double-open a directory.
pub struct TableStore {
    root: PathBuf,
    open: RwLock<HashMap<String, Arc<ActiveTable>>>,
    open_lock: Mutex<()>,
}

impl TableStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> TableStore {
        TableStore {
            root: root.into(),
            open: RwLock::new(HashMap::new()),
            open_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.table_dir(name).is_dir()
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.open.read().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ActiveTable>> {
        self.open.read().get(name).cloned()
    }

    pub fn open_tables(&self) -> Vec<Arc<ActiveTable>> {
        self.open.read().values().cloned().collect()
    }

    /// Creates the table directory with a populated `meta.bin` and empty
    /// data/dynamic files. The schema is immutable afterwards.
    pub fn create(&self, name: &str, columns: Vec<(String, ColumnKind)>) -> Result<(), Error> {
        let _guard = self.open_lock.lock();

        let dir = self.table_dir(name);
        if dir.exists() {
            return Err(Error::AlreadyExists);
        }

        let schema = Schema::new(columns)?;

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(META_FILE), encode_meta(name, &schema))?;
        File::create(dir.join(DATA_FILE))?;
        File::create(dir.join(DYNAMIC_FILE))?;

        debug!(target: "table", "created table {} ({} columns, record size {})",
            name, schema.len(), schema.record_size());
        Ok(())
    }

    /// Opens a table into the registry: reads and validates `meta.bin`,
    /// then holds `data.bin` and `dynamic.bin` read-write for the table's
    /// lifetime.
    pub fn open(&self, name: &str, is_internal: bool) -> Result<Arc<ActiveTable>, Error> {
        let _guard = self.open_lock.lock();

        if self.open.read().contains_key(name) {
            return Err(Error::AlreadyOpen);
        }

        let dir = self.table_dir(name);
        let meta = match fs::read(dir.join(META_FILE)) {
            Ok(bytes) => bytes,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => return Err(e.into()),
        };
        let (stored_name, schema) = decode_meta(&meta)?;
        if stored_name != name {
            return Err(Error::Corrupt(format!(
                "metadata names table {stored_name:?}, directory is {name:?}"
            )));
        }

        let data = open_rw(&dir.join(DATA_FILE))?;
        let dynamic = open_rw(&dir.join(DYNAMIC_FILE))?;

        let len = data.metadata()?.len();
        if len % u64::from(schema.record_size()) != 0 {
            return Err(Error::Corrupt(format!(
                "data file length {len} is not a multiple of record size {}",
                schema.record_size()
            )));
        }

        let table = Arc::new(ActiveTable {
            name: name.to_owned(),
            schema,
            is_internal,
            permissions: RwLock::new(HashMap::new()),
            files: Mutex::new(TableFiles { data, dynamic, dir }),
        });

        self.open.write().insert(name.to_owned(), table.clone());
        Ok(table)
    }

    /// Removes the table from the registry. In-flight operations holding
    /// the `Arc` finish normally; handles close when the last clone drops.
    pub fn close(&self, name: &str) -> Option<Arc<ActiveTable>> {
        let _guard = self.open_lock.lock();
        self.open.write().remove(name)
    }

    /// Non-internal table directories under the data root.
    pub fn user_table_names(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if !name.starts_with("--internal") {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn open_rw(path: &Path) -> Result<File, Error> {
    match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => Ok(f),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
        Err(e) => Err(e.into()),
    }
}

fn write_name_field(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; NAME_FIELD];
    field[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&field);
}

fn read_name_field(buf: &[u8]) -> Result<String, Error> {
    let end = buf[..NAME_FIELD]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(MAX_NAME_LEN);
    String::from_utf8(buf[..end].to_vec())
        .map_err(|_| Error::Corrupt("name field is not UTF-8".into()))
}

fn encode_meta(name: &str, schema: &Schema) -> Vec<u8> {
    let mut out = Vec::with_capacity(META_HEADER_SIZE + schema.len() * COLUMN_DESCRIPTOR_SIZE);
    out.extend_from_slice(&TABLE_MAGIC.to_le_bytes());
    write_name_field(&mut out, name);
    out.extend_from_slice(&(schema.len() as u32).to_le_bytes());
    out.extend_from_slice(&schema.record_size().to_le_bytes());
    out.push(0); // options byte, reserved
    for column in schema.columns() {
        write_name_field(&mut out, &column.name);
        out.extend_from_slice(&column.kind.id().to_le_bytes());
        out.extend_from_slice(&column.kind.declared_size().to_le_bytes());
    }
    out
}

fn decode_meta(buf: &[u8]) -> Result<(String, Schema), Error> {
    if buf.len() < META_HEADER_SIZE {
        return Err(Error::Corrupt("metadata shorter than the fixed header".into()));
    }

    let magic = u32::from_le_bytes(buf[0..4].try_into().expect("slice is 4 bytes; qed"));
    if magic != TABLE_MAGIC {
        return Err(Error::Corrupt(format!("bad magic {magic:#x}")));
    }

    let name = read_name_field(&buf[4..])?;
    let num_columns =
        u32::from_le_bytes(buf[4 + NAME_FIELD..8 + NAME_FIELD].try_into().expect("slice is 4 bytes; qed"));
    let stored_record_size =
        u32::from_le_bytes(buf[8 + NAME_FIELD..12 + NAME_FIELD].try_into().expect("slice is 4 bytes; qed"));

    let expected = META_HEADER_SIZE + num_columns as usize * COLUMN_DESCRIPTOR_SIZE;
    if buf.len() < expected {
        return Err(Error::Corrupt(format!(
            "metadata truncated: {} bytes for {num_columns} columns",
            buf.len()
        )));
    }

    let mut columns = Vec::with_capacity(num_columns as usize);
    for i in 0..num_columns as usize {
        let at = META_HEADER_SIZE + i * COLUMN_DESCRIPTOR_SIZE;
        let col_name = read_name_field(&buf[at..])?;
        let kind_id = u32::from_le_bytes(
            buf[at + NAME_FIELD..at + NAME_FIELD + 4]
                .try_into()
                .expect("slice is 4 bytes; qed"),
        );
        let kind = ColumnKind::from_id(kind_id)
            .ok_or_else(|| Error::Corrupt(format!("unknown column kind {kind_id}")))?;
        columns.push((col_name, kind));
    }

    let schema = Schema::new(columns).map_err(|_| Error::Corrupt("invalid column list".into()))?;
    if schema.record_size() != stored_record_size {
        return Err(Error::Corrupt(format!(
            "stored record size {stored_record_size} does not match layout {}",
            schema.record_size()
        )));
    }

    Ok((name, schema))
}

/// Builds meta-description JSON for a column as reported to clients.
pub fn describe_column(column: &ColumnDef) -> serde_json::Value {
    serde_json::json!({
        "name": column.name,
        "size": column.kind.declared_size(),
        "type": column.kind.as_str(),
        "physical_index": column.index,
    })
}
