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

//! File-backed account store: `accounts.bin` is a flat array of
//! fixed-size records. Creation appends, deletion flips the `active`
//! byte in place, and an account's identity is its byte offset in the
//! file (`internal_index`).

use std::{
    collections::HashMap,
    fmt,
    fs::{File, OpenOptions},
    io,
    os::unix::fs::FileExt,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use swiftdb_crypto::PasswordSlot;

use crate::permissions::GlobalPermissions;

/// Reserved username, never persisted.
pub const ROOT_USERNAME: &str = "root";

const NAME_FIELD: usize = 33;
/// active + internal_index + username + hash + salt + hierarchy + bits.
pub const ACCOUNT_RECORD_SIZE: usize = 1 + 8 + NAME_FIELD + 32 + 32 + 4 + 1;

/// Account-store errors.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// CSPRNG failure while deriving a password slot.
    Crypto(swiftdb_crypto::Error),
    /// The username already has a live record.
    UsernameInUse,
    /// No live record under that username.
    NotFound,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            Error::Io(ref err) => write!(f, "{err}"),
            Error::Crypto(ref err) => write!(f, "{err}"),
            Error::UsernameInUse => write!(f, "username already in use"),
            Error::NotFound => write!(f, "account not found"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<swiftdb_crypto::Error> for Error {
    fn from(err: swiftdb_crypto::Error) -> Self {
        Error::Crypto(err)
    }
}

/// One account. `internal_index` is the record's byte offset in
/// `accounts.bin`; the in-memory root account uses `u64::MAX`.
#[derive(Debug, Clone)]
pub struct DatabaseAccount {
    pub username: String,
    pub internal_index: u64,
    pub password: PasswordSlot,
    pub permissions: GlobalPermissions,
}

impl DatabaseAccount {
    pub fn is_root(&self) -> bool {
        self.username == ROOT_USERNAME
    }
}

/// The account registry: the backing file plus a username-keyed map of
/// live accounts. Mutations serialize on the file lock.
pub struct AccountStore {
    path: PathBuf,
    file: Mutex<File>,
    accounts: RwLock<HashMap<String, Arc<DatabaseAccount>>>,
}

fn encode_record(account: &DatabaseAccount, active: bool) -> [u8; ACCOUNT_RECORD_SIZE] {
    let mut out = [0u8; ACCOUNT_RECORD_SIZE];
    out[0] = active as u8;
    out[1..9].copy_from_slice(&account.internal_index.to_le_bytes());
    out[9..9 + account.username.len()].copy_from_slice(account.username.as_bytes());
    out[42..74].copy_from_slice(&account.password.hash);
    out[74..106].copy_from_slice(&account.password.salt);
    out[106..110].copy_from_slice(&account.permissions.hierarchy_index.to_le_bytes());
    out[110] = account.permissions.to_bits();
    out
}

fn decode_record(buf: &[u8; ACCOUNT_RECORD_SIZE]) -> Option<DatabaseAccount> {
    if buf[0] == 0 {
        return None;
    }

    let internal_index = u64::from_le_bytes(buf[1..9].try_into().expect("slice is 8 bytes; qed"));
    let name_end = buf[9..9 + NAME_FIELD]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(NAME_FIELD - 1);
    let username = String::from_utf8_lossy(&buf[9..9 + name_end]).into_owned();

    let hash: [u8; 32] = buf[42..74].try_into().expect("slice is 32 bytes; qed");
    let salt: [u8; 32] = buf[74..106].try_into().expect("slice is 32 bytes; qed");
    let hierarchy = u32::from_le_bytes(buf[106..110].try_into().expect("slice is 4 bytes; qed"));

    Some(DatabaseAccount {
        username,
        internal_index,
        password: PasswordSlot::from_parts(hash, salt),
        permissions: GlobalPermissions::from_bits(hierarchy, buf[110]),
    })
}

impl AccountStore {
    /// Opens `accounts.bin` (which must already exist) and loads every
    /// live record into the username map.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<AccountStore, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut accounts = HashMap::new();
        let len = file.metadata()?.len();
        let mut buf = [0u8; ACCOUNT_RECORD_SIZE];
        let mut offset = 0u64;

        while offset + ACCOUNT_RECORD_SIZE as u64 <= len {
            file.read_exact_at(&mut buf, offset)?;
            if let Some(account) = decode_record(&buf) {
                accounts.insert(account.username.clone(), Arc::new(account));
            }
            offset += ACCOUNT_RECORD_SIZE as u64;
        }

        if !accounts.is_empty() {
            info!("Loaded {} database user accounts into memory", accounts.len());
        }

        Ok(AccountStore {
            path,
            file: Mutex::new(file),
            accounts: RwLock::new(accounts),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Installs the in-memory root account for this process lifetime.
    pub fn install_root(&self, password: &str) -> Result<(), Error> {
        let account = DatabaseAccount {
            username: ROOT_USERNAME.to_owned(),
            internal_index: u64::MAX,
            password: PasswordSlot::derive(password)?,
            permissions: GlobalPermissions::root(),
        };
        self.accounts
            .write()
            .insert(ROOT_USERNAME.to_owned(), Arc::new(account));
        Ok(())
    }

    /// Appends a new account record and registers it in the map.
    pub fn create(
        &self,
        username: &str,
        password: &str,
        permissions: GlobalPermissions,
    ) -> Result<Arc<DatabaseAccount>, Error> {
        let file = self.file.lock();

        if self.accounts.read().contains_key(username) {
            return Err(Error::UsernameInUse);
        }

        let internal_index = file.metadata()?.len();
        let account = DatabaseAccount {
            username: username.to_owned(),
            internal_index,
            password: PasswordSlot::derive(password)?,
            permissions,
        };

        file.write_all_at(&encode_record(&account, true), internal_index)?;

        let account = Arc::new(account);
        self.accounts
            .write()
            .insert(username.to_owned(), account.clone());
        Ok(account)
    }

    /// Soft-deletes an account: flips the record's `active` byte and
    /// drops it from the map. The caller erases its permission rows.
    pub fn delete(&self, username: &str) -> Result<Arc<DatabaseAccount>, Error> {
        let file = self.file.lock();

        let account = self
            .accounts
            .write()
            .remove(username)
            .ok_or(Error::NotFound)?;

        // Root lives only in memory.
        if account.internal_index != u64::MAX {
            file.write_all_at(&[0u8], account.internal_index)?;
        }
        Ok(account)
    }

    pub fn get(&self, username: &str) -> Option<Arc<DatabaseAccount>> {
        self.accounts.read().get(username).cloned()
    }

    /// Verifies credentials; `None` covers both unknown usernames and bad
    /// passwords so callers cannot distinguish them.
    pub fn verify(&self, username: &str, password: &str) -> Option<Arc<DatabaseAccount>> {
        let account = self.get(username)?;
        if account.password.matches(password) {
            Some(account)
        } else {
            None
        }
    }

    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<_> = self.accounts.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// Flushes the backing file to disk.
    pub fn sync(&self) -> Result<(), Error> {
        Ok(self.file.lock().sync_all()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::TablePermissions;
    use std::fs;
    use tempdir::TempDir;

    fn store_at(dir: &TempDir) -> AccountStore {
        let path = dir.path().join("accounts.bin");
        if !path.exists() {
            File::create(&path).unwrap();
        }
        AccountStore::open(&path).unwrap()
    }

    #[test]
    fn record_encoding_round_trips() {
        let account = DatabaseAccount {
            username: "operator".to_owned(),
            internal_index: 3 * ACCOUNT_RECORD_SIZE as u64,
            password: PasswordSlot::derive("pw").unwrap(),
            permissions: GlobalPermissions::from_bits(17, 0b101_0101),
        };
        let decoded = decode_record(&encode_record(&account, true)).unwrap();
        assert_eq!(decoded.username, account.username);
        assert_eq!(decoded.internal_index, account.internal_index);
        assert_eq!(decoded.permissions, account.permissions);
        assert!(decoded.password.matches("pw"));

        assert!(decode_record(&encode_record(&account, false)).is_none());
    }

    #[test]
    fn create_persists_across_reopen() {
        let dir = TempDir::new("accounts").unwrap();
        {
            let store = store_at(&dir);
            let mut perms = GlobalPermissions::none(4);
            perms.create_tables = true;
            store.create("alice", "wonder", perms).unwrap();
            store.create("bob", "builder", GlobalPermissions::none(5)).unwrap();

            assert!(matches!(
                store.create("alice", "again", GlobalPermissions::none(6)),
                Err(Error::UsernameInUse)
            ));
        }

        let store = store_at(&dir);
        assert_eq!(store.len(), 2);
        let alice = store.get("alice").unwrap();
        assert!(alice.permissions.create_tables);
        assert_eq!(alice.permissions.hierarchy_index, 4);
        assert!(store.verify("alice", "wonder").is_some());
        assert!(store.verify("alice", "wrong").is_none());
        assert!(store.verify("carol", "wonder").is_none());

        // Offsets are stable record multiples.
        let bob = store.get("bob").unwrap();
        assert_eq!(bob.internal_index, ACCOUNT_RECORD_SIZE as u64);
    }

    #[test]
    fn delete_is_a_tombstone() {
        let dir = TempDir::new("accounts").unwrap();
        {
            let store = store_at(&dir);
            store.create("alice", "pw", GlobalPermissions::none(4)).unwrap();
            store.create("bob", "pw", GlobalPermissions::none(5)).unwrap();
            store.delete("alice").unwrap();
            assert!(matches!(store.delete("alice"), Err(Error::NotFound)));
        }

        let path = dir.path().join("accounts.bin");
        // File keeps both records; only the active byte changed.
        assert_eq!(
            fs::metadata(&path).unwrap().len(),
            2 * ACCOUNT_RECORD_SIZE as u64
        );

        let store = store_at(&dir);
        assert!(store.get("alice").is_none());
        assert!(store.get("bob").is_some());
    }

    #[test]
    fn root_is_memory_only() {
        let dir = TempDir::new("accounts").unwrap();
        let store = store_at(&dir);
        store.install_root("sekrit").unwrap();

        let root = store.verify("root", "sekrit").unwrap();
        assert!(root.is_root());
        assert!(root.permissions.table_administrator);
        assert_eq!(
            root.permissions.hierarchy_index,
            crate::ROOT_HIERARCHY_INDEX
        );

        assert_eq!(fs::metadata(dir.path().join("accounts.bin")).unwrap().len(), 0);

        // Sanity: admin grant covers everything a table override could.
        assert_eq!(TablePermissions::all().to_byte(), 0b1_1111);
    }
}
