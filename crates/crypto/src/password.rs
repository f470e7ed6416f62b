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

//! PBKDF2-HMAC-SHA256 password slots as stored in account records.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{random_bytes, Error};

pub const SALT_SIZE: usize = 32;
pub const HASH_SIZE: usize = 32;
pub const PBKDF2_ITERATIONS: u32 = 10000;

/// A derived password: salt plus PBKDF2 output, both 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordSlot {
    pub hash: [u8; HASH_SIZE],
    pub salt: [u8; SALT_SIZE],
}

impl PasswordSlot {
    /// Derives a slot for `plaintext` under a fresh random salt.
    pub fn derive(plaintext: &str) -> Result<PasswordSlot, Error> {
        let mut salt = [0u8; SALT_SIZE];
        random_bytes(&mut salt)?;

        let mut hash = [0u8; HASH_SIZE];
        pbkdf2_hmac::<Sha256>(plaintext.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);

        Ok(PasswordSlot { hash, salt })
    }

    /// Reassembles a slot loaded from disk.
    pub fn from_parts(hash: [u8; HASH_SIZE], salt: [u8; SALT_SIZE]) -> PasswordSlot {
        PasswordSlot { hash, salt }
    }

    /// Constant-time verification of `plaintext` against this slot.
    pub fn matches(&self, plaintext: &str) -> bool {
        let mut candidate = [0u8; HASH_SIZE];
        pbkdf2_hmac::<Sha256>(
            plaintext.as_bytes(),
            &self.salt,
            PBKDF2_ITERATIONS,
            &mut candidate,
        );

        candidate[..].ct_eq(&self.hash[..]).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_and_verify() {
        let slot = PasswordSlot::derive("this is sparta").unwrap();
        assert!(slot.matches("this is sparta"));
        assert!(!slot.matches("this is sparta!"));
        assert!(!slot.matches(""));
    }

    #[test]
    fn salts_are_unique() {
        let a = PasswordSlot::derive("pw").unwrap();
        let b = PasswordSlot::derive("pw").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn survives_part_round_trip() {
        let slot = PasswordSlot::derive("hunter2!").unwrap();
        let restored = PasswordSlot::from_parts(slot.hash, slot.salt);
        assert!(restored.matches("hunter2!"));
    }
}
