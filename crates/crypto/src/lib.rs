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

//! Cryptographic primitives backing the SwiftDB wire protocol and account
//! store: finite-field Diffie-Hellman key agreement, the AES-256-CBC frame
//! cipher, PBKDF2 password slots and a CSPRNG wrapper.

mod cipher;
mod dh;
mod error;
mod password;

pub use cipher::FrameCipher;
pub use dh::{DhSession, DH_GENERATOR};
pub use error::Error;
pub use password::PasswordSlot;

use rand::{rngs::OsRng, RngCore};

/// AES-256 key width in bytes.
pub const AES_KEY_SIZE: usize = 32;
/// CBC initialisation vector width in bytes.
pub const AES_IV_SIZE: usize = 16;

/// Fills `dest` from the operating system CSPRNG.
///
/// A failing system RNG is unrecoverable for anything built on top of it,
/// so the failure is surfaced as an error rather than degraded output.
pub fn random_bytes(dest: &mut [u8]) -> Result<(), Error> {
    OsRng.try_fill_bytes(dest).map_err(|_| Error::Rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_fills_buffer() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        random_bytes(&mut a).unwrap();
        random_bytes(&mut b).unwrap();
        // Two 256-bit draws colliding means the RNG is broken.
        assert_ne!(a, b);
    }
}
