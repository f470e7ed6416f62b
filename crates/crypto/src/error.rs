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

use std::fmt;

/// Crypto-layer errors.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The system CSPRNG refused to produce bytes.
    Rng,
    /// The peer supplied a public key that is not a valid group element.
    InvalidPeerKey,
    /// Ciphertext is truncated, misaligned or fails PKCS#7 unpadding.
    Malformed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let s = match *self {
            Error::Rng => "system random source failure",
            Error::InvalidPeerKey => "invalid peer public key",
            Error::Malformed => "malformed ciphertext",
        };
        write!(f, "{s}")
    }
}
