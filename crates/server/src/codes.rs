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

//! Wire error codes. The numeric value of each code is fixed by its
//! position and must never be reordered.

/// Every error a response can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    JsonInvalid = 0,
    PacketSizeExceeded = 1,
    OverflowProtectionTriggered = 2,
    Internal = 3,
    ParamsInvalid = 4,
    HandshakeConfigJsonInvalid = 5,
    OutdatedClientVersion = 6,
    OutdatedServerVersion = 7,
    InvalidQuery = 8,
    TableNotFound = 9,
    OpInvalid = 10,
    OpNotFound = 11,
    DataInvalid = 12,
    NonceInvalid = 13,
    TableConflict = 14,
    TableAlreadyOpen = 15,
    TableNotOpen = 16,
    InsufficientMemory = 17,
    InvalidAccountCredentials = 18,
    TooManyConnections = 19,
    TrafficEncryptionMandatory = 20,
    AccountUsernameInUse = 21,
    NameReserved = 22,
    ValueReserved = 23,
    UsernameNotFound = 24,
    InsufficientPrivileges = 25,
    TooManyColumns = 26,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Human-readable description, omitted from responses when a session
    /// disables `error_text`.
    pub fn text(self) -> &'static str {
        match self {
            ErrorCode::JsonInvalid => "The provided JSON could not be parsed by the engine.",
            ErrorCode::PacketSizeExceeded => "The total size of the sent data exceeds the maximum packet size.",
            ErrorCode::OverflowProtectionTriggered => "The buffer overflow protection has been triggered. This could be due to your query not containing a valid or correctly calculated header/terminator.",
            ErrorCode::Internal => "An unhandled internal error has occurred while executing this query.",
            ErrorCode::ParamsInvalid => "The provided query does not contain all of the mandatory parameters for the requested operation or they are not the correct types.",
            ErrorCode::HandshakeConfigJsonInvalid => "The configuration handshake has either not been sent, is invalid or contains unsupported types or attributes.",
            ErrorCode::OutdatedClientVersion => "The client is using an outdated version of SwiftDB. This version is too significant to be compatible.",
            ErrorCode::OutdatedServerVersion => "The client is using a newer version of SwiftDB than the server. This version is too significant to be compatible.",
            ErrorCode::InvalidQuery => "Your query is either missing a mandatory parameter or uses an inappropriate type for a parameter.",
            ErrorCode::TableNotFound => "The target table could not be found.",
            ErrorCode::OpInvalid => "The operation query either does not contain the operation ID or it is not a number.",
            ErrorCode::OpNotFound => "The operation type provided does not exist or is not supported by the database version.",
            ErrorCode::DataInvalid => "The operation query either does not contain the data entry or it is not an object.",
            ErrorCode::NonceInvalid => "The operation query either does not contain a unique nonce or it is not a number.",
            ErrorCode::TableConflict => "The table you are attempting to instantiate already exists.",
            ErrorCode::TableAlreadyOpen => "The table you are attempting to open has already been loaded.",
            ErrorCode::TableNotOpen => "The table you are attempting to query has not been loaded. You must load a table before you can query it.",
            ErrorCode::InsufficientMemory => "There was insufficient memory available to perform the operation you requested.",
            ErrorCode::InvalidAccountCredentials => "The handshake has failed due to incorrect or invalid database account credentials.",
            ErrorCode::TooManyConnections => "The simultaneous connection limit has been exhausted. Please either disconnect a client, ensure clients disconnect properly or increase the connection limit with max-connections.",
            ErrorCode::TrafficEncryptionMandatory => "The server requests that all clients establish an encrypted connection. Reconnect and supply a public key or adjust the server settings.",
            ErrorCode::AccountUsernameInUse => "The account username you provided for creation has already been taken. Please pick another account username.",
            ErrorCode::NameReserved => "The name you have provided is an internally reserved name and cannot be used.",
            ErrorCode::ValueReserved => "The number value you have provided is an internally reserved value and cannot be used.",
            ErrorCode::UsernameNotFound => "The account username you have provided could not be found.",
            ErrorCode::InsufficientPrivileges => "Your account does not hold the privileges required to perform this operation.",
            ErrorCode::TooManyColumns => "The table you are attempting to create exceeds the maximum column count.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_keep_their_wire_values() {
        assert_eq!(ErrorCode::JsonInvalid.as_u32(), 0);
        assert_eq!(ErrorCode::OverflowProtectionTriggered.as_u32(), 2);
        assert_eq!(ErrorCode::TableNotFound.as_u32(), 9);
        assert_eq!(ErrorCode::NonceInvalid.as_u32(), 13);
        assert_eq!(ErrorCode::TrafficEncryptionMandatory.as_u32(), 20);
        assert_eq!(ErrorCode::InsufficientPrivileges.as_u32(), 25);
        assert_eq!(ErrorCode::TooManyColumns.as_u32(), 26);
    }
}
