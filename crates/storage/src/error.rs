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

use std::{fmt, io};

/// Storage-layer errors.
#[derive(Debug)]
pub enum Error {
    /// Underlying file I/O failure.
    Io(io::Error),
    /// The named table does not exist on disk.
    NotFound,
    /// A table of that name already exists on disk.
    AlreadyExists,
    /// The table is already present in the open-table map.
    AlreadyOpen,
    /// `meta.bin` failed validation.
    Corrupt(String),
    /// A decoded query does not fit the table schema.
    ParamsInvalid,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            Error::Io(ref err) => write!(f, "{err}"),
            Error::NotFound => write!(f, "table not found"),
            Error::AlreadyExists => write!(f, "table already exists"),
            Error::AlreadyOpen => write!(f, "table already open"),
            Error::Corrupt(ref reason) => write!(f, "corrupt table metadata: {reason}"),
            Error::ParamsInvalid => write!(f, "query parameters do not fit the table schema"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
