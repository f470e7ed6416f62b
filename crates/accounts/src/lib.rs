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

//! Persistent database accounts and the permission model gating every
//! query: a global bitset per account plus per-table overrides.

#[macro_use]
extern crate log;

mod permissions;
mod store;

pub use permissions::{GlobalPermissions, TablePermissions, HIERARCHY_INDEX_MAX, ROOT_HIERARCHY_INDEX};
pub use store::{AccountStore, DatabaseAccount, Error, ACCOUNT_RECORD_SIZE, ROOT_USERNAME};
