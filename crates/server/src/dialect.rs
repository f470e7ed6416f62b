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

//! Response field naming. A session that negotiated `short_attributes`
//! receives single-letter field names on every response; requests are
//! accepted in long form either way, and handshake traffic is always
//! long-form.

use serde_json::{Map, Value};

use crate::codes::ErrorCode;

/// Maps logical response fields to their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDialect {
    Long,
    Short,
}

impl FieldDialect {
    pub fn from_short_attributes(short: bool) -> FieldDialect {
        if short {
            FieldDialect::Short
        } else {
            FieldDialect::Long
        }
    }

    pub fn nonce(self) -> &'static str {
        match self {
            FieldDialect::Long => "nonce",
            FieldDialect::Short => "n",
        }
    }

    pub fn error(self) -> &'static str {
        match self {
            FieldDialect::Long => "error",
            FieldDialect::Short => "e",
        }
    }

    pub fn data(self) -> &'static str {
        match self {
            FieldDialect::Long => "data",
            FieldDialect::Short => "d",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            FieldDialect::Long => "code",
            FieldDialect::Short => "c",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            FieldDialect::Long => "text",
            FieldDialect::Short => "t",
        }
    }
}

/// Builds a success response echoing `nonce`, with an optional payload.
pub fn success_response(dialect: FieldDialect, nonce: u64, data: Option<Value>) -> Value {
    let mut object = Map::new();
    object.insert(dialect.nonce().to_owned(), nonce.into());
    if let Some(data) = data {
        object.insert(dialect.data().to_owned(), data);
    }
    Value::Object(object)
}

/// Builds an error response. `nonce` is echoed when the request carried
/// one; `include_text` follows the session's `error_text` option.
pub fn error_response(
    dialect: FieldDialect,
    nonce: Option<u64>,
    code: ErrorCode,
    include_text: bool,
) -> Value {
    let mut payload = Map::new();
    payload.insert(dialect.code().to_owned(), code.as_u32().into());
    if include_text {
        payload.insert(dialect.text().to_owned(), code.text().into());
    }

    let mut object = Map::new();
    if let Some(nonce) = nonce {
        object.insert(dialect.nonce().to_owned(), nonce.into());
    }
    object.insert(dialect.error().to_owned(), 1.into());
    object.insert(dialect.data().to_owned(), Value::Object(payload));
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn long_form_success() {
        let v = success_response(FieldDialect::Long, 9, Some(json!({"count": 2})));
        assert_eq!(v, json!({ "nonce": 9, "data": { "count": 2 } }));

        let v = success_response(FieldDialect::Long, 9, None);
        assert_eq!(v, json!({ "nonce": 9 }));
    }

    #[test]
    fn short_form_error_without_text() {
        let v = error_response(FieldDialect::Short, Some(3), ErrorCode::TableNotFound, false);
        assert_eq!(v, json!({ "n": 3, "e": 1, "d": { "c": 9 } }));
    }

    #[test]
    fn error_without_nonce_and_with_text() {
        let v = error_response(FieldDialect::Long, None, ErrorCode::NonceInvalid, true);
        let object = v.as_object().unwrap();
        assert!(!object.contains_key("nonce"));
        assert_eq!(object["error"], json!(1));
        assert_eq!(object["data"]["code"], json!(13));
        assert_eq!(object["data"]["text"], json!(ErrorCode::NonceInvalid.text()));
    }
}
