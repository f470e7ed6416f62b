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

//! Query compilation: decoded JSON condition and change objects are
//! narrowed against a schema into typed predicates before any record is
//! touched. String equality hashes are precomputed here so the scan can
//! reject most non-matches without a dynamic-file read.

use serde_json::{Map, Value};

use crate::record::ColumnValue;
use crate::schema::{ColumnKind, Schema};
use crate::{string_hash, Error};

/// Scan direction over `data.bin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

impl SeekDirection {
    /// Accepts the wire values `1` and `-1`.
    pub fn from_wire(v: i64) -> Option<SeekDirection> {
        match v {
            1 => Some(SeekDirection::Forward),
            -1 => Some(SeekDirection::Backward),
            _ => None,
        }
    }
}

/// Inclusive/exclusive bounds for a numeric column; every supplied bound
/// must hold.
#[derive(Debug, Clone, Default)]
pub struct NumericBounds {
    pub greater_than: Option<ColumnValue>,
    pub greater_than_equal_to: Option<ColumnValue>,
    pub less_than: Option<ColumnValue>,
    pub less_than_equal_to: Option<ColumnValue>,
}

/// One compiled per-column predicate.
#[derive(Debug, Clone)]
pub enum Predicate {
    Equals(ColumnValue),
    Bounds(NumericBounds),
    TextEquals { text: String, hash: u64 },
    TextContains(String),
}

/// A predicate bound to a physical column index.
#[derive(Debug, Clone)]
pub struct Condition {
    pub column: u32,
    pub predicate: Predicate,
}

/// Narrows a direct JSON value to `kind`.
fn coerce(kind: ColumnKind, value: &Value) -> Result<ColumnValue, Error> {
    match kind {
        ColumnKind::Byte => value
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .map(ColumnValue::Byte),
        ColumnKind::Integer => value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(ColumnValue::Integer),
        ColumnKind::Long => value.as_i64().map(ColumnValue::Long),
        ColumnKind::Float => value.as_f64().map(|v| ColumnValue::Float(v as f32)),
        ColumnKind::String => value.as_str().map(|s| ColumnValue::Text(s.to_owned())),
    }
    .ok_or(Error::ParamsInvalid)
}

const BOUND_KEYS: [&str; 4] = [
    "greater_than",
    "greater_than_equal_to",
    "less_than",
    "less_than_equal_to",
];

fn compile_bounds(kind: ColumnKind, object: &Map<String, Value>) -> Result<NumericBounds, Error> {
    let mut bounds = NumericBounds::default();
    for key in BOUND_KEYS {
        if let Some(raw) = object.get(key) {
            let value = coerce(kind, raw)?;
            match key {
                "greater_than" => bounds.greater_than = Some(value),
                "greater_than_equal_to" => bounds.greater_than_equal_to = Some(value),
                "less_than" => bounds.less_than = Some(value),
                "less_than_equal_to" => bounds.less_than_equal_to = Some(value),
                _ => unreachable!("key list is exhaustive"),
            }
        }
    }
    Ok(bounds)
}

/// Compiles a `where` object (a conjunction of per-column predicates).
pub fn compile_where(schema: &Schema, object: &Map<String, Value>) -> Result<Vec<Condition>, Error> {
    let mut conditions = Vec::with_capacity(object.len());

    for (name, value) in object {
        let column = schema.column(name).ok_or(Error::ParamsInvalid)?;

        let predicate = match (column.kind, value) {
            (kind, Value::Object(spec)) if kind.is_numeric() => {
                Predicate::Bounds(compile_bounds(kind, spec)?)
            }
            (ColumnKind::String, Value::Object(spec)) => match spec.get("contains") {
                Some(Value::String(needle)) => Predicate::TextContains(needle.clone()),
                Some(_) => return Err(Error::ParamsInvalid),
                // An empty predicate object constrains nothing.
                None => continue,
            },
            (ColumnKind::String, direct) => {
                let text = direct.as_str().ok_or(Error::ParamsInvalid)?.to_owned();
                let hash = string_hash(text.as_bytes());
                Predicate::TextEquals { text, hash }
            }
            (kind, direct) => Predicate::Equals(coerce(kind, direct)?),
        };

        conditions.push(Condition {
            column: column.index,
            predicate,
        });
    }

    Ok(conditions)
}

/// Compiles an `update` change set: direct values only, keyed by column.
pub fn compile_changes(
    schema: &Schema,
    object: &Map<String, Value>,
) -> Result<Vec<(u32, ColumnValue)>, Error> {
    let mut changes = Vec::with_capacity(object.len());
    for (name, value) in object {
        let column = schema.column(name).ok_or(Error::ParamsInvalid)?;
        changes.push((column.index, coerce(column.kind, value)?));
    }
    Ok(changes)
}

/// Compiles an insert column object. Every schema column must be supplied
/// exactly once; the result is ordered by physical index.
pub fn compile_insert(schema: &Schema, object: &Map<String, Value>) -> Result<Vec<ColumnValue>, Error> {
    if object.len() != schema.len() {
        return Err(Error::ParamsInvalid);
    }

    let mut values: Vec<Option<ColumnValue>> = vec![None; schema.len()];
    for (name, value) in object {
        let column = schema.column(name).ok_or(Error::ParamsInvalid)?;
        values[column.index as usize] = Some(coerce(column.kind, value)?);
    }

    Ok(values
        .into_iter()
        .map(|v| v.expect("length matched and names are unique, so every slot is filled; qed"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(vec![
            ("id".to_owned(), ColumnKind::Long),
            ("name".to_owned(), ColumnKind::String),
            ("age".to_owned(), ColumnKind::Byte),
            ("score".to_owned(), ColumnKind::Float),
        ])
        .unwrap()
    }

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn compiles_direct_and_ranged_conditions() {
        let schema = schema();
        let conds = compile_where(
            &schema,
            &obj(json!({
                "id": 42,
                "name": "ada",
                "age": { "greater_than_equal_to": 18, "less_than": 65 },
            })),
        )
        .unwrap();

        assert_eq!(conds.len(), 3);
        assert!(matches!(conds[0].predicate, Predicate::Equals(ColumnValue::Long(42))));
        match &conds[1].predicate {
            Predicate::TextEquals { text, hash } => {
                assert_eq!(text, "ada");
                assert_eq!(*hash, string_hash(b"ada"));
            }
            other => panic!("unexpected predicate {other:?}"),
        }
        match &conds[2].predicate {
            Predicate::Bounds(b) => {
                assert!(matches!(b.greater_than_equal_to, Some(ColumnValue::Byte(18))));
                assert!(matches!(b.less_than, Some(ColumnValue::Byte(65))));
                assert!(b.greater_than.is_none());
            }
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn compiles_contains() {
        let schema = schema();
        let conds =
            compile_where(&schema, &obj(json!({ "name": { "contains": "bet" } }))).unwrap();
        assert!(matches!(&conds[0].predicate, Predicate::TextContains(n) if n == "bet"));
    }

    #[test]
    fn rejects_unknown_column_and_type_mismatch() {
        let schema = schema();
        assert!(compile_where(&schema, &obj(json!({ "missing": 1 }))).is_err());
        assert!(compile_where(&schema, &obj(json!({ "id": "nan" }))).is_err());
        assert!(compile_where(&schema, &obj(json!({ "name": 7 }))).is_err());
        assert!(compile_where(&schema, &obj(json!({ "age": -1 }))).is_err());
        assert!(compile_where(&schema, &obj(json!({ "age": 256 }))).is_err());
        assert!(compile_where(&schema, &obj(json!({ "age": { "less_than": "x" } }))).is_err());
        assert!(compile_where(&schema, &obj(json!({ "name": { "contains": 3 } }))).is_err());
    }

    #[test]
    fn insert_requires_every_column() {
        let schema = schema();
        assert!(compile_insert(&schema, &obj(json!({ "id": 1 }))).is_err());

        let values = compile_insert(
            &schema,
            &obj(json!({ "score": 1.5, "id": 1, "name": "n", "age": 3 })),
        )
        .unwrap();
        // Result is in physical order regardless of input order.
        assert_eq!(values[0], ColumnValue::Long(1));
        assert_eq!(values[3], ColumnValue::Float(1.5));
    }

    #[test]
    fn changes_are_direct_values_only() {
        let schema = schema();
        assert!(compile_changes(&schema, &obj(json!({ "id": { "greater_than": 3 } }))).is_err());
        let changes = compile_changes(&schema, &obj(json!({ "age": 30 }))).unwrap();
        assert_eq!(changes, vec![(2, ColumnValue::Byte(30))]);
    }

    #[test]
    fn seek_direction_wire_values() {
        assert_eq!(SeekDirection::from_wire(1), Some(SeekDirection::Forward));
        assert_eq!(SeekDirection::from_wire(-1), Some(SeekDirection::Backward));
        assert_eq!(SeekDirection::from_wire(0), None);
        assert_eq!(SeekDirection::from_wire(2), None);
    }
}
