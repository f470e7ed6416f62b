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

//! Query dispatch: decode the envelope, authorize against the account
//! and table permissions, invoke the executor and shape the response.
//! This is the single place internal errors become wire error codes;
//! nothing below this layer writes to the socket.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use swiftdb_accounts::{
    DatabaseAccount, GlobalPermissions, TablePermissions, HIERARCHY_INDEX_MAX, ROOT_USERNAME,
};
use swiftdb_storage::{
    compile_changes, compile_insert, compile_where, describe_column, valid_name, ActiveTable,
    ColumnKind, Condition, SeekDirection,
};

use crate::codes::ErrorCode;
use crate::context::{ServerContext, RESERVED_TABLE_PREFIX};
use crate::dialect::{error_response, success_response};
use crate::session::Session;

/// Hard cap on columns per created table.
const MAX_TABLE_COLUMNS: usize = 20;

const PASSWORD_MIN: usize = 2;
const PASSWORD_MAX: usize = 100;

/// The closed operation set with its wire numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    CreateTable = 0,
    OpenTable = 1,
    FetchTableMeta = 2,
    InsertRecord = 3,
    FindOneRecord = 4,
    FindAllRecords = 5,
    EraseAllRecords = 6,
    UpdateAllRecords = 7,
    CloseTable = 8,
    RebuildTable = 9,
    CreateDatabaseAccount = 10,
    DeleteDatabaseAccount = 11,
    SetTableAccountPrivileges = 12,
    FetchAccountTablePermissions = 13,
    FetchDatabaseTables = 14,
    FetchDatabaseAccounts = 15,
    FetchAccountPrivileges = 16,
    NoOp = 17,
}

impl Op {
    fn from_wire(value: u64) -> Option<Op> {
        Some(match value {
            0 => Op::CreateTable,
            1 => Op::OpenTable,
            2 => Op::FetchTableMeta,
            3 => Op::InsertRecord,
            4 => Op::FindOneRecord,
            5 => Op::FindAllRecords,
            6 => Op::EraseAllRecords,
            7 => Op::UpdateAllRecords,
            8 => Op::CloseTable,
            9 => Op::RebuildTable,
            10 => Op::CreateDatabaseAccount,
            11 => Op::DeleteDatabaseAccount,
            12 => Op::SetTableAccountPrivileges,
            13 => Op::FetchAccountTablePermissions,
            14 => Op::FetchDatabaseTables,
            15 => Op::FetchDatabaseAccounts,
            16 => Op::FetchAccountPrivileges,
            17 => Op::NoOp,
            _ => return None,
        })
    }
}

type OpResult = Result<Option<Value>, ErrorCode>;

/// Converts a storage failure into its wire code.
fn storage_error(e: swiftdb_storage::Error) -> ErrorCode {
    use swiftdb_storage::Error::*;
    match e {
        ParamsInvalid => ErrorCode::ParamsInvalid,
        NotFound => ErrorCode::TableNotFound,
        AlreadyExists => ErrorCode::TableConflict,
        AlreadyOpen => ErrorCode::TableAlreadyOpen,
        Io(ref err) => {
            error!("Storage I/O failure while executing a query: {err}");
            ErrorCode::Internal
        }
        Corrupt(ref reason) => {
            error!("Corrupt table state encountered: {reason}");
            ErrorCode::Internal
        }
    }
}

/// Processes one decoded message and produces exactly one response.
pub(crate) fn handle_message(ctx: &ServerContext, session: &Session, payload: &[u8]) -> Value {
    let dialect = session.dialect;
    let error_text = session.options.error_text;

    let parsed: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(_) => return error_response(dialect, None, ErrorCode::JsonInvalid, error_text),
    };

    let nonce = match parsed.get("nonce").and_then(Value::as_u64) {
        Some(nonce) => nonce,
        None => return error_response(dialect, None, ErrorCode::NonceInvalid, error_text),
    };

    let op = match parsed.get("op").and_then(Value::as_u64).and_then(Op::from_wire) {
        Some(op) => op,
        None => return error_response(dialect, Some(nonce), ErrorCode::OpInvalid, error_text),
    };

    let data = match parsed.get("data").and_then(Value::as_object) {
        Some(data) => data,
        None => return error_response(dialect, Some(nonce), ErrorCode::DataInvalid, error_text),
    };

    match dispatch(ctx, &session.account, op, data) {
        Ok(body) => success_response(dialect, nonce, body),
        Err(code) => error_response(dialect, Some(nonce), code, error_text),
    }
}

fn dispatch(
    ctx: &ServerContext,
    account: &Arc<DatabaseAccount>,
    op: Op,
    data: &Map<String, Value>,
) -> OpResult {
    match op {
        Op::NoOp => Ok(None),
        Op::CreateTable => create_table(ctx, account, data),
        Op::OpenTable => open_table(ctx, account, data),
        Op::FetchTableMeta => fetch_table_meta(ctx, account, data),
        Op::InsertRecord => insert_record(ctx, account, data),
        Op::FindOneRecord => find_one_record(ctx, account, data),
        Op::FindAllRecords => find_all_records(ctx, account, data),
        Op::EraseAllRecords => erase_all_records(ctx, account, data),
        Op::UpdateAllRecords => update_all_records(ctx, account, data),
        Op::CloseTable => close_table(ctx, account, data),
        Op::RebuildTable => rebuild_table(ctx, account, data),
        Op::CreateDatabaseAccount => create_database_account(ctx, account, data),
        Op::DeleteDatabaseAccount => delete_database_account(ctx, account, data),
        Op::SetTableAccountPrivileges => set_table_account_privileges(ctx, account, data),
        Op::FetchAccountTablePermissions => fetch_account_table_permissions(ctx, account, data),
        Op::FetchDatabaseTables => fetch_database_tables(ctx),
        Op::FetchDatabaseAccounts => Ok(Some(json!(ctx.accounts().usernames()))),
        Op::FetchAccountPrivileges => fetch_account_privileges(ctx, data),
    }
}

fn string_field<'a>(data: &'a Map<String, Value>, key: &str) -> Result<&'a str, ErrorCode> {
    data.get(key).and_then(Value::as_str).ok_or(ErrorCode::ParamsInvalid)
}

fn object_field<'a>(
    data: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Map<String, Value>, ErrorCode> {
    data.get(key)
        .and_then(Value::as_object)
        .ok_or(ErrorCode::ParamsInvalid)
}

/// Resolves `data.table` to an open, non-reserved table the account may
/// see. A denied view is indistinguishable from a missing table.
fn resolve_table(
    ctx: &ServerContext,
    account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> Result<(Arc<ActiveTable>, TablePermissions), ErrorCode> {
    let name = string_field(data, "table")?;
    if name.starts_with(RESERVED_TABLE_PREFIX) {
        return Err(ErrorCode::NameReserved);
    }

    let table = ctx.tables().get(name).ok_or(ErrorCode::TableNotOpen)?;
    let permissions = ctx.table_permissions_for(&table, account);
    if !permissions.view {
        return Err(ErrorCode::TableNotFound);
    }
    Ok((table, permissions))
}

fn open_table(ctx: &ServerContext, account: &DatabaseAccount, data: &Map<String, Value>) -> OpResult {
    if !account.permissions.open_close_tables {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let name = string_field(data, "table")?;
    if name.starts_with(RESERVED_TABLE_PREFIX) {
        return Err(ErrorCode::NameReserved);
    }
    if ctx.tables().is_open(name) {
        return Err(ErrorCode::TableAlreadyOpen);
    }
    if !ctx.tables().exists(name) {
        return Err(ErrorCode::TableNotFound);
    }

    let table = ctx.tables().open(name, false).map_err(storage_error)?;
    ctx.load_table_permissions(&table).map_err(storage_error)?;

    info!("Table {name} has been loaded into memory");
    Ok(None)
}

fn close_table(ctx: &ServerContext, account: &DatabaseAccount, data: &Map<String, Value>) -> OpResult {
    let (table, _) = resolve_table(ctx, account, data)?;
    if !account.permissions.open_close_tables {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    ctx.tables().close(table.name());
    info!("Table {} has been unloaded from memory", table.name());
    Ok(None)
}

fn create_table(ctx: &ServerContext, account: &DatabaseAccount, data: &Map<String, Value>) -> OpResult {
    if !account.permissions.create_tables {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let name = string_field(data, "name")?;
    let columns = object_field(data, "columns")?;

    if columns.is_empty() {
        return Err(ErrorCode::ParamsInvalid);
    }
    if columns.len() > MAX_TABLE_COLUMNS {
        return Err(ErrorCode::TooManyColumns);
    }
    if name.starts_with(RESERVED_TABLE_PREFIX) {
        return Err(ErrorCode::NameReserved);
    }
    if !valid_name(name) {
        return Err(ErrorCode::ParamsInvalid);
    }
    if ctx.tables().exists(name) {
        return Err(ErrorCode::TableConflict);
    }

    let mut specs = Vec::with_capacity(columns.len());
    for (column_name, column_spec) in columns {
        if !valid_name(column_name) {
            return Err(ErrorCode::ParamsInvalid);
        }
        let kind = column_spec
            .as_object()
            .and_then(|spec| spec.get("type"))
            .and_then(Value::as_str)
            .and_then(ColumnKind::from_str)
            .ok_or(ErrorCode::ParamsInvalid)?;
        specs.push((column_name.clone(), kind));
    }

    ctx.tables().create(name, specs).map_err(storage_error)?;
    Ok(None)
}

fn fetch_table_meta(
    ctx: &ServerContext,
    account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> OpResult {
    let (table, _) = resolve_table(ctx, account, data)?;

    let mut columns = Map::new();
    for column in table.schema().columns() {
        columns.insert(column.name.clone(), describe_column(column));
    }

    Ok(Some(json!({
        "name": table.name(),
        "column_count": table.schema().len(),
        "columns": columns,
    })))
}

fn parse_direction(data: &Map<String, Value>) -> Result<SeekDirection, ErrorCode> {
    match data.get("seek_direction") {
        None => Ok(SeekDirection::Forward),
        Some(value) => value
            .as_i64()
            .and_then(SeekDirection::from_wire)
            .ok_or(ErrorCode::ParamsInvalid),
    }
}

fn parse_limit(data: &Map<String, Value>) -> Result<u64, ErrorCode> {
    match data.get("limit") {
        None => Ok(0),
        Some(value) => value.as_u64().ok_or(ErrorCode::ParamsInvalid),
    }
}

/// Parses the optional `return` column list into physical indices.
fn parse_return(
    table: &ActiveTable,
    data: &Map<String, Value>,
) -> Result<Option<Vec<u32>>, ErrorCode> {
    let list = match data.get("return") {
        None => return Ok(None),
        Some(value) => value.as_array().ok_or(ErrorCode::ParamsInvalid)?,
    };

    let mut indices = Vec::with_capacity(list.len());
    for entry in list {
        let name = entry.as_str().ok_or(ErrorCode::ParamsInvalid)?;
        let column = table.schema().column(name).ok_or(ErrorCode::ParamsInvalid)?;
        indices.push(column.index);
    }
    Ok(Some(indices))
}

fn compile_where_field(
    table: &ActiveTable,
    data: &Map<String, Value>,
    key: &str,
) -> Result<Vec<Condition>, ErrorCode> {
    let object = object_field(data, key)?;
    compile_where(table.schema(), object).map_err(storage_error)
}

fn insert_record(ctx: &ServerContext, account: &DatabaseAccount, data: &Map<String, Value>) -> OpResult {
    let (table, permissions) = resolve_table(ctx, account, data)?;
    if !permissions.write {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let columns = object_field(data, "columns")?;
    let values = compile_insert(table.schema(), columns).map_err(storage_error)?;
    table.insert(&values).map_err(storage_error)?;
    Ok(None)
}

fn find_one_record(
    ctx: &ServerContext,
    account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> OpResult {
    let (table, permissions) = resolve_table(ctx, account, data)?;
    if !permissions.read {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let conditions = compile_where_field(&table, data, "where")?;
    let direction = parse_direction(data)?;
    let returned = parse_return(&table, data)?;

    let row = table
        .find_one(&conditions, direction, returned.as_deref())
        .map_err(storage_error)?;

    Ok(Some(row.map(Value::Object).unwrap_or(Value::Null)))
}

fn find_all_records(
    ctx: &ServerContext,
    account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> OpResult {
    let (table, permissions) = resolve_table(ctx, account, data)?;
    if !permissions.read {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let conditions = compile_where_field(&table, data, "where")?;
    let seek_where = match data.get("seek_where") {
        None => None,
        Some(_) => Some(compile_where_field(&table, data, "seek_where")?),
    };
    let direction = parse_direction(data)?;
    let limit = parse_limit(data)?;
    let returned = parse_return(&table, data)?;

    let rows = table
        .find_many(
            &conditions,
            seek_where.as_deref(),
            direction,
            limit,
            returned.as_deref(),
        )
        .map_err(storage_error)?;

    Ok(Some(Value::Array(rows.into_iter().map(Value::Object).collect())))
}

fn erase_all_records(
    ctx: &ServerContext,
    account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> OpResult {
    let (table, permissions) = resolve_table(ctx, account, data)?;
    if !permissions.erase {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let conditions = compile_where_field(&table, data, "where")?;
    let limit = parse_limit(data)?;
    let count = table.erase_many(&conditions, limit).map_err(storage_error)?;
    Ok(Some(json!({ "count": count })))
}

fn update_all_records(
    ctx: &ServerContext,
    account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> OpResult {
    let (table, permissions) = resolve_table(ctx, account, data)?;
    if !permissions.update {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let conditions = compile_where_field(&table, data, "where")?;
    let changes_object = object_field(data, "changes")?;
    let changes = compile_changes(table.schema(), changes_object).map_err(storage_error)?;
    let limit = parse_limit(data)?;

    let count = table
        .update_many(&conditions, &changes, limit)
        .map_err(storage_error)?;
    Ok(Some(json!({ "count": count })))
}

fn rebuild_table(ctx: &ServerContext, account: &DatabaseAccount, data: &Map<String, Value>) -> OpResult {
    let (table, permissions) = resolve_table(ctx, account, data)?;
    if !permissions.write {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    info!("Rebuild of table {} has been started", table.name());
    let started = Instant::now();
    let stats = table.rebuild().map_err(storage_error)?;
    info!(
        "Rebuild of table {} has been completed (took {}ms): {} records discovered, {} dead records removed, {} short dynamics optimized",
        table.name(),
        started.elapsed().as_millis(),
        stats.record_count,
        stats.dead_record_count,
        stats.short_dynamic_count,
    );

    Ok(Some(json!({
        "record_count": stats.record_count,
        "dead_record_count": stats.dead_record_count,
        "short_dynamic_count": stats.short_dynamic_count,
    })))
}

/// Checks a permission grant object: every supplied value must be a
/// boolean.
fn all_values_boolean(object: &Map<String, Value>) -> bool {
    object.values().all(Value::is_boolean)
}

fn create_database_account(
    ctx: &ServerContext,
    account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> OpResult {
    if !account.permissions.create_accounts {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let username = string_field(data, "username")?;
    let password = string_field(data, "password")?;
    let hierarchy = data
        .get("hierarchy_index")
        .and_then(Value::as_u64)
        .ok_or(ErrorCode::ParamsInvalid)?;
    let grants = object_field(data, "permissions")?;

    // New accounts always rank strictly below their creator.
    if hierarchy <= u64::from(account.permissions.hierarchy_index) {
        return Err(ErrorCode::InsufficientPrivileges);
    }
    if !all_values_boolean(grants) {
        return Err(ErrorCode::ParamsInvalid);
    }
    if !valid_name(username) {
        return Err(ErrorCode::ParamsInvalid);
    }
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&password.len()) {
        return Err(ErrorCode::ParamsInvalid);
    }
    if username == ROOT_USERNAME {
        return Err(ErrorCode::NameReserved);
    }
    if hierarchy == 0 || hierarchy > u64::from(HIERARCHY_INDEX_MAX) {
        return Err(ErrorCode::ValueReserved);
    }
    if ctx.accounts().get(username).is_some() {
        return Err(ErrorCode::AccountUsernameInUse);
    }

    let permissions = GlobalPermissions::from_grant_object(hierarchy as u32, grants);
    if !account.permissions.covers(&permissions) {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    ctx.accounts()
        .create(username, password, permissions)
        .map_err(account_error)?;
    info!("Database account {username:?} has been created");
    Ok(None)
}

fn delete_database_account(
    ctx: &ServerContext,
    account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> OpResult {
    if !account.permissions.delete_accounts {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let username = string_field(data, "username")?;
    let target = ctx.accounts().get(username).ok_or(ErrorCode::UsernameNotFound)?;

    if target.permissions.hierarchy_index <= account.permissions.hierarchy_index {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    ctx.accounts().delete(username).map_err(account_error)?;
    ctx.erase_account_permissions(target.internal_index)
        .map_err(storage_error)?;
    info!("Database account {username:?} has been deleted");
    Ok(None)
}

fn account_error(e: swiftdb_accounts::Error) -> ErrorCode {
    match e {
        swiftdb_accounts::Error::UsernameInUse => ErrorCode::AccountUsernameInUse,
        swiftdb_accounts::Error::NotFound => ErrorCode::UsernameNotFound,
        swiftdb_accounts::Error::Io(ref err) => {
            error!("Account store I/O failure: {err}");
            ErrorCode::Internal
        }
        swiftdb_accounts::Error::Crypto(ref err) => {
            error!("Account store crypto failure: {err}");
            ErrorCode::Internal
        }
    }
}

fn fetch_account_privileges(ctx: &ServerContext, data: &Map<String, Value>) -> OpResult {
    let username = string_field(data, "username")?;
    let target = ctx.accounts().get(username).ok_or(ErrorCode::UsernameNotFound)?;
    Ok(Some(target.permissions.to_json()))
}

fn set_table_account_privileges(
    ctx: &ServerContext,
    account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> OpResult {
    if !account.permissions.table_administrator {
        return Err(ErrorCode::InsufficientPrivileges);
    }

    let username = string_field(data, "username")?;
    let table_name = string_field(data, "table")?;
    let grants = object_field(data, "permissions")?;

    if !all_values_boolean(grants) {
        return Err(ErrorCode::ParamsInvalid);
    }
    if table_name.starts_with(RESERVED_TABLE_PREFIX) || username == ROOT_USERNAME {
        return Err(ErrorCode::NameReserved);
    }

    let target = ctx.accounts().get(username).ok_or(ErrorCode::UsernameNotFound)?;
    let table = ctx.tables().get(table_name).ok_or(ErrorCode::TableNotOpen)?;

    let permissions = TablePermissions::from_grant_object(grants);
    ctx.set_table_permissions(&table, &target, permissions)
        .map_err(storage_error)?;
    Ok(None)
}

fn fetch_account_table_permissions(
    ctx: &ServerContext,
    _account: &DatabaseAccount,
    data: &Map<String, Value>,
) -> OpResult {
    let username = string_field(data, "username")?;
    let table_name = string_field(data, "table")?;

    if table_name.starts_with(RESERVED_TABLE_PREFIX) {
        return Err(ErrorCode::NameReserved);
    }

    let target = ctx.accounts().get(username).ok_or(ErrorCode::UsernameNotFound)?;
    let table = ctx.tables().get(table_name).ok_or(ErrorCode::TableNotOpen)?;

    // Reports the stored override row only; a table-admin grant is not an
    // override and shows as all-denied here.
    let permissions = table
        .permission_byte(target.internal_index)
        .map(TablePermissions::from_byte)
        .unwrap_or_else(TablePermissions::none);
    Ok(Some(permissions.to_json()))
}

fn fetch_database_tables(ctx: &ServerContext) -> OpResult {
    let names = ctx.tables().user_table_names().map_err(storage_error)?;
    Ok(Some(json!(names)))
}
