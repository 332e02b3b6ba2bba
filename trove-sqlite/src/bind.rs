use crate::error_message_from_ptr;
use libsqlite3_sys::*;
use std::{
    ffi::{CStr, c_int},
    os::raw::{c_char, c_void},
};
use time::format_description::well_known::Rfc3339;
use trove_core::{
    DATE_FORMAT, Error, Result, TIME_FORMAT, TIMESTAMP_FORMAT, Value, truncate_long,
};

fn bind_text(statement: *mut sqlite3_stmt, index: c_int, value: &str) -> c_int {
    unsafe {
        sqlite3_bind_text(
            statement,
            index,
            value.as_ptr() as *const c_char,
            value.len() as c_int,
            SQLITE_TRANSIENT(),
        )
    }
}

fn bind_int64(statement: *mut sqlite3_stmt, index: c_int, value: i64) -> c_int {
    unsafe { sqlite3_bind_int64(statement, index, value) }
}

/// Binds `value` to the one based parameter `index`.
///
/// Integers go in as INTEGER and floats as REAL. Decimals, temporals, UUIDs and JSON
/// are bound as their canonical text, so they compare and sort numerically against
/// NUMERIC columns and are read back exactly from TEXT columns.
pub(crate) fn bind_value(statement: *mut sqlite3_stmt, index: c_int, value: Value) -> Result<()> {
    let rc = match value {
        v if v.is_null() => unsafe { sqlite3_bind_null(statement, index) },
        Value::Boolean(Some(v)) => bind_int64(statement, index, v as i64),
        Value::Int8(Some(v)) => bind_int64(statement, index, v.into()),
        Value::Int16(Some(v)) => bind_int64(statement, index, v.into()),
        Value::Int32(Some(v)) => bind_int64(statement, index, v.into()),
        Value::Int64(Some(v)) => bind_int64(statement, index, v),
        Value::UInt8(Some(v)) => bind_int64(statement, index, v.into()),
        Value::UInt16(Some(v)) => bind_int64(statement, index, v.into()),
        Value::UInt32(Some(v)) => bind_int64(statement, index, v.into()),
        Value::UInt64(Some(v)) => {
            let Ok(v) = i64::try_from(v) else {
                return Err(Error::msg(format!(
                    "Cannot bind u64 value `{}` into sqlite integer because it's out of bounds",
                    v
                )));
            };
            bind_int64(statement, index, v)
        }
        Value::Float32(Some(v)) => unsafe { sqlite3_bind_double(statement, index, v.into()) },
        Value::Float64(Some(v)) => unsafe { sqlite3_bind_double(statement, index, v) },
        Value::Decimal(Some(v)) => bind_text(statement, index, &v.to_string()),
        Value::Varchar(Some(v)) => bind_text(statement, index, &v),
        Value::Blob(Some(v)) => unsafe {
            sqlite3_bind_blob(
                statement,
                index,
                v.as_ptr() as *const c_void,
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            )
        },
        Value::Date(Some(v)) => bind_text(statement, index, &v.format(DATE_FORMAT)?),
        Value::Time(Some(v)) => bind_text(statement, index, &v.format(TIME_FORMAT)?),
        Value::Timestamp(Some(v)) => bind_text(statement, index, &v.format(TIMESTAMP_FORMAT)?),
        Value::TimestampWithTimezone(Some(v)) => {
            bind_text(statement, index, &v.format(&Rfc3339)?)
        }
        Value::Uuid(Some(v)) => bind_text(statement, index, &v.hyphenated().to_string()),
        Value::Json(Some(v)) => bind_text(statement, index, &v.to_string()),
        _ => {
            return Err(Error::msg(format!(
                "Cannot use a {:?} as a query parameter",
                value
            )));
        }
    };
    if rc != SQLITE_OK {
        unsafe {
            let db = sqlite3_db_handle(statement);
            let query = sqlite3_sql(statement);
            return Err(
                Error::msg(error_message_from_ptr(&sqlite3_errmsg(db)).to_string()).context(
                    format!(
                        "Cannot bind parameter {} to query:\n{}",
                        index,
                        truncate_long!(CStr::from_ptr(query).to_string_lossy())
                    ),
                ),
            );
        }
    }
    Ok(())
}

/// Binds as many values from `params` as the statement has placeholders.
pub(crate) fn bind_all(
    statement: *mut sqlite3_stmt,
    params: &mut impl Iterator<Item = Value>,
) -> Result<()> {
    let count = unsafe { sqlite3_bind_parameter_count(statement) };
    for index in 1..=count {
        let Some(value) = params.next() else {
            return Err(Error::msg(format!(
                "The statement expects {} parameters but only {} were given",
                count,
                index - 1
            )));
        };
        bind_value(statement, index, value)?;
    }
    Ok(())
}
