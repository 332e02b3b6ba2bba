use crate::{
    CBox, SqliteDriver, SqliteTransaction,
    bind::bind_all,
    error_message_from_ptr,
    extract::{extract_name, extract_value},
};
use async_stream::try_stream;
use libsqlite3_sys::*;
use std::{
    borrow::Cow,
    ffi::{CStr, CString, c_char, c_int, c_void},
    ptr,
    sync::{
        Arc,
        atomic::{AtomicPtr, Ordering},
    },
};
use tokio::{sync::OwnedSemaphorePermit, task::spawn_blocking};
use trove_core::{
    Connection, Context, Driver, Error, Executor, QueryResult, Result, Row, RowLabeled, RowNames,
    RowsAffected, Statement,
    stream::{Stream, TryStreamExt},
    truncate_long,
};

/// Milliseconds a statement waits on a locked database before failing with `SQLITE_BUSY`.
pub const BUSY_TIMEOUT_MS: c_int = 5_000;

/// Database opened when the url names no file.
pub const MEMORY_DATABASE: &str = ":memory:";

pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
    pub(crate) permit: Option<OwnedSemaphorePermit>,
}

impl SqliteConnection {
    /// Opens `filename`: a path, `:memory:` or a `file:` URI. Missing files are created
    /// unless the URI asks for another `mode`.
    pub(crate) fn open(filename: &str) -> Result<Self> {
        let context = || {
            format!(
                "While opening the sqlite database `{}`",
                truncate_long!(filename)
            )
        };
        let path = CString::new(filename).with_context(context)?;
        let mut connection = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_close(p);
        });
        let rc = unsafe {
            sqlite3_open_v2(
                path.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI,
                ptr::null(),
            )
        };
        if rc != SQLITE_OK {
            let message = if connection.is_null() {
                "Could not allocate the connection".to_string()
            } else {
                error_message_from_ptr(&unsafe { sqlite3_errmsg(*connection) }).to_string()
            };
            return Err(Error::msg(message).context(context()));
        }
        unsafe {
            sqlite3_busy_timeout(*connection, BUSY_TIMEOUT_MS);
            // Double quoted names that match no column are errors, never string literals.
            sqlite3_db_config(
                *connection,
                SQLITE_DBCONFIG_DQS_DML,
                0 as c_int,
                ptr::null_mut::<c_int>(),
            );
            sqlite3_db_config(
                *connection,
                SQLITE_DBCONFIG_DQS_DDL,
                0 as c_int,
                ptr::null_mut::<c_int>(),
            );
        }
        log::debug!("Opened the sqlite database `{}`", filename);
        Ok(Self {
            connection,
            permit: None,
        })
    }

    /// False while a transaction is open on this connection.
    pub fn is_autocommit(&self) -> bool {
        unsafe { sqlite3_get_autocommit(*self.connection) != 0 }
    }

    /// Runs `sql` to completion on the calling thread, discarding any row.
    pub(crate) fn execute_blocking(&self, sql: &CStr) -> Result<()> {
        let mut message: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            sqlite3_exec(
                *self.connection,
                sql.as_ptr(),
                None,
                ptr::null_mut(),
                &mut message,
            )
        };
        if rc != SQLITE_OK {
            let error = Error::msg(error_message_from_ptr(&(message as *const c_char)).to_string());
            unsafe { sqlite3_free(message as *mut c_void) };
            return Err(error.context(format!(
                "While running the query:\n{}",
                sql.to_string_lossy()
            )));
        }
        Ok(())
    }
}

/// Path and query of a `sqlite://` url.
pub(crate) fn parse_url(url: &str) -> Result<(&str, &str)> {
    let prefix = format!("{}://", <SqliteDriver as Driver>::NAME);
    let Some(rest) = url.strip_prefix(&prefix) else {
        let error = Error::msg(format!(
            "Expected sqlite connection url to start with `{}`",
            &prefix
        ))
        .context(format!(
            "While trying to connect to `{}`",
            truncate_long!(url)
        ));
        log::error!("{:#}", error);
        return Err(error);
    };
    Ok(rest.split_once('?').unwrap_or((rest, "")))
}

/// Name handed to SQLite: `:memory:` for an empty path. Query parameters are only read
/// from `file:` URIs, so a plain path with parameters is turned into one.
pub(crate) fn sqlite_filename(path: &str, query: &str) -> String {
    let path = if path.is_empty() { MEMORY_DATABASE } else { path };
    if query.is_empty() {
        path.to_string()
    } else if path.starts_with("file:") {
        format!("{path}?{query}")
    } else {
        format!("file:{path}?{query}")
    }
}

/// Compiles the first statement of `sql` starting at byte `offset`. Returns the statement,
/// null when only whitespace or comments were left, and the offset of the rest.
async fn prepare_next(
    connection: &CBox<*mut sqlite3>,
    sql: Arc<CString>,
    offset: usize,
) -> Result<(CBox<*mut sqlite3_stmt>, usize)> {
    let connection = AtomicPtr::new(**connection);
    spawn_blocking(move || unsafe {
        let connection = connection.load(Ordering::Relaxed);
        let bytes = sql.as_bytes();
        let start = sql.as_ptr().add(offset);
        let mut statement = CBox::new(ptr::null_mut(), |p| {
            sqlite3_finalize(p);
        });
        let mut tail: *const c_char = ptr::null();
        let rc = sqlite3_prepare_v2(
            connection,
            start,
            (bytes.len() - offset) as c_int,
            &mut *statement,
            &mut tail,
        );
        if rc != SQLITE_OK {
            return Err(Error::msg(
                error_message_from_ptr(&sqlite3_errmsg(connection)).to_string(),
            ));
        }
        let next = if tail.is_null() {
            bytes.len()
        } else {
            tail.offset_from(sql.as_ptr()) as usize
        };
        Ok((statement, next))
    })
    .await?
}

/// Advances the statement: `true` when a row is ready, `false` once it is done.
fn step(statement: *mut sqlite3_stmt) -> Result<bool> {
    loop {
        match unsafe { sqlite3_step(statement) } {
            SQLITE_ROW => return Ok(true),
            SQLITE_DONE => return Ok(false),
            SQLITE_BUSY => continue,
            _ => {
                let message = unsafe { sqlite3_errmsg(sqlite3_db_handle(statement)) };
                return Err(Error::msg(error_message_from_ptr(&message).to_string()));
            }
        }
    }
}

/// Rowid of the row just inserted by `statement`, if it is an insert that wrote something.
fn inserted_rowid(statement: *mut sqlite3_stmt, rows_affected: i64) -> Option<i64> {
    if rows_affected == 0 {
        return None;
    }
    let sql = unsafe { CStr::from_ptr(sqlite3_sql(statement)) };
    let is_insert = sql
        .to_bytes()
        .trim_ascii_start()
        .get(..6)
        .is_some_and(|v| v.eq_ignore_ascii_case(b"INSERT"));
    is_insert.then(|| unsafe { sqlite3_last_insert_rowid(sqlite3_db_handle(statement)) })
}

fn extract_row(statement: *mut sqlite3_stmt, labels: &RowNames) -> Result<RowLabeled> {
    let values = (0..labels.len() as c_int)
        .map(|i| extract_value(statement, i))
        .collect::<Result<Row>>()?;
    Ok(RowLabeled::new(labels.clone(), values))
}

impl Executor for SqliteConnection {
    type Driver = SqliteDriver;

    fn driver(&self) -> &Self::Driver {
        &SqliteDriver {}
    }

    /// Runs every statement in `statement.sql` in order. The parameters are consumed by
    /// the statements in placeholder order.
    fn run(&mut self, statement: Statement) -> impl Stream<Item = Result<QueryResult>> + Send {
        let context = Arc::new(format!("While running the query:\n{}", statement));
        let connection = self.connection.borrowed();
        try_stream! {
            let Statement { sql, params } = statement;
            let sql = Arc::new(CString::new(sql).context("The query contains a NUL character")?);
            let len = sql.as_bytes().len();
            let mut params = params.into_iter();
            let mut offset = 0;
            while offset < len {
                let (prepared, next) = prepare_next(&connection, sql.clone(), offset).await?;
                offset = next;
                if prepared.is_null() {
                    continue;
                }
                bind_all(*prepared, &mut params)?;
                let last = sql.as_bytes()[offset..].iter().all(u8::is_ascii_whitespace);
                if last && params.len() > 0 {
                    Err::<(), _>(Error::msg(format!(
                        "{} parameters were not consumed by the query",
                        params.len()
                    )))?;
                }
                let columns = unsafe { sqlite3_column_count(*prepared) };
                if columns > 0 {
                    let labels = (0..columns)
                        .map(|i| extract_name(*prepared, i))
                        .collect::<Result<RowNames>>()?;
                    while step(*prepared)? {
                        let row = extract_row(*prepared, &labels)?;
                        yield QueryResult::Row(row);
                    }
                } else {
                    let before = unsafe { sqlite3_total_changes64(*connection) };
                    while step(*prepared)? {}
                    let changed = unsafe { sqlite3_total_changes64(*connection) } - before;
                    let affected = RowsAffected {
                        rows_affected: changed as u64,
                        last_affected_id: inserted_rowid(*prepared, changed),
                    };
                    yield QueryResult::Affected(affected);
                }
            }
            if params.len() > 0 {
                Err::<(), _>(Error::msg(format!(
                    "{} parameters were not consumed by the query",
                    params.len()
                )))?;
            }
        }
        .map_err(move |e: Error| {
            let e = e.context(context.clone());
            log::error!("{:#}", e);
            e
        })
    }
}

impl Connection for SqliteConnection {
    async fn connect(url: Cow<'static, str>) -> Result<SqliteConnection> {
        let (path, query) = parse_url(&url)?;
        SqliteConnection::open(&sqlite_filename(path, query))
            .inspect_err(|e| log::error!("{:#}", e))
    }

    #[allow(refining_impl_trait)]
    async fn begin(&mut self) -> Result<SqliteTransaction<'_>> {
        SqliteTransaction::new(self).await
    }
}
