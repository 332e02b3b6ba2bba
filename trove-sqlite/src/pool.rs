use crate::{
    MEMORY_DATABASE, SqliteConnection,
    connection::{parse_url, sqlite_filename},
};
use std::{
    borrow::Cow,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Semaphore;
use trove_core::{Context, Error, Pool, Result};
use url::form_urlencoded;

pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

static MEMORY_POOLS: AtomicUsize = AtomicUsize::new(0);

/// Bounded pool of sqlite connections to one database. `acquire` waits while
/// `max_connections` connections are out.
///
/// The size is read from the url and removed before the rest is handed to SQLite:
/// `sqlite://shop.db?max_connections=4`. An in-memory url gets a database shared by the
/// connections of this pool only, kept alive by its idle connections.
pub struct SqlitePool {
    filename: String,
    max_connections: usize,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<SqliteConnection>>,
}

impl SqlitePool {
    pub async fn connect(url: Cow<'static, str>) -> Result<Self> {
        let (path, query) = parse_url(&url)?;
        let mut max_connections = DEFAULT_MAX_CONNECTIONS;
        let mut rest = form_urlencoded::Serializer::new(String::new());
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "max_connections" => {
                    max_connections = value
                        .parse()
                        .with_context(|| format!("Invalid max_connections `{value}`"))?;
                }
                _ => {
                    rest.append_pair(&key, &value);
                }
            }
        }
        if max_connections == 0 {
            return Err(Error::msg("max_connections must be at least 1"));
        }
        let rest = rest.finish();
        let filename = if matches!(path, "" | MEMORY_DATABASE | "file::memory:") {
            let n = MEMORY_POOLS.fetch_add(1, Ordering::Relaxed);
            format!("file:trove-pool-{n}?mode=memory&cache=shared")
        } else {
            sqlite_filename(path, &rest)
        };
        // The first connection both checks the url and keeps a memory database alive.
        let first = SqliteConnection::open(&filename).inspect_err(|e| log::error!("{:#}", e))?;
        log::debug!("Sqlite pool on `{filename}` with {max_connections} connections");
        Ok(Self {
            filename,
            max_connections,
            permits: Arc::new(Semaphore::new(max_connections)),
            idle: Mutex::new(vec![first]),
        })
    }

    /// Name handed to SQLite when opening a connection.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Connections that can be acquired right now without waiting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Pool for SqlitePool {
    type Connection = SqliteConnection;

    async fn acquire(&self) -> Result<SqliteConnection> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .context("The pool is closed")?;
        let idle = self.idle.lock().ok().and_then(|mut v| v.pop());
        let mut connection = match idle {
            Some(connection) => connection,
            None => SqliteConnection::open(&self.filename)?,
        };
        connection.permit = Some(permit);
        Ok(connection)
    }

    fn release(&self, mut connection: SqliteConnection) {
        connection.permit = None;
        if !connection.is_autocommit() {
            log::warn!("Released a connection with an open transaction, rolling back");
            if let Err(e) = connection.execute_blocking(c"ROLLBACK") {
                log::error!("{:#}", e);
            }
        }
        match self.idle.lock() {
            Ok(mut idle) => idle.push(connection),
            Err(e) => log::error!("Dropping a released connection: {e}"),
        }
    }
}
