use crate::{SqliteConnection, SqliteSqlWriter, SqliteTransaction};
use trove_core::Driver;

/// Driver for SQLite databases, `sqlite://<file or URI>`. An empty name opens a private
/// in-memory database.
#[derive(Clone, Copy, Default, Debug)]
pub struct SqliteDriver {}

impl SqliteDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;
    type SqlWriter = SqliteSqlWriter;
    type Transaction<'c> = SqliteTransaction<'c>;

    const NAME: &'static str = "sqlite";
    fn sql_writer(&self) -> SqliteSqlWriter {
        SqliteSqlWriter {}
    }
}
