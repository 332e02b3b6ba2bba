use crate::{SqliteConnection, SqliteDriver};
use trove_core::{Executor, Result, Statement, Transaction, impl_executor_transaction};

/// Transaction over a sqlite connection, opened with `BEGIN`. Dropping it while it is
/// still open rolls it back.
pub struct SqliteTransaction<'c> {
    pub(crate) connection: &'c mut SqliteConnection,
}

impl<'c> SqliteTransaction<'c> {
    pub async fn new(connection: &'c mut SqliteConnection) -> Result<Self> {
        connection.execute(Statement::raw("BEGIN")).await?;
        Ok(Self { connection })
    }

    async fn finish(self, sql: &'static str) -> Result<()> {
        self.connection.execute(Statement::raw(sql)).await?;
        Ok(())
    }
}

impl_executor_transaction!(SqliteDriver, SqliteTransaction<'c>, connection);

impl<'c> Transaction<'c> for SqliteTransaction<'c> {
    async fn commit(self) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.connection.is_autocommit() {
            return;
        }
        log::warn!("Transaction dropped without commit, rolling back");
        if let Err(e) = self.connection.execute_blocking(c"ROLLBACK") {
            log::error!("{:#}", e);
        }
    }
}
