use crate::{
    Driver, QueryResult, Result, RowLabeled, RowsAffected, Statement,
    stream::{Stream, StreamExt, TryStreamExt},
};
use std::future::Future;

/// Runs statements against a live session: a connection or a transaction.
pub trait Executor: Send + Sized {
    type Driver: Driver;

    fn driver(&self) -> &Self::Driver;

    /// General method to send any statement and return any result type (either row or count)
    fn run(&mut self, statement: Statement) -> impl Stream<Item = Result<QueryResult>> + Send;

    /// Execute the statement and returns the rows.
    fn fetch(&mut self, statement: Statement) -> impl Stream<Item = Result<RowLabeled>> + Send {
        self.run(statement).filter_map(|v| async move {
            match v {
                Ok(QueryResult::Row(v)) => Some(Ok(v)),
                Err(e) => Some(Err(e)),
                _ => None,
            }
        })
    }

    /// Execute the statement and return the total number of rows affected.
    fn execute(&mut self, statement: Statement) -> impl Future<Output = Result<RowsAffected>> + Send {
        self.run(statement)
            .filter_map(|v| async move {
                match v {
                    Ok(QueryResult::Affected(v)) => Some(Ok(v)),
                    Err(e) => Some(Err(e)),
                    _ => None,
                }
            })
            .try_collect()
    }
}
