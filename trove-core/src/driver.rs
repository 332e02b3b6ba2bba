use crate::{Connection, Result, SqlWriter, Transaction};
use std::{borrow::Cow, future::Future};

/// Entry point of a backend: names the URL scheme, the SQL dialect and the session types.
pub trait Driver: Send + Sync + Sized {
    type Connection: Connection<Driver = Self>;
    type SqlWriter: SqlWriter + 'static;
    type Transaction<'c>: Transaction<'c>;

    /// URL scheme accepted by `connect`, without the `://`.
    const NAME: &'static str;

    fn sql_writer(&self) -> Self::SqlWriter;

    fn connect(
        &self,
        url: Cow<'static, str>,
    ) -> impl Future<Output = Result<Self::Connection>> + Send {
        Self::Connection::connect(url)
    }
}
