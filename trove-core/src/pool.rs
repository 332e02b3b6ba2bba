use crate::{Connection, Result};
use std::future::Future;

/// Source of connections. Every acquired connection must be handed back with `release`.
pub trait Pool: Send + Sync {
    type Connection: Connection;

    fn acquire(&self) -> impl Future<Output = Result<Self::Connection>> + Send;

    fn release(&self, connection: Self::Connection);
}
