use crate::{Executor, Result, Transaction};
use std::{borrow::Cow, future::Future};

pub trait Connection: Executor {
    /// Open a session to the given URL, which must start with the driver name and `://`.
    fn connect(url: Cow<'static, str>) -> impl Future<Output = Result<Self>> + Send;

    /// Start a transaction on this connection. The connection cannot be used until the
    /// transaction is committed or rolled back.
    fn begin(&mut self) -> impl Future<Output = Result<impl Transaction<'_>>> + Send;
}
