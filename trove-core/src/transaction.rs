use crate::{Executor, Result};
use std::future::Future;

pub trait Transaction<'c>: Executor {
    fn commit(self) -> impl Future<Output = Result<()>> + Send;
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}

/// Implements [`Executor`] for a transaction type by forwarding to one of its fields.
#[macro_export]
macro_rules! impl_executor_transaction {
    ($driver:ty, $transaction:ident<$lt:lifetime>, $field:ident) => {
        impl<$lt> $crate::Executor for $transaction<$lt> {
            type Driver = $driver;

            fn driver(&self) -> &Self::Driver {
                self.$field.driver()
            }

            fn run(
                &mut self,
                statement: $crate::Statement,
            ) -> impl $crate::stream::Stream<Item = $crate::Result<$crate::QueryResult>> + Send {
                self.$field.run(statement)
            }
        }
    };
}
