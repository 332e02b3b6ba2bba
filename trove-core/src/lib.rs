mod as_value;
mod connection;
mod driver;
mod error;
mod executor;
mod field;
mod mapper;
mod page;
mod pool;
mod query;
mod repository;
mod sql_writer;
mod statement;
mod statements;
mod transaction;
mod util;
mod value;

pub use ::anyhow::Context;
pub use as_value::*;
pub use connection::*;
pub use driver::*;
pub use error::*;
pub use executor::*;
pub use field::*;
pub use mapper::*;
pub use page::*;
pub use pool::*;
pub use query::*;
pub use repository::*;
pub use sql_writer::*;
pub use statement::*;
pub use statements::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
