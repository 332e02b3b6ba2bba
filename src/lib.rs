//! Typed entity to row mapping, parameterized SQL generation and CRUD repositories over
//! asynchronous connections.
//!
//! ```rust
//! use trove::{CrudRepository, GenericSqlWriter, RowMapper};
//!
//! #[derive(Default)]
//! struct Item {
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! let mapper = RowMapper::builder("item", Item::default)
//!     .pk("id", |e: &Item| e.id, |e: &mut Item, id| e.id = Some(id))
//!     .autogenerated()
//!     .add_field("name", |e: &Item| e.name.clone(), |e: &mut Item, v| e.name = v)
//!     .build()
//!     .unwrap();
//! let repository = CrudRepository::<i64, Item>::new(mapper, GenericSqlWriter::new());
//! assert_eq!(
//!     repository.statements().auto_id_insert,
//!     "INSERT INTO `item` (`name`) VALUES (?)"
//! );
//! ```
pub use trove_core::*;
