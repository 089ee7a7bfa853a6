//! Typed SQL statements for SQLite.
//!
//! Tables are described once through [`define_table!`] (or by hand through
//! [`schema::TableSchema`]), registered in a [`schema::SchemaRegistry`], and
//! queried through immutable expression and statement builders that are
//! validated before any SQL text is produced.

pub mod connection;
pub mod error;
pub mod expr;
pub mod macros;
pub mod query;
pub mod render;
mod resolve;
pub mod schema;
pub mod traits;
mod validate;

pub use connection::{Database, Executor};
pub use error::{DbError, Result};
pub use query::{Compiled, Statement};
pub use render::{Placeholder, RenderOptions};
pub use traits::{FromRow, IntoExpr, IntoRow, Table};

pub use rusqlite;
