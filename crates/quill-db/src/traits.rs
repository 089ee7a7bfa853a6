//! Core traits that connect Rust types to tables and expressions.
//!
//! These traits define the contract for:
//! - Describing a table (`Table`)
//! - Converting a row value into bound parameters (`IntoRow`)
//! - Converting database rows into Rust types (`FromRow`)
//! - Lifting Rust values into expressions (`IntoExpr`)

use std::path::PathBuf;

use rusqlite::{types::Value, Row};
use tracing::warn;

use crate::{
    expr::{ColumnRef, Expr, ForeignRef, TableRef},
    query::{Compound, Query, Select},
    schema::{global, read_column, SqlDomain, TableSchema},
};

/// A type that describes a table.
///
/// Usually implemented through [`crate::define_table!`]. The schema
/// descriptor is registered in the global registry the first time
/// [`Table::table`] is called.
pub trait Table: Sized + 'static {
    /// Builds the schema descriptor for this table.
    fn schema() -> TableSchema;

    /// A reference to the registered table.
    ///
    /// If the descriptor is invalid the reference carries the unregistered
    /// schema, and building any statement over it reports the definition
    /// error.
    fn table() -> TableRef {
        match global().get_or_register::<Self>() {
            Ok(schema) => TableRef::new(schema),
            Err(err) => {
                warn!("{err}");
                TableRef::new(std::sync::Arc::new(Self::schema()))
            }
        }
    }

    fn col(name: &str) -> Expr {
        Self::table().col(name)
    }

    fn alias(name: &str) -> TableRef {
        Self::table().alias(name)
    }

    fn rowid() -> Expr {
        Self::table().rowid()
    }

    fn foreign_key(name: &str) -> ForeignRef {
        Self::table().foreign_key(name)
    }

    /// The `excluded` pseudo-table of an upsert on this table.
    fn excluded() -> TableRef {
        Self::table().excluded()
    }
}

/// A row value that can be inserted, in column declaration order.
pub trait IntoRow {
    fn into_row(self) -> Vec<Value>;
}

impl IntoRow for Vec<Value> {
    fn into_row(self) -> Vec<Value> {
        self
    }
}

/// A trait for converting a database row into a Rust type.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

impl FromRow for Vec<Value> {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        (0..row.as_ref().column_count())
            .map(|idx| row.get::<_, Value>(idx))
            .collect()
    }
}

macro_rules! tuple_row {
    ($($name:ident: $idx:tt),+) => {
        impl<$($name: SqlDomain),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> rusqlite::Result<Self> {
                Ok(($(read_column::<$name>(row, $idx)?,)+))
            }
        }

        impl<$($name: SqlDomain),+> IntoRow for ($($name,)+) {
            fn into_row(self) -> Vec<Value> {
                vec![$(self.$idx.into_value()),+]
            }
        }
    };
}

tuple_row!(A: 0);
tuple_row!(A: 0, B: 1);
tuple_row!(A: 0, B: 1, C: 2);
tuple_row!(A: 0, B: 1, C: 2, D: 3);
tuple_row!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_row!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Anything usable as an operand of an expression.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl IntoExpr for ColumnRef {
    fn into_expr(self) -> Expr {
        Expr::column(self)
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Expr {
        Expr::literal(self)
    }
}

impl IntoExpr for &str {
    fn into_expr(self) -> Expr {
        Expr::literal(Value::Text(self.to_string()))
    }
}

impl IntoExpr for PathBuf {
    fn into_expr(self) -> Expr {
        Expr::literal(self.into_value())
    }
}

macro_rules! literal_expr {
    ($($ty:ty),*) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::literal(SqlDomain::into_value(self))
                }
            }
        )*
    };
}

literal_expr!(i8, i16, i32, i64, u8, u16, u32, f32, f64, bool, String, Vec<u8>);

impl<T: IntoExpr> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        match self {
            Some(value) => value.into_expr(),
            None => Expr::literal(Value::Null),
        }
    }
}

impl IntoExpr for Select {
    fn into_expr(self) -> Expr {
        Expr::subquery(Query::Select(self))
    }
}

impl IntoExpr for &Select {
    fn into_expr(self) -> Expr {
        Expr::subquery(Query::Select(self.clone()))
    }
}

impl IntoExpr for Compound {
    fn into_expr(self) -> Expr {
        Expr::subquery(Query::Compound(self))
    }
}

impl IntoExpr for Query {
    fn into_expr(self) -> Expr {
        Expr::subquery(self)
    }
}
