//! Macros for declaring tables.
//!
//! The [`define_table!`] macro declares a row struct together with its
//! schema descriptor, tying column names to Rust types.

/// Declares a row struct and implements [`Table`](crate::Table),
/// [`IntoRow`](crate::IntoRow) and [`FromRow`](crate::FromRow) for it.
///
/// # Syntax
///
/// ```ignore
/// define_table! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub struct Person as "Person" {
///         pub id: i64 [primary, autoincrement],
///         pub name: String [unique],
///         pub age: i64 = 18,
///         pub born: String [domain = Domain::Date],
///         pub nickname: Option<String> = None,
///     }
///     constraints |t| {
///         t.check_column("_age", "age", |row| row.col("age").ge(0))
///     }
///     computed |row| {
///         decade = row.col("age") / 10;
///     }
/// }
/// ```
///
/// Flags map to the [`ColumnDef`](crate::schema::ColumnDef) builder method
/// of the same name. `= value` sets a literal default of the field's type.
/// The table name defaults to the struct name.
///
/// Every field also gets an associated function returning its column, so
/// `Person::age().gt(18)` builds a predicate. Each `computed` entry becomes
/// an associated function returning its expression over the table, usable
/// anywhere a column is. Computed entries are not stored.
#[macro_export]
macro_rules! define_table {
    (@name $name:ident) => {
        stringify!($name)
    };
    (@name $name:ident $table:literal) => {
        $table
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(as $table:literal)? {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
                    $([ $($flag:ident $(= $val:expr)?),* $(,)? ])?
                    $(= $default:expr)?
            ),* $(,)?
        }
        $(constraints |$builder:ident| $constraints:block)?
        $(computed |$row:ident| {
            $(
                $(#[$cmeta:meta])*
                $computed:ident = $expr:expr;
            )*
        })?
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $name {
            $(
                #[allow(dead_code)]
                pub fn $field() -> $crate::expr::Expr {
                    <Self as $crate::Table>::col(stringify!($field))
                }
            )*
        }

        $(
            impl $name {
                $(
                    $(#[$cmeta])*
                    #[allow(dead_code)]
                    pub fn $computed() -> $crate::expr::Expr {
                        let $row = <Self as $crate::Table>::table();
                        $expr
                    }
                )*
            }
        )?

        impl $crate::Table for $name {
            fn schema() -> $crate::schema::TableSchema {
                let builder = $crate::schema::TableSchema::builder(
                    $crate::define_table!(@name $name $($table)?)
                )
                $(
                    .column(
                        $crate::schema::ColumnDef::of::<$ty>(stringify!($field))
                            $($(.$flag($($val)?))*)?
                            $(.default_value(
                                <$ty as $crate::schema::SqlDomain>::into_value($default)
                            ))?
                    )
                )*;
                $(
                    let builder = {
                        let $builder = builder;
                        $constraints
                    };
                )?
                builder.build()
            }
        }

        impl $crate::IntoRow for $name {
            fn into_row(self) -> Vec<$crate::rusqlite::types::Value> {
                vec![$($crate::schema::SqlDomain::into_value(self.$field)),*]
            }
        }

        impl $crate::FromRow for $name {
            fn from_row(row: &$crate::rusqlite::Row) -> $crate::rusqlite::Result<Self> {
                let stmt: &$crate::rusqlite::Statement = row.as_ref();
                Ok(Self {
                    $(
                        $field: $crate::schema::read_column::<$ty>(
                            row,
                            stmt.column_index(stringify!($field))?,
                        )?,
                    )*
                })
            }
        }
    };
}
