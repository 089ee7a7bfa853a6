//! Column domains and the mapping from Rust types.

use std::path::PathBuf;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value, ValueRef};
use serde::Serialize;

/// Declared domain of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Text,
    Integer,
    Real,
    Boolean,
    Blob,
    Date,
    Time,
    Timestamp,
    /// No declared type.
    Any,
}

impl Domain {
    /// The storage class written in DDL, `None` for untyped columns.
    pub fn storage_class(&self) -> Option<&'static str> {
        match self {
            Domain::Text | Domain::Date | Domain::Time | Domain::Timestamp => Some("TEXT"),
            Domain::Integer => Some("INTEGER"),
            Domain::Real => Some("REAL"),
            Domain::Boolean => Some("BOOLEAN"),
            Domain::Blob => Some("BLOB"),
            Domain::Any => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Domain::Integer | Domain::Real | Domain::Boolean)
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" | "str" | "path" => Ok(Domain::Text),
            "integer" | "int" => Ok(Domain::Integer),
            "real" | "float" | "double" => Ok(Domain::Real),
            "boolean" | "bool" => Ok(Domain::Boolean),
            "blob" | "bytes" => Ok(Domain::Blob),
            "date" => Ok(Domain::Date),
            "time" => Ok(Domain::Time),
            "timestamp" | "datetime" => Ok(Domain::Timestamp),
            "any" => Ok(Domain::Any),
            other => Err(format!("unknown column type `{other}`")),
        }
    }
}

/// A Rust type usable as a table field.
///
/// Connects a field type to its column domain and converts values across
/// the engine boundary.
pub trait SqlDomain: Sized {
    const DOMAIN: Domain;
    const NULLABLE: bool = false;

    fn into_value(self) -> Value;

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self>;
}

macro_rules! integer_domain {
    ($($ty:ty),*) => {
        $(
            impl SqlDomain for $ty {
                const DOMAIN: Domain = Domain::Integer;

                fn into_value(self) -> Value {
                    Value::Integer(i64::from(self))
                }

                fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    <$ty as FromSql>::column_result(value)
                }
            }
        )*
    };
}

integer_domain!(i8, i16, i32, i64, u8, u16, u32);

impl SqlDomain for f64 {
    const DOMAIN: Domain = Domain::Real;

    fn into_value(self) -> Value {
        Value::Real(self)
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        f64::column_result(value)
    }
}

impl SqlDomain for f32 {
    const DOMAIN: Domain = Domain::Real;

    fn into_value(self) -> Value {
        Value::Real(f64::from(self))
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        f64::column_result(value).map(|v| v as f32)
    }
}

impl SqlDomain for bool {
    const DOMAIN: Domain = Domain::Boolean;

    fn into_value(self) -> Value {
        Value::Integer(self as i64)
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        bool::column_result(value)
    }
}

impl SqlDomain for String {
    const DOMAIN: Domain = Domain::Text;

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value)
    }
}

impl SqlDomain for PathBuf {
    const DOMAIN: Domain = Domain::Text;

    fn into_value(self) -> Value {
        Value::Text(self.to_string_lossy().into_owned())
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value).map(PathBuf::from)
    }
}

impl SqlDomain for Vec<u8> {
    const DOMAIN: Domain = Domain::Blob;

    fn into_value(self) -> Value {
        Value::Blob(self)
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Vec::<u8>::column_result(value)
    }
}

/// Untyped values keep whatever the engine stored.
impl SqlDomain for Value {
    const DOMAIN: Domain = Domain::Any;
    const NULLABLE: bool = true;

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(value.into())
    }
}

impl<T: SqlDomain> SqlDomain for Option<T> {
    const DOMAIN: Domain = T::DOMAIN;
    const NULLABLE: bool = true;

    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }
}

/// Reads one column of a row through its [`SqlDomain`] conversion.
pub fn read_column<T: SqlDomain>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let value = row.get_ref(idx)?;
    T::from_value(value).map_err(|err| match err {
        FromSqlError::InvalidType => {
            rusqlite::Error::InvalidColumnType(idx, column_name(row, idx), value.data_type())
        }
        err => rusqlite::Error::FromSqlConversionFailure(idx, value.data_type(), Box::new(err)),
    })
}

fn column_name(row: &rusqlite::Row<'_>, idx: usize) -> String {
    row.as_ref()
        .column_name(idx)
        .map(str::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_class() {
        assert_eq!(Domain::Text.storage_class(), Some("TEXT"));
        assert_eq!(Domain::Timestamp.storage_class(), Some("TEXT"));
        assert_eq!(Domain::Boolean.storage_class(), Some("BOOLEAN"));
        assert_eq!(Domain::Any.storage_class(), None);
    }

    #[test]
    fn test_rust_type_domains() {
        assert_eq!(<i64 as SqlDomain>::DOMAIN, Domain::Integer);
        assert_eq!(<PathBuf as SqlDomain>::DOMAIN, Domain::Text);
        assert_eq!(<Option<bool> as SqlDomain>::DOMAIN, Domain::Boolean);
        assert!(<Option<bool> as SqlDomain>::NULLABLE);
        assert!(!<Vec<u8> as SqlDomain>::NULLABLE);
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(true.into_value(), Value::Integer(1));
        assert_eq!(None::<String>.into_value(), Value::Null);
        assert_eq!(
            <Option<i64>>::from_value(ValueRef::Integer(4)).unwrap(),
            Some(4)
        );
        assert_eq!(<Option<i64>>::from_value(ValueRef::Null).unwrap(), None);
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!("TEXT".parse::<Domain>().unwrap(), Domain::Text);
        assert_eq!("datetime".parse::<Domain>().unwrap(), Domain::Timestamp);
        assert!("uuid".parse::<Domain>().is_err());
    }
}
