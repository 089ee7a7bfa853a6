//! Table and column references.

use std::{fmt, sync::Arc};

use super::{Expr, ExprNode};
use crate::{query::Query, schema::TableSchema};

/// Pseudo-columns every rowid table carries.
const ROWID_ALIASES: [&str; 3] = ["rowid", "oid", "_rowid_"];

/// What a [`TableRef`] reads from.
#[derive(Clone)]
pub enum TableSource {
    Table(Arc<TableSchema>),
    /// A derived table (subquery in FROM).
    Query(Box<Query>),
    /// The row of a table being declared, used by CHECK constraints.
    Declaring(Arc<str>),
    /// The `excluded` pseudo-table of an upsert.
    Excluded(Arc<TableSchema>),
}

/// A table as it appears in a statement, optionally aliased.
#[derive(Clone)]
pub struct TableRef {
    source: TableSource,
    alias: Option<Arc<str>>,
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "TableRef({} AS {alias})", self.table_name()),
            None => write!(f, "TableRef({})", self.table_name()),
        }
    }
}

impl TableRef {
    pub fn new(schema: Arc<TableSchema>) -> Self {
        Self {
            source: TableSource::Table(schema),
            alias: None,
        }
    }

    pub(crate) fn derived(query: Query, alias: impl Into<Arc<str>>) -> Self {
        Self {
            source: TableSource::Query(Box::new(query)),
            alias: Some(alias.into()),
        }
    }

    pub(crate) fn declaring(name: &str) -> Self {
        Self {
            source: TableSource::Declaring(Arc::from(name)),
            alias: None,
        }
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    /// A copy of this reference under another name.
    pub fn alias(&self, alias: &str) -> TableRef {
        Self {
            source: self.source.clone(),
            alias: Some(Arc::from(alias)),
        }
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn is_aliased(&self) -> bool {
        self.alias.is_some()
    }

    /// The underlying table name, or the alias of a derived table.
    pub fn table_name(&self) -> &str {
        match &self.source {
            TableSource::Table(schema) => schema.name(),
            TableSource::Declaring(name) => name,
            TableSource::Excluded(_) => "excluded",
            TableSource::Query(_) => self.alias.as_deref().unwrap_or_default(),
        }
    }

    /// The name columns are qualified with.
    pub fn visible_name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.table_name())
    }

    pub fn schema(&self) -> Option<&Arc<TableSchema>> {
        match &self.source {
            TableSource::Table(schema) | TableSource::Excluded(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn query(&self) -> Option<&Query> {
        match &self.source {
            TableSource::Query(query) => Some(query),
            _ => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self.source, TableSource::Excluded(_))
    }

    /// Whether both references name the same table instance in a statement.
    pub fn same_as(&self, other: &TableRef) -> bool {
        self.visible_name() == other.visible_name()
    }

    /// Output column names, when known.
    pub fn column_names(&self) -> Vec<String> {
        match &self.source {
            TableSource::Table(schema) | TableSource::Excluded(schema) => {
                schema.column_names().map(str::to_string).collect()
            }
            TableSource::Query(query) => query.output_names().into_iter().flatten().collect(),
            TableSource::Declaring(_) => Vec::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        match &self.source {
            TableSource::Table(schema) => {
                schema.has_column(name) || ROWID_ALIASES.contains(&name.to_ascii_lowercase().as_str())
            }
            TableSource::Excluded(schema) => schema.has_column(name),
            TableSource::Query(query) => {
                query.output_names().iter().flatten().any(|n| n == name)
            }
            TableSource::Declaring(_) => true,
        }
    }

    /// A column of this table.
    pub fn col(&self, name: &str) -> Expr {
        Expr::column(ColumnRef {
            table: self.clone(),
            name: name.to_string(),
        })
    }

    /// Every column, in declaration order.
    pub fn all(&self) -> Vec<Expr> {
        self.column_names().iter().map(|name| self.col(name)).collect()
    }

    pub fn rowid(&self) -> Expr {
        self.col("rowid")
    }

    pub fn foreign_key(&self, name: &str) -> ForeignRef {
        ForeignRef {
            table: self.clone(),
            name: name.to_string(),
        }
    }

    /// The `excluded` pseudo-table for an upsert into this table.
    pub fn excluded(&self) -> TableRef {
        match &self.source {
            TableSource::Table(schema) | TableSource::Excluded(schema) => Self {
                source: TableSource::Excluded(schema.clone()),
                alias: None,
            },
            _ => self.clone(),
        }
    }
}

/// A column bound to the table reference it was taken from.
#[derive(Clone, Debug)]
pub struct ColumnRef {
    pub table: TableRef,
    pub name: String,
}

impl ColumnRef {
    /// The domain of the column, when the table has a schema.
    pub fn domain(&self) -> Option<crate::schema::Domain> {
        if ROWID_ALIASES.contains(&self.name.to_ascii_lowercase().as_str()) {
            return Some(crate::schema::Domain::Integer);
        }
        self.table
            .schema()
            .and_then(|s| s.column(&self.name))
            .map(|c| c.domain)
    }
}

impl From<ColumnRef> for Expr {
    fn from(column: ColumnRef) -> Self {
        Expr::new(ExprNode::Column(column))
    }
}

/// A named foreign key of a table, used as a join target.
#[derive(Clone, Debug)]
pub struct ForeignRef {
    pub table: TableRef,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, Domain};

    fn person() -> TableRef {
        TableRef::new(Arc::new(
            TableSchema::builder("Person")
                .column(ColumnDef::of::<String>("name").primary())
                .column(ColumnDef::of::<i64>("age"))
                .build(),
        ))
    }

    #[test]
    fn test_alias_keeps_table_name() {
        let p = person().alias("p");
        assert_eq!(p.table_name(), "Person");
        assert_eq!(p.visible_name(), "p");
        assert!(!p.same_as(&person()));
    }

    #[test]
    fn test_rowid_is_known() {
        let p = person();
        assert!(p.has_column("ROWID"));
        assert!(!p.has_column("height"));

        let rowid = p.rowid();
        assert_eq!(rowid.as_column().unwrap().domain(), Some(Domain::Integer));
    }

    #[test]
    fn test_all_columns() {
        let names: Vec<_> = person()
            .all()
            .iter()
            .filter_map(|e| e.output_name().map(str::to_string))
            .collect();
        assert_eq!(names, ["name", "age"]);
    }

    #[test]
    fn test_excluded() {
        let excluded = person().excluded();
        assert!(excluded.is_excluded());
        assert_eq!(excluded.visible_name(), "excluded");
        assert!(excluded.has_column("age"));
    }
}
