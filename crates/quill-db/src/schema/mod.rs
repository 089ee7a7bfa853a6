//! Table metadata.
//!
//! A [`TableSchema`] is the immutable description of one table: its ordered
//! columns and its constraints. Schemas are produced by a
//! [`TableSchemaBuilder`] (usually through [`crate::define_table!`]) and
//! stored in a [`SchemaRegistry`].

pub mod domain;
pub mod registry;

use std::{collections::BTreeMap, fmt, sync::Arc};

use rusqlite::types::Value;

pub use domain::{read_column, Domain, SqlDomain};
pub use registry::{global, ColumnInfo, SchemaInfo, SchemaRegistry, TableId};

use crate::{
    error::{DbError, Result},
    expr::{Expr, TableRef},
    render,
    traits::Table,
};

/// Default value attached to a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    /// An explicit `DEFAULT NULL`.
    Null,
    Value(Value),
    CurrentDate,
    CurrentTime,
    CurrentTimestamp,
}

impl From<Value> for ColumnDefault {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ColumnDefault::Null,
            value => ColumnDefault::Value(value),
        }
    }
}

/// One column of a table declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub domain: Domain,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub auto_increment: bool,
    primary: bool,
    unique: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
            nullable: false,
            default: None,
            auto_increment: false,
            primary: false,
            unique: false,
        }
    }

    /// Derives the domain and nullability from a Rust type.
    pub fn of<T: SqlDomain>(name: impl Into<String>) -> Self {
        let mut column = Self::new(name, T::DOMAIN);
        column.nullable = T::NULLABLE;
        column
    }

    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets a literal default. `Value::Null` requests an explicit
    /// `DEFAULT NULL` and makes the column nullable.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        let default = ColumnDefault::from(value.into());
        if default == ColumnDefault::Null {
            self.nullable = true;
        }
        self.default = Some(default);
        self
    }

    pub fn default_null(self) -> Self {
        self.default_value(Value::Null)
    }

    /// Uses the `CURRENT_*` sentinel matching the column's date/time domain.
    pub fn default_current(mut self) -> Self {
        self.default = match self.domain {
            Domain::Date => Some(ColumnDefault::CurrentDate),
            Domain::Time => Some(ColumnDefault::CurrentTime),
            Domain::Timestamp => Some(ColumnDefault::CurrentTimestamp),
            _ => self.default,
        };
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Referential action for `ON UPDATE` / `ON DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkAction {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl FkAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
            FkAction::Cascade => "CASCADE",
        }
    }
}

impl std::str::FromStr for FkAction {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "NO ACTION" => Ok(FkAction::NoAction),
            "RESTRICT" => Ok(FkAction::Restrict),
            "SET NULL" => Ok(FkAction::SetNull),
            "SET DEFAULT" => Ok(FkAction::SetDefault),
            "CASCADE" => Ok(FkAction::Cascade),
            _ => Err(DbError::Construction(format!(
                "unknown foreign key action `{s}`"
            ))),
        }
    }
}

/// A named foreign key from local columns to another (or the same) table.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub target: String,
    pub target_columns: Vec<String>,
    pub on_update: Option<FkAction>,
    pub on_delete: Option<FkAction>,
    target_schema: Option<Arc<TableSchema>>,
}

impl ForeignKey {
    /// References the primary key of `T`, matching columns by position.
    pub fn to<T: Table>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let table = T::table();
        let target_columns = table
            .schema()
            .map(|s| s.primary_key().to_vec())
            .unwrap_or_default();
        Self::to_table(name, columns, &table, target_columns)
    }

    /// References named columns of an already declared table.
    pub fn to_table(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        target: &TableRef,
        target_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            target: target.table_name().to_string(),
            target_columns: target_columns.into_iter().map(Into::into).collect(),
            on_update: None,
            on_delete: None,
            target_schema: target.schema().cloned(),
        }
    }

    pub fn on_update(mut self, action: FkAction) -> Self {
        self.on_update = Some(action);
        self
    }

    pub fn on_delete(mut self, action: FkAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Schema of the referenced table, `None` for self references.
    pub fn target_schema(&self) -> Option<&Arc<TableSchema>> {
        self.target_schema.as_ref()
    }
}

impl PartialEq for ForeignKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.columns == other.columns
            && self.target == other.target
            && self.target_columns == other.target_columns
            && self.on_update == other.on_update
            && self.on_delete == other.on_delete
    }
}

/// A CHECK constraint over one field or the whole row.
#[derive(Debug, Clone)]
pub struct CheckConstraint {
    pub name: String,
    pub column: Option<String>,
    pub expr: Expr,
}

impl CheckConstraint {
    /// The check expression as it appears in DDL.
    pub fn sql(&self) -> Result<String> {
        render::inline_expr(&self.expr)
    }
}

impl PartialEq for CheckConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.column == other.column
            && matches!((self.sql(), other.sql()), (Ok(a), Ok(b)) if a == b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Primary(Vec<String>),
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
    Foreign(ForeignKey),
    Check(CheckConstraint),
}

/// Immutable metadata for one table.
#[derive(Clone, PartialEq)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDef>,
    constraints: Vec<Constraint>,
}

impl fmt::Debug for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSchema")
            .field("name", &self.name)
            .field(
                "columns",
                &self.columns.iter().map(|c| &c.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TableSchema {
    pub fn builder(name: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn primary_key(&self) -> &[String] {
        self.constraints
            .iter()
            .find_map(|c| match c {
                Constraint::Primary(columns) => Some(columns.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn is_primary(&self, column: &str) -> bool {
        self.primary_key().iter().any(|c| c == column)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.constraints.iter().filter_map(|c| match c {
            Constraint::Foreign(fk) => Some(fk),
            _ => None,
        })
    }

    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys().find(|fk| fk.name == name)
    }

    pub fn checks(&self) -> impl Iterator<Item = &CheckConstraint> {
        self.constraints.iter().filter_map(|c| match c {
            Constraint::Check(check) => Some(check),
            _ => None,
        })
    }

    /// Unique constraints as column lists, in declaration order.
    pub fn uniques(&self) -> impl Iterator<Item = &[String]> {
        self.constraints.iter().filter_map(|c| match c {
            Constraint::Unique { columns, .. } => Some(columns.as_slice()),
            _ => None,
        })
    }

    pub fn defaults(&self) -> BTreeMap<&str, &ColumnDefault> {
        self.columns
            .iter()
            .filter_map(|c| c.default.as_ref().map(|d| (c.name.as_str(), d)))
            .collect()
    }

    /// Checks the internal consistency of the declaration.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(DbError::definition(&self.name, reason));

        if self.columns.is_empty() {
            return fail("a table needs at least one column".into());
        }

        for (idx, column) in self.columns.iter().enumerate() {
            if self.columns[..idx].iter().any(|c| c.name == column.name) {
                return fail(format!("duplicate column `{}`", column.name));
            }
        }

        let pk = self.primary_key();
        for column in self.columns.iter().filter(|c| c.auto_increment) {
            if column.domain != Domain::Integer || pk.len() != 1 || pk[0] != column.name {
                return fail(format!(
                    "auto-increment column `{}` must be the single INTEGER primary key",
                    column.name
                ));
            }
        }

        for constraint in &self.constraints {
            let columns: &[String] = match constraint {
                Constraint::Primary(columns) | Constraint::Unique { columns, .. } => columns,
                Constraint::Foreign(fk) => &fk.columns,
                Constraint::Check(check) => {
                    let mut missing = None;
                    check.expr.visit(&mut |node| {
                        if let Some(column) = node.as_column() {
                            if missing.is_none() && !self.has_column(&column.name) {
                                missing = Some(column.name.clone());
                            }
                        }
                    });
                    if let Some(name) = missing {
                        return fail(format!("check `{}` uses unknown column `{name}`", check.name));
                    }
                    match &check.column {
                        Some(column) => std::slice::from_ref(column),
                        None => &[],
                    }
                }
            };
            if let Some(unknown) = columns.iter().find(|c| !self.has_column(c)) {
                return fail(format!("constraint refers to unknown column `{unknown}`"));
            }
        }

        if self
            .constraints
            .iter()
            .filter(|c| matches!(c, Constraint::Primary(_)))
            .count()
            > 1
        {
            return fail("more than one primary key".into());
        }

        for fk in self.foreign_keys() {
            if fk.columns.is_empty() || fk.columns.len() != fk.target_columns.len() {
                return fail(format!(
                    "foreign key `{}` maps {} column(s) onto {} target column(s)",
                    fk.name,
                    fk.columns.len(),
                    fk.target_columns.len()
                ));
            }
            let target = fk.target_schema().map(|s| s.as_ref()).unwrap_or(self);
            if let Some(unknown) = fk.target_columns.iter().find(|c| !target.has_column(c)) {
                return fail(format!(
                    "foreign key `{}` targets unknown column `{}.{unknown}`",
                    fk.name, fk.target
                ));
            }
        }

        Ok(())
    }
}

/// Accumulates columns and constraints for a [`TableSchema`].
pub struct TableSchemaBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    constraints: Vec<Constraint>,
}

impl TableSchemaBuilder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Declares a table-level (possibly multi-column) unique constraint.
    pub fn unique(
        mut self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.constraints.push(Constraint::Unique {
            name: Some(name.into()),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn foreign(mut self, fk: ForeignKey) -> Self {
        self.constraints.push(Constraint::Foreign(fk));
        self
    }

    /// Declares a foreign key onto columns of this same table.
    pub fn foreign_self(
        mut self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        target_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.constraints.push(Constraint::Foreign(ForeignKey {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            target: self.name.clone(),
            target_columns: target_columns.into_iter().map(Into::into).collect(),
            on_update: None,
            on_delete: None,
            target_schema: None,
        }));
        self
    }

    /// Same as [`Self::foreign_self`] with referential actions.
    pub fn foreign_self_with(
        self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        target_columns: impl IntoIterator<Item = impl Into<String>>,
        on_update: FkAction,
        on_delete: FkAction,
    ) -> Self {
        let mut builder = self.foreign_self(name, columns, target_columns);
        if let Some(Constraint::Foreign(fk)) = builder.constraints.last_mut() {
            fk.on_update = Some(on_update);
            fk.on_delete = Some(on_delete);
        }
        builder
    }

    /// Declares a whole-row check. The closure receives a reference to the
    /// row being checked.
    pub fn check(mut self, name: impl Into<String>, f: impl FnOnce(&TableRef) -> Expr) -> Self {
        let row = TableRef::declaring(&self.name);
        self.constraints.push(Constraint::Check(CheckConstraint {
            name: name.into(),
            column: None,
            expr: f(&row),
        }));
        self
    }

    /// Declares a check attached to a single field.
    pub fn check_column(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        f: impl FnOnce(&TableRef) -> Expr,
    ) -> Self {
        let row = TableRef::declaring(&self.name);
        self.constraints.push(Constraint::Check(CheckConstraint {
            name: name.into(),
            column: Some(column.into()),
            expr: f(&row),
        }));
        self
    }

    /// Folds field-level flags into constraints. Validation happens at
    /// registration.
    pub fn build(self) -> TableSchema {
        let mut constraints = Vec::new();

        let primary: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.clone())
            .collect();
        if !primary.is_empty() {
            constraints.push(Constraint::Primary(primary));
        }

        constraints.extend(self.columns.iter().filter(|c| c.unique).map(|c| {
            Constraint::Unique {
                name: None,
                columns: vec![c.name.clone()],
            }
        }));
        constraints.extend(self.constraints);

        TableSchema {
            name: self.name,
            columns: self.columns,
            constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> TableSchema {
        TableSchema::builder("Person")
            .column(ColumnDef::of::<String>("name").primary())
            .column(ColumnDef::of::<i64>("age"))
            .check_column("_age", "age", |row| row.col("age").gt(10))
            .build()
    }

    #[test]
    fn test_primary_key_folding() {
        let schema = TableSchema::builder("Account")
            .column(ColumnDef::of::<String>("bank").primary())
            .column(ColumnDef::of::<String>("person").primary())
            .column(ColumnDef::of::<i64>("money"))
            .build();

        assert_eq!(schema.primary_key(), ["bank", "person"]);
        assert!(schema.is_primary("person"));
        assert!(!schema.is_primary("money"));
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_optional_column_is_nullable() {
        let column = ColumnDef::of::<Option<i64>>("b");
        assert!(column.nullable);
        assert_eq!(column.domain, Domain::Integer);
        assert_eq!(column.default, None);

        let column = ColumnDef::of::<String>("f").default_null();
        assert!(column.nullable);
        assert_eq!(column.default, Some(ColumnDefault::Null));
    }

    #[test]
    fn test_default_current_follows_domain() {
        let column = ColumnDef::new("a", Domain::Date).default_current();
        assert_eq!(column.default, Some(ColumnDefault::CurrentDate));

        let column = ColumnDef::new("c", Domain::Timestamp).default_current();
        assert_eq!(column.default, Some(ColumnDefault::CurrentTimestamp));
    }

    #[test]
    fn test_check_equality_uses_rendered_sql() {
        assert_eq!(person(), person());

        let other = TableSchema::builder("Person")
            .column(ColumnDef::of::<String>("name").primary())
            .column(ColumnDef::of::<i64>("age"))
            .check_column("_age", "age", |row| row.col("age").gt(20))
            .build();
        assert_ne!(person(), other);
    }

    #[test]
    fn test_validate_rejects_bad_autoincrement() {
        let schema = TableSchema::builder("T")
            .column(ColumnDef::of::<String>("a").primary().autoincrement())
            .build();
        assert!(matches!(schema.validate(), Err(DbError::Definition { .. })));

        let schema = TableSchema::builder("T")
            .column(ColumnDef::of::<i64>("a").primary().autoincrement())
            .build();
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_check_column() {
        let schema = TableSchema::builder("T")
            .column(ColumnDef::of::<i64>("a"))
            .check("_b", |row| row.col("b").gt(0))
            .build();
        assert!(matches!(schema.validate(), Err(DbError::Definition { .. })));
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let schema = TableSchema::builder("T")
            .column(ColumnDef::of::<i64>("a"))
            .column(ColumnDef::of::<String>("a"))
            .build();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_self_foreign_key() {
        let schema = TableSchema::builder("Test")
            .column(ColumnDef::of::<String>("name").primary())
            .column(ColumnDef::of::<String>("ref"))
            .foreign_self("_ref", ["ref"], ["name"])
            .build();

        let fk = schema.foreign_key("_ref").unwrap();
        assert_eq!(fk.target, "Test");
        assert!(fk.target_schema().is_none());
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_fk_action_parse() {
        assert_eq!("no action".parse::<FkAction>().unwrap(), FkAction::NoAction);
        assert_eq!("SET_NULL".parse::<FkAction>().unwrap(), FkAction::SetNull);
        assert!("explode".parse::<FkAction>().is_err());
    }
}
