//! TOML table declarations.
//!
//! ```toml
//! [[table]]
//! name = "Author"
//!
//! [[table.column]]
//! name = "id"
//! type = "integer"
//! primary = true
//! autoincrement = true
//!
//! [[table.check]]
//! name = "_id"
//! column = "id"
//! op = ">"
//! value = 0
//! ```
//!
//! Tables are registered in declaration order, so a foreign key may only
//! reference a table declared earlier (or its own table).

use std::{fs, path::Path, sync::Arc};

use quill_db::{
    expr::{Expr, TableRef},
    rusqlite::types::Value,
    schema::{ColumnDef, Domain, FkAction, ForeignKey, SchemaRegistry, TableId, TableSchema},
};
use serde::Deserialize;
use tracing::debug;

use crate::error::{CliError, CliResult, IoContext};

#[derive(Debug, Default, Deserialize)]
pub struct Declarations {
    #[serde(default, rename = "table")]
    pub tables: Vec<TableDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDecl {
    pub name: String,
    #[serde(default, rename = "column")]
    pub columns: Vec<ColumnDecl>,
    #[serde(default, rename = "unique")]
    pub uniques: Vec<UniqueDecl>,
    #[serde(default, rename = "foreign")]
    pub foreign_keys: Vec<ForeignDecl>,
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDecl {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub sql_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub autoincrement: bool,
    pub default: Option<toml::Value>,
}

fn default_type() -> String {
    "any".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniqueDecl {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignDecl {
    pub name: String,
    pub columns: Vec<String>,
    pub references: String,
    /// Defaults to the referenced table's primary key.
    pub referenced_columns: Option<Vec<String>>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckDecl {
    pub name: String,
    pub column: String,
    pub op: String,
    pub value: toml::Value,
}

/// Declared tables, registered and in declaration order.
pub struct Catalog {
    pub registry: SchemaRegistry,
    pub tables: Vec<TableRef>,
}

impl Declarations {
    pub fn parse(content: &str) -> CliResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).with_path(path)?;
        Self::parse(&content)
    }

    pub fn into_catalog(self) -> CliResult<Catalog> {
        let registry = SchemaRegistry::new();
        let mut tables = Vec::with_capacity(self.tables.len());
        for decl in &self.tables {
            let schema = decl.to_schema(&registry)?;
            let schema = registry.register(TableId::named(&decl.name), schema)?;
            debug!("declared table {}", decl.name);
            tables.push(TableRef::new(schema));
        }
        Ok(Catalog { registry, tables })
    }
}

fn to_sql_value(table: &str, value: &toml::Value) -> CliResult<Value> {
    Ok(match value {
        toml::Value::String(s) => Value::Text(s.clone()),
        toml::Value::Integer(i) => Value::Integer(*i),
        toml::Value::Float(f) => Value::Real(*f),
        toml::Value::Boolean(b) => Value::Integer(i64::from(*b)),
        toml::Value::Datetime(dt) => Value::Text(dt.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            return Err(CliError::declaration(
                table,
                "values must be strings, numbers, booleans or datetimes",
            ))
        }
    })
}

fn fk_action(table: &str, action: Option<&str>) -> CliResult<Option<FkAction>> {
    action
        .map(|a| {
            a.parse::<FkAction>()
                .map_err(|err| CliError::declaration(table, err.to_string()))
        })
        .transpose()
}

fn comparison(table: &str, lhs: Expr, op: &str, rhs: Value) -> CliResult<Expr> {
    Ok(match op.trim().to_ascii_lowercase().as_str() {
        "=" | "==" => lhs.eq(rhs),
        "!=" | "<>" => lhs.ne(rhs),
        "<" => lhs.lt(rhs),
        "<=" => lhs.le(rhs),
        ">" => lhs.gt(rhs),
        ">=" => lhs.ge(rhs),
        "like" => lhs.like(rhs),
        "glob" => lhs.glob(rhs),
        other => {
            return Err(CliError::declaration(
                table,
                format!("unknown check operator `{other}`"),
            ))
        }
    })
}

impl ColumnDecl {
    fn to_column(&self, table: &str) -> CliResult<ColumnDef> {
        let domain: Domain = self
            .sql_type
            .parse()
            .map_err(|err: String| CliError::declaration(table, err))?;

        let mut column = ColumnDef::new(&self.name, domain);
        if self.nullable {
            column = column.nullable();
        }
        if self.primary {
            column = column.primary();
        }
        if self.unique {
            column = column.unique();
        }
        if self.autoincrement {
            column = column.autoincrement();
        }

        match &self.default {
            None => {}
            Some(toml::Value::String(s))
                if s.starts_with("CURRENT_")
                    && matches!(domain, Domain::Date | Domain::Time | Domain::Timestamp) =>
            {
                column = column.default_current();
            }
            Some(value) => column = column.default_value(to_sql_value(table, value)?),
        }
        Ok(column)
    }
}

impl TableDecl {
    fn to_schema(&self, registry: &SchemaRegistry) -> CliResult<TableSchema> {
        let name = self.name.as_str();
        let mut builder = TableSchema::builder(name);

        for column in &self.columns {
            builder = builder.column(column.to_column(name)?);
        }
        for unique in &self.uniques {
            builder = builder.unique(&unique.name, unique.columns.iter().cloned());
        }

        for fk in &self.foreign_keys {
            let on_update = fk_action(name, fk.on_update.as_deref())?;
            let on_delete = fk_action(name, fk.on_delete.as_deref())?;

            if fk.references == self.name {
                let target = match &fk.referenced_columns {
                    Some(columns) => columns.clone(),
                    None => self
                        .columns
                        .iter()
                        .filter(|c| c.primary)
                        .map(|c| c.name.clone())
                        .collect(),
                };
                builder = if on_update.is_none() && on_delete.is_none() {
                    builder.foreign_self(&fk.name, fk.columns.iter().cloned(), target)
                } else {
                    builder.foreign_self_with(
                        &fk.name,
                        fk.columns.iter().cloned(),
                        target,
                        on_update.unwrap_or(FkAction::NoAction),
                        on_delete.unwrap_or(FkAction::NoAction),
                    )
                };
                continue;
            }

            let target = registry.find(&fk.references).ok_or_else(|| {
                CliError::declaration(
                    name,
                    format!(
                        "foreign key `{}` references `{}`, which is not declared before it",
                        fk.name, fk.references
                    ),
                )
            })?;
            let columns = fk
                .referenced_columns
                .clone()
                .unwrap_or_else(|| target.primary_key().to_vec());
            let mut key = ForeignKey::to_table(
                &fk.name,
                fk.columns.iter().cloned(),
                &TableRef::new(Arc::clone(&target)),
                columns,
            );
            if let Some(action) = on_update {
                key = key.on_update(action);
            }
            if let Some(action) = on_delete {
                key = key.on_delete(action);
            }
            builder = builder.foreign(key);
        }

        for check in &self.checks {
            let value = to_sql_value(name, &check.value)?;
            let op = check.op.clone();
            let column = check.column.clone();
            let mut failed = None;
            builder = builder.check_column(&check.name, &check.column, |row| {
                match comparison(name, row.col(&column), &op, value) {
                    Ok(expr) => expr,
                    Err(err) => {
                        failed = Some(err);
                        row.col(&column)
                    }
                }
            });
            if let Some(err) = failed {
                return Err(err);
            }
        }

        Ok(builder.build())
    }
}
