//! CREATE TABLE rendering.

use rusqlite::types::Value;

use super::{bracket_ident, inline_expr, inline_value, quote_ident};
use crate::{
    error::{DbError, Result},
    query::CreateTable,
    schema::{ColumnDef, ColumnDefault, Constraint, Domain, TableSchema},
};

fn bracket_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| bracket_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_sql(column: &ColumnDef, default: &ColumnDefault) -> String {
    match default {
        ColumnDefault::Null => "NULL".to_string(),
        ColumnDefault::Value(Value::Integer(i)) if column.domain == Domain::Boolean => {
            if *i != 0 { "True" } else { "False" }.to_string()
        }
        ColumnDefault::Value(value) => inline_value(value),
        ColumnDefault::CurrentDate => "CURRENT_DATE".to_string(),
        ColumnDefault::CurrentTime => "CURRENT_TIME".to_string(),
        ColumnDefault::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
    }
}

fn column_line(schema: &TableSchema, column: &ColumnDef) -> String {
    let pk = schema.primary_key();
    let inline_pk = pk.len() == 1 && pk[0] == column.name;

    let mut line = bracket_ident(&column.name);
    if let Some(storage) = column.domain.storage_class() {
        line.push(' ');
        line.push_str(storage);
    }
    if !column.nullable || inline_pk {
        line.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        line.push_str(" DEFAULT ");
        line.push_str(&default_sql(column, default));
    }
    if inline_pk {
        line.push_str(" PRIMARY KEY");
        if column.auto_increment {
            line.push_str(" AUTOINCREMENT");
        }
    }
    let unique = schema.constraints().iter().any(|c| {
        matches!(c, Constraint::Unique { name: None, columns } if columns.len() == 1 && columns[0] == column.name)
    });
    if unique {
        line.push_str(" UNIQUE");
    }
    line
}

fn named(name: &str) -> String {
    format!("CONSTRAINT {} ", quote_ident(name))
}

/// Renders the DDL for one table.
///
/// Columns come first, then table-level UNIQUE, CHECK, FOREIGN KEY and
/// composite PRIMARY KEY clauses.
pub(crate) fn create_table(create: &CreateTable) -> Result<String> {
    let schema = create.table.schema().ok_or_else(|| {
        DbError::Construction("CREATE TABLE needs a declared table".into())
    })?;

    let mut lines: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| column_line(schema, c))
        .collect();

    for constraint in schema.constraints() {
        if let Constraint::Unique {
            name: Some(name),
            columns,
        } = constraint
        {
            lines.push(format!("{}UNIQUE ({})", named(name), bracket_list(columns)));
        }
    }
    for check in schema.checks() {
        lines.push(format!(
            "{}CHECK ({})",
            named(&check.name),
            inline_expr(&check.expr)?
        ));
    }
    for fk in schema.foreign_keys() {
        let mut line = format!(
            "{}FOREIGN KEY ({}) REFERENCES {} ({})",
            named(&fk.name),
            bracket_list(&fk.columns),
            quote_ident(&fk.target),
            bracket_list(&fk.target_columns)
        );
        if let Some(action) = fk.on_update {
            line.push_str(" ON UPDATE ");
            line.push_str(action.as_sql());
        }
        if let Some(action) = fk.on_delete {
            line.push_str(" ON DELETE ");
            line.push_str(action.as_sql());
        }
        lines.push(line);
    }
    let pk = schema.primary_key();
    if pk.len() > 1 {
        lines.push(format!("PRIMARY KEY ({})", bracket_list(pk)));
    }

    Ok(format!(
        "CREATE TABLE {}{} (\n    {}\n)",
        if create.if_not_exists {
            "IF NOT EXISTS "
        } else {
            ""
        },
        quote_ident(schema.name()),
        lines.join(" ,\n    ")
    ))
}
