use nu_ansi_term::Color::{Cyan, Green, Yellow};
use quill_db::{
    expr::TableRef,
    render::inline_value,
    schema::{ColumnDefault, TableSchema},
};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::info;

use crate::{
    decl::Catalog,
    error::CliResult,
    utils::{yes_no, Colored},
};

fn default_text(default: Option<&ColumnDefault>) -> String {
    match default {
        None => "-".to_string(),
        Some(ColumnDefault::Null) => "NULL".to_string(),
        Some(ColumnDefault::Value(value)) => inline_value(value),
        Some(ColumnDefault::CurrentDate) => "CURRENT_DATE".to_string(),
        Some(ColumnDefault::CurrentTime) => "CURRENT_TIME".to_string(),
        Some(ColumnDefault::CurrentTimestamp) => "CURRENT_TIMESTAMP".to_string(),
    }
}

fn key_text(schema: &TableSchema, column: &str) -> String {
    let mut keys = Vec::new();
    if schema.is_primary(column) {
        keys.push("PK".to_string());
    }
    if schema.uniques().any(|u| u.len() == 1 && u[0] == column) {
        keys.push("UNIQUE".to_string());
    }
    for fk in schema.foreign_keys() {
        if let Some(pos) = fk.columns.iter().position(|c| c == column) {
            let target = fk.target_columns.get(pos).map_or("?", String::as_str);
            keys.push(format!("FK {}.{}", fk.target, target));
        }
    }
    if keys.is_empty() {
        "-".to_string()
    } else {
        keys.join(", ")
    }
}

/// Column table of one declared table.
pub fn table_summary(table: &TableRef) -> Option<String> {
    let schema = table.schema()?;

    let mut builder = Builder::new();
    builder.push_record(["Column", "Type", "Nullable", "Default", "Keys"]);
    for column in schema.columns() {
        builder.push_record([
            column.name.clone(),
            column.domain.storage_class().unwrap_or("-").to_string(),
            yes_no(column.nullable).to_string(),
            default_text(column.default.as_ref()),
            key_text(schema, &column.name),
        ]);
    }

    Some(
        builder
            .build()
            .with(Panel::header(schema.name()))
            .with(Style::rounded())
            .with(BorderCorrection {})
            .to_string(),
    )
}

pub fn display_info(catalog: &Catalog, json: bool) -> CliResult<()> {
    if json {
        let info = catalog.registry.info();
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    for table in &catalog.tables {
        if let Some(summary) = table_summary(table) {
            info!("{summary}");
        }
    }

    let info = catalog.registry.info();
    if !info.relations.is_empty() {
        info!("\n{}:", Colored(Cyan, "Relations"));
        for (from, to) in &info.relations {
            info!("  {} → {}", Colored(Green, from), Colored(Yellow, to));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::Declarations;

    #[test]
    fn test_table_summary() {
        let catalog = Declarations::parse(
            r#"
[[table]]
name = "Owner"
[[table.column]]
name = "id"
type = "integer"
primary = true

[[table]]
name = "Pet"
[[table.column]]
name = "owner"
type = "integer"
[[table.column]]
name = "nickname"
type = "text"
nullable = true
default = "rex"
[[table.foreign]]
name = "fk_owner"
columns = ["owner"]
references = "Owner"
"#,
        )
        .unwrap()
        .into_catalog()
        .unwrap();

        let summary = table_summary(&catalog.tables[1]).unwrap();
        assert!(summary.contains("Pet"));
        assert!(summary.contains("FK Owner.id"));
        assert!(summary.contains("'rex'"));
    }
}
