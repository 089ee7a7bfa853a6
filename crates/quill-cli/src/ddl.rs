use quill_db::{query::create_table, Statement};

use crate::{decl::Catalog, error::CliResult};

/// CREATE TABLE statements for every declared table, in declaration order.
pub fn render_ddl(catalog: &Catalog, if_not_exists: bool) -> CliResult<String> {
    let mut out = String::new();
    for table in &catalog.tables {
        let mut statement = create_table(table);
        if if_not_exists {
            statement = statement.if_not_exists();
        }
        out.push_str(&statement.build()?.sql);
        out.push_str(";\n");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::Declarations;

    #[test]
    fn test_render_ddl() {
        let catalog = Declarations::parse(
            "[[table]]\nname = \"Tag\"\n[[table.column]]\nname = \"label\"\ntype = \"text\"\nprimary = true\n",
        )
        .unwrap()
        .into_catalog()
        .unwrap();

        assert_eq!(
            render_ddl(&catalog, false).unwrap(),
            "CREATE TABLE Tag (\n    [label] TEXT NOT NULL PRIMARY KEY\n);\n"
        );
        assert!(render_ddl(&catalog, true)
            .unwrap()
            .starts_with("CREATE TABLE IF NOT EXISTS Tag"));
    }
}
