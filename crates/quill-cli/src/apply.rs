use std::{fs, path::Path};

use quill_db::{query::create_table, Database, Statement};
use tracing::{info, warn};

use crate::{
    decl::Catalog,
    error::{CliResult, IoContext},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created(String),
    UpToDate(String),
    /// The stored definition differs from the declaration; left untouched.
    Differs(String),
}

pub fn open_database(path: &Path, foreign_keys: bool) -> CliResult<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_path(parent)?;
    }
    let db = Database::open(path)?;
    db.set_foreign_keys(foreign_keys)?;
    Ok(db)
}

/// Creates every declared table missing from `db`.
pub fn apply_catalog(db: &Database, catalog: &Catalog) -> CliResult<Vec<ApplyOutcome>> {
    let mut outcomes = Vec::with_capacity(catalog.tables.len());
    for table in &catalog.tables {
        let name = table.table_name().to_string();
        let statement = create_table(table);
        let declared = statement.build()?.sql;

        let outcome = match db.table_sql(&name)? {
            Some(stored) if stored == declared => ApplyOutcome::UpToDate(name),
            Some(_) => ApplyOutcome::Differs(name),
            None => {
                db.submit(&statement.if_not_exists())?;
                ApplyOutcome::Created(name)
            }
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

pub fn report(outcomes: &[ApplyOutcome]) {
    for outcome in outcomes {
        match outcome {
            ApplyOutcome::Created(name) => info!("Created table {name}"),
            ApplyOutcome::UpToDate(name) => info!("Table {name} is up to date"),
            ApplyOutcome::Differs(name) => {
                warn!("Table {name} exists with a different definition; skipped")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::decl::Declarations;

    fn catalog(extra: bool) -> Catalog {
        let mut decl = String::from(
            "[[table]]\nname = \"Note\"\n[[table.column]]\nname = \"body\"\ntype = \"text\"\n",
        );
        if extra {
            decl.push_str("[[table.column]]\nname = \"pinned\"\ntype = \"boolean\"\ndefault = false\n");
        }
        Declarations::parse(&decl).unwrap().into_catalog().unwrap()
    }

    #[test]
    fn test_apply_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("notes.db");
        let db = open_database(&path, true).unwrap();

        let first = apply_catalog(&db, &catalog(false)).unwrap();
        assert_eq!(first, [ApplyOutcome::Created("Note".into())]);
        assert!(path.exists());

        let second = apply_catalog(&db, &catalog(false)).unwrap();
        assert_eq!(second, [ApplyOutcome::UpToDate("Note".into())]);

        let changed = apply_catalog(&db, &catalog(true)).unwrap();
        assert_eq!(changed, [ApplyOutcome::Differs("Note".into())]);
    }
}
