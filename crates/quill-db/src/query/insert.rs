//! INSERT builder, including upserts.

use std::sync::Arc;

use super::{
    clause::{Assignment, ConflictPolicy},
    Query,
};
use crate::{
    expr::{Expr, TableRef},
    traits::{IntoExpr, IntoRow},
};

#[derive(Debug, Clone)]
pub(crate) enum InsertSource {
    /// Rows of values; empty means `DEFAULT VALUES`.
    Values(Vec<Vec<Expr>>),
    Query(Query),
}

#[derive(Debug, Clone)]
pub(crate) enum UpsertAction {
    Nothing,
    Update {
        assignments: Vec<Assignment>,
        filter: Option<Expr>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Upsert {
    pub target: Vec<Expr>,
    pub action: UpsertAction,
}

#[derive(Debug, Clone)]
pub(crate) struct InsertData {
    pub table: TableRef,
    pub policy: Option<ConflictPolicy>,
    pub columns: Vec<String>,
    pub source: InsertSource,
    pub upsert: Option<Upsert>,
    /// Built column by column through `.set()`.
    pub by_name: bool,
    /// Set when `.set()` was mixed with whole-row values.
    pub mixed: bool,
}

/// An INSERT statement.
#[derive(Debug, Clone)]
pub struct Insert {
    inner: Arc<InsertData>,
}

pub fn insert_into(table: &TableRef) -> Insert {
    Insert {
        inner: Arc::new(InsertData {
            table: table.clone(),
            policy: None,
            columns: Vec::new(),
            source: InsertSource::Values(Vec::new()),
            upsert: None,
            by_name: false,
            mixed: false,
        }),
    }
}

impl Insert {
    pub(crate) fn data(&self) -> &InsertData {
        &self.inner
    }

    fn with(&self, f: impl FnOnce(&mut InsertData)) -> Self {
        let mut data = (*self.inner).clone();
        f(&mut data);
        Insert {
            inner: Arc::new(data),
        }
    }

    /// `INSERT OR <policy>`.
    pub fn policy(&self, policy: ConflictPolicy) -> Self {
        self.with(|d| d.policy = Some(policy))
    }

    /// Sets one named column of a single-row insert.
    pub fn set(&self, column: &Expr, value: impl IntoExpr) -> Self {
        let name = column.as_column().map(|c| c.name.clone());
        let value = value.into_expr();
        self.with(|d| {
            let fresh = d.columns.is_empty()
                && matches!(&d.source, InsertSource::Values(rows) if rows.is_empty());
            let (Some(name), true) = (name, fresh || d.by_name) else {
                d.mixed = true;
                return;
            };
            d.by_name = true;
            if let InsertSource::Values(rows) = &mut d.source {
                match rows.first_mut() {
                    Some(row) => row.push(value),
                    None => rows.push(vec![value]),
                }
            }
            d.columns.push(name);
        })
    }

    /// Restricts the inserted columns; rows then list values in this order.
    pub fn columns<I>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = Expr>,
    {
        let names: Vec<_> = columns
            .into_iter()
            .map(|c| c.as_column().map(|c| c.name.clone()))
            .collect();
        self.with(|d| {
            if names.iter().any(Option::is_none) {
                d.mixed = true;
            }
            d.columns = names.into_iter().flatten().collect();
        })
    }

    /// Appends whole rows, in column declaration order.
    pub fn rows<I, R>(&self, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoRow,
    {
        let rows: Vec<Vec<Expr>> = rows
            .into_iter()
            .map(|r| r.into_row().into_iter().map(IntoExpr::into_expr).collect())
            .collect();
        self.append(rows)
    }

    /// Appends one row of expressions.
    pub fn values<I, E>(&self, row: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        let row = row.into_iter().map(IntoExpr::into_expr).collect();
        self.append(vec![row])
    }

    fn append(&self, new_rows: Vec<Vec<Expr>>) -> Self {
        self.with(|d| {
            if d.by_name {
                d.mixed = true;
            }
            if d.columns.is_empty() {
                d.columns = d.table.column_names();
            }
            match &mut d.source {
                InsertSource::Values(rows) => rows.extend(new_rows),
                InsertSource::Query(_) => d.mixed = true,
            }
        })
    }

    /// `INSERT ... SELECT`.
    pub fn select(&self, query: impl Into<Query>) -> Self {
        let query = query.into();
        self.with(|d| {
            if matches!(&d.source, InsertSource::Values(rows) if !rows.is_empty()) {
                d.mixed = true;
            }
            if d.columns.is_empty() {
                d.columns = d.table.column_names();
            }
            d.source = InsertSource::Query(query);
        })
    }

    /// Starts an `ON CONFLICT` clause; an empty target is allowed for
    /// `DO NOTHING`.
    pub fn on_conflict<I>(&self, target: I) -> OnConflict
    where
        I: IntoIterator<Item = Expr>,
    {
        OnConflict {
            insert: self.clone(),
            target: target.into_iter().collect(),
        }
    }
}

/// The pending `ON CONFLICT` clause of an [`Insert`].
#[derive(Debug, Clone)]
pub struct OnConflict {
    insert: Insert,
    target: Vec<Expr>,
}

impl OnConflict {
    fn finish(self, action: UpsertAction) -> Insert {
        let target = self.target;
        self.insert.with(|d| d.upsert = Some(Upsert { target, action }))
    }

    pub fn do_nothing(self) -> Insert {
        self.finish(UpsertAction::Nothing)
    }

    /// `DO UPDATE SET ...`; values may reference the `excluded` pseudo-table.
    pub fn do_update<I>(self, assignments: I) -> Insert
    where
        I: IntoIterator<Item = Assignment>,
    {
        let assignments = assignments.into_iter().collect();
        self.finish(UpsertAction::Update {
            assignments,
            filter: None,
        })
    }

    /// `DO UPDATE SET ... WHERE pred`.
    pub fn do_update_where<I>(self, assignments: I, pred: impl IntoExpr) -> Insert
    where
        I: IntoIterator<Item = Assignment>,
    {
        let assignments = assignments.into_iter().collect();
        self.finish(UpsertAction::Update {
            assignments,
            filter: Some(pred.into_expr()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, TableSchema};

    fn person() -> TableRef {
        TableRef::new(Arc::new(
            TableSchema::builder("Person")
                .column(ColumnDef::of::<String>("name").primary())
                .column(ColumnDef::of::<i64>("age"))
                .build(),
        ))
    }

    #[test]
    fn test_set_builds_single_row() {
        let p = person();
        let insert = insert_into(&p).set(&p.col("name"), "Alice").set(&p.col("age"), 30);

        assert_eq!(insert.data().columns, ["name", "age"]);
        match &insert.data().source {
            InsertSource::Values(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].len(), 2);
            }
            InsertSource::Query(_) => panic!("expected values"),
        }
        assert!(!insert.data().mixed);
    }

    #[test]
    fn test_rows_use_all_columns() {
        let p = person();
        let insert = insert_into(&p).rows([("Alice".to_string(), 30i64), ("Bob".to_string(), 40)]);

        assert_eq!(insert.data().columns, ["name", "age"]);
        match &insert.data().source {
            InsertSource::Values(rows) => assert_eq!(rows.len(), 2),
            InsertSource::Query(_) => panic!("expected values"),
        }
    }

    #[test]
    fn test_set_after_rows_is_flagged() {
        let p = person();
        let insert = insert_into(&p)
            .rows([("Alice".to_string(), 30i64), ("Bob".to_string(), 40)])
            .set(&p.col("age"), 1);
        assert!(insert.data().mixed);
    }
}
