//! SELECT builder.

use std::{borrow::Borrow, ops, sync::Arc};

use super::{
    clause::{JoinClause, JoinKind, JoinTarget, OrderTerm},
    compound::{Compound, SetOp},
};
use crate::{
    expr::{Expr, ExprNode, ForeignRef, TableRef, TableSource, WindowDef},
    traits::IntoExpr,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct SelectData {
    pub columns: Vec<Expr>,
    pub from: Option<TableRef>,
    pub joins: Vec<JoinClause>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub windows: Vec<WindowDef>,
    pub order_by: Vec<OrderTerm>,
    pub distinct: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// A SELECT statement.
///
/// Constructed via [`select_from`] or [`select_all`], then chained with
/// `.join()`, `.filter()`, `.order_by()`, etc.
#[derive(Debug, Clone)]
pub struct Select {
    inner: Arc<SelectData>,
}

/// Selects the given expressions.
///
/// Without an explicit [`Select::from`], the table of the first column in
/// the projection becomes the FROM source.
pub fn select_from<I, E>(columns: I) -> Select
where
    I: IntoIterator<Item = E>,
    E: IntoExpr,
{
    Select {
        inner: Arc::new(SelectData {
            columns: columns.into_iter().map(IntoExpr::into_expr).collect(),
            ..Default::default()
        }),
    }
}

/// Selects every column of `table`.
pub fn select_all(table: &TableRef) -> Select {
    Select {
        inner: Arc::new(SelectData {
            columns: table.all(),
            from: Some(table.clone()),
            ..Default::default()
        }),
    }
}

fn and_with(existing: &Option<Expr>, pred: Expr) -> Option<Expr> {
    Some(match existing {
        Some(existing) => existing.and(pred),
        None => pred,
    })
}

impl Select {
    pub(crate) fn data(&self) -> &SelectData {
        &self.inner
    }

    fn with(&self, f: impl FnOnce(&mut SelectData)) -> Self {
        let mut data = (*self.inner).clone();
        f(&mut data);
        Select {
            inner: Arc::new(data),
        }
    }

    /// Sets the FROM source explicitly.
    pub fn from(&self, table: &TableRef) -> Self {
        self.with(|d| d.from = Some(table.clone()))
    }

    pub fn distinct(&self) -> Self {
        self.with(|d| d.distinct = true)
    }

    /// Joins a table named by a predicate, a table, a column or a foreign key.
    pub fn join(&self, target: impl Into<JoinTarget>, kind: JoinKind) -> Self {
        let target = target.into();
        self.with(|d| {
            d.joins.push(JoinClause {
                target,
                predicates: Vec::new(),
                kind,
            })
        })
    }

    /// Joins `table` with explicit predicates, ANDed together.
    pub fn join_on<I>(&self, table: &TableRef, predicates: I, kind: JoinKind) -> Self
    where
        I: IntoIterator<Item = Expr>,
    {
        let predicates = predicates.into_iter().collect();
        self.with(|d| {
            d.joins.push(JoinClause {
                target: JoinTarget::Table(table.clone()),
                predicates,
                kind,
            })
        })
    }

    /// Joins `table` through the named foreign key.
    pub fn join_via(&self, table: &TableRef, fk: ForeignRef, kind: JoinKind) -> Self {
        self.with(|d| {
            d.joins.push(JoinClause {
                target: JoinTarget::TableVia(table.clone(), fk),
                predicates: Vec::new(),
                kind,
            })
        })
    }

    /// Adds a WHERE predicate; repeated calls are ANDed.
    pub fn filter(&self, pred: impl IntoExpr) -> Self {
        let pred = pred.into_expr();
        self.with(|d| d.filter = and_with(&d.filter, pred))
    }

    pub fn group_by<I, E>(&self, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        let exprs: Vec<_> = exprs.into_iter().map(IntoExpr::into_expr).collect();
        self.with(|d| d.group_by.extend(exprs))
    }

    /// Adds a HAVING predicate; repeated calls are ANDed.
    pub fn having(&self, pred: impl IntoExpr) -> Self {
        let pred = pred.into_expr();
        self.with(|d| d.having = and_with(&d.having, pred))
    }

    pub fn order_by<I, O>(&self, terms: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderTerm>,
    {
        let terms: Vec<_> = terms.into_iter().map(Into::into).collect();
        self.with(|d| d.order_by.extend(terms))
    }

    /// Declares named windows for the WINDOW clause.
    pub fn windows<I, W>(&self, defs: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Borrow<WindowDef>,
    {
        let defs: Vec<_> = defs.into_iter().map(|w| w.borrow().clone()).collect();
        self.with(|d| d.windows.extend(defs))
    }

    pub fn limit(&self, limit: u32) -> Self {
        self.with(|d| d.limit = Some(limit))
    }

    pub fn offset(&self, offset: u32) -> Self {
        self.with(|d| d.offset = Some(offset))
    }

    /// Sets pagination params; pages start at 1.
    pub fn page(&self, page: u32, per_page: u32) -> Self {
        self.with(|d| {
            d.limit = Some(per_page);
            d.offset = Some(page.saturating_sub(1) * per_page);
        })
    }

    /// Uses this query as a derived table named `alias`.
    pub fn alias(&self, alias: &str) -> TableRef {
        TableRef::derived(super::Query::Select(self.clone()), alias)
    }

    /// The FROM source: explicit, or inferred from the projection.
    pub fn source(&self) -> Option<TableRef> {
        if let Some(from) = &self.inner.from {
            return Some(from.clone());
        }
        let mut found = None;
        for column in &self.inner.columns {
            column.visit(&mut |node| {
                if found.is_some() {
                    return;
                }
                if let ExprNode::Column(column) = node.node() {
                    if matches!(
                        column.table.source(),
                        TableSource::Table(_) | TableSource::Query(_)
                    ) {
                        found = Some(column.table.clone());
                    }
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }

    pub fn output_names(&self) -> Vec<Option<String>> {
        let mut names = Vec::new();
        for column in &self.inner.columns {
            match column.node() {
                ExprNode::Star => names.extend(
                    self.source()
                        .map(|t| t.column_names())
                        .unwrap_or_default()
                        .into_iter()
                        .map(Some),
                ),
                _ => names.push(column.output_name().map(str::to_string)),
            }
        }
        names
    }

    pub fn arity(&self) -> usize {
        self.output_names().len()
    }

    pub fn union(&self, other: &Select, all: bool) -> Compound {
        let op = if all { SetOp::UnionAll } else { SetOp::Union };
        Compound::new(op, self.clone().into(), other.clone())
    }

    pub fn intersect(&self, other: &Select) -> Compound {
        Compound::new(SetOp::Intersect, self.clone().into(), other.clone())
    }

    pub fn except(&self, other: &Select) -> Compound {
        Compound::new(SetOp::Except, self.clone().into(), other.clone())
    }
}

impl ops::BitOr<Select> for Select {
    type Output = Compound;

    fn bitor(self, rhs: Select) -> Compound {
        self.union(&rhs, false)
    }
}

impl ops::BitAnd<Select> for Select {
    type Output = Compound;

    fn bitand(self, rhs: Select) -> Compound {
        self.intersect(&rhs)
    }
}

impl ops::Sub<Select> for Select {
    type Output = Compound;

    fn sub(self, rhs: Select) -> Compound {
        self.except(&rhs)
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
    fn test_builder_is_persistent() {
        let p = person();
        let base = select_from([p.col("name")]);
        let filtered = base.filter(p.col("age").gt(10));

        assert!(base.data().filter.is_none());
        assert!(filtered.data().filter.is_some());
        assert!(base.data().columns[0].ptr_eq(&filtered.data().columns[0]));
    }

    #[test]
    fn test_source_inference() {
        let p = person();
        let select = select_from([crate::expr::func::count_of(p.col("age")).alias("n")]);
        assert_eq!(select.source().unwrap().table_name(), "Person");

        let select = select_from([crate::expr::lit(1)]);
        assert!(select.source().is_none());
    }

    #[test]
    fn test_output_names() {
        let p = person();
        let select = select_from([p.col("name"), p.col("age").alias("years"), p.col("age") + 1]);
        assert_eq!(
            select.output_names(),
            vec![Some("name".into()), Some("years".into()), None]
        );
        assert_eq!(select_all(&p).arity(), 2);
    }

    #[test]
    fn test_page() {
        let select = select_all(&person()).page(3, 20);
        assert_eq!(select.data().limit, Some(20));
        assert_eq!(select.data().offset, Some(40));
    }
}
