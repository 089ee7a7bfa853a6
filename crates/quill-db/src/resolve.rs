//! Join resolution.
//!
//! Turns declared join targets into a joined table plus an ON predicate,
//! inferring predicates from foreign keys where none was given.

use tracing::trace;

use crate::{
    error::{DbError, Result},
    expr::{Expr, ExprNode, TableRef, TableSource},
    query::{JoinClause, JoinKind, JoinTarget},
    schema::ForeignKey,
};

#[derive(Debug, Clone)]
pub(crate) struct ResolvedJoin {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Option<Expr>,
}

/// Resolves joins left to right; each join sees the tables before it.
pub(crate) fn resolve_joins(from: Option<&TableRef>, joins: &[JoinClause]) -> Result<Vec<ResolvedJoin>> {
    let mut scope: Vec<TableRef> = from.cloned().into_iter().collect();
    let mut resolved = Vec::with_capacity(joins.len());

    for join in joins {
        let (table, on) = resolve(&scope, join)?;
        trace!(
            table = table.visible_name(),
            kind = join.kind.as_sql(),
            inferred = join.predicates.is_empty() && !matches!(join.target, JoinTarget::Predicate(_)),
            "resolved join"
        );
        scope.push(table.clone());
        resolved.push(ResolvedJoin {
            kind: join.kind,
            table,
            on,
        });
    }

    Ok(resolved)
}

fn in_scope(scope: &[TableRef], table: &TableRef) -> bool {
    scope.iter().any(|t| t.same_as(table))
}

pub(crate) fn conjunction(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(|acc, e| acc.and(e))
}

fn resolve(scope: &[TableRef], join: &JoinClause) -> Result<(TableRef, Option<Expr>)> {
    let extra = || join.predicates.iter().cloned();

    if join.kind == JoinKind::Cross {
        return match &join.target {
            JoinTarget::Table(table) if join.predicates.is_empty() => {
                ensure_new(scope, table)?;
                Ok((table.clone(), None))
            }
            _ => Err(DbError::Resolution(
                "a cross join takes a bare table without predicate".into(),
            )),
        };
    }

    match &join.target {
        JoinTarget::Predicate(pred) => {
            let table = introduced_table(scope, pred)?;
            Ok((table, conjunction(std::iter::once(pred.clone()).chain(extra()))))
        }
        JoinTarget::Table(table) => {
            ensure_new(scope, table)?;
            if !join.predicates.is_empty() {
                return Ok((table.clone(), conjunction(extra())));
            }
            let on = infer(scope, table, None)?;
            Ok((table.clone(), Some(on)))
        }
        JoinTarget::Column(column) => {
            let column = column
                .as_column()
                .ok_or_else(|| DbError::Resolution("expected a column".into()))?;
            let table = column.table.clone();
            ensure_new(scope, &table)?;
            let on = infer(scope, &table, Some(&column.name))?;
            Ok((table, conjunction(std::iter::once(on).chain(extra()))))
        }
        JoinTarget::Foreign(fk_ref) => {
            let fk = named_fk(&fk_ref.table, &fk_ref.name)?;
            let owner = &fk_ref.table;
            let target = fk_target(owner, fk);

            let (new, on) = if let Some(local) = scope.iter().find(|t| t.same_as(owner)) {
                ensure_new(scope, &target)?;
                let on = fk_predicate(fk, local, &target, false);
                (target, on)
            } else if let Some(existing) = scope.iter().find(|t| t.table_name() == fk.target) {
                let on = fk_predicate(fk, owner, existing, true);
                (owner.clone(), on)
            } else {
                return Err(DbError::Resolution(format!(
                    "neither side of foreign key `{}` is in scope",
                    fk.name
                )));
            };
            Ok((new, conjunction(std::iter::once(on).chain(extra()))))
        }
        JoinTarget::TableVia(table, fk_ref) => {
            ensure_new(scope, table)?;
            let fk = named_fk(&fk_ref.table, &fk_ref.name)?;
            let owner = fk_ref.table.table_name();

            let on = if let Some(local) = scope
                .iter()
                .find(|t| t.table_name() == owner && table.table_name() == fk.target)
            {
                fk_predicate(fk, local, table, false)
            } else if let Some(target) = scope
                .iter()
                .find(|t| t.table_name() == fk.target && table.table_name() == owner)
            {
                fk_predicate(fk, table, target, true)
            } else {
                return Err(DbError::Resolution(format!(
                    "foreign key `{}` does not relate `{}` to the tables in scope",
                    fk.name,
                    table.visible_name()
                )));
            };
            Ok((table.clone(), conjunction(std::iter::once(on).chain(extra()))))
        }
    }
}

fn ensure_new(scope: &[TableRef], table: &TableRef) -> Result<()> {
    if in_scope(scope, table) {
        return Err(DbError::Resolution(format!(
            "`{}` is already in scope; alias it to join it again",
            table.visible_name()
        )));
    }
    Ok(())
}

/// The single table a join predicate brings into scope.
fn introduced_table(scope: &[TableRef], pred: &Expr) -> Result<TableRef> {
    let mut new: Vec<TableRef> = Vec::new();
    pred.visit(&mut |node| {
        if let ExprNode::Column(column) = node.node() {
            let table = &column.table;
            if matches!(table.source(), TableSource::Table(_) | TableSource::Query(_))
                && !in_scope(scope, table)
                && !new.iter().any(|t| t.same_as(table))
            {
                new.push(table.clone());
            }
        }
    });

    match new.len() {
        1 => Ok(new.remove(0)),
        0 => Err(DbError::Resolution(
            "the predicate does not introduce a new table".into(),
        )),
        _ => Err(DbError::Resolution(format!(
            "the predicate introduces several tables: {}",
            new.iter()
                .map(|t| t.visible_name().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

pub(crate) fn named_fk<'a>(table: &'a TableRef, name: &str) -> Result<&'a ForeignKey> {
    table
        .schema()
        .and_then(|s| s.foreign_key(name))
        .ok_or_else(|| {
            DbError::Resolution(format!(
                "`{}` has no foreign key named `{name}`",
                table.table_name()
            ))
        })
}

pub(crate) fn fk_target(owner: &TableRef, fk: &ForeignKey) -> TableRef {
    match fk.target_schema() {
        Some(schema) => TableRef::new(schema.clone()),
        None => match owner.schema() {
            Some(schema) => TableRef::new(schema.clone()),
            None => owner.clone(),
        },
    }
}

/// Equalities between the foreign key's columns, the joined side first.
fn fk_predicate(fk: &ForeignKey, local: &TableRef, target: &TableRef, local_is_new: bool) -> Expr {
    let pairs = match fk_columns(fk) {
        Ok(pairs) => pairs,
        Err(err) => return Expr::invalid(err.to_string()),
    };
    let eqs = pairs
        .into_iter()
        .map(|(lc, tc)| {
            let (l, t) = (local.col(lc), target.col(tc));
            if local_is_new {
                l.eq(t)
            } else {
                t.eq(l)
            }
        });
    conjunction(eqs).unwrap_or_else(|| Expr::invalid(format!("foreign key `{}` has no columns", fk.name)))
}

/// `(local, target)` column pairs of a foreign key.
pub(crate) fn fk_columns(fk: &ForeignKey) -> Result<Vec<(&str, &str)>> {
    if fk.columns.is_empty() || fk.columns.len() != fk.target_columns.len() {
        return Err(DbError::Resolution(format!(
            "foreign key `{}` pairs {} column(s) with {} target column(s)",
            fk.name,
            fk.columns.len(),
            fk.target_columns.len()
        )));
    }
    Ok(fk
        .columns
        .iter()
        .zip(&fk.target_columns)
        .map(|(lc, tc)| (lc.as_str(), tc.as_str()))
        .collect())
}

/// Infers the predicate joining `new` from the foreign keys between it and
/// the tables in scope, in either direction.
fn infer(scope: &[TableRef], new: &TableRef, column: Option<&str>) -> Result<Expr> {
    let mut candidates: Vec<(&ForeignKey, Expr)> = Vec::new();

    for existing in scope {
        if let Some(schema) = existing.schema() {
            for fk in schema.foreign_keys() {
                if fk.target == new.table_name()
                    && column.map_or(true, |c| fk.target_columns.iter().any(|tc| tc == c))
                {
                    candidates.push((fk, fk_predicate(fk, existing, new, false)));
                }
            }
        }

        // a self reference was already found in the preferred orientation
        if existing.table_name() == new.table_name() {
            continue;
        }

        if let Some(schema) = new.schema() {
            for fk in schema.foreign_keys() {
                if fk.target == existing.table_name()
                    && column.map_or(true, |c| fk.columns.iter().any(|lc| lc == c))
                {
                    candidates.push((fk, fk_predicate(fk, new, existing, true)));
                }
            }
        }
    }

    match candidates.len() {
        1 => Ok(candidates.remove(0).1),
        0 => Err(DbError::Resolution(format!(
            "no foreign key relates `{}` to the tables in scope",
            new.visible_name()
        ))),
        _ => Err(DbError::Resolution(format!(
            "several foreign keys relate `{}` to the tables in scope: {}",
            new.visible_name(),
            candidates
                .iter()
                .map(|(fk, _)| fk.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}
