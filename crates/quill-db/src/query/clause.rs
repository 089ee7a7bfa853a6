//! Clause values shared by the statement builders.

use std::{fmt, str::FromStr};

use crate::{
    error::{DbError, Result},
    expr::{Expr, ForeignRef, TableRef},
};

/// An ORDER BY term.
#[derive(Debug, Clone)]
pub struct OrderTerm {
    pub expr: Expr,
    pub desc: bool,
}

impl OrderTerm {
    pub fn new(expr: Expr, desc: bool) -> Self {
        Self { expr, desc }
    }
}

impl From<Expr> for OrderTerm {
    fn from(expr: Expr) -> Self {
        Self::new(expr, false)
    }
}

impl From<&Expr> for OrderTerm {
    fn from(expr: &Expr) -> Self {
        Self::new(expr.clone(), false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Cross,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

impl FromStr for JoinKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', " ");
        match normalized.as_str() {
            "inner" | "join" | "inner join" => Ok(JoinKind::Inner),
            "left" | "left outer" | "left join" | "left outer join" => Ok(JoinKind::Left),
            "cross" | "cross join" => Ok(JoinKind::Cross),
            "full" | "full outer" | "full join" | "full outer join" | "outer" => Err(
                DbError::Construction("FULL OUTER JOIN is not supported".into()),
            ),
            _ => Err(DbError::Construction(format!("unknown join kind `{s}`"))),
        }
    }
}

/// What a join clause names.
#[derive(Debug, Clone)]
pub enum JoinTarget {
    /// A predicate; the joined table is the one it introduces.
    Predicate(Expr),
    /// A table; the predicate comes from a foreign key.
    Table(TableRef),
    /// A column; the foreign key must cover it.
    Column(Expr),
    /// A named foreign key.
    Foreign(ForeignRef),
    /// A table joined through a named foreign key, for self joins.
    TableVia(TableRef, ForeignRef),
}

impl From<Expr> for JoinTarget {
    fn from(expr: Expr) -> Self {
        if expr.as_column().is_some() {
            JoinTarget::Column(expr)
        } else {
            JoinTarget::Predicate(expr)
        }
    }
}

impl From<&Expr> for JoinTarget {
    fn from(expr: &Expr) -> Self {
        expr.clone().into()
    }
}

impl From<TableRef> for JoinTarget {
    fn from(table: TableRef) -> Self {
        JoinTarget::Table(table)
    }
}

impl From<&TableRef> for JoinTarget {
    fn from(table: &TableRef) -> Self {
        JoinTarget::Table(table.clone())
    }
}

impl From<ForeignRef> for JoinTarget {
    fn from(fk: ForeignRef) -> Self {
        JoinTarget::Foreign(fk)
    }
}

/// A join as declared, before resolution.
#[derive(Debug, Clone)]
pub(crate) struct JoinClause {
    pub target: JoinTarget,
    pub predicates: Vec<Expr>,
    pub kind: JoinKind,
}

/// `column = value` in UPDATE and `DO UPDATE SET`.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub column: Expr,
    pub value: Expr,
}

impl Assignment {
    pub fn new(column: Expr, value: Expr) -> Self {
        Self { column, value }
    }
}

/// `INSERT OR ...` / `UPDATE OR ...` conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    Abort,
    Fail,
    Ignore,
    Replace,
    Rollback,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictPolicy::Abort => "ABORT",
            ConflictPolicy::Fail => "FAIL",
            ConflictPolicy::Ignore => "IGNORE",
            ConflictPolicy::Replace => "REPLACE",
            ConflictPolicy::Rollback => "ROLLBACK",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ABORT" => Ok(ConflictPolicy::Abort),
            "FAIL" => Ok(ConflictPolicy::Fail),
            "IGNORE" => Ok(ConflictPolicy::Ignore),
            "REPLACE" => Ok(ConflictPolicy::Replace),
            "ROLLBACK" => Ok(ConflictPolicy::Rollback),
            _ => Err(DbError::Construction(format!(
                "unknown conflict policy `{s}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_kind_parse() {
        assert_eq!("left outer".parse::<JoinKind>().unwrap(), JoinKind::Left);
        assert_eq!("CROSS".parse::<JoinKind>().unwrap(), JoinKind::Cross);

        let err = "full outer".parse::<JoinKind>().unwrap_err();
        assert!(err.to_string().contains("FULL OUTER JOIN"));
    }

    #[test]
    fn test_conflict_policy_roundtrip() {
        for policy in [
            ConflictPolicy::Abort,
            ConflictPolicy::Fail,
            ConflictPolicy::Ignore,
            ConflictPolicy::Replace,
            ConflictPolicy::Rollback,
        ] {
            assert_eq!(policy.to_string().parse::<ConflictPolicy>().unwrap(), policy);
        }
    }
}
