//! Expression tree.
//!
//! An [`Expr`] is an immutable, reference-counted node. Cloning an
//! expression shares the node; builders never mutate existing nodes.
//!
//! # Example
//!
//! ```ignore
//! use quill_db::{expr::*, Table};
//!
//! let adult = Person::age().ge(18) & Person::name().like("A%");
//! let total = count().alias("total");
//! ```

mod column;
pub mod func;
pub(crate) mod ops;
mod window;

use std::{fmt, sync::Arc};

use rusqlite::types::Value;

pub use column::{ColumnRef, ForeignRef, TableRef, TableSource};
pub use func::{Call, FuncDecl, FuncRole};
pub use ops::{BinaryOp, UnaryOp};
pub use window::{Bound, Frame, FrameMode, Over, Window, WindowDef};

use crate::{
    query::{Assignment, OrderTerm, Query},
    traits::{IntoExpr, Table},
};

/// An expression node.
#[derive(Debug)]
pub enum ExprNode {
    Column(ColumnRef),
    /// A value bound as a parameter.
    Literal(Value),
    /// A verbatim SQL fragment.
    Raw(String),
    Star,
    Unary {
        op: UnaryOp,
        operand: Expr,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
    },
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
        negated: bool,
    },
    InList {
        expr: Expr,
        list: Vec<Expr>,
        negated: bool,
    },
    InQuery {
        expr: Expr,
        query: Query,
        negated: bool,
    },
    IsNull {
        expr: Expr,
        negated: bool,
    },
    Exists(Query),
    Call(Call),
    Window {
        call: Call,
        over: Over,
    },
    Alias {
        expr: Expr,
        name: String,
    },
    Subquery(Query),
    Tuple(Vec<Expr>),
    /// A misuse detected while building, reported by `build()`.
    Invalid(String),
}

#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Expr {
    pub fn new(node: ExprNode) -> Self {
        Expr(Arc::new(node))
    }

    pub fn node(&self) -> &ExprNode {
        &self.0
    }

    /// Whether both handles share the same node.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn column(column: ColumnRef) -> Self {
        Self::new(ExprNode::Column(column))
    }

    pub(crate) fn literal(value: Value) -> Self {
        Self::new(ExprNode::Literal(value))
    }

    pub(crate) fn subquery(query: Query) -> Self {
        Self::new(ExprNode::Subquery(query))
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::new(ExprNode::Invalid(reason.into()))
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self.node() {
            ExprNode::Column(column) => Some(column),
            _ => None,
        }
    }

    /// The name this expression exposes as an output column, if any.
    pub fn output_name(&self) -> Option<&str> {
        match self.node() {
            ExprNode::Alias { name, .. } => Some(name),
            ExprNode::Column(column) => Some(&column.name),
            _ => None,
        }
    }

    /// Strips an alias wrapper.
    pub fn unaliased(&self) -> &Expr {
        match self.node() {
            ExprNode::Alias { expr, .. } => expr,
            _ => self,
        }
    }

    /// Walks this expression depth-first without entering subqueries.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self.node() {
            ExprNode::Column(_)
            | ExprNode::Literal(_)
            | ExprNode::Raw(_)
            | ExprNode::Star
            | ExprNode::Exists(_)
            | ExprNode::Subquery(_)
            | ExprNode::Invalid(_) => {}
            ExprNode::Unary { operand, .. } => operand.visit(f),
            ExprNode::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            ExprNode::Between { expr, low, high, .. } => {
                expr.visit(f);
                low.visit(f);
                high.visit(f);
            }
            ExprNode::InList { expr, list, .. } => {
                expr.visit(f);
                list.iter().for_each(|e| e.visit(f));
            }
            ExprNode::InQuery { expr, .. } => expr.visit(f),
            ExprNode::IsNull { expr, .. } | ExprNode::Alias { expr, .. } => expr.visit(f),
            ExprNode::Call(call) => call.args.iter().for_each(|e| e.visit(f)),
            ExprNode::Window { call, over } => {
                call.args.iter().for_each(|e| e.visit(f));
                if let Over::Inline(window) = over {
                    window.partition_by.iter().for_each(|e| e.visit(f));
                    window.order_by.iter().for_each(|t| t.expr.visit(f));
                }
            }
            ExprNode::Tuple(items) => items.iter().for_each(|e| e.visit(f)),
        }
    }

    fn binary(self, op: BinaryOp, right: impl IntoExpr) -> Expr {
        Expr::new(ExprNode::Binary {
            op,
            left: self,
            right: right.into_expr(),
        })
    }

    pub fn eq(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Eq, other)
    }

    pub fn ne(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Ne, other)
    }

    pub fn lt(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Lt, other)
    }

    pub fn le(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Le, other)
    }

    pub fn gt(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Gt, other)
    }

    pub fn ge(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Ge, other)
    }

    /// `IS`, the null-safe equality.
    pub fn is(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Is, other)
    }

    pub fn is_not(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::IsNot, other)
    }

    pub fn like(&self, pattern: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Like, pattern)
    }

    pub fn not_like(&self, pattern: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::NotLike, pattern)
    }

    pub fn glob(&self, pattern: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Glob, pattern)
    }

    pub fn and(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::And, other)
    }

    pub fn or(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Or, other)
    }

    pub fn not(&self) -> Expr {
        Expr::new(ExprNode::Unary {
            op: UnaryOp::Not,
            operand: self.clone(),
        })
    }

    /// String concatenation (`||`).
    pub fn concat(&self, other: impl IntoExpr) -> Expr {
        self.clone().binary(BinaryOp::Concat, other)
    }

    pub fn between(&self, low: impl IntoExpr, high: impl IntoExpr) -> Expr {
        Expr::new(ExprNode::Between {
            expr: self.clone(),
            low: low.into_expr(),
            high: high.into_expr(),
            negated: false,
        })
    }

    pub fn not_between(&self, low: impl IntoExpr, high: impl IntoExpr) -> Expr {
        Expr::new(ExprNode::Between {
            expr: self.clone(),
            low: low.into_expr(),
            high: high.into_expr(),
            negated: true,
        })
    }

    /// `IN (...)` over a list of values.
    pub fn in_<I, E>(&self, list: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        Expr::new(ExprNode::InList {
            expr: self.clone(),
            list: list.into_iter().map(IntoExpr::into_expr).collect(),
            negated: false,
        })
    }

    pub fn not_in<I, E>(&self, list: I) -> Expr
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        Expr::new(ExprNode::InList {
            expr: self.clone(),
            list: list.into_iter().map(IntoExpr::into_expr).collect(),
            negated: true,
        })
    }

    /// `IN (SELECT ...)`.
    pub fn in_query(&self, query: impl Into<Query>) -> Expr {
        Expr::new(ExprNode::InQuery {
            expr: self.clone(),
            query: query.into(),
            negated: false,
        })
    }

    pub fn not_in_query(&self, query: impl Into<Query>) -> Expr {
        Expr::new(ExprNode::InQuery {
            expr: self.clone(),
            query: query.into(),
            negated: true,
        })
    }

    pub fn null(&self) -> Expr {
        Expr::new(ExprNode::IsNull {
            expr: self.clone(),
            negated: false,
        })
    }

    pub fn not_null(&self) -> Expr {
        Expr::new(ExprNode::IsNull {
            expr: self.clone(),
            negated: true,
        })
    }

    pub fn alias(&self, name: impl Into<String>) -> Expr {
        Expr::new(ExprNode::Alias {
            expr: self.unaliased().clone(),
            name: name.into(),
        })
    }

    /// An assignment `self = value` for UPDATE and upserts.
    pub fn set(&self, value: impl IntoExpr) -> Assignment {
        Assignment::new(self.clone(), value.into_expr())
    }

    pub fn asc(&self) -> OrderTerm {
        OrderTerm::new(self.clone(), false)
    }

    pub fn desc(&self) -> OrderTerm {
        OrderTerm::new(self.clone(), true)
    }

    /// Marks a function call as `DISTINCT`.
    pub fn distinct(&self) -> Expr {
        match self.node() {
            ExprNode::Call(call) => Expr::new(ExprNode::Call(call.with_distinct())),
            _ => Expr::invalid("DISTINCT applies to function calls only"),
        }
    }

    /// Turns a function call into a window function call.
    pub fn over(&self, over: impl Into<Over>) -> Expr {
        match self.node() {
            ExprNode::Call(call) => Expr::new(ExprNode::Window {
                call: call.clone(),
                over: over.into(),
            }),
            _ => Expr::invalid("OVER applies to function calls only"),
        }
    }
}

/// A column of a table, looked up by name at build time.
pub fn col<T: Table>(name: &str) -> Expr {
    T::col(name)
}

/// A bound literal value.
pub fn lit(value: impl IntoExpr) -> Expr {
    value.into_expr()
}

/// A verbatim SQL fragment, never parameterized.
pub fn raw(sql: impl Into<String>) -> Expr {
    Expr::new(ExprNode::Raw(sql.into()))
}

/// Alias of [`raw`].
pub fn verbatim(sql: impl Into<String>) -> Expr {
    raw(sql)
}

/// A literal inlined into the SQL text instead of being bound.
pub fn constant(value: impl Into<Value>) -> Expr {
    raw(crate::render::inline_value(&value.into()))
}

/// `*`, as in `SELECT *` or `COUNT(*)`.
pub fn star() -> Expr {
    Expr::new(ExprNode::Star)
}

/// A row value `(a, b, ...)`.
pub fn tuple<I, E>(items: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: IntoExpr,
{
    Expr::new(ExprNode::Tuple(
        items.into_iter().map(IntoExpr::into_expr).collect(),
    ))
}

pub fn exists(query: impl Into<Query>) -> Expr {
    Expr::new(ExprNode::Exists(query.into()))
}

pub fn not_exists(query: impl Into<Query>) -> Expr {
    exists(query).not()
}

/// `expr IN (list)`.
pub fn contains<I, E>(expr: impl IntoExpr, list: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: IntoExpr,
{
    expr.into_expr().in_(list)
}

pub fn between(expr: impl IntoExpr, low: impl IntoExpr, high: impl IntoExpr) -> Expr {
    expr.into_expr().between(low, high)
}

pub fn is_null(expr: impl IntoExpr) -> Expr {
    expr.into_expr().null()
}

pub fn asc(expr: impl IntoExpr) -> OrderTerm {
    expr.into_expr().asc()
}

pub fn desc(expr: impl IntoExpr) -> OrderTerm {
    expr.into_expr().desc()
}

/// The `excluded` pseudo-table of an upsert on `T`.
pub fn excluded<T: Table>() -> TableRef {
    T::excluded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, TableSchema};

    fn table() -> TableRef {
        TableRef::new(Arc::new(
            TableSchema::builder("T")
                .column(ColumnDef::of::<i64>("a"))
                .column(ColumnDef::of::<String>("b"))
                .build(),
        ))
    }

    #[test]
    fn test_clone_shares_node() {
        let a = table().col("a");
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&table().col("a")));
    }

    #[test]
    fn test_builders_do_not_mutate() {
        let a = table().col("a");
        let cmp = a.gt(1);
        assert!(matches!(a.node(), ExprNode::Column(_)));
        match cmp.node() {
            ExprNode::Binary { op, left, .. } => {
                assert_eq!(*op, BinaryOp::Gt);
                assert!(left.ptr_eq(&a));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_output_name() {
        let t = table();
        assert_eq!(t.col("a").output_name(), Some("a"));
        assert_eq!(t.col("a").alias("x").output_name(), Some("x"));
        assert_eq!(t.col("a").gt(1).output_name(), None);
    }

    #[test]
    fn test_realias_replaces_name() {
        let e = table().col("a").alias("x").alias("y");
        match e.node() {
            ExprNode::Alias { expr, name } => {
                assert_eq!(name, "y");
                assert!(expr.as_column().is_some());
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_distinct_on_non_call_is_invalid() {
        let e = table().col("a").distinct();
        assert!(matches!(e.node(), ExprNode::Invalid(_)));
    }

    #[test]
    fn test_visit_collects_columns() {
        let t = table();
        let e = t.col("a").gt(1) & t.col("b").like("x%");
        let mut names = Vec::new();
        e.visit(&mut |node| {
            if let Some(column) = node.as_column() {
                names.push(column.name.clone());
            }
        });
        assert_eq!(names, ["a", "b"]);
    }
}
