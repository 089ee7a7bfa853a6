//! Operators and their precedence.

use std::ops;

use super::{Expr, ExprNode};
use crate::traits::IntoExpr;

/// Binding strength of SQLite's operators, loosest first.
///
/// Atoms (columns, literals, calls, parenthesized subqueries) bind tightest.
pub(crate) mod prec {
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
    pub const NOT: u8 = 3;
    pub const EQUALITY: u8 = 4;
    pub const RELATIONAL: u8 = 5;
    pub const BITWISE: u8 = 6;
    pub const ADDITIVE: u8 = 7;
    pub const MULTIPLICATIVE: u8 = 8;
    pub const CONCAT: u8 = 9;
    pub const UNARY: u8 = 10;
    pub const ATOM: u8 = 11;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
}

impl UnaryOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT ",
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
        }
    }

    pub(crate) fn precedence(&self) -> u8 {
        match self {
            UnaryOp::Not => prec::NOT,
            UnaryOp::Neg | UnaryOp::BitNot => prec::UNARY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Is,
    IsNot,
    Like,
    NotLike,
    Glob,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    ShiftLeft,
    ShiftRight,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
}

impl BinaryOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            BinaryOp::Or => "OR",
            BinaryOp::And => "AND",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Is => "IS",
            BinaryOp::IsNot => "IS NOT",
            BinaryOp::Like => "LIKE",
            BinaryOp::NotLike => "NOT LIKE",
            BinaryOp::Glob => "GLOB",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Concat => "||",
        }
    }

    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => prec::OR,
            BinaryOp::And => prec::AND,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Is
            | BinaryOp::IsNot
            | BinaryOp::Like
            | BinaryOp::NotLike
            | BinaryOp::Glob => prec::EQUALITY,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => prec::RELATIONAL,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::ShiftLeft | BinaryOp::ShiftRight => {
                prec::BITWISE
            }
            BinaryOp::Add | BinaryOp::Sub => prec::ADDITIVE,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => prec::MULTIPLICATIVE,
            BinaryOp::Concat => prec::CONCAT,
        }
    }

    /// `a op (b op c)` equals `(a op b) op c`.
    pub(crate) fn is_associative(&self) -> bool {
        matches!(
            self,
            BinaryOp::Or
                | BinaryOp::And
                | BinaryOp::Add
                | BinaryOp::Mul
                | BinaryOp::Concat
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
        )
    }

    pub(crate) fn is_comparison(&self) -> bool {
        self.precedence() == prec::EQUALITY || self.precedence() == prec::RELATIONAL
    }

    pub(crate) fn is_arithmetic(&self) -> bool {
        matches!(
            self.precedence(),
            prec::BITWISE | prec::ADDITIVE | prec::MULTIPLICATIVE
        )
    }
}

impl ExprNode {
    /// Binding strength of this node when rendered outside a projection.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            ExprNode::Binary { op, .. } => op.precedence(),
            ExprNode::Unary { op, .. } => op.precedence(),
            ExprNode::Between { .. } | ExprNode::InList { .. } | ExprNode::InQuery { .. } => {
                prec::EQUALITY
            }
            ExprNode::IsNull { .. } => prec::EQUALITY,
            _ => prec::ATOM,
        }
    }
}

fn binary(left: Expr, op: BinaryOp, right: impl IntoExpr) -> Expr {
    Expr::new(ExprNode::Binary {
        op,
        left,
        right: right.into_expr(),
    })
}

macro_rules! binary_operator {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl<R: IntoExpr> ops::$trait<R> for Expr {
                type Output = Expr;

                fn $method(self, rhs: R) -> Expr {
                    binary(self, BinaryOp::$op, rhs)
                }
            }

            impl<R: IntoExpr> ops::$trait<R> for &Expr {
                type Output = Expr;

                fn $method(self, rhs: R) -> Expr {
                    binary(self.clone(), BinaryOp::$op, rhs)
                }
            }
        )*
    };
}

binary_operator! {
    BitAnd::bitand => And,
    BitOr::bitor => Or,
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Rem::rem => Rem,
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::new(ExprNode::Unary {
            op: UnaryOp::Not,
            operand: self,
        })
    }
}

impl ops::Not for &Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        !self.clone()
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::new(ExprNode::Unary {
            op: UnaryOp::Neg,
            operand: self,
        })
    }
}

impl ops::Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        -self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lit;

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOp::Or.precedence() < BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() < UnaryOp::Not.precedence());
        assert!(UnaryOp::Not.precedence() < BinaryOp::Eq.precedence());
        assert!(BinaryOp::Eq.precedence() < BinaryOp::Lt.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::Mul.precedence());
        assert!(BinaryOp::Mul.precedence() < BinaryOp::Concat.precedence());
    }

    #[test]
    fn test_operator_overloads() {
        let e = lit(1) + 2;
        assert!(matches!(
            e.node(),
            ExprNode::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));

        let e = !(lit(1) & lit(2));
        match e.node() {
            ExprNode::Unary { op, operand } => {
                assert_eq!(*op, UnaryOp::Not);
                assert_eq!(operand.node().precedence(), prec::AND);
            }
            other => panic!("unexpected node {other:?}"),
        }
    }
}
