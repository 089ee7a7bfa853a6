//! SQL functions.
//!
//! Every known function is described once in [`FUNCTIONS`]; the builder
//! functions below are thin wrappers that look their declaration up and
//! produce a call node. Unknown names can still be called through [`call`].

use rusqlite::types::Value;

use super::{ops::BinaryOp, star, Expr, ExprNode};
use crate::{render::quote_text, traits::IntoExpr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncRole {
    Scalar,
    Aggregate,
    /// Only valid with `OVER`.
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Required,
    /// May be omitted when trailing.
    Optional,
    /// Any number of further arguments.
    Variadic,
    /// Inlined as quoted SQL text instead of bound.
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Call,
    /// Folded into a chain of the binary operator.
    Infix(BinaryOp),
}

#[derive(Debug)]
pub struct FuncDecl {
    pub name: &'static str,
    pub role: FuncRole,
    pub slots: &'static [Slot],
    pub expansion: Expansion,
}

impl FuncDecl {
    pub fn min_args(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Required | Slot::Literal))
            .count()
    }

    /// `None` when variadic.
    pub fn max_args(&self) -> Option<usize> {
        if self.slots.contains(&Slot::Variadic) {
            None
        } else {
            Some(self.slots.len())
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args() && self.max_args().map_or(true, |max| count <= max)
    }
}

use FuncRole::*;
use Slot::*;

macro_rules! decl {
    ($name:literal, $role:ident, [$($slot:ident),*]) => {
        decl!($name, $role, [$($slot),*], Expansion::Call)
    };
    ($name:literal, $role:ident, [$($slot:ident),*], $expansion:expr) => {
        FuncDecl {
            name: $name,
            role: $role,
            slots: &[$($slot),*],
            expansion: $expansion,
        }
    };
}

pub static FUNCTIONS: &[FuncDecl] = &[
    decl!("ABS", Scalar, [Required]),
    decl!("ROUND", Scalar, [Required, Optional]),
    decl!("STRFTIME", Scalar, [Literal, Required, Variadic]),
    decl!("DATE", Scalar, [Required, Variadic]),
    decl!("TIME", Scalar, [Required, Variadic]),
    decl!("DATETIME", Scalar, [Required, Variadic]),
    decl!("JULIANDAY", Scalar, [Required, Variadic]),
    decl!("CONCAT", Scalar, [Required, Required, Variadic], Expansion::Infix(BinaryOp::Concat)),
    decl!("LENGTH", Scalar, [Required]),
    decl!("LOWER", Scalar, [Required]),
    decl!("UPPER", Scalar, [Required]),
    decl!("TRIM", Scalar, [Required, Optional]),
    decl!("SUBSTR", Scalar, [Required, Required, Optional]),
    decl!("REPLACE", Scalar, [Required, Required, Required]),
    decl!("INSTR", Scalar, [Required, Required]),
    decl!("COALESCE", Scalar, [Required, Required, Variadic]),
    decl!("IFNULL", Scalar, [Required, Required]),
    decl!("NULLIF", Scalar, [Required, Required]),
    decl!("TYPEOF", Scalar, [Required]),
    decl!("RANDOM", Scalar, []),
    decl!("PRINTF", Scalar, [Literal, Variadic]),
    decl!("HEX", Scalar, [Required]),
    decl!("QUOTE", Scalar, [Required]),
    decl!("COUNT", Aggregate, [Required]),
    decl!("SUM", Aggregate, [Required]),
    decl!("TOTAL", Aggregate, [Required]),
    decl!("AVG", Aggregate, [Required]),
    decl!("MIN", Aggregate, [Required]),
    decl!("MAX", Aggregate, [Required]),
    decl!("GROUP_CONCAT", Aggregate, [Required, Optional]),
    decl!("ROW_NUMBER", Window, []),
    decl!("RANK", Window, []),
    decl!("DENSE_RANK", Window, []),
    decl!("PERCENT_RANK", Window, []),
    decl!("CUME_DIST", Window, []),
    decl!("NTILE", Window, [Required]),
    decl!("LAG", Window, [Required, Optional, Optional]),
    decl!("LEAD", Window, [Required, Optional, Optional]),
    decl!("FIRST_VALUE", Window, [Required]),
    decl!("LAST_VALUE", Window, [Required]),
    decl!("NTH_VALUE", Window, [Required, Required]),
];

pub fn lookup(name: &str) -> Option<&'static FuncDecl> {
    FUNCTIONS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

/// A function call.
#[derive(Debug, Clone)]
pub struct Call {
    pub name: String,
    pub decl: Option<&'static FuncDecl>,
    pub args: Vec<Expr>,
    pub distinct: bool,
}

impl Call {
    pub fn role(&self) -> FuncRole {
        self.decl.map(|d| d.role).unwrap_or(FuncRole::Scalar)
    }

    pub(crate) fn with_distinct(&self) -> Call {
        Call {
            distinct: true,
            ..self.clone()
        }
    }
}

/// Calls any function by name.
///
/// Known functions get their declared treatment; other names are emitted
/// as a plain call.
pub fn call<I, E>(name: &str, args: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: IntoExpr,
{
    apply(name, args.into_iter().map(IntoExpr::into_expr).collect())
}

fn apply(name: &str, mut args: Vec<Expr>) -> Expr {
    let decl = lookup(name);

    if let Some(decl) = decl {
        for (slot, arg) in decl.slots.iter().zip(args.iter_mut()) {
            if *slot == Slot::Literal {
                if let ExprNode::Literal(Value::Text(text)) = arg.node() {
                    *arg = super::raw(quote_text(text));
                }
            }
        }

        if let Expansion::Infix(op) = decl.expansion {
            if !decl.accepts(args.len()) {
                return Expr::invalid(format!(
                    "{} takes at least {} arguments, got {}",
                    decl.name,
                    decl.min_args(),
                    args.len()
                ));
            }
            let mut args = args.into_iter();
            let first = args.next().unwrap_or_else(|| Expr::literal(Value::Null));
            return args.fold(first, |left, right| {
                Expr::new(ExprNode::Binary { op, left, right })
            });
        }
    }

    Expr::new(ExprNode::Call(Call {
        name: decl.map(|d| d.name.to_string()).unwrap_or_else(|| name.to_string()),
        decl,
        args,
        distinct: false,
    }))
}

macro_rules! unary_fns {
    ($($(#[$meta:meta])* $fn_name:ident => $sql:literal),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $fn_name(x: impl IntoExpr) -> Expr {
                apply($sql, vec![x.into_expr()])
            }
        )*
    };
}

macro_rules! nullary_fns {
    ($($fn_name:ident => $sql:literal),* $(,)?) => {
        $(
            pub fn $fn_name() -> Expr {
                apply($sql, Vec::new())
            }
        )*
    };
}

unary_fns! {
    abs => "ABS",
    round => "ROUND",
    length => "LENGTH",
    lower => "LOWER",
    upper => "UPPER",
    trim => "TRIM",
    typeof_ => "TYPEOF",
    hex => "HEX",
    quote => "QUOTE",
    /// `COUNT(x)`; see [`count`] for `COUNT(*)`.
    count_of => "COUNT",
    sum => "SUM",
    total => "TOTAL",
    avg => "AVG",
    min => "MIN",
    max => "MAX",
    group_concat => "GROUP_CONCAT",
    ntile => "NTILE",
    lag => "LAG",
    lead => "LEAD",
    first_value => "FIRST_VALUE",
    last_value => "LAST_VALUE",
}

nullary_fns! {
    random => "RANDOM",
    row_number => "ROW_NUMBER",
    rank => "RANK",
    dense_rank => "DENSE_RANK",
    percent_rank => "PERCENT_RANK",
    cume_dist => "CUME_DIST",
}

/// `COUNT(*)`.
pub fn count() -> Expr {
    apply("COUNT", vec![star()])
}

pub fn round_to(x: impl IntoExpr, digits: impl IntoExpr) -> Expr {
    apply("ROUND", vec![x.into_expr(), digits.into_expr()])
}

pub fn trim_chars(x: impl IntoExpr, chars: impl IntoExpr) -> Expr {
    apply("TRIM", vec![x.into_expr(), chars.into_expr()])
}

pub fn group_concat_with(x: impl IntoExpr, separator: impl IntoExpr) -> Expr {
    apply("GROUP_CONCAT", vec![x.into_expr(), separator.into_expr()])
}

pub fn substr(x: impl IntoExpr, start: impl IntoExpr) -> Expr {
    apply("SUBSTR", vec![x.into_expr(), start.into_expr()])
}

pub fn substr_len(x: impl IntoExpr, start: impl IntoExpr, len: impl IntoExpr) -> Expr {
    apply(
        "SUBSTR",
        vec![x.into_expr(), start.into_expr(), len.into_expr()],
    )
}

pub fn replace(x: impl IntoExpr, from: impl IntoExpr, to: impl IntoExpr) -> Expr {
    apply(
        "REPLACE",
        vec![x.into_expr(), from.into_expr(), to.into_expr()],
    )
}

pub fn instr(x: impl IntoExpr, needle: impl IntoExpr) -> Expr {
    apply("INSTR", vec![x.into_expr(), needle.into_expr()])
}

pub fn ifnull(x: impl IntoExpr, fallback: impl IntoExpr) -> Expr {
    apply("IFNULL", vec![x.into_expr(), fallback.into_expr()])
}

pub fn nullif(x: impl IntoExpr, y: impl IntoExpr) -> Expr {
    apply("NULLIF", vec![x.into_expr(), y.into_expr()])
}

pub fn nth_value(x: impl IntoExpr, n: impl IntoExpr) -> Expr {
    apply("NTH_VALUE", vec![x.into_expr(), n.into_expr()])
}

/// `LAG(x, offset, default)`.
pub fn lag_by(x: impl IntoExpr, offset: impl IntoExpr, default: impl IntoExpr) -> Expr {
    apply(
        "LAG",
        vec![x.into_expr(), offset.into_expr(), default.into_expr()],
    )
}

pub fn lead_by(x: impl IntoExpr, offset: impl IntoExpr, default: impl IntoExpr) -> Expr {
    apply(
        "LEAD",
        vec![x.into_expr(), offset.into_expr(), default.into_expr()],
    )
}

/// Folds the arguments into an `a || b || c` chain.
pub fn concat<I, E>(args: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: IntoExpr,
{
    call("CONCAT", args)
}

pub fn coalesce<I, E>(args: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: IntoExpr,
{
    call("COALESCE", args)
}

/// `STRFTIME(format, time, modifiers...)`; the format is inlined.
pub fn strftime<I, E>(format: &str, time: impl IntoExpr, modifiers: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: IntoExpr,
{
    let mut args = vec![Expr::literal(Value::Text(format.to_string())), time.into_expr()];
    args.extend(modifiers.into_iter().map(IntoExpr::into_expr));
    apply("STRFTIME", args)
}

/// `PRINTF(format, args...)`; the format is inlined.
pub fn printf<I, E>(format: &str, args: I) -> Expr
where
    I: IntoIterator<Item = E>,
    E: IntoExpr,
{
    let mut all = vec![Expr::literal(Value::Text(format.to_string()))];
    all.extend(args.into_iter().map(IntoExpr::into_expr));
    apply("PRINTF", all)
}

macro_rules! time_fns {
    ($($fn_name:ident => $sql:literal),* $(,)?) => {
        $(
            pub fn $fn_name<I, E>(time: impl IntoExpr, modifiers: I) -> Expr
            where
                I: IntoIterator<Item = E>,
                E: IntoExpr,
            {
                let mut args = vec![time.into_expr()];
                args.extend(modifiers.into_iter().map(IntoExpr::into_expr));
                apply($sql, args)
            }
        )*
    };
}

time_fns! {
    date => "DATE",
    time => "TIME",
    datetime => "DATETIME",
    julianday => "JULIANDAY",
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lit;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("row_number").unwrap().role, FuncRole::Window);
        assert_eq!(lookup("Sum").unwrap().role, FuncRole::Aggregate);
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn test_arity_bounds() {
        let round = lookup("ROUND").unwrap();
        assert!(round.accepts(1));
        assert!(round.accepts(2));
        assert!(!round.accepts(3));

        let coalesce = lookup("COALESCE").unwrap();
        assert!(!coalesce.accepts(1));
        assert!(coalesce.accepts(5));
    }

    #[test]
    fn test_concat_expands_to_infix() {
        let e = concat([lit("a"), lit("b"), lit("c")]);
        match e.node() {
            ExprNode::Binary { op, left, .. } => {
                assert_eq!(*op, BinaryOp::Concat);
                assert!(matches!(
                    left.node(),
                    ExprNode::Binary {
                        op: BinaryOp::Concat,
                        ..
                    }
                ));
            }
            other => panic!("unexpected node {other:?}"),
        }

        assert!(matches!(concat([lit("a")]).node(), ExprNode::Invalid(_)));
    }

    #[test]
    fn test_strftime_inlines_format() {
        let e = strftime("%Y", lit("2024-01-01"), Vec::<Expr>::new());
        match e.node() {
            ExprNode::Call(call) => {
                assert_eq!(call.name, "STRFTIME");
                assert!(matches!(call.args[0].node(), ExprNode::Raw(s) if s == "'%Y'"));
                assert!(matches!(call.args[1].node(), ExprNode::Literal(_)));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_count_star_and_distinct() {
        match count().node() {
            ExprNode::Call(call) => assert!(matches!(call.args[0].node(), ExprNode::Star)),
            other => panic!("unexpected node {other:?}"),
        }
        match count_of(lit(1)).distinct().node() {
            ExprNode::Call(call) => assert!(call.distinct),
            other => panic!("unexpected node {other:?}"),
        }
    }
}
