//! Set operations: UNION, UNION ALL, INTERSECT, EXCEPT.

use std::{ops, sync::Arc};

use super::{clause::OrderTerm, select::Select, Query};
use crate::expr::TableRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl SetOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SetOp::Union => "UNION",
            SetOp::UnionAll => "UNION ALL",
            SetOp::Intersect => "INTERSECT",
            SetOp::Except => "EXCEPT",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompoundData {
    pub op: SetOp,
    pub left: Query,
    pub right: Select,
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Two queries combined by a set operator.
///
/// Chains associate to the left: `a | b | c` is `(a UNION b) UNION c`.
/// ORDER BY and LIMIT apply to the combined result.
#[derive(Debug, Clone)]
pub struct Compound {
    inner: Arc<CompoundData>,
}

impl Compound {
    pub(crate) fn new(op: SetOp, left: Query, right: Select) -> Self {
        Self {
            inner: Arc::new(CompoundData {
                op,
                left,
                right,
                order_by: Vec::new(),
                limit: None,
                offset: None,
            }),
        }
    }

    pub(crate) fn data(&self) -> &CompoundData {
        &self.inner
    }

    fn with(&self, f: impl FnOnce(&mut CompoundData)) -> Self {
        let mut data = (*self.inner).clone();
        f(&mut data);
        Compound {
            inner: Arc::new(data),
        }
    }

    /// Orders the combined result. Terms must name output columns of the
    /// left operand.
    pub fn order_by<I, O>(&self, terms: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderTerm>,
    {
        let terms: Vec<_> = terms.into_iter().map(Into::into).collect();
        self.with(|d| d.order_by.extend(terms))
    }

    pub fn limit(&self, limit: u32) -> Self {
        self.with(|d| d.limit = Some(limit))
    }

    pub fn offset(&self, offset: u32) -> Self {
        self.with(|d| d.offset = Some(offset))
    }

    /// Operands from left to right.
    pub fn operands(&self) -> Vec<&Select> {
        let mut operands = match &self.inner.left {
            Query::Select(select) => vec![select],
            Query::Compound(compound) => compound.operands(),
        };
        operands.push(&self.inner.right);
        operands
    }

    /// Output names come from the leftmost operand.
    pub fn output_names(&self) -> Vec<Option<String>> {
        self.inner.left.output_names()
    }

    pub fn arity(&self) -> usize {
        self.inner.left.arity()
    }

    pub fn alias(&self, alias: &str) -> TableRef {
        TableRef::derived(Query::Compound(self.clone()), alias)
    }

    fn chain(&self, op: SetOp, other: &Select) -> Compound {
        Compound::new(op, Query::Compound(self.clone()), other.clone())
    }

    pub fn union(&self, other: &Select, all: bool) -> Compound {
        let op = if all { SetOp::UnionAll } else { SetOp::Union };
        self.chain(op, other)
    }

    pub fn intersect(&self, other: &Select) -> Compound {
        self.chain(SetOp::Intersect, other)
    }

    pub fn except(&self, other: &Select) -> Compound {
        self.chain(SetOp::Except, other)
    }
}

impl ops::BitOr<Select> for Compound {
    type Output = Compound;

    fn bitor(self, rhs: Select) -> Compound {
        self.union(&rhs, false)
    }
}

impl ops::BitAnd<Select> for Compound {
    type Output = Compound;

    fn bitand(self, rhs: Select) -> Compound {
        self.intersect(&rhs)
    }
}

impl ops::Sub<Select> for Compound {
    type Output = Compound;

    fn sub(self, rhs: Select) -> Compound {
        self.except(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expr::lit, query::select_from};

    #[test]
    fn test_left_associative_chain() {
        let a = select_from([lit(1)]);
        let b = select_from([lit(2)]);
        let c = select_from([lit(3)]);

        let compound = (a | b) - c;
        assert_eq!(compound.data().op, SetOp::Except);
        assert!(matches!(compound.data().left, Query::Compound(_)));
        assert_eq!(compound.operands().len(), 3);
    }

    #[test]
    fn test_union_all_flag() {
        let a = select_from([lit(1)]);
        let b = select_from([lit(2)]);
        assert_eq!(a.union(&b, true).data().op, SetOp::UnionAll);
        assert_eq!(a.union(&b, false).data().op, SetOp::Union);
    }
}
