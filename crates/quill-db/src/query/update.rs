//! UPDATE builder.

use std::sync::Arc;

use super::clause::{Assignment, ConflictPolicy};
use crate::{
    expr::{Expr, TableRef},
    traits::IntoExpr,
};

#[derive(Debug, Clone)]
pub(crate) struct UpdateData {
    pub table: TableRef,
    pub policy: Option<ConflictPolicy>,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Expr>,
}

/// An UPDATE statement.
///
/// ```ignore
/// update(&Person::table(), [Person::age().set(Person::age() + 1)])
///     .filter(Person::name().eq("Alice"));
/// ```
#[derive(Debug, Clone)]
pub struct Update {
    inner: Arc<UpdateData>,
}

/// Updates `table` with assignments rendered in the given order.
pub fn update<I>(table: &TableRef, assignments: I) -> Update
where
    I: IntoIterator<Item = Assignment>,
{
    Update {
        inner: Arc::new(UpdateData {
            table: table.clone(),
            policy: None,
            assignments: assignments.into_iter().collect(),
            filter: None,
        }),
    }
}

impl Update {
    pub(crate) fn data(&self) -> &UpdateData {
        &self.inner
    }

    fn with(&self, f: impl FnOnce(&mut UpdateData)) -> Self {
        let mut data = (*self.inner).clone();
        f(&mut data);
        Update {
            inner: Arc::new(data),
        }
    }

    /// `UPDATE OR <policy>`.
    pub fn policy(&self, policy: ConflictPolicy) -> Self {
        self.with(|d| d.policy = Some(policy))
    }

    /// Adds a WHERE predicate; repeated calls are ANDed.
    pub fn filter(&self, pred: impl IntoExpr) -> Self {
        let pred = pred.into_expr();
        self.with(|d| {
            d.filter = Some(match &d.filter {
                Some(existing) => existing.and(pred),
                None => pred,
            })
        })
    }
}
