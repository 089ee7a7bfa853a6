//! DELETE builder.

use std::sync::Arc;

use crate::{
    expr::{Expr, TableRef},
    traits::IntoExpr,
};

#[derive(Debug, Clone)]
pub(crate) struct DeleteData {
    pub table: TableRef,
    pub filter: Option<Expr>,
}

/// A DELETE statement.
#[derive(Debug, Clone)]
pub struct Delete {
    inner: Arc<DeleteData>,
}

pub fn delete_from(table: &TableRef) -> Delete {
    Delete {
        inner: Arc::new(DeleteData {
            table: table.clone(),
            filter: None,
        }),
    }
}

impl Delete {
    pub(crate) fn data(&self) -> &DeleteData {
        &self.inner
    }

    /// Adds a WHERE predicate; repeated calls are ANDed.
    pub fn filter(&self, pred: impl IntoExpr) -> Self {
        let pred = pred.into_expr();
        let filter = Some(match &self.inner.filter {
            Some(existing) => existing.and(pred),
            None => pred,
        });
        Delete {
            inner: Arc::new(DeleteData {
                table: self.inner.table.clone(),
                filter,
            }),
        }
    }
}
