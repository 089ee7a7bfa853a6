//! CREATE TABLE builder.

use crate::expr::TableRef;

/// A CREATE TABLE statement for a declared table.
#[derive(Debug, Clone)]
pub struct CreateTable {
    pub(crate) table: TableRef,
    pub(crate) if_not_exists: bool,
}

pub fn create_table(table: &TableRef) -> CreateTable {
    CreateTable {
        table: table.clone(),
        if_not_exists: false,
    }
}

impl CreateTable {
    pub fn if_not_exists(&self) -> Self {
        Self {
            if_not_exists: true,
            ..self.clone()
        }
    }
}
