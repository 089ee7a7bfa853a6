//! Statement builders.
//!
//! Every builder method takes `&self` and returns a new statement that
//! shares unchanged parts with the original, so partially built statements
//! can be reused freely.
//!
//! ```ignore
//! use quill_db::{expr::*, query::*, Statement, Table};
//!
//! let adults = select_all(&Person::table()).filter(Person::age().ge(18));
//! let oldest = adults.order_by([Person::age().desc()]).limit(1);
//!
//! let compiled = oldest.build()?;
//! // SELECT name, age FROM Person WHERE age >= ? ORDER BY age DESC LIMIT 1
//! ```

mod clause;
mod compound;
mod create;
mod delete;
mod insert;
mod select;
mod update;
mod util;

use rusqlite::types::Value;
use tracing::debug;

pub use clause::{Assignment, ConflictPolicy, JoinKind, JoinTarget, OrderTerm};
pub use compound::{Compound, SetOp};
pub use create::{create_table, CreateTable};
pub use delete::{delete_from, Delete};
pub use insert::{insert_into, Insert, OnConflict};
pub use select::{select_all, select_from, Select};
pub use update::{update, Update};
pub use util::{map_foreign, map_foreign_by, pull_foreign, pull_foreign_by};

pub(crate) use clause::JoinClause;
pub(crate) use insert::{InsertSource, Upsert, UpsertAction};

use crate::{
    error::Result,
    render::{self, RenderOptions},
    validate,
};

/// Rendered SQL text and its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Compiled {
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

/// A statement that can be validated and rendered.
pub trait Statement {
    /// Validates and renders with explicit options.
    fn compile(&self, options: &RenderOptions) -> Result<Compiled>;

    /// Validates and renders with `?` placeholders.
    fn build(&self) -> Result<Compiled> {
        self.compile(&RenderOptions::default())
    }
}

/// A query producing rows: a plain SELECT or a compound of them.
#[derive(Debug, Clone)]
pub enum Query {
    Select(Select),
    Compound(Compound),
}

impl Query {
    /// Output column names; `None` for unnamed expressions.
    pub fn output_names(&self) -> Vec<Option<String>> {
        match self {
            Query::Select(select) => select.output_names(),
            Query::Compound(compound) => compound.output_names(),
        }
    }

    /// Number of output columns.
    pub fn arity(&self) -> usize {
        match self {
            Query::Select(select) => select.arity(),
            Query::Compound(compound) => compound.arity(),
        }
    }
}

impl From<Select> for Query {
    fn from(select: Select) -> Self {
        Query::Select(select)
    }
}

impl From<&Select> for Query {
    fn from(select: &Select) -> Self {
        Query::Select(select.clone())
    }
}

impl From<Compound> for Query {
    fn from(compound: Compound) -> Self {
        Query::Compound(compound)
    }
}

impl From<&Compound> for Query {
    fn from(compound: &Compound) -> Self {
        Query::Compound(compound.clone())
    }
}

/// Every statement kind, as seen by the validator and renderer.
pub(crate) enum StatementRef<'a> {
    Query(&'a Query),
    Select(&'a Select),
    Compound(&'a Compound),
    Insert(&'a Insert),
    Update(&'a Update),
    Delete(&'a Delete),
    CreateTable(&'a CreateTable),
}

pub(crate) fn compile(statement: StatementRef<'_>, options: &RenderOptions) -> Result<Compiled> {
    validate::validate(&statement)?;
    let compiled = render::render(&statement, options)?;
    debug!(
        sql = %compiled.sql,
        params = compiled.params.len(),
        "compiled statement"
    );
    Ok(compiled)
}

macro_rules! statement {
    ($($ty:ident),*) => {
        $(
            impl Statement for $ty {
                fn compile(&self, options: &RenderOptions) -> Result<Compiled> {
                    compile(StatementRef::$ty(self), options)
                }
            }
        )*
    };
}

statement!(Query, Select, Compound, Insert, Update, Delete, CreateTable);
