//! Execution against a SQLite connection.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use tracing::trace;

use crate::{
    error::Result,
    query::{create_table, Compiled, Statement},
    render::RenderOptions,
    traits::{FromRow, Table},
};

/// Runs compiled statements.
pub trait Executor {
    /// Executes a statement, returning the number of changed rows.
    fn execute(&self, compiled: &Compiled) -> Result<usize>;

    /// Runs a query and maps every row.
    fn query<R: FromRow>(&self, compiled: &Compiled) -> Result<Vec<R>>;
}

/// A shared SQLite connection.
///
/// # Example
///
/// ```ignore
/// let db = Database::open_in_memory()?;
/// db.create::<Person>()?;
/// db.submit(&insert_into(&Person::table()).rows([alice]))?;
/// let people: Vec<Person> = db.fetch(&select_all(&Person::table()))?;
/// ```
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    options: RenderOptions,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Database {
            conn: Arc::new(Mutex::new(conn)),
            options: RenderOptions::default(),
        }
    }

    /// Uses `options` when compiling submitted statements.
    pub fn with_options(self, options: RenderOptions) -> Self {
        Self { options, ..self }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Toggles `PRAGMA foreign_keys`.
    pub fn set_foreign_keys(&self, enabled: bool) -> Result<()> {
        let pragma = if enabled { "ON" } else { "OFF" };
        self.execute_batch(&format!("PRAGMA foreign_keys = {pragma};"))
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Compiles and executes a statement.
    pub fn submit<S: Statement>(&self, statement: &S) -> Result<usize> {
        let compiled = statement.compile(&self.options)?;
        self.execute(&compiled)
    }

    /// Compiles and runs a query.
    pub fn fetch<R: FromRow, S: Statement>(&self, statement: &S) -> Result<Vec<R>> {
        let compiled = statement.compile(&self.options)?;
        self.query(&compiled)
    }

    pub fn fetch_one<R: FromRow, S: Statement>(&self, statement: &S) -> Result<Option<R>> {
        Ok(self.fetch(statement)?.into_iter().next())
    }

    /// Rows as raw values, in projection order.
    pub fn fetch_values<S: Statement>(&self, statement: &S) -> Result<Vec<Vec<Value>>> {
        self.fetch(statement)
    }

    /// Creates the table for `T` unless it exists.
    pub fn create<T: Table>(&self) -> Result<()> {
        self.submit(&create_table(&T::table()).if_not_exists())?;
        Ok(())
    }

    /// The stored CREATE statement of a table, if it exists.
    pub fn table_sql(&self, name: &str) -> Result<Option<String>> {
        let sql = self
            .lock()
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(sql)
    }
}

impl Executor for Database {
    fn execute(&self, compiled: &Compiled) -> Result<usize> {
        let conn = self.lock();
        let changed = conn.execute(&compiled.sql, params_from_iter(compiled.params.iter()))?;
        trace!(changed, "executed statement");
        Ok(changed)
    }

    fn query<R: FromRow>(&self, compiled: &Compiled) -> Result<Vec<R>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&compiled.sql)?;
        let rows = stmt.query_map(params_from_iter(compiled.params.iter()), R::from_row)?;
        let rows = rows.collect::<rusqlite::Result<Vec<R>>>()?;
        trace!(rows = rows.len(), "fetched rows");
        Ok(rows)
    }
}
