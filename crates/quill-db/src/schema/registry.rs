//! Registry of table schemas.

use std::{
    any::TypeId,
    collections::{BTreeMap, HashMap},
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use serde::Serialize;
use tracing::debug;

use super::TableSchema;
use crate::{
    error::{DbError, Result},
    traits::Table,
};

static GLOBAL: LazyLock<SchemaRegistry> = LazyLock::new(SchemaRegistry::new);

/// The process-wide registry used by [`Table::table`].
pub fn global() -> &'static SchemaRegistry {
    &GLOBAL
}

/// Identity under which a schema is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableId {
    /// A Rust type implementing [`Table`].
    Type(TypeId, &'static str),
    /// A table declared at runtime.
    Named(String),
}

impl TableId {
    pub fn of<T: 'static>() -> Self {
        TableId::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    pub fn named(name: impl Into<String>) -> Self {
        TableId::Named(name.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: Option<&'static str>,
    pub is_primary: bool,
}

/// Read-only export of everything registered, for diagram and
/// documentation tooling.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaInfo {
    pub tables: BTreeMap<String, Vec<ColumnInfo>>,
    pub primary_keys: BTreeMap<String, Vec<String>>,
    pub relations: Vec<(String, String)>,
}

/// Map of table identities to their schemas.
///
/// Registration is serialized by the write lock; lookups share the read lock.
#[derive(Default)]
pub struct SchemaRegistry {
    tables: RwLock<HashMap<TableId, Arc<TableSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `schema` under `id`.
    ///
    /// Registering an identical schema again returns the existing entry. A
    /// different schema under the same identity is a definition error.
    pub fn register(&self, id: TableId, schema: TableSchema) -> Result<Arc<TableSchema>> {
        schema.validate()?;

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = tables.get(&id) {
            if **existing == schema {
                return Ok(existing.clone());
            }
            return Err(DbError::definition(
                schema.name(),
                "already registered with a different shape",
            ));
        }

        debug!(
            table = schema.name(),
            columns = schema.columns().len(),
            "registered table"
        );
        let schema = Arc::new(schema);
        tables.insert(id, schema.clone());
        Ok(schema)
    }

    pub fn register_table<T: Table>(&self) -> Result<Arc<TableSchema>> {
        self.register(TableId::of::<T>(), T::schema())
    }

    /// Returns the registered schema for `T`, registering it on first use.
    ///
    /// The descriptor is evaluated outside the lock so that it may itself
    /// touch the registry (foreign keys to other tables).
    pub fn get_or_register<T: Table>(&self) -> Result<Arc<TableSchema>> {
        if let Some(schema) = self.get::<T>() {
            return Ok(schema);
        }
        self.register_table::<T>()
    }

    pub fn lookup(&self, id: &TableId) -> Option<Arc<TableSchema>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn get<T: Table>(&self) -> Option<Arc<TableSchema>> {
        self.lookup(&TableId::of::<T>())
    }

    /// Finds a schema by its table name.
    pub fn find(&self, name: &str) -> Option<Arc<TableSchema>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|schema| schema.name() == name)
            .cloned()
    }

    /// All registered schemas, ordered by table name.
    pub fn tables(&self) -> Vec<Arc<TableSchema>> {
        let mut tables: Vec<_> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        tables.sort_by(|a, b| a.name().cmp(b.name()));
        tables
    }

    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn info(&self) -> SchemaInfo {
        let mut info = SchemaInfo::default();
        for schema in self.tables() {
            let columns = schema
                .columns()
                .iter()
                .map(|c| ColumnInfo {
                    name: c.name.clone(),
                    sql_type: c.domain.storage_class(),
                    is_primary: schema.is_primary(&c.name),
                })
                .collect();
            info.tables.insert(schema.name().to_string(), columns);
            info.primary_keys
                .insert(schema.name().to_string(), schema.primary_key().to_vec());
            for fk in schema.foreign_keys() {
                info.relations
                    .push((schema.name().to_string(), fk.target.clone()));
            }
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;

    fn bank(extra: bool) -> TableSchema {
        let mut builder = TableSchema::builder("Bank")
            .column(ColumnDef::of::<String>("name").primary());
        if extra {
            builder = builder.column(ColumnDef::of::<i64>("branches"));
        }
        builder.build()
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = SchemaRegistry::new();
        let first = registry.register(TableId::named("Bank"), bank(false)).unwrap();
        let second = registry.register(TableId::named("Bank"), bank(false)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_conflict() {
        let registry = SchemaRegistry::new();
        registry.register(TableId::named("Bank"), bank(false)).unwrap();

        let err = registry
            .register(TableId::named("Bank"), bank(true))
            .unwrap_err();
        assert!(matches!(err, DbError::Definition { .. }));
        assert_eq!(
            registry.lookup(&TableId::named("Bank")).unwrap().columns().len(),
            1
        );
    }

    #[test]
    fn test_register_validates() {
        let registry = SchemaRegistry::new();
        let schema = TableSchema::builder("Empty").build();
        assert!(registry.register(TableId::named("Empty"), schema).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_info_export() {
        let registry = SchemaRegistry::new();
        let bank = registry.register(TableId::named("Bank"), bank(false)).unwrap();
        let account = TableSchema::builder("Account")
            .column(ColumnDef::of::<String>("bank").primary())
            .column(ColumnDef::of::<i64>("money"))
            .foreign(crate::schema::ForeignKey::to_table(
                "_bank",
                ["bank"],
                &crate::expr::TableRef::new(bank),
                ["name"],
            ))
            .build();
        registry.register(TableId::named("Account"), account).unwrap();

        let info = registry.info();
        assert_eq!(info.tables.len(), 2);
        assert_eq!(info.primary_keys["Account"], ["bank"]);
        assert_eq!(
            info.relations,
            vec![("Account".to_string(), "Bank".to_string())]
        );
        let money = &info.tables["Account"][1];
        assert_eq!(money.sql_type, Some("INTEGER"));
        assert!(!money.is_primary);
    }
}
