//! Row-to-row navigation through foreign keys.
//!
//! Given a row value, build the SELECT that fetches what it references, or
//! what references it.

use rusqlite::types::Value;

use crate::{
    error::{DbError, Result},
    expr::{Expr, ForeignRef, TableRef},
    resolve::{conjunction, fk_columns, fk_target, named_fk},
    schema::{ForeignKey, TableSchema},
    traits::{IntoRow, Table},
};

use super::{select_all, Select};

/// Selects the row of `T` that `row` references.
///
/// `R` must declare exactly one foreign key onto `T`; use
/// [`map_foreign_by`] to pick one by name.
pub fn map_foreign<R, T>(row: R) -> Result<Select>
where
    R: Table + IntoRow,
    T: Table,
{
    let owner = R::table();
    let fk = only_foreign_key(&owner, T::table().table_name())?;
    map_foreign_by(row, &owner.foreign_key(&fk))
}

/// Selects the row that `row` references through `fk`.
pub fn map_foreign_by(row: impl IntoRow, fk: &ForeignRef) -> Result<Select> {
    let owner = &fk.table;
    let key = named_fk(owner, &fk.name)?;
    let schema = declared(owner)?;
    let target = fk_target(owner, key);

    let values = row.into_row();
    let eqs = fk_columns(key)?
        .into_iter()
        .map(|(local, remote)| Ok(target.col(remote).eq(value_of(schema, &values, local)?)))
        .collect::<Result<Vec<Expr>>>()?;
    Ok(filtered(&target, eqs))
}

/// Selects the rows of `R` that reference `row`.
///
/// `R` must declare exactly one foreign key onto `T`; use
/// [`pull_foreign_by`] to pick one by name.
pub fn pull_foreign<R, T>(row: T) -> Result<Select>
where
    R: Table,
    T: Table + IntoRow,
{
    let owner = R::table();
    let fk = only_foreign_key(&owner, T::table().table_name())?;
    pull_foreign_by(row, &owner.foreign_key(&fk))
}

/// Selects the rows that reference `row` through `fk`.
pub fn pull_foreign_by(row: impl IntoRow, fk: &ForeignRef) -> Result<Select> {
    let owner = &fk.table;
    let key = named_fk(owner, &fk.name)?;
    let target = fk_target(owner, key);
    let schema = declared(&target)?;

    let values = row.into_row();
    let eqs = fk_columns(key)?
        .into_iter()
        .map(|(local, remote)| Ok(owner.col(local).eq(value_of(schema, &values, remote)?)))
        .collect::<Result<Vec<Expr>>>()?;
    Ok(filtered(owner, eqs))
}

fn declared(table: &TableRef) -> Result<&TableSchema> {
    table.schema().map(|s| s.as_ref()).ok_or_else(|| {
        DbError::Resolution(format!("`{}` is not a declared table", table.visible_name()))
    })
}

fn only_foreign_key(owner: &TableRef, target: &str) -> Result<String> {
    let schema = declared(owner)?;
    let keys: Vec<&ForeignKey> = schema
        .foreign_keys()
        .filter(|fk| fk.target == target)
        .collect();
    match keys.as_slice() {
        [fk] => Ok(fk.name.clone()),
        [] => Err(DbError::Resolution(format!(
            "`{}` has no foreign key onto `{target}`",
            schema.name()
        ))),
        _ => Err(DbError::Resolution(format!(
            "`{}` has several foreign keys onto `{target}`: {}",
            schema.name(),
            keys.iter()
                .map(|fk| fk.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

fn value_of(schema: &TableSchema, values: &[Value], column: &str) -> Result<Value> {
    schema
        .column_names()
        .position(|c| c == column)
        .and_then(|idx| values.get(idx))
        .cloned()
        .ok_or_else(|| {
            DbError::Arity(format!(
                "the row carries no value for `{}.{column}`",
                schema.name()
            ))
        })
}

fn filtered(table: &TableRef, eqs: Vec<Expr>) -> Select {
    let query = select_all(table);
    match conjunction(eqs) {
        Some(pred) => query.filter(pred),
        None => query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{define_table, Statement};

    define_table! {
        #[derive(Debug, Clone, PartialEq)]
        struct Holder {
            name: String [primary],
            age: i64,
        }
    }

    define_table! {
        #[derive(Debug, Clone, PartialEq)]
        struct Ledger {
            bank: String [primary],
            holder: String [primary],
            money: i64,
        }
        constraints |t| {
            t.foreign(ForeignKey::to::<Holder>("_holder", ["holder"]))
        }
    }

    define_table! {
        #[derive(Debug, Clone, PartialEq)]
        struct Transfer {
            from_holder: String,
            to_holder: String,
        }
        constraints |t| {
            t.foreign(ForeignKey::to::<Holder>("_from", ["from_holder"]))
                .foreign(ForeignKey::to::<Holder>("_to", ["to_holder"]))
        }
    }

    fn ledger() -> Ledger {
        Ledger {
            bank: "V".into(),
            holder: "Alice".into(),
            money: 1000,
        }
    }

    #[test]
    fn test_map_foreign_selects_referenced_row() {
        let compiled = map_foreign::<Ledger, Holder>(ledger())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(compiled.sql, "SELECT name, age FROM Holder WHERE name = ?");
        assert_eq!(compiled.params, vec![Value::Text("Alice".into())]);
    }

    #[test]
    fn test_pull_foreign_selects_referencing_rows() {
        let alice = Holder {
            name: "Alice".into(),
            age: 18,
        };
        let compiled = pull_foreign::<Ledger, Holder>(alice)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT bank, holder, money FROM Ledger WHERE holder = ?"
        );
        assert_eq!(compiled.params, vec![Value::Text("Alice".into())]);
    }

    #[test]
    fn test_ambiguous_key_needs_a_name() {
        let transfer = Transfer {
            from_holder: "Alice".into(),
            to_holder: "Bob".into(),
        };
        let err = map_foreign::<Transfer, Holder>(transfer.clone()).unwrap_err();
        assert!(matches!(err, DbError::Resolution(ref m) if m.contains("_from, _to")));

        let compiled = map_foreign_by(transfer, &Transfer::foreign_key("_to"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(compiled.params, vec![Value::Text("Bob".into())]);

        let err = map_foreign::<Holder, Ledger>(Holder {
            name: "x".into(),
            age: 1,
        })
        .unwrap_err();
        assert!(matches!(err, DbError::Resolution(_)));
    }

    #[test]
    fn test_short_row_is_rejected() {
        let err = map_foreign_by(vec![Value::Text("V".into())], &Ledger::foreign_key("_holder"))
            .unwrap_err();
        assert!(matches!(err, DbError::Arity(_)));
    }
}
