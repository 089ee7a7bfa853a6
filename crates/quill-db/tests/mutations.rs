use std::sync::Arc;

use quill_db::{
    define_table,
    expr::{lit, TableRef},
    query::{delete_from, insert_into, select_all, select_from, update, ConflictPolicy},
    schema::{ColumnDef, ForeignKey, SchemaRegistry, TableId, TableSchema},
    Database, DbError, Statement, Table,
};

define_table! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Counter {
        pub name: String [primary],
        pub hits: i64 = 0,
    }
}

define_table! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Visit {
        pub page: String,
        pub count: i64,
    }
}

fn counters() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.create::<Counter>().unwrap();
    db
}

fn all_counters(db: &Database) -> Vec<Counter> {
    db.fetch(&select_all(&Counter::table()).order_by([Counter::name()]))
        .unwrap()
}

fn bump(name: &str, by: i64) -> quill_db::query::Insert {
    let excluded = Counter::excluded();
    insert_into(&Counter::table())
        .set(&Counter::name(), name)
        .set(&Counter::hits(), by)
        .on_conflict([Counter::name()])
        .do_update([Counter::hits().set(Counter::hits() + excluded.col("hits"))])
}

#[test]
fn test_upsert_text() {
    let compiled = bump("home", 1).build().unwrap();
    assert_eq!(
        compiled.sql,
        "INSERT INTO Counter (name, hits) VALUES (?, ?) ON CONFLICT (name) DO UPDATE SET hits = hits + excluded.hits"
    );
    assert_eq!(compiled.params.len(), 2);
}

#[test]
fn test_upsert_accumulates() {
    let db = counters();
    db.submit(&bump("home", 1)).unwrap();
    db.submit(&bump("home", 2)).unwrap();
    db.submit(&bump("about", 5)).unwrap();

    assert_eq!(
        all_counters(&db),
        vec![
            Counter {
                name: "about".into(),
                hits: 5,
            },
            Counter {
                name: "home".into(),
                hits: 3,
            },
        ]
    );

    let ignore = insert_into(&Counter::table())
        .set(&Counter::name(), "home")
        .set(&Counter::hits(), 100)
        .on_conflict([Counter::name()])
        .do_nothing();
    db.submit(&ignore).unwrap();
    assert_eq!(all_counters(&db)[1].hits, 3);
}

#[test]
fn test_upsert_with_filter() {
    let db = counters();
    db.submit(&bump("home", 10)).unwrap();

    let capped = insert_into(&Counter::table())
        .set(&Counter::name(), "home")
        .set(&Counter::hits(), 1)
        .on_conflict([Counter::name()])
        .do_update_where(
            [Counter::hits().set(Counter::hits() + 1)],
            Counter::hits().lt(5),
        );
    assert_eq!(
        capped.build().unwrap().sql,
        "INSERT INTO Counter (name, hits) VALUES (?, ?) ON CONFLICT (name) DO UPDATE SET hits = hits + ? WHERE hits < ?"
    );
    db.submit(&capped).unwrap();
    assert_eq!(all_counters(&db)[0].hits, 10);
}

#[test]
fn test_insert_select_upsert_has_where() {
    let db = counters();
    db.create::<Visit>().unwrap();
    db.submit(&insert_into(&Visit::table()).rows([
        Visit {
            page: "home".into(),
            count: 2,
        },
        Visit {
            page: "blog".into(),
            count: 7,
        },
    ]))
    .unwrap();
    db.submit(&bump("home", 1)).unwrap();

    let excluded = Counter::excluded();
    let merge = insert_into(&Counter::table())
        .select(select_from([Visit::page(), Visit::count()]))
        .on_conflict([Counter::name()])
        .do_update([Counter::hits().set(Counter::hits() + excluded.col("hits"))]);
    assert_eq!(
        merge.build().unwrap().sql,
        "INSERT INTO Counter (name, hits) SELECT page, count FROM Visit WHERE true ON CONFLICT (name) DO UPDATE SET hits = hits + excluded.hits"
    );
    db.submit(&merge).unwrap();

    let hits: Vec<i64> = all_counters(&db).into_iter().map(|c| c.hits).collect();
    assert_eq!(hits, [7, 3]);
}

#[test]
fn test_insert_compound_upsert_has_where() {
    let db = counters();
    db.create::<Visit>().unwrap();
    db.submit(&insert_into(&Visit::table()).rows([
        Visit {
            page: "home".into(),
            count: 2,
        },
        Visit {
            page: "blog".into(),
            count: 7,
        },
    ]))
    .unwrap();
    db.submit(&bump("home", 1)).unwrap();

    let busy = select_from([Visit::page(), Visit::count()]).filter(Visit::count().gt(5));
    let every = select_from([Visit::page(), Visit::count()]);
    let merge = insert_into(&Counter::table())
        .select(busy | every)
        .on_conflict([Counter::name()])
        .do_nothing();
    assert_eq!(
        merge.build().unwrap().sql,
        "INSERT INTO Counter (name, hits) SELECT page, count FROM Visit WHERE count > ? UNION SELECT page, count FROM Visit WHERE true ON CONFLICT (name) DO NOTHING"
    );
    db.submit(&merge).unwrap();

    assert_eq!(
        all_counters(&db),
        vec![
            Counter {
                name: "blog".into(),
                hits: 7,
            },
            Counter {
                name: "home".into(),
                hits: 1,
            },
        ]
    );
}

#[test]
fn test_update_and_delete() {
    let db = counters();
    db.submit(&bump("a", 1)).unwrap();
    db.submit(&bump("b", 2)).unwrap();

    let double = update(&Counter::table(), [Counter::hits().set(Counter::hits() * 2)])
        .filter(Counter::name().eq("b"));
    assert_eq!(
        double.build().unwrap().sql,
        "UPDATE Counter SET hits = hits * ? WHERE name = ?"
    );
    assert_eq!(db.submit(&double).unwrap(), 1);

    let gone = delete_from(&Counter::table()).filter(Counter::hits().lt(2));
    assert_eq!(gone.build().unwrap().sql, "DELETE FROM Counter WHERE hits < ?");
    assert_eq!(db.submit(&gone).unwrap(), 1);

    assert_eq!(
        all_counters(&db),
        vec![Counter {
            name: "b".into(),
            hits: 4,
        }]
    );
}

#[test]
fn test_insert_policy_and_default_values() {
    let db = counters();
    db.submit(&bump("a", 1)).unwrap();

    let replace = insert_into(&Counter::table())
        .policy(ConflictPolicy::Replace)
        .rows([Counter {
            name: "a".into(),
            hits: 9,
        }]);
    assert_eq!(
        replace.build().unwrap().sql,
        "INSERT OR REPLACE INTO Counter (name, hits) VALUES (?, ?)"
    );
    db.submit(&replace).unwrap();
    assert_eq!(all_counters(&db)[0].hits, 9);

    let defaults = insert_into(&Counter::table()).build().unwrap();
    assert_eq!(defaults.sql, "INSERT INTO Counter DEFAULT VALUES");
}

#[test]
fn test_validation_leaves_data_untouched() {
    let db = counters();
    db.submit(&bump("a", 1)).unwrap();
    let before = all_counters(&db);

    let bad = update(&Counter::table(), [Counter::hits().set(0)])
        .filter(Counter::col("missing").eq(1));
    let err = db.submit(&bad).unwrap_err();
    assert!(matches!(err, DbError::UnknownColumn { .. }));
    assert!(err.is_construction());

    let visit = Visit::table();
    let bad = delete_from(&Counter::table()).filter(visit.col("page").eq("a"));
    let err = db.submit(&bad).unwrap_err();
    assert!(matches!(err, DbError::UnknownTable(_)));

    let bad = insert_into(&Counter::table()).values([lit("only one")]);
    assert!(matches!(db.submit(&bad).unwrap_err(), DbError::Arity(_)));

    assert_eq!(all_counters(&db), before);
}

fn shop(extra: bool) -> TableSchema {
    let mut builder = TableSchema::builder("Shop").column(ColumnDef::of::<i64>("id").primary());
    if extra {
        builder = builder.column(ColumnDef::of::<String>("city"));
    }
    builder.build()
}

#[test]
fn test_registration_is_idempotent() {
    let registry = SchemaRegistry::new();
    let first = registry.register(TableId::named("shop"), shop(false)).unwrap();
    let again = registry.register(TableId::named("shop"), shop(false)).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(registry.len(), 1);

    let err = registry
        .register(TableId::named("shop"), shop(true))
        .unwrap_err();
    assert!(matches!(err, DbError::Definition { .. }));
    assert_eq!(registry.lookup(&TableId::named("shop")).unwrap().columns().len(), 1);
}

#[test]
fn test_schema_info_export() {
    let registry = SchemaRegistry::new();
    let shop = registry.register(TableId::named("shop"), shop(false)).unwrap();
    let shop_ref = TableRef::new(shop);
    let stock = TableSchema::builder("Stock")
        .column(ColumnDef::of::<i64>("shop"))
        .column(ColumnDef::of::<i64>("qty"))
        .foreign(ForeignKey::to_table("_shop", ["shop"], &shop_ref, ["id"]))
        .build();
    registry.register(TableId::named("stock"), stock).unwrap();

    let info = registry.info();
    assert_eq!(info.relations, vec![("Stock".to_string(), "Shop".to_string())]);
    assert_eq!(info.primary_keys["Shop"], ["id".to_string()]);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["tables"]["Stock"][1]["name"], "qty");
    assert_eq!(json["tables"]["Shop"][0]["type"], "INTEGER");
    assert_eq!(json["tables"]["Shop"][0]["is_primary"], true);
}
