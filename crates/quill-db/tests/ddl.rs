use quill_db::{
    define_table,
    expr::{func, lit},
    query::{create_table, delete_from, insert_into, select_all, update},
    schema::{ColumnDef, Domain, FkAction, ForeignKey, TableSchema},
    Database, DbError, Statement, Table,
};

define_table! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct A {
        pub a: i64,
        pub b: i64 = 0,
        pub c: String = String::new(),
        pub d: bool = true,
        pub e: bool = false,
        pub f: Option<String> = None,
    }
}

define_table! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Author {
        pub id: i64 [primary, autoincrement],
        pub name: String [unique],
        pub age: i64,
    }
    constraints |t| {
        t.check_column("_age", "age", |row| row.col("age").gt(10))
    }
}

define_table! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Book as "Book" {
        pub author: i64,
        pub title: String,
        pub added: String [domain = Domain::Timestamp],
    }
    constraints |t| {
        t.unique("_title", ["author", "title"])
            .foreign(ForeignKey::to::<Author>("_author", ["author"]).on_delete(FkAction::Cascade))
    }
}

define_table! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Misdeclared {
        pub code: String [primary, autoincrement],
        pub n: i64,
    }
}

define_table! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Floor {
        pub n: i64,
    }
    constraints |t| {
        t.check("_floor", |row| row.col("n").ge(-lit(-5)))
    }
}

#[test]
fn test_create_table_text() {
    let sql = create_table(&A::table()).build().unwrap().sql;
    assert_eq!(
        sql,
        "CREATE TABLE A (\n    [a] INTEGER NOT NULL ,\n    [b] INTEGER NOT NULL DEFAULT 0 ,\n    [c] TEXT NOT NULL DEFAULT '' ,\n    [d] BOOLEAN NOT NULL DEFAULT True ,\n    [e] BOOLEAN NOT NULL DEFAULT False ,\n    [f] TEXT DEFAULT NULL\n)"
    );

    let sql = create_table(&A::table()).if_not_exists().build().unwrap().sql;
    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS A (\n"));
}

#[test]
fn test_constraint_clauses() {
    let sql = create_table(&Author::table()).build().unwrap().sql;
    assert_eq!(
        sql,
        "CREATE TABLE Author (\n    [id] INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT ,\n    [name] TEXT NOT NULL UNIQUE ,\n    [age] INTEGER NOT NULL ,\n    CONSTRAINT _age CHECK (age > 10)\n)"
    );

    let sql = create_table(&Book::table()).build().unwrap().sql;
    assert_eq!(
        sql,
        "CREATE TABLE Book (\n    [author] INTEGER NOT NULL ,\n    [title] TEXT NOT NULL ,\n    [added] TEXT NOT NULL ,\n    CONSTRAINT _title UNIQUE ([author], [title]) ,\n    CONSTRAINT _author FOREIGN KEY ([author]) REFERENCES Author ([id]) ON DELETE CASCADE\n)"
    );
}

#[test]
fn test_composite_primary_key() {
    let schema = TableSchema::builder("Pair")
        .column(ColumnDef::of::<i64>("x").primary())
        .column(ColumnDef::of::<i64>("y").primary())
        .column(ColumnDef::new("payload", Domain::Any).nullable())
        .build();
    let table = quill_db::expr::TableRef::new(std::sync::Arc::new(schema));

    let sql = create_table(&table).build().unwrap().sql;
    assert_eq!(
        sql,
        "CREATE TABLE Pair (\n    [x] INTEGER NOT NULL ,\n    [y] INTEGER NOT NULL ,\n    [payload] ,\n    PRIMARY KEY ([x], [y])\n)"
    );
}

#[test]
fn test_defaults_round_trip() {
    let db = Database::open_in_memory().unwrap();
    db.create::<A>().unwrap();
    db.submit(&insert_into(&A::table()).set(&A::a(), 1)).unwrap();

    let rows: Vec<A> = db.fetch(&select_all(&A::table())).unwrap();
    assert_eq!(
        rows,
        vec![A {
            a: 1,
            b: 0,
            c: String::new(),
            d: true,
            e: false,
            f: None,
        }]
    );

    let stored = db.table_sql("A").unwrap().unwrap();
    assert!(stored.contains("[d] BOOLEAN NOT NULL DEFAULT True"));
}

#[test]
fn test_check_constraint_enforced() {
    let db = Database::open_in_memory().unwrap();
    db.create::<Author>().unwrap();

    let young = insert_into(&Author::table())
        .set(&Author::name(), "kid")
        .set(&Author::age(), 5);
    let err = db.submit(&young).unwrap_err();
    assert!(!err.is_construction());

    let ok = insert_into(&Author::table())
        .set(&Author::name(), "ann")
        .set(&Author::age(), 40);
    db.submit(&ok).unwrap();

    let count: Option<(i64,)> = db
        .fetch_one(&quill_db::query::select_from([func::count()]).from(&Author::table()))
        .unwrap();
    assert_eq!(count, Some((1,)));
}

#[test]
fn test_invalid_declaration_fails_every_statement() {
    let table = Misdeclared::table();
    let is_definition = |result: quill_db::Result<quill_db::Compiled>| {
        matches!(result, Err(DbError::Definition { ref table, .. }) if table.as_str() == "Misdeclared")
    };

    assert!(is_definition(create_table(&table).build()));
    assert!(is_definition(select_all(&table).build()));
    assert!(is_definition(
        quill_db::query::select_from([Misdeclared::n()]).build()
    ));
    assert!(is_definition(
        insert_into(&table)
            .set(&Misdeclared::code(), "x")
            .set(&Misdeclared::n(), 1)
            .build()
    ));
    assert!(is_definition(
        update(&table, [Misdeclared::n().set(2)]).build()
    ));
    assert!(is_definition(
        delete_from(&table).filter(Misdeclared::n().eq(1)).build()
    ));
}

#[test]
fn test_negated_negative_literal_in_check() {
    let sql = create_table(&Floor::table()).build().unwrap().sql;
    assert_eq!(
        sql,
        "CREATE TABLE Floor (\n    [n] INTEGER NOT NULL ,\n    CONSTRAINT _floor CHECK (n >= - -5)\n)"
    );

    let db = Database::open_in_memory().unwrap();
    db.create::<Floor>().unwrap();
    assert!(db.submit(&insert_into(&Floor::table()).set(&Floor::n(), 3)).is_err());
    db.submit(&insert_into(&Floor::table()).set(&Floor::n(), 7)).unwrap();
}
