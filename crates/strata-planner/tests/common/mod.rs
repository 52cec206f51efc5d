#![allow(dead_code)]

use bson::{Document, doc};
use strata_planner::{CollectionWriter, Database, ExecutionResult, PlannerConfig, PlannerError};
use strata_query::{Cardinality, OrderCondition, Relation, RelationSide, Request, Select};
use strata_store::MemoryStore;

pub const AUTHORS: &str = "authors";
pub const BOOKS: &str = "books";

pub fn temp_db() -> Database<MemoryStore> {
    temp_db_with(PlannerConfig::default())
}

pub fn temp_db_with(config: PlannerConfig) -> Database<MemoryStore> {
    init_tracing();
    Database::open(MemoryStore::new(), config).unwrap()
}

/// Route planner logs to the test harness. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn create_collections(db: &Database<MemoryStore>) {
    let txn = db.begin(false).unwrap();
    txn.create_collection(AUTHORS, &["name", "age", "verified"]).unwrap();
    txn.create_collection(BOOKS, &["name", "rating", "author_id"]).unwrap();
    txn.commit().unwrap();
}

pub fn insert(db: &Database<MemoryStore>, collection: &str, docs: &[Document]) -> Vec<String> {
    let txn = db.begin(false).unwrap();
    let desc = txn.collection(collection).unwrap();
    let writer = CollectionWriter::new(txn.datastore(), &desc);
    let keys = docs.iter().map(|d| writer.create(d).unwrap()).collect();
    txn.commit().unwrap();
    keys
}

pub struct Library {
    pub alice: String,
    pub bob: String,
    pub carol: String,
}

/// Three authors and four books, one of them pointing at a missing author.
pub fn seed_library(db: &Database<MemoryStore>) -> Library {
    create_collections(db);
    let authors = insert(
        db,
        AUTHORS,
        &[
            doc! { "name": "Alice", "age": 30, "verified": true },
            doc! { "name": "Bob", "age": 45, "verified": false },
            doc! { "name": "Carol", "age": 30, "verified": true },
        ],
    );
    let library = Library {
        alice: authors[0].clone(),
        bob: authors[1].clone(),
        carol: authors[2].clone(),
    };
    insert(
        db,
        BOOKS,
        &[
            doc! { "name": "Rust in Action", "rating": 4.5, "author_id": library.alice.as_str() },
            doc! { "name": "Tokio Deep Dive", "rating": 4.0, "author_id": library.alice.as_str() },
            doc! { "name": "Compilers", "rating": 3.0, "author_id": library.bob.as_str() },
            doc! { "name": "Orphan", "rating": 2.0, "author_id": "bae-missing" },
        ],
    );
    library
}

pub fn execute(db: &Database<MemoryStore>, request: &Request) -> Result<ExecutionResult, PlannerError> {
    let txn = db.begin(false)?;
    let result = txn.execute(request)?;
    txn.commit()?;
    Ok(result)
}

pub fn rows(db: &Database<MemoryStore>, request: &Request) -> Vec<Document> {
    execute(db, request).unwrap().into_rows()
}

pub fn explain(db: &Database<MemoryStore>, request: &Request) -> Document {
    match execute(db, request).unwrap() {
        ExecutionResult::Explain(doc) => doc,
        ExecutionResult::Rows(rows) => panic!("expected an explain report, got {} rows", rows.len()),
    }
}

/// Authors rendering `name` and `age`, ordered by name.
pub fn authors_by_name() -> (Select, usize, usize) {
    let mut select = Select::new(AUTHORS);
    let name = select.add_field("name");
    let age = select.add_field("age");
    select.order_by = vec![OrderCondition::asc(name)];
    (select, name, age)
}

/// The books of an author, rendering `name` and ordered by it.
/// Returns the selection and its `name` and `rating` slots.
pub fn books_of_author(name: &str) -> (Select, usize, usize) {
    let mut books = Select::new(BOOKS);
    books.name = name.to_string();
    let title = books.add_field("name");
    let rating = books.add_hidden_field("rating");
    let author_id = books.add_hidden_field("author_id");
    books.order_by = vec![OrderCondition::asc(title)];
    books.relation = Some(Relation {
        cardinality: Cardinality::Many,
        side: RelationSide::Secondary,
        foreign_key: author_id,
    });
    (books, title, rating)
}

pub fn names(rows: &[Document], key: &str) -> Vec<String> {
    rows.iter()
        .map(|r| r.get_str(key).unwrap_or_default().to_string())
        .collect()
}
