mod common;
use common::*;

use bson::{Bson, Document, doc};
use strata_planner::{Block, CollectionWriter, Database, HEAD_LINK, HeadStoreKey, Link, PlannerConfig, PlannerError};
use strata_query::{CommitSelect, Limit, OrderCondition, Request, Select};
use strata_store::{Datastore, MemoryStore, Region};

/// Alice, created once and then aged twice.
fn aging_author(db: &Database<MemoryStore>) -> String {
    create_collections(db);
    let key = insert(db, AUTHORS, &[doc! { "name": "Alice", "age": 30 }]).remove(0);
    for age in [31, 32] {
        let txn = db.begin(false).unwrap();
        let desc = txn.collection(AUTHORS).unwrap();
        CollectionWriter::new(txn.datastore(), &desc)
            .update(&key, &doc! { "age": age })
            .unwrap();
        txn.commit().unwrap();
    }
    key
}

fn rows_of(db: &Database<MemoryStore>, commits: CommitSelect) -> Vec<Document> {
    rows(db, &Request::commits(commits))
}

fn heights(rows: &[Document]) -> Vec<i64> {
    rows.iter().map(|r| r.get_i64("height").unwrap()).collect()
}

fn cids(rows: &[Document]) -> Vec<String> {
    rows.iter().map(|r| r.get_str("cid").unwrap().to_string()).collect()
}

#[test]
fn full_history_walks_back_from_the_head() {
    let db = temp_db();
    let key = aging_author(&db);

    let rows = rows(&db, &Request::commits(CommitSelect::all(&key)));
    assert_eq!(heights(&rows), vec![3, 2, 1]);
    for row in &rows {
        assert_eq!(row.get_str("docKey").unwrap(), key);
        assert_eq!(row.get("fieldName"), Some(&Bson::Null));
    }
    assert_eq!(rows[2].get_document("delta").unwrap(), &doc! { "name": "Alice", "age": 30 });
}

#[test]
fn head_links_point_at_the_previous_commit() {
    let db = temp_db();
    let key = aging_author(&db);

    let rows = rows(&db, &Request::commits(CommitSelect::all(&key)));
    let cids = cids(&rows);
    let links = rows[0].get_array("links").unwrap();
    assert_eq!(links.len(), 2);

    let Bson::Document(field_link) = &links[0] else {
        panic!("link is not a document: {:?}", links[0]);
    };
    assert_eq!(field_link.get_str("name").unwrap(), "age");

    let Bson::Document(head_link) = &links[1] else {
        panic!("link is not a document: {:?}", links[1]);
    };
    assert_eq!(head_link.get_str("name").unwrap(), HEAD_LINK);
    assert_eq!(head_link.get_str("cid").unwrap(), cids[1]);

    let first_links = rows[2].get_array("links").unwrap();
    assert!(first_links.iter().all(|l| match l {
        Bson::Document(d) => d.get_str("name").unwrap() != HEAD_LINK,
        _ => false,
    }));
}

#[test]
fn latest_commits_only_yield_heads() {
    let db = temp_db();
    let key = aging_author(&db);

    let rows = rows(&db, &Request::commits(CommitSelect::latest(&key)));
    assert_eq!(heights(&rows), vec![3]);
}

#[test]
fn configured_default_depth_bounds_the_walk() {
    let db = temp_db_with(PlannerConfig {
        default_commit_depth: Some(2),
        ..PlannerConfig::default()
    });
    let key = aging_author(&db);

    let rows = rows(&db, &Request::commits(CommitSelect::all(&key)));
    assert_eq!(heights(&rows), vec![3, 2]);

    // An explicit depth wins over the default.
    let mut commits = CommitSelect::all(&key);
    commits.depth = Some(3);
    assert_eq!(heights(&rows_of(&db, commits)), vec![3, 2, 1]);
}

#[test]
fn document_and_cid_yield_only_that_commit() {
    let db = temp_db();
    let key = aging_author(&db);
    let all = cids(&rows(&db, &Request::commits(CommitSelect::all(&key))));

    let mut commits = CommitSelect::all(&key);
    commits.cid = Some(all[1].clone());
    let rows = rows_of(&db, commits);
    assert_eq!(cids(&rows), vec![all[1].clone()]);
    assert_eq!(heights(&rows), vec![2]);
}

#[test]
fn cid_alone_yields_only_that_commit() {
    let db = temp_db();
    let key = aging_author(&db);
    let all = cids(&rows(&db, &Request::commits(CommitSelect::all(&key))));

    let mut commits = CommitSelect::new("commits");
    commits.cid = Some(all[1].clone());
    let rows = rows_of(&db, commits);
    assert_eq!(cids(&rows), vec![all[1].clone()]);
    assert_eq!(heights(&rows), vec![2]);
}

#[test]
fn shared_ancestor_of_two_heads_is_yielded_once() {
    let db = temp_db();
    create_collections(&db);
    let doc_key = "bae-forked";
    let block = |priority: u64, name: &str, links: Vec<Link>| Block {
        priority,
        schema_version_id: "v1".to_string(),
        field_name: "C".to_string(),
        doc_key: doc_key.to_string(),
        data: Bson::Document(doc! { "name": name }),
        links,
    };

    let txn = db.begin(false).unwrap();
    let ds = txn.datastore();
    let base = ds.put_block(&block(1, "Alice", Vec::new()).encode().unwrap()).unwrap();
    for name in ["Alicia", "Ally"] {
        let head = ds
            .put_block(&block(2, name, vec![Link::head(base.clone())]).encode().unwrap())
            .unwrap();
        let key = HeadStoreKey::new(doc_key, "C").with_cid(head);
        ds.put(Region::Heads, &key.bytes(), b"2").unwrap();
    }
    txn.commit().unwrap();

    let rows = rows(&db, &Request::commits(CommitSelect::all(doc_key)));
    let cids = cids(&rows);
    assert_eq!(rows.len(), 3);
    assert_eq!(cids.iter().filter(|c| **c == base.to_string()).count(), 1);
    let mut heights = heights(&rows);
    heights.sort_unstable();
    assert_eq!(heights, vec![1, 2, 2]);
}

#[test]
fn commits_need_a_document_or_a_cid() {
    let db = temp_db();
    aging_author(&db);

    let err = execute(&db, &Request::commits(CommitSelect::new("commits"))).unwrap_err();
    assert!(matches!(err, PlannerError::InvalidRequest(_)), "{err}");
}

#[test]
fn field_history_is_keyed_by_field_id() {
    let db = temp_db();
    let key = aging_author(&db);
    let desc = db.begin(true).unwrap().collection(AUTHORS).unwrap();
    let age = desc.field("age").unwrap();

    let mut commits = CommitSelect::all(&key);
    commits.field = Some(age.id.to_string());
    let rows = rows_of(&db, commits);
    assert_eq!(heights(&rows), vec![3, 2, 1]);
    assert!(rows.iter().all(|r| r.get_str("fieldName").unwrap() == "age"));
    assert_eq!(rows[0].get("delta"), Some(&Bson::Int32(32)));
}

#[test]
fn commits_can_be_ordered_and_limited() {
    let db = temp_db();
    let key = aging_author(&db);

    let mut commits = CommitSelect::all(&key);
    let height = commits.mapping.first_index_of_name(CommitSelect::HEIGHT).unwrap();
    commits.order_by = vec![OrderCondition::asc(height)];
    commits.limit = Some(Limit::new(2));
    assert_eq!(heights(&rows_of(&db, commits)), vec![1, 2]);
}

#[test]
fn undecodable_block_is_malformed() {
    let db = temp_db();
    create_collections(&db);

    let txn = db.begin(false).unwrap();
    let cid = txn.datastore().put_block(b"not a block").unwrap();
    txn.commit().unwrap();

    let mut commits = CommitSelect::new("commits");
    commits.cid = Some(cid.to_string());
    let err = execute(&db, &Request::commits(commits)).unwrap_err();
    assert!(matches!(err, PlannerError::MalformedBlock { ref cid, .. } if !cid.is_empty()), "{err}");
}

#[test]
fn version_join_yields_the_latest_composite_commit() {
    let db = temp_db();
    create_collections(&db);
    let key = insert(&db, AUTHORS, &[doc! { "name": "Bob", "age": 45 }]).remove(0);
    {
        let txn = db.begin(false).unwrap();
        let desc = txn.collection(AUTHORS).unwrap();
        CollectionWriter::new(txn.datastore(), &desc)
            .update(&key, &doc! { "verified": true })
            .unwrap();
        txn.commit().unwrap();
    }

    let mut authors = Select::new(AUTHORS);
    authors.add_field("name");
    authors.add_commits(CommitSelect::new("_version"));
    let rows = rows(&db, &Request::select(authors));
    assert_eq!(rows.len(), 1);

    let version = rows[0].get_array("_version").unwrap();
    assert_eq!(version.len(), 1);
    let Bson::Document(head) = &version[0] else {
        panic!("version entry is not a document");
    };
    assert_eq!(head.get_i64("height").unwrap(), 2);
    assert_eq!(head.get_str("docKey").unwrap(), key);
}
