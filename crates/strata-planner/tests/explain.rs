mod common;
use common::*;

use bson::{Bson, Document, doc};
use strata_planner::PlannerConfig;
use strata_query::{Condition, ExplainMode, Mutation, Request, Select};

fn at<'d>(doc: &'d Document, path: &[&str]) -> &'d Document {
    path.iter().fold(doc, |d, key| {
        d.get_document(key)
            .unwrap_or_else(|_| panic!("missing {key} in {d}"))
    })
}

#[test]
fn simple_explain_reports_attributes_without_running() {
    let db = temp_db();
    seed_library(&db);

    let mut select = Select::new(AUTHORS);
    let age = select.add_field("age");
    select.filter = Some(Condition::eq(age, 30));
    let report = explain(&db, &Request::select(select).explain(ExplainMode::Simple));

    let scan = at(&report, &["explain", "selectTopNode", "selectNode", "scanNode"]);
    assert_eq!(scan.get_str("collectionName").unwrap(), AUTHORS);
    assert_eq!(scan.get_str("collectionID").unwrap(), "1");
    assert!(matches!(scan.get("filter"), Some(Bson::Document(_))));
    assert_eq!(scan.get_array("spans").unwrap().len(), 1);
    assert!(!scan.get_bool("reverse").unwrap());
    assert!(scan.get("iterations").is_none());

    let select = at(&report, &["explain", "selectTopNode", "selectNode"]);
    assert_eq!(select.get("filter"), Some(&Bson::Null));
}

#[test]
fn simple_explain_can_include_counters() {
    let db = temp_db_with(PlannerConfig {
        explain_counters: true,
        ..PlannerConfig::default()
    });
    seed_library(&db);

    let report = explain(&db, &Request::select(Select::new(AUTHORS)).explain(ExplainMode::Simple));
    let scan = at(&report, &["explain", "selectTopNode", "selectNode", "scanNode"]);
    assert_eq!(scan.get_i64("iterations").unwrap(), 0);
    assert_eq!(scan.get_str("collectionName").unwrap(), AUTHORS);
}

#[test]
fn debug_explain_keeps_only_the_shape() {
    let db = temp_db();
    seed_library(&db);

    let (select, _, _) = authors_by_name();
    let report = explain(&db, &Request::select(select).explain(ExplainMode::Debug));
    assert_eq!(
        report,
        doc! { "explain": { "selectTopNode": { "orderNode": { "selectNode": { "scanNode": {} } } } } }
    );
}

#[test]
fn execute_explain_reports_counters() {
    let db = temp_db();
    seed_library(&db);

    let (mut select, _, age) = authors_by_name();
    select.filter = Some(Condition::eq(age, 30));
    let report = explain(&db, &Request::select(select).explain(ExplainMode::Execute));

    let scan = at(&report, &["explain", "selectTopNode", "orderNode", "selectNode", "scanNode"]);
    assert_eq!(scan.get_i64("iterations").unwrap(), 3);
    assert_eq!(scan.get_i64("docFetches").unwrap(), 3);
    assert_eq!(scan.get_i64("fieldFetches").unwrap(), 6);
    assert_eq!(scan.get_i64("filterMatches").unwrap(), 2);
    assert!(scan.get("collectionName").is_none());

    let order = at(&report, &["explain", "selectTopNode", "orderNode"]);
    assert_eq!(order.get_i64("iterations").unwrap(), 3);
}

#[test]
fn join_explain_names_the_strategy() {
    let db = temp_db();
    seed_library(&db);

    let (mut authors, _, _) = authors_by_name();
    let (books, _, _) = books_of_author("books");
    authors.add_child(books, true);
    let report = explain(&db, &Request::select(authors).explain(ExplainMode::Simple));

    let join = at(&report, &["explain", "selectTopNode", "orderNode", "selectNode", "typeIndexJoin"]);
    assert_eq!(join.get_str("joinType").unwrap(), "typeJoinMany");
    assert_eq!(join.get_str("rootName").unwrap(), AUTHORS);
    assert_eq!(join.get_str("subTypeName").unwrap(), "books");
    assert_eq!(at(join, &["root", "scanNode"]).get_str("collectionName").unwrap(), AUTHORS);
    assert!(join.get_document("subType").unwrap().contains_key("selectTopNode"));
}

#[test]
fn several_joins_explain_as_parallel_readers() {
    let db = temp_db();
    seed_library(&db);

    let (mut authors, _, _) = authors_by_name();
    authors.add_child(books_of_author("books").0, true);
    authors.add_child(books_of_author("moreBooks").0, true);
    let report = explain(&db, &Request::select(authors).explain(ExplainMode::Simple));

    let parallel = at(&report, &["explain", "selectTopNode", "orderNode", "selectNode", "parallelNode"]);
    let children = parallel.get_array("children").unwrap();
    assert_eq!(children.len(), 2);
    for child in children {
        let Bson::Document(child) = child else {
            panic!("child is not a document");
        };
        let readers = at(child, &["typeIndexJoin", "root", "multiScanNode"]);
        assert_eq!(readers.get_i64("readers").unwrap(), 2);
    }
}

#[test]
fn explaining_a_mutation_does_not_write() {
    let db = temp_db();
    create_collections(&db);

    let (select, _, _) = authors_by_name();
    let input = doc! { "name": "Dana" };
    let request = Request::mutation(Mutation::create(select, input.clone())).explain(ExplainMode::Simple);
    let report = explain(&db, &request);

    let create = at(&report, &["explain", "createNode"]);
    assert_eq!(create.get_str("collectionName").unwrap(), AUTHORS);
    assert_eq!(create.get_document("data").unwrap(), &input);

    let (select, _, _) = authors_by_name();
    assert!(rows(&db, &Request::select(select)).is_empty());
}
