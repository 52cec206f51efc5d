mod common;
use common::*;

use strata_planner::{Arena, NodeId, NodeKind, Planner, PlannerConfig};
use strata_query::{DocumentMapping, Request};

fn drain(arena: &mut Arena<'_>, root: NodeId, mapping: &DocumentMapping) -> Vec<bson::Document> {
    arena.init(root).unwrap();
    arena.start(root).unwrap();
    let mut out = Vec::new();
    while arena.next(root).unwrap() {
        out.push(mapping.to_map(arena.value(root).unwrap()));
    }
    out
}

#[test]
fn plan_can_run_again_after_close() {
    let db = temp_db();
    seed_library(&db);

    let (mut authors, _, _) = authors_by_name();
    let (books, _, _) = books_of_author("books");
    authors.add_child(books, true);
    let mapping = authors.mapping.clone();
    let request = Request::select(authors);

    let txn = db.begin(true).unwrap();
    let mut planner = Planner::new(txn.datastore(), PlannerConfig::default());
    let root = planner.new_plan(&request).unwrap();
    planner.expand_plan(root).unwrap();
    let arena = planner.arena_mut();

    let first = drain(arena, root, &mapping);
    arena.close(root).unwrap();
    arena.close(root).unwrap();
    let second = drain(arena, root, &mapping);
    arena.close(root).unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[test]
fn unexpanded_select_reports_unwired_stages() {
    let db = temp_db();
    seed_library(&db);

    let (select, _, _) = authors_by_name();
    let txn = db.begin(true).unwrap();
    let mut planner = Planner::new(txn.datastore(), PlannerConfig::default());
    let root = planner.new_plan(&Request::select(select)).unwrap();
    assert_eq!(planner.arena().kind(root).unwrap(), NodeKind::SelectTop);

    assert!(planner.arena_mut().init(root).is_err());
}
