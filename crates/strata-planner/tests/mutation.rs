mod common;
use common::*;

use bson::doc;
use strata_planner::{PlannerError, doc_key_for};
use strata_query::{Condition, DELETED_FIELD, Mutation, Request, Select};

#[test]
fn create_returns_the_new_document() {
    let db = temp_db();
    create_collections(&db);

    let (mut select, _, _) = authors_by_name();
    select.render_key();
    let input = doc! { "name": "Dana", "age": 28 };
    let rows = rows(&db, &Request::mutation(Mutation::create(select, input.clone())));

    let key = doc_key_for(&input).unwrap();
    assert_eq!(rows, vec![doc! { "name": "Dana", "age": 28, "_key": key }]);

    let (select, _, _) = authors_by_name();
    assert_eq!(names(&common::rows(&db, &Request::select(select)), "name"), vec!["Dana"]);
}

#[test]
fn creating_the_same_document_twice_fails() {
    let db = temp_db();
    seed_library(&db);

    let (select, _, _) = authors_by_name();
    let input = doc! { "name": "Alice", "age": 30, "verified": true };
    let err = execute(&db, &Request::mutation(Mutation::create(select, input))).unwrap_err();
    assert!(matches!(err, PlannerError::DocumentExists(_)), "{err}");
}

#[test]
fn create_rejects_unknown_fields() {
    let db = temp_db();
    create_collections(&db);

    let (select, _, _) = authors_by_name();
    let err = execute(&db, &Request::mutation(Mutation::create(select, doc! { "nickname": "D" }))).unwrap_err();
    assert!(matches!(err, PlannerError::FieldNotFound(_)), "{err}");
}

#[test]
fn update_by_filter() {
    let db = temp_db();
    seed_library(&db);

    let mut select = Select::new(AUTHORS);
    let name = select.add_field("name");
    select.add_field("verified");
    let mut mutation = Mutation::update(select, doc! { "verified": true });
    mutation.filter = Some(Condition::eq(name, "Bob"));

    let rows = rows(&db, &Request::mutation(mutation));
    assert_eq!(rows, vec![doc! { "name": "Bob", "verified": true }]);

    let (mut check, _, _) = authors_by_name();
    let verified = check.add_field("verified");
    check.filter = Some(Condition::eq(verified, true));
    assert_eq!(
        names(&common::rows(&db, &Request::select(check)), "name"),
        vec!["Alice", "Bob", "Carol"]
    );
}

#[test]
fn update_by_keys() {
    let db = temp_db();
    let library = seed_library(&db);

    let (select, _, _) = authors_by_name();
    let mut mutation = Mutation::update(select, doc! { "age": 31 });
    mutation.doc_keys = Some(vec![library.carol.clone()]);

    let rows = rows(&db, &Request::mutation(mutation));
    assert_eq!(rows, vec![doc! { "name": "Carol", "age": 31 }]);
}

#[test]
fn update_matching_nothing_returns_nothing() {
    let db = temp_db();
    seed_library(&db);

    let (select, name, _) = authors_by_name();
    let mut mutation = Mutation::update(select, doc! { "age": 99 });
    mutation.filter = Some(Condition::eq(name, "Nobody"));
    assert!(rows(&db, &Request::mutation(mutation)).is_empty());
}

#[test]
fn delete_returns_what_it_removed() {
    let db = temp_db();
    let library = seed_library(&db);

    let (select, _, age) = authors_by_name();
    let mut mutation = Mutation::delete(select);
    mutation.filter = Some(Condition::eq(age, 30));

    let deleted = rows(&db, &Request::mutation(mutation));
    assert_eq!(
        deleted,
        vec![doc! { "name": "Alice", "age": 30 }, doc! { "name": "Carol", "age": 30 }]
    );

    let (select, _, _) = authors_by_name();
    assert_eq!(names(&common::rows(&db, &Request::select(select)), "name"), vec!["Bob"]);

    // Deleted documents stay readable on request.
    let (mut select, _, _) = authors_by_name();
    select.show_deleted = true;
    select.render_key();
    let flag = select.mapping.add_next(DELETED_FIELD);
    select.mapping.add_render(flag, DELETED_FIELD);
    let all = common::rows(&db, &Request::select(select));
    assert_eq!(names(&all, "name"), vec!["Alice", "Bob", "Carol"]);
    for row in &all {
        let key = row.get_str("_key").unwrap();
        let expected = key != library.bob;
        assert_eq!(row.get_bool(DELETED_FIELD).unwrap(), expected, "{key}");
    }
}

#[test]
fn deleting_by_key_twice_finds_nothing_the_second_time() {
    let db = temp_db();
    let library = seed_library(&db);

    let delete_bob = || {
        let (select, _, _) = authors_by_name();
        let mut mutation = Mutation::delete(select);
        mutation.doc_keys = Some(vec![library.bob.clone()]);
        Request::mutation(mutation)
    };
    assert_eq!(names(&rows(&db, &delete_bob()), "name"), vec!["Bob"]);
    assert!(rows(&db, &delete_bob()).is_empty());
}
