mod common;
use common::*;

use bson::{Bson, doc};
use strata_query::{
    AggregateTarget, Cardinality, CompareOp, Condition, GROUP_FIELD, GroupBy, Limit, OrderCondition, Relation,
    RelationSide, Request, Select,
};

/// Authors grouped by age, ordered by age, with the grouped names in `_group`.
fn authors_by_age() -> (Select, usize, usize, usize) {
    let mut select = Select::new(AUTHORS);
    let age = select.add_field("age");
    let name = select.add_hidden_field("name");
    select.group_by = Some(GroupBy { fields: vec![age] });
    select.order_by = vec![OrderCondition::asc(age)];

    let mut group = select.group_child();
    group.render_existing("name");
    group.order_by = vec![OrderCondition::asc(name)];
    let group_index = select.add_child(group, true);
    (select, age, name, group_index)
}

#[test]
fn rows_are_partitioned_by_value() {
    let db = temp_db();
    seed_library(&db);

    let (select, _, _, _) = authors_by_age();
    let rows = rows(&db, &Request::select(select));
    assert_eq!(
        rows,
        vec![
            doc! { "age": 30, "_group": [{ "name": "Alice" }, { "name": "Carol" }] },
            doc! { "age": 45, "_group": [{ "name": "Bob" }] },
        ]
    );
}

#[test]
fn parent_filter_limits_groups_and_their_rows() {
    let db = temp_db();
    seed_library(&db);

    let (mut select, _, name, _) = authors_by_age();
    select.filter = Some(Condition::field(name, CompareOp::Ne, "Carol"));
    let rows = rows(&db, &Request::select(select));
    assert_eq!(
        rows,
        vec![
            doc! { "age": 30, "_group": [{ "name": "Alice" }] },
            doc! { "age": 45, "_group": [{ "name": "Bob" }] },
        ]
    );
}

#[test]
fn parent_filter_drops_groups_without_rows() {
    let db = temp_db();
    seed_library(&db);

    let (mut select, age, _, _) = authors_by_age();
    select.filter = Some(Condition::field(age, CompareOp::Lt, 40));
    let rows = rows(&db, &Request::select(select));
    assert_eq!(rows, vec![doc! { "age": 30, "_group": [{ "name": "Alice" }, { "name": "Carol" }] }]);
}

#[test]
fn group_child_filter_applies_per_group() {
    let db = temp_db();
    seed_library(&db);

    let mut select = Select::new(AUTHORS);
    let age = select.add_field("age");
    let name = select.add_hidden_field("name");
    select.group_by = Some(GroupBy { fields: vec![age] });
    select.order_by = vec![OrderCondition::asc(age)];

    let mut group = select.group_child();
    group.render_existing("name");
    group.filter = Some(Condition::field(name, CompareOp::Ne, "Alice"));
    select.add_child(group, true);

    let rows = rows(&db, &Request::select(select));
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].get_array(GROUP_FIELD).unwrap(),
        &vec![Bson::Document(doc! { "name": "Carol" })]
    );
    assert_eq!(
        rows[1].get_array(GROUP_FIELD).unwrap(),
        &vec![Bson::Document(doc! { "name": "Bob" })]
    );
}

#[test]
fn child_window_hides_rows_but_count_sees_them() {
    let db = temp_db();
    seed_library(&db);

    let mut select = Select::new(AUTHORS);
    let age = select.add_field("age");
    let name = select.add_hidden_field("name");
    select.group_by = Some(GroupBy { fields: vec![age] });
    select.order_by = vec![OrderCondition::asc(age)];

    let mut group = select.group_child();
    group.render_existing("name");
    group.order_by = vec![OrderCondition::asc(name)];
    group.limit = Some(Limit::new(1));
    let group_index = select.add_child(group, true);
    select.add_count("_count", AggregateTarget::host(group_index));

    let rows = rows(&db, &Request::select(select));
    assert_eq!(
        rows,
        vec![
            doc! { "age": 30, "_group": [{ "name": "Alice" }], "_count": 2i64 },
            doc! { "age": 45, "_group": [{ "name": "Bob" }], "_count": 1i64 },
        ]
    );
}

#[test]
fn parent_limit_applies_to_groups() {
    let db = temp_db();
    seed_library(&db);

    let (mut select, _, _, _) = authors_by_age();
    select.limit = Some(Limit::new(1));
    let rows = rows(&db, &Request::select(select));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_i32("age").unwrap(), 30);
}

#[test]
fn grouping_without_a_child_selection_keeps_raw_rows() {
    let db = temp_db();
    seed_library(&db);

    let mut select = Select::new(AUTHORS);
    let verified = select.add_field("verified");
    select.add_hidden_field("name");
    select.group_by = Some(GroupBy { fields: vec![verified] });
    select.order_by = vec![OrderCondition::asc(verified)];
    let rows_slot = select.mapping.add_next(GROUP_FIELD);
    select.add_count("_count", AggregateTarget::host(rows_slot));

    let rows = rows(&db, &Request::select(select));
    assert_eq!(
        rows,
        vec![
            doc! { "verified": false, "_count": 1i64 },
            doc! { "verified": true, "_count": 2i64 },
        ]
    );
}

#[test]
fn grouped_related_rows_are_regrouped_for_every_parent() {
    let db = temp_db();
    seed_library(&db);

    let (mut authors, _, _) = authors_by_name();
    let mut books = Select::related(
        BOOKS,
        "books",
        Relation {
            cardinality: Cardinality::Many,
            side: RelationSide::Secondary,
            foreign_key: 0,
        },
    );
    let rating = books.add_field("rating");
    let title = books.add_hidden_field("name");
    let author_id = books.add_hidden_field("author_id");
    if let Some(relation) = &mut books.relation {
        relation.foreign_key = author_id;
    }
    books.group_by = Some(GroupBy { fields: vec![rating] });
    books.order_by = vec![OrderCondition::asc(rating)];
    let mut group = books.group_child();
    group.render_existing("name");
    group.order_by = vec![OrderCondition::asc(title)];
    books.add_child(group, true);
    authors.add_child(books, true);

    let rows = rows(&db, &Request::select(authors));
    let books_of = |i: usize| rows[i].get("books").cloned().unwrap();
    assert_eq!(
        books_of(0),
        bson::bson!([
            { "rating": 4.0, "_group": [{ "name": "Tokio Deep Dive" }] },
            { "rating": 4.5, "_group": [{ "name": "Rust in Action" }] }
        ])
    );
    assert_eq!(books_of(1), bson::bson!([{ "rating": 3.0, "_group": [{ "name": "Compilers" }] }]));
    assert_eq!(books_of(2), Bson::Array(Vec::new()));
}

#[test]
fn nested_group_partitions_on_both_keys() {
    let db = temp_db();
    seed_library(&db);
    insert(&db, AUTHORS, &[doc! { "name": "Dave", "age": 30, "verified": false }]);

    let mut select = Select::new(AUTHORS);
    let age = select.add_field("age");
    let name = select.add_hidden_field("name");
    let verified = select.add_hidden_field("verified");
    select.group_by = Some(GroupBy { fields: vec![age] });
    select.order_by = vec![OrderCondition::asc(age)];

    let mut by_verified = select.group_child();
    by_verified.render_existing("age");
    by_verified.render_existing("verified");
    by_verified.group_by = Some(GroupBy { fields: vec![verified] });
    by_verified.order_by = vec![OrderCondition::asc(verified)];
    let mut names = by_verified.group_child();
    names.render_existing("name");
    names.order_by = vec![OrderCondition::asc(name)];
    by_verified.add_child(names, true);
    select.add_child(by_verified, true);

    let rows = rows(&db, &Request::select(select));
    assert_eq!(
        rows,
        vec![
            doc! {
                "age": 30,
                "_group": [
                    { "age": 30, "verified": false, "_group": [{ "name": "Dave" }] },
                    { "age": 30, "verified": true, "_group": [{ "name": "Alice" }, { "name": "Carol" }] }
                ]
            },
            doc! {
                "age": 45,
                "_group": [{ "age": 45, "verified": false, "_group": [{ "name": "Bob" }] }]
            },
        ]
    );
}
