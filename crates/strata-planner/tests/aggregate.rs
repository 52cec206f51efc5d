mod common;
use common::*;

use bson::doc;
use strata_planner::PlannerError;
use strata_query::{AggregateTarget, CompareOp, Condition, Limit, OrderCondition, Request, Select, TopLevelSelect};

#[test]
fn average_over_related_rows() {
    let db = temp_db();
    seed_library(&db);

    let (mut authors, _, _) = authors_by_name();
    let (books, _, rating) = books_of_author("books");
    let books_index = authors.add_child(books, false);
    authors.add_average("_avg", vec![AggregateTarget::child(books_index, rating)]);

    let rows = rows(&db, &Request::select(authors));
    assert_eq!(
        rows,
        vec![
            doc! { "name": "Alice", "age": 30, "_avg": 4.25 },
            doc! { "name": "Bob", "age": 45, "_avg": 3.0 },
            doc! { "name": "Carol", "age": 30, "_avg": 0.0 },
        ]
    );
}

#[test]
fn sum_and_count_side_by_side() {
    let db = temp_db();
    seed_library(&db);

    let (mut authors, _, _) = authors_by_name();
    let (books, _, rating) = books_of_author("books");
    let books_index = authors.add_child(books, false);
    authors.add_count("_count", AggregateTarget::host(books_index));
    authors.add_sum("_sum", vec![AggregateTarget::child(books_index, rating)]);

    let rows = rows(&db, &Request::select(authors));
    assert_eq!(rows[0], doc! { "name": "Alice", "age": 30, "_count": 2i64, "_sum": 8.5 });
    assert_eq!(rows[1], doc! { "name": "Bob", "age": 45, "_count": 1i64, "_sum": 3.0 });
    assert_eq!(rows[2], doc! { "name": "Carol", "age": 30, "_count": 0i64, "_sum": 0i64 });
}

#[test]
fn count_target_filter_and_window() {
    let db = temp_db();
    seed_library(&db);

    let (mut authors, _, _) = authors_by_name();
    let (books, title, rating) = books_of_author("books");
    let books_index = authors.add_child(books, false);

    let mut good = AggregateTarget::host(books_index);
    good.filter = Some(Condition::field(rating, CompareOp::Ge, 4.0));
    authors.add_count("good", good);

    let mut first = AggregateTarget::host(books_index);
    first.order_by = vec![OrderCondition::desc(title)];
    first.limit = Some(Limit::new(1));
    authors.add_count("first", first);

    let rows = rows(&db, &Request::select(authors));
    assert_eq!(names(&rows, "name"), vec!["Alice", "Bob", "Carol"]);
    assert_eq!(rows[0].get_i64("good").unwrap(), 2);
    assert_eq!(rows[0].get_i64("first").unwrap(), 1);
    assert_eq!(rows[1].get_i64("good").unwrap(), 0);
    assert_eq!(rows[2].get_i64("first").unwrap(), 0);
}

#[test]
fn top_level_aggregates_over_a_selection() {
    let db = temp_db();
    seed_library(&db);

    let mut authors = Select::new(AUTHORS);
    let age = authors.add_field("age");
    let mut top = TopLevelSelect::new();
    let authors_index = top.add_select(authors, false);
    top.add_count("_count", AggregateTarget::host(authors_index));
    top.add_sum("_sum", vec![AggregateTarget::child(authors_index, age)]);

    let rows = rows(&db, &Request::top_level(top));
    assert_eq!(rows, vec![doc! { "_count": 3i64, "_sum": 105i64 }]);
}

#[test]
fn top_level_renders_its_selections() {
    let db = temp_db();
    seed_library(&db);

    let (authors, _, _) = authors_by_name();
    let mut top = TopLevelSelect::new();
    let authors_index = top.add_select(authors, true);
    top.add_count("_count", AggregateTarget::host(authors_index));

    let rows = rows(&db, &Request::top_level(top));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_array("authors").unwrap().len(), 3);
    assert_eq!(rows[0].get_i64("_count").unwrap(), 3);
}

#[test]
fn summing_text_is_unsupported() {
    let db = temp_db();
    seed_library(&db);

    let (mut authors, _, _) = authors_by_name();
    let (books, title, _) = books_of_author("books");
    let books_index = authors.add_child(books, false);
    authors.add_sum("_sum", vec![AggregateTarget::child(books_index, title)]);

    let err = execute(&db, &Request::select(authors)).unwrap_err();
    assert!(
        matches!(err, PlannerError::UnsupportedNumeric { ref aggregate, .. } if aggregate == "_sum"),
        "{err}"
    );

    // The failed plan was closed and the store still answers.
    let (authors, _, _) = authors_by_name();
    assert_eq!(rows(&db, &Request::select(authors)).len(), 3);
}
