//! End-to-end reads through the engine against a scripted datastore.

#[path = "../common/fixtures.rs"]
mod fixtures;

use std::sync::Arc;

use datagrid::prelude::*;
use fixtures::{registry, rows, table_of, StubStore};
use serde_json::json;

fn engine_with_sink() -> (Engine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let engine = Engine::new(registry()).with_sink(sink.clone());
    (engine, sink)
}

/// Store scripted for a two-post blog page.
fn blog_store() -> StubStore {
    StubStore::new(|query| {
        let sql = query.to_sql(Dialect::Postgres);
        match table_of(query).as_str() {
            "posts" if sql.contains("COUNT(*)") => rows(json!([{"aggregate": 2}])),
            "posts" if sql.contains("MAX(") => {
                rows(json!([{"aggregate": "2024-06-01 10:00:00"}]))
            }
            "posts" => rows(json!([
                {"id": 1, "title": "First", "author_id": 10, "views": 5,
                 "updated_at": "2024-06-01 10:00:00"},
                {"id": 2, "title": "Second", "author_id": 11, "views": 500,
                 "updated_at": "2024-05-01 09:00:00"}
            ])),
            "users" => rows(json!([
                {"id": 10, "name": "Ann", "nickname": null},
                {"id": 11, "name": "Bo", "nickname": "bo"}
            ])),
            "comments" if sql.contains("GROUP BY") => {
                rows(json!([{"__parent_key": 1, "aggregate": 2}]))
            }
            "comments" => rows(json!([
                {"id": 100, "post_id": 1, "author_id": 10, "body": "nice"},
                {"id": 101, "post_id": 1, "author_id": 11, "body": "great"}
            ])),
            "tags" => rows(json!([
                {"id": 7, "name": "rust", "__parent_key": 1}
            ])),
            _ => vec![],
        }
    })
}

fn token(engine: &Engine) -> String {
    engine.registry().token_for("post").unwrap()
}

#[test]
fn page_with_association_and_count_columns() {
    let (engine, _) = engine_with_sink();
    let store = blog_store();
    let request = TableRequest::new(
        &token(&engine),
        vec![
            ColumnDefinition::new("id"),
            ColumnDefinition::new("title").sortable(),
            ColumnDefinition::new("author.name").sortable(),
            ColumnDefinition::new("comments_count"),
        ],
    );

    let response = engine.fetch(&store, &request).unwrap();

    assert_eq!(response.total, 2);
    assert_eq!(response.data.len(), 2);
    let first = &response.data[0];
    let keys: Vec<&String> = first.keys().collect();
    assert_eq!(keys, vec!["id", "title", "author.name", "comments_count"]);
    assert_eq!(first["author.name"], json!("Ann"));
    assert_eq!(first["comments_count"], json!(2));
    // No comments on post 2; missing groups read as zero.
    assert_eq!(response.data[1]["comments_count"], json!(0));
    assert_eq!(
        response.cache_timestamp.as_deref(),
        Some("2024-06-01T10:00:00Z")
    );
}

#[test]
fn one_query_per_association_path_not_per_row() {
    let (engine, _) = engine_with_sink();
    let store = blog_store();
    let request = TableRequest::new(
        &token(&engine),
        vec![
            ColumnDefinition::new("id"),
            ColumnDefinition::new("author.name"),
            ColumnDefinition::new("comments_count"),
        ],
    );
    engine.fetch(&store, &request).unwrap();

    let executed = store.executed_sql();
    // count + page + one author batch + one comments aggregate + timestamp
    assert_eq!(executed.len(), 5);
    assert_eq!(store.count_matching("FROM \"users\""), 1);
    assert_eq!(store.count_matching("FROM \"comments\""), 1);
    assert!(executed
        .iter()
        .any(|sql| sql.contains("\"id\" IN (10, 11)")));
}

#[test]
fn nested_paths_load_level_by_level() {
    let (engine, _) = engine_with_sink();
    let store = blog_store();
    let request = TableRequest::new(
        &token(&engine),
        vec![
            ColumnDefinition::new("id"),
            ColumnDefinition::new("comments.author.name"),
        ],
    );
    let response = engine.fetch(&store, &request).unwrap();

    // Both hops load once each, batched across the page.
    assert_eq!(store.count_matching("FROM \"comments\""), 1);
    assert_eq!(store.count_matching("FROM \"users\""), 1);

    // Arrays map the remaining path over their elements.
    assert_eq!(response.data[0]["comments.author.name"], json!(["Ann", "Bo"]));
    assert_eq!(response.data[1]["comments.author.name"], json!([]));
}

#[test]
fn many_to_many_loads_through_the_pivot() {
    let (engine, _) = engine_with_sink();
    let store = blog_store();
    let request = TableRequest::new(
        &token(&engine),
        vec![ColumnDefinition::new("id"), ColumnDefinition::new("tags.name")],
    );
    let response = engine.fetch(&store, &request).unwrap();

    assert!(store.executed_sql().iter().any(|sql| sql.contains(
        "INNER JOIN \"post_tag\" AS \"p\" ON \"p\".\"tag_id\" = \"t\".\"id\""
    )));
    assert_eq!(response.data[0]["tags.name"], json!(["rust"]));
    assert_eq!(response.data[1]["tags.name"], json!([]));
}

#[test]
fn full_load_precedence_serves_counts_from_memory() {
    let (engine, _) = engine_with_sink();
    let store = blog_store();
    let request = TableRequest::new(
        &token(&engine),
        vec![
            ColumnDefinition::new("id"),
            ColumnDefinition::new("comments.author.name"),
            ColumnDefinition::new("comments_count"),
        ],
    );
    let response = engine.fetch(&store, &request).unwrap();

    // The full load answers the count; no aggregate query runs.
    assert_eq!(store.count_matching("GROUP BY"), 0);
    assert_eq!(response.data[0]["comments_count"], json!(2));
    assert_eq!(response.data[1]["comments_count"], json!(0));
}

#[test]
fn computed_attribute_resolves_from_batched_dependencies() {
    let (engine, _) = engine_with_sink();
    let store = blog_store();
    let request = TableRequest::new(
        &token(&engine),
        vec![
            ColumnDefinition::new("id"),
            ColumnDefinition::new("summary"),
            ColumnDefinition::new("has_comments"),
        ],
    );
    let response = engine.fetch(&store, &request).unwrap();

    // The manifest pulled "comments" in exactly once for the whole page.
    assert_eq!(store.count_matching("FROM \"comments\""), 1);
    assert_eq!(response.data[0]["summary"], json!("nice"));
    assert_eq!(response.data[0]["has_comments"], json!(true));
    assert_eq!(response.data[1]["summary"], json!(null));
    assert_eq!(response.data[1]["has_comments"], json!(false));
}

#[test]
fn optimizer_loads_what_the_plan_missed() {
    use datagrid::optimize::optimize;
    use datagrid::plan::EagerLoadPlan;

    let registry = registry();
    let entity = registry.get("post").unwrap();
    let graph = registry.graph().unwrap();
    let diag = Diagnostics::new(Arc::new(MemorySink::new()));
    let store = blog_store();

    // A page materialized without the computed attribute's dependency.
    let mut page_rows = rows(json!([{"id": 1}, {"id": 2}]));
    optimize(
        &store,
        &registry,
        &graph,
        &entity,
        &EagerLoadPlan::default(),
        &["summary".to_string()],
        &mut page_rows,
        &diag,
    )
    .unwrap();

    assert_eq!(store.count_matching("FROM \"comments\""), 1);
    assert_eq!(page_rows[0]["comments"].as_array().unwrap().len(), 2);
    assert_eq!(page_rows[1]["comments"], json!([]));
}

#[test]
fn unresolvable_sort_degrades_instead_of_failing() {
    let (engine, sink) = engine_with_sink();
    let store = blog_store();
    let mut request = TableRequest::new(
        &token(&engine),
        vec![ColumnDefinition::new("id")],
    );
    request.sort = Some("profile.age".into());

    let response = engine.fetch(&store, &request).unwrap();
    assert_eq!(response.total, 2);
    assert!(sink.contains("profile.age"));
    assert!(store
        .executed_sql()
        .iter()
        .any(|sql| sql.contains("ORDER BY \"posts\".\"id\"")));
}

#[test]
fn missing_model_or_columns_is_fatal() {
    let (engine, _) = engine_with_sink();
    let store = StubStore::empty();

    let request = TableRequest::new("", vec![ColumnDefinition::new("id")]);
    assert!(matches!(
        engine.fetch(&store, &request),
        Err(EngineError::Request(_))
    ));

    let request = TableRequest::new(&token(&engine), vec![]);
    assert!(matches!(
        engine.fetch(&store, &request),
        Err(EngineError::Request(_))
    ));
}

#[test]
fn forged_model_tokens_are_rejected() {
    let (engine, _) = engine_with_sink();
    let store = StubStore::empty();

    let request = TableRequest::new("garbage", vec![ColumnDefinition::new("id")]);
    assert!(matches!(
        engine.fetch(&store, &request),
        Err(EngineError::Token(_))
    ));

    let mut tampered = token(&engine);
    tampered.pop();
    tampered.push('A');
    let request = TableRequest::new(&tampered, vec![ColumnDefinition::new("id")]);
    assert!(matches!(
        engine.fetch(&store, &request),
        Err(EngineError::Token(_))
    ));
}

#[test]
fn per_page_is_clamped_to_settings() {
    let (engine, _) = engine_with_sink();
    let store = blog_store();
    let mut request = TableRequest::new(&token(&engine), vec![ColumnDefinition::new("id")]);
    request.per_page = Some(10_000);
    engine.fetch(&store, &request).unwrap();

    assert!(store
        .executed_sql()
        .iter()
        .any(|sql| sql.contains("LIMIT 100")));
}
