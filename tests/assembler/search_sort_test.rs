//! Free-text search assembly and sort resolution.

#[path = "../common/fixtures.rs"]
mod fixtures;

use std::sync::Arc;

use datagrid::analyze::analyze;
use datagrid::assemble::{assemble, QueryPlan};
use datagrid::plan::plan;
use datagrid::prelude::*;
use fixtures::registry;

fn assemble_request(request: &TableRequest) -> (QueryPlan, Arc<MemorySink>) {
    let registry = registry();
    let entity = registry.get("post").unwrap();
    let graph = registry.graph().unwrap();
    let sink = Arc::new(MemorySink::new());
    let diag = Diagnostics::new(sink.clone());
    let analysis = analyze(&entity, &graph, &request.columns, &diag);
    let eager = plan(&entity, &graph, &analysis, &diag);
    let query_plan = assemble(
        &entity, &graph, &registry, request, &analysis, eager, 1, 10, &diag,
    );
    (query_plan, sink)
}

fn page_sql(request: &TableRequest) -> String {
    assemble_request(request).0.page_query().to_sql(Dialect::Postgres)
}

fn searchable_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::new("id"),
        ColumnDefinition::new("title").sortable(),
        ColumnDefinition::new("author.name").sortable(),
        ColumnDefinition::new("has_comments").sortable(),
    ]
}

#[test]
fn search_is_case_insensitive_substring() {
    let mut request = TableRequest::new("post", searchable_columns());
    request.search = Some("RuSt".into());
    let sql = page_sql(&request);
    assert!(sql.contains("LOWER(CAST(\"posts\".\"title\" AS TEXT)) LIKE '%rust%' ESCAPE '\\'"));
}

#[test]
fn search_or_combines_sortable_fields_and_reaches_associations() {
    let mut request = TableRequest::new("post", searchable_columns());
    request.search = Some("rust".into());
    let sql = page_sql(&request);
    assert!(sql.contains(" OR "));
    assert!(sql.contains("FROM \"users\" AS \"t1\""));
    assert!(sql.contains("LOWER(CAST(\"t1\".\"name\" AS TEXT)) LIKE '%rust%' ESCAPE '\\'"));
}

#[test]
fn search_skips_computed_and_unsortable_fields() {
    let mut request = TableRequest::new("post", searchable_columns());
    request.search = Some("rust".into());
    let sql = page_sql(&request);
    // "id" is not sortable, has_comments is computed; neither is searched.
    assert!(!sql.contains("LOWER(CAST(\"posts\".\"id\""));
    assert_eq!(sql.matches("LIKE").count(), 2);
}

#[test]
fn search_includes_each_fallback_alternative() {
    let mut request = TableRequest::new(
        "post",
        vec![ColumnDefinition::new("author.nickname|author.name").sortable()],
    );
    request.search = Some("bob".into());
    let sql = page_sql(&request);
    assert!(sql.contains("\"t1\".\"nickname\""));
    assert!(sql.contains("\"t1\".\"name\""));
}

#[test]
fn blank_search_is_a_no_op() {
    let mut request = TableRequest::new("post", searchable_columns());
    request.search = Some("   ".into());
    assert!(!page_sql(&request).contains("LIKE"));
}

#[test]
fn physical_sort_orders_directly() {
    let mut request = TableRequest::new("post", vec![ColumnDefinition::new("title")]);
    request.sort = Some("title".into());
    request.direction = Some(SortDirection::Desc);
    assert!(page_sql(&request).contains("ORDER BY \"posts\".\"title\" DESC"));
}

#[test]
fn association_sort_uses_correlated_scalar_subquery() {
    let mut request = TableRequest::new("post", vec![ColumnDefinition::new("author.name")]);
    request.sort = Some("author.name".into());
    request.direction = Some(SortDirection::Desc);
    let sql = page_sql(&request);
    assert!(sql.contains(
        "ORDER BY (SELECT \"t1\".\"name\" FROM \"users\" AS \"t1\" WHERE \"t1\".\"id\" = \"posts\".\"author_id\" LIMIT 1) DESC NULLS LAST"
    ));
}

#[test]
fn multi_hop_sort_chains_left_joins() {
    let mut request =
        TableRequest::new("post", vec![ColumnDefinition::new("comments.author.name")]);
    request.sort = Some("comments.author.name".into());
    let sql = page_sql(&request);
    assert!(sql.contains("FROM \"comments\" AS \"t1\""));
    assert!(sql.contains("LEFT JOIN \"users\" AS \"t2\" ON \"t2\".\"id\" = \"t1\".\"author_id\""));
    assert!(sql.contains("WHERE \"t1\".\"post_id\" = \"posts\".\"id\" LIMIT 1"));
}

#[test]
fn unresolvable_sort_falls_back_to_primary_key() {
    // The association graph has no "profile"; sorting must not error.
    let mut request = TableRequest::new("post", vec![ColumnDefinition::new("id")]);
    request.sort = Some("profile.age".into());
    request.direction = Some(SortDirection::Desc);
    let (query_plan, sink) = assemble_request(&request);
    let sql = query_plan.page_query().to_sql(Dialect::Postgres);
    assert!(sql.contains("ORDER BY \"posts\".\"id\" DESC"));
    assert!(sink.contains("profile.age"));
}

#[test]
fn computed_sort_falls_back_to_primary_key() {
    let mut request = TableRequest::new("post", vec![ColumnDefinition::new("has_comments")]);
    request.sort = Some("has_comments".into());
    let (query_plan, sink) = assemble_request(&request);
    let sql = query_plan.page_query().to_sql(Dialect::Postgres);
    assert!(sql.contains("ORDER BY \"posts\".\"id\" ASC"));
    assert!(sink.contains("has_comments"));
}

#[test]
fn default_order_is_primary_key_ascending() {
    let request = TableRequest::new("post", vec![ColumnDefinition::new("id")]);
    assert!(page_sql(&request).contains("ORDER BY \"posts\".\"id\" ASC"));
}

#[test]
fn many_to_many_sort_goes_through_the_pivot() {
    let mut request = TableRequest::new("post", vec![ColumnDefinition::new("tags.name")]);
    request.sort = Some("tags.name".into());
    let sql = page_sql(&request);
    assert!(sql.contains("FROM \"tags\" AS \"t1\""));
    assert!(sql.contains("INNER JOIN \"post_tag\" AS \"p1\" ON \"p1\".\"tag_id\" = \"t1\".\"id\""));
    assert!(sql.contains("\"p1\".\"post_id\" = \"posts\".\"id\""));
}

#[test]
fn page_window_applies_limit_and_offset() {
    let registry = registry();
    let entity = registry.get("post").unwrap();
    let graph = registry.graph().unwrap();
    let diag = Diagnostics::new(Arc::new(MemorySink::new()));
    let request = TableRequest::new("post", vec![ColumnDefinition::new("id")]);
    let analysis = analyze(&entity, &graph, &request.columns, &diag);
    let eager = plan(&entity, &graph, &analysis, &diag);
    let query_plan = assemble(
        &entity, &graph, &registry, &request, &analysis, eager, 3, 25, &diag,
    );
    let sql = query_plan.page_query().to_sql(Dialect::Postgres);
    assert!(sql.ends_with("LIMIT 25 OFFSET 50"));
}
