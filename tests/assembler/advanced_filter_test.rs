//! Advanced filter operators and their deferral rules.

#[path = "../common/fixtures.rs"]
mod fixtures;

use std::sync::Arc;

use datagrid::analyze::analyze;
use datagrid::assemble::{assemble, QueryPlan};
use datagrid::plan::plan;
use datagrid::prelude::*;
use fixtures::registry;
use serde_json::json;

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

fn with_advanced(filters: serde_json::Value) -> TableRequest {
    let mut request = TableRequest::new("post", vec![ColumnDefinition::new("id")]);
    request.advanced_filters = serde_json::from_value(filters).unwrap();
    request
}

fn page_sql(request: &TableRequest) -> String {
    assemble_request(request).0.page_query().to_sql(Dialect::Postgres)
}

#[test]
fn where_in_and_not_in() {
    let request = with_advanced(json!([
        {"field": "status", "operator": "whereIn", "value": ["draft", "review"]},
        {"field": "views", "operator": "whereNotIn", "value": [0]}
    ]));
    let sql = page_sql(&request);
    assert!(sql.contains("\"posts\".\"status\" IN ('draft', 'review')"));
    assert!(sql.contains("\"posts\".\"views\" NOT IN (0)"));
}

#[test]
fn where_between_needs_two_bounds() {
    let request = with_advanced(json!([
        {"field": "views", "operator": "whereBetween", "value": [10, 100]}
    ]));
    assert!(page_sql(&request).contains("\"posts\".\"views\" BETWEEN 10 AND 100"));

    let (query_plan, _) = assemble_request(&with_advanced(json!([
        {"field": "views", "operator": "whereBetween", "value": [10]}
    ])));
    assert!(!query_plan.page_query().to_sql(Dialect::Postgres).contains("BETWEEN"));
}

#[test]
fn null_checks() {
    let request = with_advanced(json!([
        {"field": "published_at", "operator": "whereNull"}
    ]));
    assert!(page_sql(&request).contains("\"posts\".\"published_at\" IS NULL"));

    let request = with_advanced(json!([
        {"field": "published_at", "operator": "whereNotNull"}
    ]));
    assert!(page_sql(&request).contains("\"posts\".\"published_at\" IS NOT NULL"));
}

#[test]
fn where_with_custom_operator() {
    let request = with_advanced(json!([
        {"field": "views", "operator": "where", "value": 10, "options": {"operator": ">="}}
    ]));
    assert!(page_sql(&request).contains("\"posts\".\"views\" >= 10"));
}

#[test]
fn where_with_unknown_operator_is_dropped() {
    let (query_plan, sink) = assemble_request(&with_advanced(json!([
        {"field": "views", "operator": "where", "value": 10, "options": {"operator": "~~"}}
    ])));
    let sql = query_plan.page_query().to_sql(Dialect::Postgres);
    assert!(!sql.contains("\"posts\".\"views\""));
    assert!(sink.contains("views"));
}

#[test]
fn date_part_operators() {
    let request = with_advanced(json!([
        {"field": "created_at", "operator": "whereYear", "value": 2024},
        {"field": "created_at", "operator": "whereMonth", "value": "3"},
        {"field": "created_at", "operator": "whereDate", "value": "2024-03-09"}
    ]));
    let sql = page_sql(&request);
    assert!(sql.contains("EXTRACT(YEAR FROM \"posts\".\"created_at\") = 2024"));
    assert!(sql.contains("EXTRACT(MONTH FROM \"posts\".\"created_at\") = 3"));
    assert!(sql.contains("CAST(\"posts\".\"created_at\" AS DATE) = '2024-03-09'"));
}

#[test]
fn where_has_on_bare_association() {
    let request = with_advanced(json!([
        {"field": "comments", "operator": "whereHas"}
    ]));
    assert!(page_sql(&request).contains(
        "EXISTS (SELECT 1 FROM \"comments\" AS \"t1\" WHERE \"t1\".\"post_id\" = \"posts\".\"id\")"
    ));
}

#[test]
fn where_doesnt_have_negates() {
    let request = with_advanced(json!([
        {"field": "comments", "operator": "whereDoesntHave"}
    ]));
    assert!(page_sql(&request).contains("NOT EXISTS"));
}

#[test]
fn where_has_with_attribute_predicate() {
    let request = with_advanced(json!([
        {"field": "author.name", "operator": "whereHas", "value": "bob"}
    ]));
    let sql = page_sql(&request);
    assert!(sql.contains("FROM \"users\" AS \"t1\""));
    assert!(sql.contains("\"t1\".\"name\" = 'bob'"));
}

#[test]
fn dotted_operator_applies_inside_existence_check() {
    let request = with_advanced(json!([
        {"field": "comments.body", "operator": "whereNotNull"}
    ]));
    let sql = page_sql(&request);
    assert!(sql.contains("FROM \"comments\" AS \"t1\""));
    assert!(sql.contains("\"t1\".\"body\" IS NOT NULL"));
}

#[test]
fn ordering_filters_defer_to_sort_stage() {
    let request = with_advanced(json!([
        {"field": "views", "operator": "orderBy", "options": {"direction": "desc"}}
    ]));
    let sql = page_sql(&request);
    assert!(sql.contains("ORDER BY \"posts\".\"views\" DESC"));
}

#[test]
fn order_by_multiple_expands_in_order() {
    let request = with_advanced(json!([
        {"field": "views", "operator": "orderByMultiple", "value": [
            {"column": "status", "direction": "asc"},
            {"column": "views", "direction": "desc"}
        ]}
    ]));
    let sql = page_sql(&request);
    let status_at = sql.find("ORDER BY \"posts\".\"status\" ASC").unwrap();
    let views_at = sql.find("\"posts\".\"views\" DESC").unwrap();
    assert!(status_at < views_at);
}

#[test]
fn manual_sort_suppresses_deferred_orderings() {
    let mut request = with_advanced(json!([
        {"field": "views", "operator": "orderBy", "options": {"direction": "desc"}}
    ]));
    request.sort = Some("title".into());
    let (query_plan, sink) = assemble_request(&request);
    let sql = query_plan.page_query().to_sql(Dialect::Postgres);
    assert!(sql.contains("ORDER BY \"posts\".\"title\" ASC"));
    assert!(!sql.contains("\"posts\".\"views\" DESC"));
    assert!(sink.contains("manual sort overrides"));
}

#[test]
fn advanced_filter_on_computed_attribute_is_skipped() {
    let (query_plan, sink) = assemble_request(&with_advanced(json!([
        {"field": "is_popular", "operator": "where", "value": true}
    ])));
    assert!(!query_plan.page_query().to_sql(Dialect::Postgres).contains("views"));
    assert!(sink.contains("is_popular"));
}
