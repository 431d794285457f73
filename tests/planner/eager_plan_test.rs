//! Eager-load plan validation and deduplication.

#[path = "../common/fixtures.rs"]
mod fixtures;

use std::sync::Arc;

use datagrid::analyze::ColumnAnalysis;
use datagrid::plan::plan;
use datagrid::prelude::*;
use fixtures::registry;

fn plan_for(analysis: ColumnAnalysis) -> (datagrid::plan::EagerLoadPlan, Arc<MemorySink>) {
    let registry = registry();
    let entity = registry.get("post").unwrap();
    let graph = registry.graph().unwrap();
    let sink = Arc::new(MemorySink::new());
    let diag = Diagnostics::new(sink.clone());
    (plan(&entity, &graph, &analysis, &diag), sink)
}

#[test]
fn valid_paths_survive() {
    let (plan, _) = plan_for(ColumnAnalysis {
        relation_paths: vec!["author".into(), "comments".into()],
        ..Default::default()
    });
    assert_eq!(plan.full_load, vec!["author", "comments"]);
    assert!(plan.count_only.is_empty());
}

#[test]
fn invalid_path_dropped_with_warning() {
    let (plan, sink) = plan_for(ColumnAnalysis {
        relation_paths: vec!["profile".into(), "author".into()],
        ..Default::default()
    });
    assert_eq!(plan.full_load, vec!["author"]);
    assert!(sink.contains("profile"));
}

#[test]
fn ancestors_are_closed_over() {
    // Even when the analyzer only surfaced the deep path, every prefix
    // must load.
    let (plan, _) = plan_for(ColumnAnalysis {
        relation_paths: vec!["comments.author".into()],
        ..Default::default()
    });
    assert_eq!(plan.full_load, vec!["comments", "comments.author"]);
}

#[test]
fn full_load_wins_over_count_only() {
    let (plan, _) = plan_for(ColumnAnalysis {
        relation_paths: vec!["comments".into()],
        count_paths: vec!["comments".into()],
        ..Default::default()
    });
    assert_eq!(plan.full_load, vec!["comments"]);
    assert!(plan.count_only.is_empty());
}

#[test]
fn count_only_path_kept_when_not_fully_loaded() {
    let (plan, _) = plan_for(ColumnAnalysis {
        count_paths: vec!["comments".into()],
        ..Default::default()
    });
    assert!(plan.full_load.is_empty());
    assert_eq!(plan.count_only, vec!["comments"]);
}

#[test]
fn count_of_invalid_path_dropped() {
    let (plan, sink) = plan_for(ColumnAnalysis {
        count_paths: vec!["reactions".into()],
        ..Default::default()
    });
    assert!(plan.count_only.is_empty());
    assert!(sink.contains("reactions"));
}

#[test]
fn plan_orders_shallow_first() {
    let (plan, _) = plan_for(ColumnAnalysis {
        relation_paths: vec!["comments.author".into(), "author".into()],
        ..Default::default()
    });
    let depth_of = |p: &String| p.matches('.').count();
    for window in plan.full_load.windows(2) {
        assert!(depth_of(&window[0]) <= depth_of(&window[1]));
    }
}

#[test]
fn to_many_full_load_reports_free_count() {
    let (_, sink) = plan_for(ColumnAnalysis {
        relation_paths: vec!["comments".into()],
        ..Default::default()
    });
    assert!(sink.contains("piggybacks"));
}
