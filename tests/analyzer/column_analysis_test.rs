//! Column key classification.

#[path = "../common/fixtures.rs"]
mod fixtures;

use std::sync::Arc;

use datagrid::analyze::{analyze, ColumnAnalysis};
use datagrid::prelude::*;
use fixtures::registry;

fn analyze_keys(keys: &[&str]) -> (ColumnAnalysis, Arc<MemorySink>) {
    let registry = registry();
    let entity = registry.get("post").unwrap();
    let graph = registry.graph().unwrap();
    let sink = Arc::new(MemorySink::new());
    let diag = Diagnostics::new(sink.clone());
    let columns: Vec<ColumnDefinition> = keys.iter().map(|k| ColumnDefinition::new(k)).collect();
    (analyze(&entity, &graph, &columns, &diag), sink)
}

#[test]
fn base_field_and_single_hop_path() {
    let (analysis, _) = analyze_keys(&["id", "author.name"]);
    assert_eq!(analysis.base_fields, vec!["id"]);
    assert_eq!(analysis.relation_paths, vec!["author"]);
    assert!(analysis.count_paths.is_empty());
    assert!(analysis.computed.is_empty());
}

#[test]
fn multi_hop_path_adds_every_prefix() {
    let (analysis, _) = analyze_keys(&["comments.author.name"]);
    assert_eq!(analysis.relation_paths, vec!["comments", "comments.author"]);
}

#[test]
fn leaf_is_attribute_not_a_hop() {
    // The final segment stays an attribute even though it is also the
    // name of a field that exists on the tail entity.
    let (analysis, _) = analyze_keys(&["author.name"]);
    assert!(!analysis.relation_paths.contains(&"author.name".to_string()));
}

#[test]
fn fallback_alternatives_union_their_paths() {
    let (analysis, _) = analyze_keys(&["author.nickname|author.name"]);
    assert_eq!(analysis.relation_paths, vec!["author"]);

    let (analysis, _) = analyze_keys(&["comments.author.name|author.name"]);
    assert_eq!(
        analysis.relation_paths,
        vec!["comments", "comments.author", "author"]
    );
}

#[test]
fn bare_fallback_alternative_is_not_a_field() {
    // "n/a" is a literal default at projection time, not a select column.
    let (analysis, sink) = analyze_keys(&["author.nickname|n/a"]);
    assert!(analysis.base_fields.is_empty());
    assert!(sink.records().is_empty());
}

#[test]
fn count_suffix_classifies_count_only() {
    let (analysis, _) = analyze_keys(&["comments_count"]);
    assert_eq!(analysis.count_paths, vec!["comments"]);
    assert!(analysis.relation_paths.is_empty());
}

#[test]
fn dotted_count_keeps_ancestors_full() {
    let (analysis, _) = analyze_keys(&["author.posts_count"]);
    assert_eq!(analysis.relation_paths, vec!["author"]);
    assert_eq!(analysis.count_paths, vec!["author.posts"]);
}

#[test]
fn count_suffix_on_non_association_stays_physical() {
    // "views_count" is not backed by an association named "views".
    let (analysis, _) = analyze_keys(&["views_count"]);
    assert!(analysis.count_paths.is_empty());
    assert_eq!(analysis.base_fields, vec!["views_count"]);
}

#[test]
fn computed_attribute_brings_manifest_paths() {
    let (analysis, _) = analyze_keys(&["has_comments"]);
    assert_eq!(analysis.computed, vec!["has_comments"]);
    assert_eq!(analysis.relation_paths, vec!["comments"]);
}

#[test]
fn unknown_key_degrades_to_physical_with_warning() {
    let (analysis, sink) = analyze_keys(&["ghost"]);
    assert_eq!(analysis.base_fields, vec!["ghost"]);
    assert!(sink.contains("ghost"));
}

#[test]
fn relation_column_contributes_its_path() {
    let registry = registry();
    let entity = registry.get("post").unwrap();
    let graph = registry.graph().unwrap();
    let diag = Diagnostics::new(Arc::new(MemorySink::new()));

    let mut column = ColumnDefinition::new("tag_ids").typed(FieldType::Pivot);
    column.relation = Some("tags".into());
    let analysis = analyze(&entity, &graph, &[column], &diag);
    assert!(analysis.relation_paths.contains(&"tags".to_string()));
}

#[test]
fn duplicate_paths_deduplicate() {
    let (analysis, _) = analyze_keys(&["author.name", "author.email", "author.nickname|author.name"]);
    assert_eq!(analysis.relation_paths, vec!["author"]);
}
