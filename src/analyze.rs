//! Column analyzer - classifies requested column keys.
//!
//! Each key resolves to one of: physical field, association path (possibly
//! nested), count-only association, fallback chain, or computed attribute.
//! Classification never fails a request; keys that fit nothing are treated
//! as physical and reported through the diagnostic sink.

use crate::diag::Diagnostics;
use crate::request::ColumnDefinition;
use crate::schema::{AssociationGraph, EntityDescriptor};

const COMPONENT: &str = "analyzer";

/// Classification of every requested column key.
#[derive(Debug, Clone, Default)]
pub struct ColumnAnalysis {
    /// Physical columns of the base entity.
    pub base_fields: Vec<String>,
    /// Candidate association paths to load in full (ancestor closure
    /// included; validated later by the planner).
    pub relation_paths: Vec<String>,
    /// Candidate association paths wanted as counts only.
    pub count_paths: Vec<String>,
    /// Names of requested computed attributes.
    pub computed: Vec<String>,
}

impl ColumnAnalysis {
    fn push_field(&mut self, field: &str) {
        if !self.base_fields.iter().any(|f| f == field) {
            self.base_fields.push(field.into());
        }
    }

    fn push_path(&mut self, path: String) {
        if !self.relation_paths.contains(&path) {
            self.relation_paths.push(path);
        }
    }

    fn push_count(&mut self, path: String) {
        if !self.count_paths.contains(&path) {
            self.count_paths.push(path);
        }
    }

    fn push_computed(&mut self, name: &str) {
        if !self.computed.iter().any(|c| c == name) {
            self.computed.push(name.into());
        }
    }

    /// Add a dotted path plus every non-empty prefix of it.
    fn push_path_with_prefixes(&mut self, path: &str) {
        let segments: Vec<&str> = path.split('.').collect();
        for end in 1..=segments.len() {
            self.push_path(segments[..end].join("."));
        }
    }
}

/// Split a pipe-separated key into trimmed fallback alternatives.
pub fn split_alternatives(key: &str) -> Vec<&str> {
    key.split('|').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Split a dotted key into (association path, leaf attribute).
///
/// Returns `None` for keys without dots.
pub fn split_path_and_leaf(key: &str) -> Option<(String, &str)> {
    let (path, leaf) = key.rsplit_once('.')?;
    Some((path.to_string(), leaf))
}

/// Classify the requested columns against an entity.
pub fn analyze(
    entity: &EntityDescriptor,
    graph: &AssociationGraph,
    columns: &[ColumnDefinition],
    diag: &Diagnostics,
) -> ColumnAnalysis {
    let mut analysis = ColumnAnalysis::default();

    for column in columns {
        // Pivot and attachment columns project through their association;
        // their keys never name physical columns.
        let projects_through_relation = matches!(
            column.declared_type(),
            crate::schema::FieldType::Pivot | crate::schema::FieldType::Attachment
        );
        if !projects_through_relation {
            let alternatives = split_alternatives(&column.key);
            let in_fallback = alternatives.len() > 1;
            for alternative in alternatives {
                classify_alternative(entity, graph, alternative, in_fallback, &mut analysis, diag);
            }
        }

        // Reference, pivot and attachment columns name the association they
        // project through; make sure it gets loaded.
        if let Some(relation) = &column.relation {
            if graph.resolve_path(&entity.name, relation).is_ok() {
                analysis.push_path_with_prefixes(relation);
            }
        }
    }

    analysis
}

fn classify_alternative(
    entity: &EntityDescriptor,
    graph: &AssociationGraph,
    key: &str,
    in_fallback: bool,
    analysis: &mut ColumnAnalysis,
    diag: &Diagnostics,
) {
    if let Some((path, leaf)) = split_path_and_leaf(key) {
        // Count exception: `author.posts_count` counts `author.posts`
        // instead of loading it, while `author` itself stays a full load.
        if let Some(counted) = leaf.strip_suffix("_count") {
            if let Ok(tail) = graph.tail_entity_of(&entity.name, &path) {
                if graph.association_of(&tail, counted).is_some() {
                    analysis.push_path_with_prefixes(&path);
                    analysis.push_count(format!("{path}.{counted}"));
                    return;
                }
            }
        }

        // The leaf is the attribute; the rest is the association path.
        // Every prefix is loaded so ancestor hops are present in memory.
        analysis.push_path_with_prefixes(&path);
        return;
    }

    // Non-dotted keys.
    if let Some(counted) = key.strip_suffix("_count") {
        if entity.find_association(counted).is_some() {
            analysis.push_count(counted.to_string());
            return;
        }
    }

    if entity.has_field(key) {
        analysis.push_field(key);
        return;
    }

    if let Some(attribute) = entity.find_computed(key) {
        analysis.push_computed(key);
        // The manifest tells us which associations the derivation reads.
        for dependency in &attribute.dependencies {
            analysis.push_path_with_prefixes(dependency);
        }
        return;
    }

    if in_fallback {
        // A bare fallback alternative may be a literal default rather than
        // a column; resolution decides at projection time.
        return;
    }

    diag.warn(
        COMPONENT,
        format!("column '{key}' is neither a field, association nor computed attribute; treating as physical"),
    );
    analysis.push_field(key);
}
