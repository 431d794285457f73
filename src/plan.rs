//! Relationship planner - turns candidate paths into a validated
//! eager-load plan.
//!
//! Every candidate path is walked segment by segment through the entity's
//! association graph; paths that don't resolve are dropped with a warning.
//! The output is deduplicated, ancestor-closed, and ordered shallow-first
//! so the loader can attach parents before children.

use crate::analyze::ColumnAnalysis;
use crate::diag::Diagnostics;
use crate::schema::{AssociationGraph, EntityDescriptor};

const COMPONENT: &str = "planner";

/// The associations to fetch ahead of projection.
///
/// A path never appears in both sets: a full load can answer a count from
/// the rows already in memory, so full-load wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EagerLoadPlan {
    /// Paths whose related rows are fetched and attached, shallow-first.
    pub full_load: Vec<String>,
    /// Paths fetched as grouped counts only.
    pub count_only: Vec<String>,
}

impl EagerLoadPlan {
    pub fn is_empty(&self) -> bool {
        self.full_load.is_empty() && self.count_only.is_empty()
    }
}

/// Validate candidate paths against the association graph and produce the
/// eager-load plan.
pub fn plan(
    entity: &EntityDescriptor,
    graph: &AssociationGraph,
    analysis: &ColumnAnalysis,
    diag: &Diagnostics,
) -> EagerLoadPlan {
    let mut full_load: Vec<String> = Vec::new();

    for path in &analysis.relation_paths {
        match graph.resolve_path(&entity.name, path) {
            Ok(_) => {
                // Closure: ancestors must load even if the analyzer only
                // surfaced the deep path.
                let segments: Vec<&str> = path.split('.').collect();
                for end in 1..=segments.len() {
                    let prefix = segments[..end].join(".");
                    if !full_load.contains(&prefix) {
                        full_load.push(prefix);
                    }
                }
            }
            Err(err) => {
                diag.warn(
                    COMPONENT,
                    format!("dropping unresolvable association path '{path}': {err}"),
                );
            }
        }
    }

    let mut count_only: Vec<String> = Vec::new();
    for path in &analysis.count_paths {
        match graph.resolve_path(&entity.name, path) {
            Ok(resolved) => {
                if !resolved.tail().association.kind.is_to_many() {
                    diag.warn(
                        COMPONENT,
                        format!("count requested for to-one association '{path}'; counting anyway"),
                    );
                }
                if full_load.contains(path) {
                    // Full-load wins; the loader counts attached rows in
                    // memory instead of issuing an aggregate query.
                    continue;
                }
                if !count_only.contains(path) {
                    count_only.push(path.clone());
                }
            }
            Err(err) => {
                diag.warn(
                    COMPONENT,
                    format!("dropping unresolvable count path '{path}': {err}"),
                );
            }
        }
    }

    // Shallow-first so parents are attached before their children load.
    full_load.sort_by_key(|p| p.matches('.').count());

    // Every full-loaded to-many association also yields a free
    // `<name>_count` from the rows in memory; surface that so operators
    // can see the extra field the loader will attach.
    for path in &full_load {
        if let Ok(resolved) = graph.resolve_path(&entity.name, path) {
            if resolved.tail().association.kind.is_to_many() && !count_only.contains(path) {
                diag.info(
                    COMPONENT,
                    format!("count for to-many association '{path}' piggybacks on its full load"),
                );
            }
        }
    }

    EagerLoadPlan {
        full_load,
        count_only,
    }
}
