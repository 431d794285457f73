//! Post-query optimizer - batch-loads what computed attributes still need.
//!
//! Computed attributes declare the association paths they read. Any
//! manifest path the eager-load plan did not already satisfy is loaded
//! once for the whole materialized page, then each resolver is triggered
//! on a sample row to warm per-attribute memoization. Resolver failures
//! are swallowed; this stage never fails a request on its own.

use crate::diag::Diagnostics;
use crate::exec::{self, Datastore, DatastoreError, Row};
use crate::plan::EagerLoadPlan;
use crate::schema::graph::AssociationGraph;
use crate::schema::{EntityDescriptor, ModelRegistry};

const COMPONENT: &str = "optimizer";

/// Satisfy outstanding computed-attribute dependencies for the page.
pub fn optimize(
    store: &dyn Datastore,
    registry: &ModelRegistry,
    graph: &AssociationGraph,
    entity: &EntityDescriptor,
    eager: &EagerLoadPlan,
    requested_computed: &[String],
    rows: &mut [Row],
    diag: &Diagnostics,
) -> Result<(), DatastoreError> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut loaded: Vec<String> = eager.full_load.clone();

    for name in requested_computed {
        let Some(attribute) = entity.find_computed(name) else {
            continue;
        };

        for dependency in &attribute.dependencies {
            // Ancestors first; the loader attaches level by level.
            let segments: Vec<&str> = dependency.split('.').collect();
            for end in 1..=segments.len() {
                let prefix = segments[..end].join(".");
                if loaded.contains(&prefix) {
                    continue;
                }
                diag.info(
                    COMPONENT,
                    format!("batch-loading '{prefix}' for computed attribute '{name}'"),
                );
                exec::load_path(store, registry, graph, entity, rows, &prefix, diag)?;
                loaded.push(prefix);
            }
        }

        // One sample invocation warms any internal memoization; the result
        // is irrelevant here and failures stay local.
        if let (Some(resolver), Some(sample)) = (attribute.resolver.as_ref(), rows.first()) {
            let _ = resolver(sample);
        }
    }

    Ok(())
}
