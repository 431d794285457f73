//! Execution - runs a [`QueryPlan`](crate::assemble::QueryPlan) against a
//! datastore and materializes the page.
//!
//! The datastore is a synchronous collaborator that only knows how to run
//! a rendered query; everything batching-related lives here. Each
//! association path costs exactly one query for the whole page (`WHERE key
//! IN (...)`, pivot joins for many-to-many), never one per row. Count-only
//! paths run one GROUP BY aggregate each.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::assemble::QueryPlan;
use crate::diag::Diagnostics;
use crate::schema::{Association, AssociationKind, EntityDescriptor, ModelRegistry};
use crate::schema::graph::AssociationGraph;
use crate::sql::{col, count_star, lit_json, Expr, ExprExt, JoinType, Query, SelectExpr, TableRef};

const COMPONENT: &str = "loader";

/// A materialized row: column names to JSON values, with associations
/// attached as nested objects/arrays as they load.
pub type Row = Map<String, Value>;

/// Errors from the datastore boundary. Fatal to the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatastoreError {
    #[error("query execution failed: {0}")]
    Execution(String),
}

/// Synchronous query execution boundary.
///
/// Implementations render the query for their dialect and return rows as
/// JSON maps. The engine never holds connections or transactions itself.
pub trait Datastore {
    fn select(&self, query: &Query) -> Result<Vec<Row>, DatastoreError>;
}

/// The executed page before projection.
#[derive(Debug, Clone)]
pub struct ExecutedPage {
    pub rows: Vec<Row>,
    pub total: u64,
    /// Raw MAX(updated_at) over the filtered base set, when tracked.
    pub cache_timestamp: Option<String>,
}

/// Run the plan: count, fetch the page, then satisfy the eager-load plan
/// with batched queries.
pub fn run(
    store: &dyn Datastore,
    registry: &ModelRegistry,
    graph: &AssociationGraph,
    entity: &EntityDescriptor,
    plan: &QueryPlan,
    diag: &Diagnostics,
) -> Result<ExecutedPage, DatastoreError> {
    let total = scalar_u64(&store.select(&plan.count_query())?);
    let mut rows = store.select(&plan.page_query())?;

    for path in &plan.eager.full_load {
        load_path(store, registry, graph, entity, &mut rows, path, diag)?;
    }
    for path in &plan.eager.count_only {
        load_count_path(store, registry, graph, entity, &mut rows, path, diag)?;
    }

    let cache_timestamp = match plan.timestamp_query() {
        Some(query) => scalar_string(&store.select(&query)?),
        None => None,
    };

    Ok(ExecutedPage {
        rows,
        total,
        cache_timestamp,
    })
}

// =============================================================================
// Full loads
// =============================================================================

/// Batch-load one association path and attach the related rows in memory.
///
/// Ancestor paths must already be loaded (the planner orders the plan
/// shallow-first). Unresolvable paths degrade to a warning.
pub(crate) fn load_path(
    store: &dyn Datastore,
    registry: &ModelRegistry,
    graph: &AssociationGraph,
    entity: &EntityDescriptor,
    rows: &mut [Row],
    path: &str,
    diag: &Diagnostics,
) -> Result<(), DatastoreError> {
    let resolved = match graph.resolve_path(&entity.name, path) {
        Ok(resolved) => resolved,
        Err(err) => {
            diag.warn(COMPONENT, format!("skipping load of '{path}': {err}"));
            return Ok(());
        }
    };
    let tail = resolved.tail();
    let Some(target) = registry.get(&tail.to) else {
        diag.warn(COMPONENT, format!("no descriptor for entity '{}'", tail.to));
        return Ok(());
    };

    let segments: Vec<&str> = path.split('.').collect();
    let parent_segments = &segments[..segments.len() - 1];
    let mut parents: Vec<&mut Row> = Vec::new();
    for row in rows.iter_mut() {
        collect_at(row, parent_segments, &mut parents);
    }

    attach(store, parents, &tail.association, &target)
}

fn attach(
    store: &dyn Datastore,
    mut parents: Vec<&mut Row>,
    association: &Association,
    target: &EntityDescriptor,
) -> Result<(), DatastoreError> {
    if parents.is_empty() {
        return Ok(());
    }

    match &association.kind {
        AssociationKind::BelongsTo {
            foreign_key,
            owner_key,
        } => {
            let keys = collect_keys(&parents, foreign_key);
            let index = if keys.is_empty() {
                HashMap::new()
            } else {
                let query = Query::new()
                    .select_star()
                    .from(TableRef::new(&target.table))
                    .filter(col(owner_key).in_list(key_literals(&keys)));
                index_unique(store.select(&query)?, owner_key)
            };
            for parent in &mut parents {
                let value = parent
                    .get(foreign_key)
                    .map(value_key)
                    .and_then(|k| index.get(&k))
                    .cloned()
                    .map(Value::Object)
                    .unwrap_or(Value::Null);
                attach_one(parent, association, value);
            }
        }

        AssociationKind::HasOne {
            foreign_key,
            local_key,
        } => {
            let keys = collect_keys(&parents, local_key);
            let index = if keys.is_empty() {
                HashMap::new()
            } else {
                let query = Query::new()
                    .select_star()
                    .from(TableRef::new(&target.table))
                    .filter(col(foreign_key).in_list(key_literals(&keys)));
                index_unique(store.select(&query)?, foreign_key)
            };
            for parent in &mut parents {
                let value = parent
                    .get(local_key)
                    .map(value_key)
                    .and_then(|k| index.get(&k))
                    .cloned()
                    .map(Value::Object)
                    .unwrap_or(Value::Null);
                attach_one(parent, association, value);
            }
        }

        AssociationKind::HasMany {
            foreign_key,
            local_key,
        } => {
            let keys = collect_keys(&parents, local_key);
            let groups = if keys.is_empty() {
                HashMap::new()
            } else {
                let query = Query::new()
                    .select_star()
                    .from(TableRef::new(&target.table))
                    .filter(col(foreign_key).in_list(key_literals(&keys)));
                index_grouped(store.select(&query)?, foreign_key)
            };
            attach_groups(&mut parents, association, local_key, groups);
        }

        AssociationKind::ManyToMany {
            pivot_table,
            pivot_foreign_key,
            pivot_related_key,
            local_key,
            related_key,
        } => {
            let keys = collect_keys(&parents, local_key);
            let groups = if keys.is_empty() {
                HashMap::new()
            } else {
                let query = Query::new()
                    .select(vec![
                        SelectExpr::new(crate::sql::table_star("t")),
                        SelectExpr::new(crate::sql::table_col("p", pivot_foreign_key))
                            .with_alias(PARENT_KEY),
                    ])
                    .from(TableRef::new(&target.table).with_alias("t"))
                    .join(
                        JoinType::Inner,
                        TableRef::new(pivot_table).with_alias("p"),
                        crate::sql::table_col("p", pivot_related_key)
                            .eq(crate::sql::table_col("t", related_key)),
                    )
                    .filter(crate::sql::table_col("p", pivot_foreign_key)
                        .in_list(key_literals(&keys)));
                let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
                for mut row in store.select(&query)? {
                    if let Some(parent_key) = row.remove(PARENT_KEY) {
                        groups.entry(value_key(&parent_key)).or_default().push(row);
                    }
                }
                groups
            };
            attach_groups(&mut parents, association, local_key, groups);
        }
    }

    Ok(())
}

/// Alias for the pivot parent key smuggled through many-to-many loads.
const PARENT_KEY: &str = "__parent_key";

/// Attach a to-one association value, with its degenerate 0/1 count so a
/// count request answered by a full load still resolves.
fn attach_one(parent: &mut Row, association: &Association, value: Value) {
    let present = !value.is_null();
    parent.insert(
        format!("{}_count", association.name),
        Value::from(u64::from(present)),
    );
    parent.insert(association.name.clone(), value);
}

fn attach_groups(
    parents: &mut [&mut Row],
    association: &Association,
    parent_key_field: &str,
    mut groups: HashMap<String, Vec<Row>>,
) {
    for parent in parents.iter_mut() {
        let rows = parent
            .get(parent_key_field)
            .map(value_key)
            .and_then(|k| groups.remove(&k))
            .unwrap_or_default();
        // A to-many load always carries its count; counting rows already
        // in memory is free and spares a dedicated aggregate query.
        parent.insert(
            format!("{}_count", association.name),
            Value::from(rows.len() as u64),
        );
        parent.insert(
            association.name.clone(),
            Value::Array(rows.into_iter().map(Value::Object).collect()),
        );
    }
}

// =============================================================================
// Count-only loads
// =============================================================================

fn load_count_path(
    store: &dyn Datastore,
    registry: &ModelRegistry,
    graph: &AssociationGraph,
    entity: &EntityDescriptor,
    rows: &mut [Row],
    path: &str,
    diag: &Diagnostics,
) -> Result<(), DatastoreError> {
    let resolved = match graph.resolve_path(&entity.name, path) {
        Ok(resolved) => resolved,
        Err(err) => {
            diag.warn(COMPONENT, format!("skipping count of '{path}': {err}"));
            return Ok(());
        }
    };
    let tail = resolved.tail();
    let Some(target) = registry.get(&tail.to) else {
        diag.warn(COMPONENT, format!("no descriptor for entity '{}'", tail.to));
        return Ok(());
    };

    let segments: Vec<&str> = path.split('.').collect();
    let parent_segments = &segments[..segments.len() - 1];
    let mut parents: Vec<&mut Row> = Vec::new();
    for row in rows.iter_mut() {
        collect_at(row, parent_segments, &mut parents);
    }
    if parents.is_empty() {
        return Ok(());
    }

    // One grouped aggregate per path; missing groups read as zero.
    let (group_column, parent_key_field, count_table) = match &tail.association.kind {
        AssociationKind::BelongsTo {
            foreign_key,
            owner_key,
        } => (owner_key.clone(), foreign_key.clone(), target.table.clone()),
        AssociationKind::HasOne {
            foreign_key,
            local_key,
        }
        | AssociationKind::HasMany {
            foreign_key,
            local_key,
        } => (foreign_key.clone(), local_key.clone(), target.table.clone()),
        AssociationKind::ManyToMany {
            pivot_table,
            pivot_foreign_key,
            local_key,
            ..
        } => (
            pivot_foreign_key.clone(),
            local_key.clone(),
            pivot_table.clone(),
        ),
    };

    let keys = collect_keys(&parents, &parent_key_field);
    let mut counts: HashMap<String, u64> = HashMap::new();
    if !keys.is_empty() {
        let query = Query::new()
            .select(vec![
                SelectExpr::new(col(&group_column)).with_alias(PARENT_KEY),
                SelectExpr::new(count_star()).with_alias("aggregate"),
            ])
            .from(TableRef::new(&count_table))
            .filter(col(&group_column).in_list(key_literals(&keys)))
            .group_by(vec![col(&group_column)]);
        for row in store.select(&query)? {
            if let Some(key) = row.get(PARENT_KEY) {
                counts.insert(value_key(key), aggregate_of(&row));
            }
        }
    }

    let field = format!("{}_count", tail.association.name);
    for parent in &mut parents {
        let count = parent
            .get(&parent_key_field)
            .map(value_key)
            .and_then(|k| counts.get(&k).copied())
            .unwrap_or(0);
        parent.insert(field.clone(), Value::from(count));
    }

    Ok(())
}

// =============================================================================
// Row plumbing
// =============================================================================

/// Collect mutable references to the rows sitting at an association path.
fn collect_at<'a>(row: &'a mut Row, segments: &[&str], out: &mut Vec<&'a mut Row>) {
    if segments.is_empty() {
        out.push(row);
        return;
    }
    match row.get_mut(segments[0]) {
        Some(Value::Object(map)) => collect_at(map, &segments[1..], out),
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::Object(map) = item {
                    collect_at(map, &segments[1..], out);
                }
            }
        }
        _ => {}
    }
}

/// Distinct, non-null key values across the parent rows, in first-seen
/// order.
fn collect_keys(parents: &[&mut Row], field: &str) -> Vec<Value> {
    let mut seen: Vec<Value> = Vec::new();
    for parent in parents {
        if let Some(value) = parent.get(field) {
            if !value.is_null() && !seen.contains(value) {
                seen.push(value.clone());
            }
        }
    }
    seen
}

fn key_literals(keys: &[Value]) -> Vec<Expr> {
    keys.iter().filter_map(lit_json).collect()
}

/// Canonical map key for a JSON value, so numeric and string keys compare
/// consistently on both sides of the join.
fn value_key(value: &Value) -> String {
    value.to_string()
}

fn index_unique(rows: Vec<Row>, key_field: &str) -> HashMap<String, Row> {
    let mut index = HashMap::new();
    for row in rows {
        let key = row.get(key_field).map(value_key);
        if let Some(key) = key {
            index.entry(key).or_insert(row);
        }
    }
    index
}

fn index_grouped(rows: Vec<Row>, key_field: &str) -> HashMap<String, Vec<Row>> {
    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    for row in rows {
        let key = row.get(key_field).map(value_key);
        if let Some(key) = key {
            groups.entry(key).or_default().push(row);
        }
    }
    groups
}

/// First row's `aggregate` column as u64 (count/total queries).
fn scalar_u64(rows: &[Row]) -> u64 {
    rows.first().map(aggregate_of).unwrap_or(0)
}

fn aggregate_of(row: &Row) -> u64 {
    match row.get("aggregate").or_else(|| row.values().next()) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// First row's `aggregate` column as a string (timestamp probes).
fn scalar_string(rows: &[Row]) -> Option<String> {
    let row = rows.first()?;
    let value = row.get("aggregate").or_else(|| row.values().next())?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
