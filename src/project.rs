//! Result projection - maps materialized rows into the literal requested
//! output shape and wraps them in pagination metadata.
//!
//! Per row, per column: association and fallback keys resolve against the
//! eagerly loaded data, temporal values normalize to ISO-8601, special
//! kinds (references, pivots, attachments) resolve their secondary
//! shapes, and link specs decorate. The output carries exactly the
//! requested keys plus `<key>_link` entries - nothing else leaks.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::analyze::split_alternatives;
use crate::assemble::QueryPlan;
use crate::diag::Diagnostics;
use crate::exec::{Datastore, DatastoreError, ExecutedPage, Row};
use crate::request::{ColumnDefinition, LinkSpec, TableRequest};
use crate::schema::{EntityDescriptor, FieldType, ModelRegistry};
use crate::sql::{col, lit_json, ExprExt, Query, TableRef};

const COMPONENT: &str = "projector";

/// `{field}` / `{association.field}` placeholders in link templates.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_.]+)\}").expect("placeholder pattern compiles"));

// =============================================================================
// Response types
// =============================================================================

/// One entry of the pagination `links` array.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageLink {
    pub url: Option<String>,
    pub label: String,
    pub active: bool,
}

/// The complete paginated response.
#[derive(Debug, Clone, Serialize)]
pub struct TableResponse {
    pub data: Vec<Row>,
    pub current_page: u64,
    pub first_page_url: String,
    pub from: Option<u64>,
    pub last_page: u64,
    pub last_page_url: String,
    pub links: Vec<PageLink>,
    pub next_page_url: Option<String>,
    pub path: String,
    pub per_page: u64,
    pub prev_page_url: Option<String>,
    pub to: Option<u64>,
    pub total: u64,
    pub cache_key: String,
    pub cache_timestamp: Option<String>,
}

// =============================================================================
// Projection
// =============================================================================

/// Project the executed page into the response.
pub fn respond(
    store: &dyn Datastore,
    registry: &ModelRegistry,
    entity: &EntityDescriptor,
    request: &TableRequest,
    plan: &QueryPlan,
    page: ExecutedPage,
    base_path: &str,
    diag: &Diagnostics,
) -> Result<TableResponse, DatastoreError> {
    let row_count = page.rows.len() as u64;
    let mut data = Vec::with_capacity(page.rows.len());
    for row in &page.rows {
        data.push(project_row(
            store,
            registry,
            entity,
            &request.columns,
            row,
            diag,
        )?);
    }

    let per_page = plan.per_page;
    let current = plan.page;
    let total = page.total;
    let last_page = if total == 0 {
        1
    } else {
        total.div_ceil(per_page)
    };

    let (from, to) = if row_count == 0 {
        (None, None)
    } else {
        let from = (current - 1) * per_page + 1;
        (Some(from), Some(from + row_count - 1))
    };

    let url = |page: u64| format!("{base_path}?page={page}");
    let prev_page_url = (current > 1).then(|| url(current - 1));
    let next_page_url = (current < last_page).then(|| url(current + 1));

    let mut links = Vec::with_capacity(last_page as usize + 2);
    links.push(PageLink {
        url: prev_page_url.clone(),
        label: "&laquo; Previous".into(),
        active: false,
    });
    for page_number in 1..=last_page {
        links.push(PageLink {
            url: Some(url(page_number)),
            label: page_number.to_string(),
            active: page_number == current,
        });
    }
    links.push(PageLink {
        url: next_page_url.clone(),
        label: "Next &raquo;".into(),
        active: false,
    });

    Ok(TableResponse {
        data,
        current_page: current,
        first_page_url: url(1),
        from,
        last_page,
        last_page_url: url(last_page),
        links,
        next_page_url,
        path: base_path.into(),
        per_page,
        prev_page_url,
        to,
        total,
        cache_key: cache_key(&entity.name, request),
        cache_timestamp: page.cache_timestamp.map(|t| canonical_iso(&t)),
    })
}

/// Stable identifier for this dataset + request shape, so clients can key
/// their caches without interpreting the request themselves.
fn cache_key(entity: &str, request: &TableRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity.as_bytes());
    hasher.update([0x1f]);
    if let Ok(canonical) = serde_json::to_string(request) {
        hasher.update(canonical.as_bytes());
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn project_row(
    store: &dyn Datastore,
    registry: &ModelRegistry,
    entity: &EntityDescriptor,
    columns: &[ColumnDefinition],
    row: &Row,
    diag: &Diagnostics,
) -> Result<Row, DatastoreError> {
    let mut out = Row::new();

    for column in columns {
        let key = column.key.as_str();
        let field_type = column.declared_type();

        let value = match field_type {
            FieldType::Attachment => attachment_value(row, column),
            FieldType::Pivot => pivot_value(row, column),
            FieldType::Reference => reference_value(store, registry, row, column, diag)?,
            _ => {
                if !key.contains('.') && !key.contains('|') {
                    if let Some(attribute) = entity.find_computed(key) {
                        attribute
                            .resolver
                            .as_ref()
                            .and_then(|resolve| resolve(row))
                            .unwrap_or(Value::Null)
                    } else {
                        resolve_key(row, key, field_type)
                    }
                } else {
                    resolve_key(row, key, field_type)
                }
            }
        };
        out.insert(key.to_string(), value);

        if let Some(link) = &column.link {
            if let Some(decoration) = render_link(link, row) {
                out.insert(format!("{key}_link"), decoration);
            }
        }
    }

    Ok(out)
}

/// Resolve a (possibly pipe-separated, possibly dotted) key against a
/// materialized row.
///
/// Fallback chains evaluate left to right and stop at the first non-empty
/// value; a non-dotted alternative with no matching property is a literal
/// default string.
fn resolve_key(row: &Row, key: &str, field_type: FieldType) -> Value {
    let alternatives = split_alternatives(key);
    if alternatives.len() > 1 {
        for alternative in alternatives {
            if !alternative.contains('.') && !row.contains_key(alternative) {
                return Value::String(alternative.to_string());
            }
            let value = data_get_row(row, alternative);
            if !value_is_blank(&value) {
                return format_value(value, field_type);
            }
        }
        return Value::Null;
    }
    format_value(data_get_row(row, key), field_type)
}

/// Walk a dotted path through a row tree. Arrays map the remaining path
/// over their elements.
fn data_get_row(row: &Row, path: &str) -> Value {
    let segments: Vec<&str> = path.split('.').collect();
    match row.get(segments[0]) {
        Some(value) => data_get_value(value, &segments[1..]),
        None => Value::Null,
    }
}

fn data_get_value(value: &Value, segments: &[&str]) -> Value {
    if segments.is_empty() {
        return value.clone();
    }
    match value {
        Value::Object(map) => match map.get(segments[0]) {
            Some(inner) => data_get_value(inner, &segments[1..]),
            None => Value::Null,
        },
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| data_get_value(item, segments)).collect())
        }
        _ => Value::Null,
    }
}

/// First-non-empty semantics for fallback chains.
fn value_is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Normalize temporal strings to canonical ISO-8601; other values pass
/// through as plain JSON.
fn format_value(value: Value, field_type: FieldType) -> Value {
    if field_type.is_temporal() {
        if let Value::String(s) = &value {
            return Value::String(canonical_iso(s));
        }
    }
    value
}

/// Best-effort ISO-8601 normalization of common datastore formats.
///
/// Unparseable input passes through untouched.
pub fn canonical_iso(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.to_rfc3339_opts(SecondsFormat::Secs, true);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return naive.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true);
        }
    }
    if NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
        return trimmed.to_string();
    }
    raw.to_string()
}

// =============================================================================
// Special field kinds
// =============================================================================

/// Attachment lists resolve from their loaded association rows.
fn attachment_value(row: &Row, column: &ColumnDefinition) -> Value {
    let relation = column.relation.as_deref().unwrap_or("media");
    match row.get(relation) {
        Some(Value::Array(items)) if !items.is_empty() => Value::Array(items.clone()),
        _ => Value::Null,
    }
}

/// Many-to-many projection: loaded association rows narrowed to the
/// nested sortable columns plus id.
fn pivot_value(row: &Row, column: &ColumnDefinition) -> Value {
    let Some(relation) = column.relation.as_deref() else {
        return Value::Null;
    };
    let Some(Value::Array(items)) = row.get(relation) else {
        return Value::Array(vec![]);
    };
    let keys = nested_projection_keys(column);
    Value::Array(
        items
            .iter()
            .map(|item| match item {
                Value::Object(map) => Value::Object(narrow_row(map, &keys)),
                other => other.clone(),
            })
            .collect(),
    )
}

/// Reference lookup: fetch the referenced entity (or entities) by the
/// stored id(s) and project only the nested sortable columns plus id.
fn reference_value(
    store: &dyn Datastore,
    registry: &ModelRegistry,
    row: &Row,
    column: &ColumnDefinition,
    diag: &Diagnostics,
) -> Result<Value, DatastoreError> {
    let Some(relation) = column.relation.as_deref() else {
        diag.warn(
            COMPONENT,
            format!("reference column '{}' has no relation", column.key),
        );
        return Ok(Value::Null);
    };
    let Some(target) = registry.get(relation) else {
        diag.warn(
            COMPONENT,
            format!("reference column '{}' names unregistered entity '{relation}'", column.key),
        );
        return Ok(Value::Null);
    };

    let stored = match row.get(&column.key) {
        Some(value) => value.clone(),
        None => return Ok(Value::Null),
    };
    let ids = stored_ids(&stored);
    if ids.is_empty() {
        return Ok(if column.single {
            Value::Null
        } else {
            Value::Array(vec![])
        });
    }

    let mut select_keys = nested_projection_keys(column);
    if !select_keys.contains(&target.primary_key) {
        select_keys.insert(0, target.primary_key.clone());
    }

    let query = Query::new()
        .select(select_keys.iter().map(|k| col(k)).collect::<Vec<_>>())
        .from(TableRef::new(&target.table))
        .filter(col(&target.primary_key).in_list(ids.iter().filter_map(lit_json).collect()));
    let fetched = store.select(&query)?;

    Ok(if column.single {
        fetched
            .into_iter()
            .next()
            .map(Value::Object)
            .unwrap_or(Value::Null)
    } else {
        Value::Array(fetched.into_iter().map(Value::Object).collect())
    })
}

/// Ids referenced by a stored value: a bare id, a list of ids, a JSON
/// string encoding either, or objects carrying an `id`.
fn stored_ids(stored: &Value) -> Vec<Value> {
    match stored {
        Value::Number(_) => vec![stored.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => map.get("id").cloned(),
                Value::Number(_) | Value::String(_) => Some(item.clone()),
                _ => None,
            })
            .collect(),
        Value::String(s) => {
            if let Ok(decoded) = serde_json::from_str::<Value>(s) {
                if !matches!(decoded, Value::String(_)) {
                    return stored_ids(&decoded);
                }
            }
            if s.trim().is_empty() {
                vec![]
            } else {
                vec![stored.clone()]
            }
        }
        _ => vec![],
    }
}

/// Keys the nested column spec marks sortable.
fn nested_projection_keys(column: &ColumnDefinition) -> Vec<String> {
    column
        .columns
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter(|nested| nested.sortable)
        .map(|nested| nested.key.clone())
        .collect()
}

fn narrow_row(map: &Row, keys: &[String]) -> Row {
    let mut out = Row::new();
    for key in keys {
        if let Some(value) = map.get(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    if let Some(id) = map.get("id") {
        out.entry("id".to_string()).or_insert_with(|| id.clone());
    }
    out
}

// =============================================================================
// Link decoration
// =============================================================================

/// Build the `{url, target, style}` decoration for a column, or `None`
/// when the resolved URL is empty.
fn render_link(link: &LinkSpec, row: &Row) -> Option<Value> {
    let url = if let Some(url_field) = &link.url_field {
        let value = resolve_key(row, url_field, FieldType::Text);
        match value {
            Value::String(s) if !s.trim().is_empty() => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        }
    } else {
        let template = link.url.as_deref()?;
        PLACEHOLDER
            .replace_all(template, |captures: &regex::Captures| {
                placeholder_value(row, &captures[1])
            })
            .into_owned()
    };

    let mut decoration = Row::new();
    decoration.insert("url".into(), Value::String(url));
    decoration.insert(
        "target".into(),
        Value::String(link.target.clone().unwrap_or_else(|| "_self".into())),
    );
    decoration.insert(
        "style".into(),
        Value::String(link.style.clone().unwrap_or_else(|| "default".into())),
    );
    Some(Value::Object(decoration))
}

fn placeholder_value(row: &Row, path: &str) -> String {
    match data_get_row(row, path) {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
