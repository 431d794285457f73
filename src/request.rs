//! Request wire types - what a caller sends to describe a table read.
//!
//! The request is declarative: which entity (as an opaque token), which
//! columns (dot paths, pipe fallbacks, count keys, computed names), plus
//! filters, advanced filters, named scopes, free-text search, sort and
//! paging parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::FieldType;
use crate::sql::SortDir;

fn default_true() -> bool {
    true
}

/// Link decoration attached to a column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LinkSpec {
    /// URL template with `{field}` / `{association.field}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Column key whose resolved value is the URL itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// One requested output column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Output key. Dot syntax reaches through associations
    /// (`author.name`), pipe syntax declares fallbacks (`nickname|name`),
    /// a `_count` suffix requests a count-only association.
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    #[serde(default)]
    pub sortable: bool,

    #[serde(default = "default_true")]
    pub filterable: bool,

    /// Association or entity reference for special field kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkSpec>,

    /// Nested column spec for reference/pivot projections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnDefinition>>,

    /// Reference lookups: single id vs list of ids.
    #[serde(default, alias = "singleSearch")]
    pub single: bool,
}

impl ColumnDefinition {
    /// Bare column with just a key; everything else defaulted.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.into(),
            label: None,
            field_type: None,
            sortable: false,
            filterable: true,
            relation: None,
            link: None,
            columns: None,
            single: false,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn declared_type(&self) -> FieldType {
        self.field_type.unwrap_or_default()
    }
}

/// Match mode for text filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Contains,
    #[serde(alias = "startsWith")]
    StartsWith,
    Exact,
}

/// A simple per-field filter value, with or without an explicit mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Moded {
        value: Value,
        #[serde(default, rename = "searchMode", alias = "search_mode")]
        search_mode: SearchMode,
    },
    Raw(Value),
}

impl FilterValue {
    pub fn value(&self) -> &Value {
        match self {
            FilterValue::Moded { value, .. } => value,
            FilterValue::Raw(value) => value,
        }
    }

    pub fn mode(&self) -> SearchMode {
        match self {
            FilterValue::Moded { search_mode, .. } => *search_mode,
            FilterValue::Raw(_) => SearchMode::Contains,
        }
    }
}

/// The closed set of advanced filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvancedOp {
    WhereIn,
    WhereNotIn,
    WhereBetween,
    WhereNotBetween,
    WhereNull,
    WhereNotNull,
    Where,
    WhereDate,
    WhereMonth,
    WhereYear,
    WhereDay,
    WhereTime,
    WhereHas,
    WhereDoesntHave,
    OrderBy,
    OrderByMultiple,
}

impl AdvancedOp {
    /// Operators that contribute ordering rather than predicates.
    pub fn is_ordering(&self) -> bool {
        matches!(self, AdvancedOp::OrderBy | AdvancedOp::OrderByMultiple)
    }
}

/// Options accompanying an advanced filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    /// SQL comparison operator for `where` (`=`, `!=`, `<`, `<=`, `>`,
    /// `>=`, `like`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Sort direction for `orderBy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
}

/// A structured table-configuration filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedFilter {
    pub field: String,
    pub operator: AdvancedOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FilterOptions>,
}

/// Invocation of a server-declared named scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeCall {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
}

/// Requested sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(self) -> SortDir {
        match self {
            SortDirection::Asc => SortDir::Asc,
            SortDirection::Desc => SortDir::Desc,
        }
    }
}

/// A complete table read request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRequest {
    /// Opaque signed entity token; resolved through the server registry.
    pub model: String,

    pub columns: Vec<ColumnDefinition>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, FilterValue>,

    #[serde(
        default,
        rename = "advancedFilters",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub advanced_filters: Vec<AdvancedFilter>,

    #[serde(default, rename = "modelScopes", skip_serializing_if = "Vec::is_empty")]
    pub model_scopes: Vec<ScopeCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,

    #[serde(default, rename = "perPage", skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
}

impl TableRequest {
    /// Minimal request for an entity token and columns.
    pub fn new(model: &str, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            model: model.into(),
            columns,
            filters: BTreeMap::new(),
            advanced_filters: vec![],
            model_scopes: vec![],
            search: None,
            sort: None,
            direction: None,
            per_page: None,
            page: None,
        }
    }

    /// Column definition matching an exact key, if requested.
    pub fn find_column(&self, key: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.key == key)
    }
}
