//! Query assembler - applies scopes, filters, search and sort to produce
//! an immutable [`QueryPlan`].
//!
//! Clause order is fixed and non-commutative: named scopes, advanced
//! filters (minus deferred orderings), simple filters, free-text search,
//! then sort. Every clause that fails to resolve is dropped with a
//! diagnostic; assembly itself never fails.

use serde_json::Value;

use crate::analyze::{split_alternatives, split_path_and_leaf, ColumnAnalysis};
use crate::diag::Diagnostics;
use crate::plan::EagerLoadPlan;
use crate::request::{
    AdvancedFilter, AdvancedOp, ColumnDefinition, FilterOptions, SearchMode, TableRequest,
};
use crate::schema::{
    AssociationKind, CompareOp, Derivation, EntityDescriptor, FieldType, ModelRegistry,
    ResolvedHop,
};
use crate::schema::graph::AssociationGraph;
use crate::sql::{
    cast, col, count_star, exists, extract, lit_bool, lit_int, lit_json, lit_str, lower, max,
    table_col, CastType, DatePart, Expr, ExprExt, Join, JoinType, OrderByExpr, Query, SelectExpr,
    SortDir, TableRef,
};

const COMPONENT: &str = "assembler";

// =============================================================================
// Query Plan
// =============================================================================

/// What the page query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectList {
    /// Everything; required whenever associations or computed attributes
    /// need columns the request didn't name (foreign keys, manifests).
    Star,
    /// A narrow physical column list.
    Fields(Vec<String>),
}

/// Immutable description of one table read.
///
/// Built functionally by [`assemble`] and handed once to the executor;
/// nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub entity: String,
    pub table: String,
    pub primary_key: String,
    pub select: SelectList,
    pub predicate: Option<Expr>,
    pub order: Vec<OrderByExpr>,
    pub eager: EagerLoadPlan,
    pub page: u64,
    pub per_page: u64,
    /// Whether the entity tracks updated_at for cache invalidation.
    pub track_timestamps: bool,
}

impl QueryPlan {
    /// The paginated row query.
    pub fn page_query(&self) -> Query {
        let mut query = Query::new().from(TableRef::new(&self.table));
        query = match &self.select {
            SelectList::Star => query.select_star(),
            SelectList::Fields(fields) => {
                query.select(fields.iter().map(|f| col(f)).collect::<Vec<_>>())
            }
        };
        if let Some(predicate) = &self.predicate {
            query = query.filter(predicate.clone());
        }
        query
            .order_by(self.order.clone())
            .limit(self.per_page)
            .offset((self.page - 1) * self.per_page)
    }

    /// The total-count query over the same predicate.
    pub fn count_query(&self) -> Query {
        let mut query = Query::new()
            .select(vec![SelectExpr::new(count_star()).with_alias("aggregate")])
            .from(TableRef::new(&self.table));
        if let Some(predicate) = &self.predicate {
            query = query.filter(predicate.clone());
        }
        query
    }

    /// Latest-modification probe for cache invalidation, when tracked.
    pub fn timestamp_query(&self) -> Option<Query> {
        if !self.track_timestamps {
            return None;
        }
        let mut query = Query::new()
            .select(vec![
                SelectExpr::new(max(table_col(&self.table, "updated_at"))).with_alias("aggregate"),
            ])
            .from(TableRef::new(&self.table));
        if let Some(predicate) = &self.predicate {
            query = query.filter(predicate.clone());
        }
        Some(query)
    }
}

// =============================================================================
// Assembly
// =============================================================================

/// Assemble the query plan for a request.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    entity: &EntityDescriptor,
    graph: &AssociationGraph,
    registry: &ModelRegistry,
    request: &TableRequest,
    analysis: &ColumnAnalysis,
    eager: EagerLoadPlan,
    page: u64,
    per_page: u64,
    diag: &Diagnostics,
) -> QueryPlan {
    let ctx = Ctx {
        entity,
        graph,
        registry,
        diag,
    };

    let mut predicate: Option<Expr> = None;

    // 1. Named scopes.
    for call in &request.model_scopes {
        match entity.find_scope(&call.name) {
            Some(scope) => match scope(&call.parameters) {
                Some(expr) => and_into(&mut predicate, expr.paren()),
                None => diag.warn(
                    COMPONENT,
                    format!("scope '{}' declined its parameters; skipped", call.name),
                ),
            },
            None => diag.warn(
                COMPONENT,
                format!("unknown scope '{}' skipped", call.name),
            ),
        }
    }

    // 2. Advanced filters; orderings are deferred (or suppressed by a
    //    manual sort).
    let manual_sort = request.sort.is_some();
    let mut deferred_orderings: Vec<&AdvancedFilter> = Vec::new();
    for filter in &request.advanced_filters {
        if filter.operator.is_ordering() {
            if manual_sort {
                diag.info(
                    COMPONENT,
                    format!(
                        "manual sort overrides deferred ordering on '{}'",
                        filter.field
                    ),
                );
            } else {
                deferred_orderings.push(filter);
            }
            continue;
        }
        if entity.find_computed(&filter.field).is_some() {
            diag.info(
                COMPONENT,
                format!(
                    "skipping advanced filter for computed attribute '{}'",
                    filter.field
                ),
            );
            continue;
        }
        if let Some(expr) = ctx.advanced_predicate(filter) {
            and_into(&mut predicate, expr);
        }
    }

    // 3. Simple per-field filters.
    for (key, filter_value) in &request.filters {
        let value = filter_value.value();
        if value_is_empty(value) {
            continue;
        }
        let Some(column) = request.find_column(key) else {
            continue;
        };
        if !column.filterable {
            diag.info(COMPONENT, format!("column '{key}' is not filterable"));
            continue;
        }

        if !key.contains('.') && !key.contains('|') {
            if let Some(attribute) = entity.find_computed(key) {
                match ctx.computed_predicate(attribute.derivation.clone(), value, filter_value.mode())
                {
                    Some(expr) => and_into(&mut predicate, expr),
                    None => diag.info(
                        COMPONENT,
                        format!("filter on computed attribute '{key}' has no physical translation"),
                    ),
                }
                continue;
            }
        }

        let alternatives = split_alternatives(key);
        if alternatives.len() > 1 {
            let mut group: Option<Expr> = None;
            for alternative in alternatives {
                if entity.find_computed(alternative).is_some() {
                    continue;
                }
                if let Some(expr) = ctx.filter_single(alternative, column, value, filter_value.mode())
                {
                    or_into(&mut group, expr);
                }
            }
            if let Some(group) = group {
                and_into(&mut predicate, group.paren());
            }
        } else if let Some(expr) = ctx.filter_single(key, column, value, filter_value.mode()) {
            and_into(&mut predicate, expr);
        }
    }

    // 4. Free-text search across sortable, non-computed fields.
    if let Some(term) = request.search.as_deref() {
        let term = term.trim();
        if !term.is_empty() {
            let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
            let mut group: Option<Expr> = None;
            for column in request.columns.iter().filter(|c| c.sortable) {
                for alternative in split_alternatives(&column.key) {
                    if entity.find_computed(alternative).is_some() {
                        continue;
                    }
                    if let Some(expr) = ctx.search_single(alternative, &pattern) {
                        or_into(&mut group, expr);
                    }
                }
            }
            if let Some(group) = group {
                and_into(&mut predicate, group.paren());
            }
        }
    }

    // 5. Sort: manual wins; deferred orderings otherwise.
    let direction = request
        .direction
        .map(|d| d.to_sql())
        .unwrap_or(SortDir::Asc);
    let mut order: Vec<OrderByExpr> = Vec::new();
    if let Some(sort_key) = request.sort.as_deref() {
        order.push(ctx.sort_expr(sort_key, direction));
    } else {
        for filter in deferred_orderings {
            match filter.operator {
                AdvancedOp::OrderBy => {
                    let dir = ordering_direction(&filter.options);
                    order.push(ctx.sort_expr(&filter.field, dir));
                }
                AdvancedOp::OrderByMultiple => {
                    let Some(Value::Array(items)) = &filter.value else {
                        continue;
                    };
                    for item in items {
                        let column = item
                            .get("column")
                            .and_then(Value::as_str)
                            .unwrap_or(&filter.field);
                        let dir = match item.get("direction").and_then(Value::as_str) {
                            Some("desc") => SortDir::Desc,
                            _ => SortDir::Asc,
                        };
                        order.push(ctx.sort_expr(column, dir));
                    }
                }
                _ => {}
            }
        }
    }
    if order.is_empty() {
        // Deterministic pagination needs a total order.
        order.push(OrderByExpr::with_dir(
            table_col(&entity.table, &entity.primary_key),
            SortDir::Asc,
        ));
    }

    // Narrow select is only safe when nothing needs undeclared columns.
    let select = if eager.is_empty() && analysis.computed.is_empty() {
        let mut fields = vec![entity.primary_key.clone()];
        for field in &analysis.base_fields {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        if entity.timestamps && !fields.iter().any(|f| f == "updated_at") {
            fields.push("updated_at".into());
        }
        SelectList::Fields(fields)
    } else {
        SelectList::Star
    };

    QueryPlan {
        entity: entity.name.clone(),
        table: entity.table.clone(),
        primary_key: entity.primary_key.clone(),
        select,
        predicate,
        order,
        eager,
        page,
        per_page,
        track_timestamps: entity.timestamps,
    }
}

fn ordering_direction(options: &Option<FilterOptions>) -> SortDir {
    options
        .as_ref()
        .and_then(|o| o.direction)
        .map(|d| d.to_sql())
        .unwrap_or(SortDir::Asc)
}

fn and_into(predicate: &mut Option<Expr>, clause: Expr) {
    *predicate = Some(match predicate.take() {
        Some(existing) => existing.and(clause),
        None => clause,
    });
}

fn or_into(predicate: &mut Option<Expr>, clause: Expr) {
    *predicate = Some(match predicate.take() {
        Some(existing) => existing.or(clause),
        None => clause,
    });
}

/// Empty filter values are ignored, matching the caller's intent of "no
/// constraint".
fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Escape LIKE wildcards in user input; patterns always use `\` escapes.
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn numeric_literal(value: &Value) -> Option<Expr> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(lit_int(i))
            } else {
                n.as_f64().map(crate::sql::lit_float)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(lit_int(i))
            } else {
                s.parse::<f64>().ok().map(crate::sql::lit_float)
            }
        }
        _ => None,
    }
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// =============================================================================
// Resolution context
// =============================================================================

struct Ctx<'a> {
    entity: &'a EntityDescriptor,
    graph: &'a AssociationGraph,
    registry: &'a ModelRegistry,
    diag: &'a Diagnostics,
}

impl Ctx<'_> {
    fn table_of(&self, entity_name: &str) -> Option<String> {
        self.registry.get(entity_name).map(|d| d.table.clone())
    }

    fn tail_descriptor(&self, path: &str) -> Option<std::sync::Arc<EntityDescriptor>> {
        let tail = self.graph.tail_entity_of(&self.entity.name, path).ok()?;
        self.registry.get(&tail)
    }

    // -------------------------------------------------------------------------
    // Existence subqueries
    // -------------------------------------------------------------------------

    /// Rewrite a predicate on a related attribute as a nested EXISTS chain
    /// correlated by each hop's join keys.
    ///
    /// `inner` receives the innermost hop's alias and builds the leaf
    /// predicate; `None` produces a bare existence check.
    fn exists_over_path(
        &self,
        path: &str,
        inner: Option<&dyn Fn(&str) -> Option<Expr>>,
        negated: bool,
    ) -> Option<Expr> {
        let resolved = match self.graph.resolve_path(&self.entity.name, path) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.diag.warn(
                    COMPONENT,
                    format!("cannot filter through '{path}': {err}"),
                );
                return None;
            }
        };
        let expr = self.exists_hops(&resolved.hops, &self.entity.table, 1, inner)?;
        Some(match expr {
            Expr::Exists { query, .. } if negated => Expr::Exists {
                query,
                negated: true,
            },
            other if negated => other.not(),
            other => other,
        })
    }

    fn exists_hops(
        &self,
        hops: &[ResolvedHop],
        outer: &str,
        depth: usize,
        inner: Option<&dyn Fn(&str) -> Option<Expr>>,
    ) -> Option<Expr> {
        let hop = hops.first()?;
        let related_table = self.table_of(&hop.to)?;
        let alias = format!("t{depth}");
        let pivot_alias = format!("p{depth}");

        let (pivot_join, correlation) =
            correlate_hop(&hop.association.kind, outer, &alias, &pivot_alias);

        let mut query = Query::new()
            .select(vec![lit_int(1)])
            .from(TableRef::new(&related_table).with_alias(&alias));
        if let Some(join) = pivot_join {
            query = query.join(join.join_type, join.table, join.on);
        }
        query = query.filter(correlation);

        if hops.len() > 1 {
            let rest = self.exists_hops(&hops[1..], &alias, depth + 1, inner)?;
            query = query.filter(rest);
        } else if let Some(build_leaf) = inner {
            query = query.filter(build_leaf(&alias)?);
        }

        Some(exists(query))
    }

    // -------------------------------------------------------------------------
    // Advanced filters
    // -------------------------------------------------------------------------

    fn advanced_predicate(&self, filter: &AdvancedFilter) -> Option<Expr> {
        let field = filter.field.as_str();
        let value = filter.value.as_ref();
        let options = filter.options.as_ref();

        match filter.operator {
            AdvancedOp::WhereHas | AdvancedOp::WhereDoesntHave => {
                let negated = filter.operator == AdvancedOp::WhereDoesntHave;
                match (split_path_and_leaf(field), value) {
                    (Some((path, attribute)), Some(value)) => {
                        // Predicate on the related attribute inside the check.
                        let sql_op = options
                            .and_then(|o| o.operator.clone())
                            .unwrap_or_else(|| "=".into());
                        let attribute = attribute.to_string();
                        let value = value.clone();
                        self.exists_over_path(
                            &path,
                            Some(&move |alias: &str| {
                                comparison(table_col(alias, &attribute), &sql_op, &value)
                            }),
                            negated,
                        )
                    }
                    (Some((path, _)), None) => self.exists_over_path(&path, None, negated),
                    (None, _) => self.exists_over_path(field, None, negated),
                }
            }
            _ => {
                if let Some((path, attribute)) = split_path_and_leaf(field) {
                    let operator = filter.operator;
                    let attribute = attribute.to_string();
                    let value = value.cloned();
                    let options = options.cloned();
                    self.exists_over_path(
                        &path,
                        Some(&move |alias: &str| {
                            direct_advanced(
                                table_col(alias, &attribute),
                                operator,
                                value.as_ref(),
                                options.as_ref(),
                            )
                        }),
                        false,
                    )
                } else {
                    let expr = direct_advanced(
                        table_col(&self.entity.table, field),
                        filter.operator,
                        value,
                        options,
                    );
                    if expr.is_none() {
                        self.diag.warn(
                            COMPONENT,
                            format!(
                                "advanced filter '{:?}' on '{}' dropped: value not applicable",
                                filter.operator, field
                            ),
                        );
                    }
                    expr
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Simple filters
    // -------------------------------------------------------------------------

    fn filter_single(
        &self,
        key: &str,
        column: &ColumnDefinition,
        value: &Value,
        mode: SearchMode,
    ) -> Option<Expr> {
        let field_type = column.declared_type();
        if let Some((path, leaf)) = split_path_and_leaf(key) {
            let leaf = leaf.to_string();
            let value = value.clone();
            return self.exists_over_path(
                &path,
                Some(&move |alias: &str| {
                    typed_predicate(table_col(alias, &leaf), field_type, &value, mode)
                }),
                false,
            );
        }

        if !self.entity.has_field(key) {
            // Bare fallback alternatives may be literal defaults.
            return None;
        }
        typed_predicate(
            table_col(&self.entity.table, key),
            field_type,
            value,
            mode,
        )
    }

    fn search_single(&self, key: &str, pattern: &str) -> Option<Expr> {
        if let Some((path, leaf)) = split_path_and_leaf(key) {
            let leaf = leaf.to_string();
            let pattern = pattern.to_string();
            return self.exists_over_path(
                &path,
                Some(&move |alias: &str| {
                    Some(
                        lower(cast(table_col(alias, &leaf), CastType::Text))
                            .like_escape(lit_str(&pattern), '\\'),
                    )
                }),
                false,
            );
        }
        if !self.entity.has_field(key) {
            return None;
        }
        Some(
            lower(cast(table_col(&self.entity.table, key), CastType::Text))
                .like_escape(lit_str(pattern), '\\'),
        )
    }

    // -------------------------------------------------------------------------
    // Computed attribute translation
    // -------------------------------------------------------------------------

    /// Push a computed filter into the physical query when its declared
    /// derivation matches a translatable shape. The shapes are tried in
    /// declaration order of [`Derivation`]; anything else is skipped.
    fn computed_predicate(
        &self,
        derivation: Derivation,
        value: &Value,
        mode: SearchMode,
    ) -> Option<Expr> {
        match derivation {
            Derivation::ExistsAssociation { association } => {
                let wanted = truthy(value)?;
                self.exists_over_path(&association, None, !wanted)
            }
            Derivation::FieldComparison {
                field,
                op,
                value: constant,
            } => {
                let wanted = truthy(value)?;
                let op = if wanted { op } else { op.inverted() };
                let target = table_col(&self.entity.table, &field);
                let constant = lit_json(&constant)?;
                Some(apply_compare(target, op, constant))
            }
            Derivation::RelatedFieldIfExists { association, field } => {
                let wanted = truthy(value)?;
                self.exists_over_path(
                    &association,
                    Some(&move |alias: &str| Some(table_col(alias, &field).is_not_null())),
                    !wanted,
                )
            }
            Derivation::AssociationField { association, field } => {
                let value = value.clone();
                self.exists_over_path(
                    &association,
                    Some(&move |alias: &str| {
                        typed_predicate(table_col(alias, &field), FieldType::Text, &value, mode)
                    }),
                    false,
                )
            }
            Derivation::OwnField { field } => {
                if !self.entity.has_field(&field) {
                    return None;
                }
                typed_predicate(
                    table_col(&self.entity.table, &field),
                    FieldType::Text,
                    value,
                    mode,
                )
            }
            Derivation::Opaque => None,
        }
    }

    // -------------------------------------------------------------------------
    // Sort resolution
    // -------------------------------------------------------------------------

    /// Resolve a sort key, falling back to primary-key order on any
    /// failure. Never errors.
    fn sort_expr(&self, key: &str, direction: SortDir) -> OrderByExpr {
        let fallback = || {
            OrderByExpr::with_dir(
                table_col(&self.entity.table, &self.entity.primary_key),
                direction,
            )
        };

        if self.entity.find_computed(key).is_some() {
            self.diag.warn(
                COMPONENT,
                format!("cannot sort by computed attribute '{key}'; ordering by primary key"),
            );
            return fallback();
        }

        if let Some((path, leaf)) = split_path_and_leaf(key) {
            match self.association_sort(&path, leaf, direction) {
                Some(order) => return order,
                None => {
                    self.diag.warn(
                        COMPONENT,
                        format!("cannot sort by '{key}'; ordering by primary key"),
                    );
                    return fallback();
                }
            }
        }

        if self.entity.has_field(key) {
            return OrderByExpr::with_dir(table_col(&self.entity.table, key), direction);
        }

        self.diag.warn(
            COMPONENT,
            format!("unknown sort column '{key}'; ordering by primary key"),
        );
        fallback()
    }

    /// Order by a related attribute via a correlated scalar subquery.
    ///
    /// Single hop selects straight off the related table; deeper paths
    /// chain LEFT JOINs and stay correlated by the first hop.
    fn association_sort(&self, path: &str, leaf: &str, direction: SortDir) -> Option<OrderByExpr> {
        let resolved = self.graph.resolve_path(&self.entity.name, path).ok()?;
        let tail = self.tail_descriptor(path)?;
        if !tail.has_field(leaf) {
            return None;
        }

        let first = &resolved.hops[0];
        let first_table = self.table_of(&first.to)?;
        let first_alias = "t1".to_string();
        let (pivot_join, correlation) = correlate_hop(
            &first.association.kind,
            &self.entity.table,
            &first_alias,
            "p1",
        );

        let mut query = Query::new().from(TableRef::new(&first_table).with_alias(&first_alias));
        if let Some(join) = pivot_join {
            query = query.join(join.join_type, join.table, join.on);
        }

        let mut outer_alias = first_alias;
        for (index, hop) in resolved.hops.iter().enumerate().skip(1) {
            let alias = format!("t{}", index + 1);
            let pivot_alias = format!("p{}", index + 1);
            let table = self.table_of(&hop.to)?;
            for join in chain_joins(
                &hop.association.kind,
                &outer_alias,
                &alias,
                &table,
                &pivot_alias,
            ) {
                query = query.join(join.join_type, join.table, join.on);
            }
            outer_alias = alias;
        }

        query = query
            .select(vec![table_col(&outer_alias, leaf)])
            .filter(correlation)
            .limit(1);

        Some(OrderByExpr::with_dir(Expr::Subquery(Box::new(query)), direction).nulls_last())
    }
}

// =============================================================================
// Join-key helpers
// =============================================================================

/// Correlation of one hop against an outer row, for EXISTS subqueries and
/// first-hop sort correlation. Many-to-many hops contribute a pivot join.
fn correlate_hop(
    kind: &AssociationKind,
    outer: &str,
    alias: &str,
    pivot_alias: &str,
) -> (Option<Join>, Expr) {
    match kind {
        AssociationKind::BelongsTo {
            foreign_key,
            owner_key,
        } => (
            None,
            table_col(alias, owner_key).eq(table_col(outer, foreign_key)),
        ),
        AssociationKind::HasOne {
            foreign_key,
            local_key,
        }
        | AssociationKind::HasMany {
            foreign_key,
            local_key,
        } => (
            None,
            table_col(alias, foreign_key).eq(table_col(outer, local_key)),
        ),
        AssociationKind::ManyToMany {
            pivot_table,
            pivot_foreign_key,
            pivot_related_key,
            local_key,
            related_key,
        } => (
            Some(Join {
                join_type: JoinType::Inner,
                table: TableRef::new(pivot_table).with_alias(pivot_alias),
                on: table_col(pivot_alias, pivot_related_key).eq(table_col(alias, related_key)),
            }),
            table_col(pivot_alias, pivot_foreign_key).eq(table_col(outer, local_key)),
        ),
    }
}

/// LEFT JOIN chain for one hop of a multi-hop sort subquery.
fn chain_joins(
    kind: &AssociationKind,
    outer: &str,
    alias: &str,
    table: &str,
    pivot_alias: &str,
) -> Vec<Join> {
    match kind {
        AssociationKind::BelongsTo {
            foreign_key,
            owner_key,
        } => vec![Join {
            join_type: JoinType::Left,
            table: TableRef::new(table).with_alias(alias),
            on: table_col(alias, owner_key).eq(table_col(outer, foreign_key)),
        }],
        AssociationKind::HasOne {
            foreign_key,
            local_key,
        }
        | AssociationKind::HasMany {
            foreign_key,
            local_key,
        } => vec![Join {
            join_type: JoinType::Left,
            table: TableRef::new(table).with_alias(alias),
            on: table_col(alias, foreign_key).eq(table_col(outer, local_key)),
        }],
        AssociationKind::ManyToMany {
            pivot_table,
            pivot_foreign_key,
            pivot_related_key,
            local_key,
            related_key,
        } => vec![
            Join {
                join_type: JoinType::Left,
                table: TableRef::new(pivot_table).with_alias(pivot_alias),
                on: table_col(pivot_alias, pivot_foreign_key).eq(table_col(outer, local_key)),
            },
            Join {
                join_type: JoinType::Left,
                table: TableRef::new(table).with_alias(alias),
                on: table_col(alias, related_key).eq(table_col(pivot_alias, pivot_related_key)),
            },
        ],
    }
}

// =============================================================================
// Value semantics
// =============================================================================

fn apply_compare(target: Expr, op: CompareOp, constant: Expr) -> Expr {
    match op {
        CompareOp::Eq => target.eq(constant),
        CompareOp::Ne => target.ne(constant),
        CompareOp::Lt => target.lt(constant),
        CompareOp::Lte => target.lte(constant),
        CompareOp::Gt => target.gt(constant),
        CompareOp::Gte => target.gte(constant),
    }
}

/// SQL comparison from a `where` options operator string.
fn comparison(target: Expr, sql_op: &str, value: &Value) -> Option<Expr> {
    let literal = lit_json(value)?;
    Some(match sql_op {
        "=" => target.eq(literal),
        "!=" | "<>" => target.ne(literal),
        "<" => target.lt(literal),
        "<=" => target.lte(literal),
        ">" => target.gt(literal),
        ">=" => target.gte(literal),
        "like" | "LIKE" => target.like(literal),
        _ => return None,
    })
}

/// Predicate for a single advanced operator on a direct column.
fn direct_advanced(
    target: Expr,
    operator: AdvancedOp,
    value: Option<&Value>,
    options: Option<&FilterOptions>,
) -> Option<Expr> {
    match operator {
        AdvancedOp::WhereIn | AdvancedOp::WhereNotIn => {
            let Some(Value::Array(items)) = value else {
                return None;
            };
            if items.is_empty() {
                return None;
            }
            let literals: Vec<Expr> = items.iter().filter_map(lit_json).collect();
            Some(if operator == AdvancedOp::WhereIn {
                target.in_list(literals)
            } else {
                target.not_in_list(literals)
            })
        }
        AdvancedOp::WhereBetween | AdvancedOp::WhereNotBetween => {
            let Some(Value::Array(items)) = value else {
                return None;
            };
            if items.len() < 2 {
                return None;
            }
            let low = lit_json(&items[0])?;
            let high = lit_json(&items[1])?;
            Some(if operator == AdvancedOp::WhereBetween {
                target.between(low, high)
            } else {
                target.not_between(low, high)
            })
        }
        AdvancedOp::WhereNull => Some(target.is_null()),
        AdvancedOp::WhereNotNull => Some(target.is_not_null()),
        AdvancedOp::Where => {
            let sql_op = options
                .and_then(|o| o.operator.as_deref())
                .unwrap_or("=");
            comparison(target, sql_op, value?)
        }
        AdvancedOp::WhereDate => {
            let date = value?.as_str()?;
            Some(cast(target, CastType::Date).eq(lit_str(date)))
        }
        AdvancedOp::WhereMonth => date_part_eq(target, DatePart::Month, value?),
        AdvancedOp::WhereYear => date_part_eq(target, DatePart::Year, value?),
        AdvancedOp::WhereDay => date_part_eq(target, DatePart::Day, value?),
        AdvancedOp::WhereTime => {
            let time = value?.as_str()?;
            Some(cast(target, CastType::Time).eq(lit_str(time)))
        }
        // Relationship and ordering operators are handled by the caller.
        AdvancedOp::WhereHas
        | AdvancedOp::WhereDoesntHave
        | AdvancedOp::OrderBy
        | AdvancedOp::OrderByMultiple => None,
    }
}

fn date_part_eq(target: Expr, part: DatePart, value: &Value) -> Option<Expr> {
    let number = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(extract(part, target).eq(lit_int(number)))
}

/// Predicate for a simple filter value, honoring the column's declared
/// type and search mode.
///
/// Numeric values always resolve to exact matches, whatever the mode:
/// searching "5" must never match "15".
fn typed_predicate(
    target: Expr,
    field_type: FieldType,
    value: &Value,
    mode: SearchMode,
) -> Option<Expr> {
    match field_type {
        FieldType::Boolean => {
            let flag = truthy(value)?;
            Some(target.eq(lit_bool(flag)))
        }
        FieldType::Date | FieldType::Timestamp => date_range_predicate(target, value),
        FieldType::Select | FieldType::Reference => {
            let literal = numeric_literal(value).or_else(|| lit_json(value))?;
            Some(target.eq(literal))
        }
        FieldType::Number => {
            let literal = numeric_literal(value)?;
            Some(target.eq(literal))
        }
        FieldType::Pivot | FieldType::Attachment => None,
        FieldType::Text => {
            if let Some(literal) = numeric_literal(value) {
                return Some(target.eq(literal));
            }
            let text = value.as_str()?;
            match mode {
                SearchMode::Exact => Some(target.eq(lit_str(text))),
                SearchMode::StartsWith => {
                    Some(target.like_escape(lit_str(&format!("{}%", escape_like(text))), '\\'))
                }
                SearchMode::Contains => {
                    Some(target.like_escape(lit_str(&format!("%{}%", escape_like(text))), '\\'))
                }
            }
        }
    }
}

/// Date filters accept a bare day or a `{from,to}` range, compared at
/// date granularity.
fn date_range_predicate(target: Expr, value: &Value) -> Option<Expr> {
    match value {
        Value::String(s) => Some(cast(target, CastType::Date).eq(lit_str(s))),
        Value::Object(bounds) => {
            let mut expr: Option<Expr> = None;
            if let Some(from) = bounds.get("from").and_then(Value::as_str) {
                if !from.is_empty() {
                    and_into(
                        &mut expr,
                        cast(target.clone(), CastType::Date).gte(lit_str(from)),
                    );
                }
            }
            if let Some(to) = bounds.get("to").and_then(Value::as_str) {
                if !to.is_empty() {
                    and_into(&mut expr, cast(target, CastType::Date).lte(lit_str(to)));
                }
            }
            expr
        }
        _ => None,
    }
}
