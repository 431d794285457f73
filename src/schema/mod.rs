//! Entity schema - descriptors for the relational entities the engine
//! can serve.
//!
//! A descriptor names an entity's physical table, fields and primary key,
//! declares its associations (the edges the column analyzer and planner
//! walk), registers computed attributes with their static dependency
//! manifests, and exposes named scopes as server-declared predicate
//! fragments.

pub mod graph;
pub mod registry;

use std::collections::HashMap;
use std::sync::Arc;

use inflector::Inflector;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sql::Expr;

pub use graph::{AssociationGraph, ResolvedHop, ResolvedPath, SchemaError};
pub use registry::{ModelRegistry, TokenError};

// =============================================================================
// Field Types
// =============================================================================

/// Declared type of a requested column.
///
/// Drives filter value semantics and projection of special field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Boolean,
    Date,
    Timestamp,
    Select,
    /// Reference lookup: the column stores the id (or id list) of a row in
    /// another registered entity.
    #[serde(alias = "model_search")]
    Reference,
    /// Many-to-many projection through a named association.
    #[serde(alias = "pivot_model")]
    Pivot,
    /// Polymorphic attachment list resolved through an association.
    #[serde(alias = "media")]
    Attachment,
}

impl FieldType {
    /// Field kinds that are never part of the physical select list.
    pub fn is_special(&self) -> bool {
        matches!(
            self,
            FieldType::Reference | FieldType::Pivot | FieldType::Attachment
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Timestamp)
    }
}

// =============================================================================
// Associations
// =============================================================================

/// How an association joins two entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationKind {
    /// To-one; the foreign key lives on the base entity.
    BelongsTo {
        foreign_key: String,
        owner_key: String,
    },
    /// To-one; the foreign key lives on the related entity.
    HasOne {
        foreign_key: String,
        local_key: String,
    },
    /// To-many; the foreign key lives on the related entity.
    HasMany {
        foreign_key: String,
        local_key: String,
    },
    /// To-many through a pivot table.
    ManyToMany {
        pivot_table: String,
        pivot_foreign_key: String,
        pivot_related_key: String,
        local_key: String,
        related_key: String,
    },
}

impl AssociationKind {
    pub fn is_to_many(&self) -> bool {
        matches!(
            self,
            AssociationKind::HasMany { .. } | AssociationKind::ManyToMany { .. }
        )
    }
}

/// A named association from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub name: String,
    /// Registered name of the target entity.
    pub target: String,
    pub kind: AssociationKind,
}

// =============================================================================
// Computed Attributes
// =============================================================================

/// Row-level resolver for a computed attribute.
pub type ComputedResolver =
    Arc<dyn Fn(&serde_json::Map<String, Value>) -> Option<Value> + Send + Sync>;

/// Comparison operator in a derivation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    /// Logical negation, used when a boolean computed filter asks for `false`.
    pub fn inverted(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Gte,
            CompareOp::Lte => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Lte,
            CompareOp::Gte => CompareOp::Lt,
        }
    }
}

/// Structured description of how a computed attribute derives its value.
///
/// Declared up front instead of inspected from implementation source; the
/// assembler uses it to push computed filters into the physical query when
/// one of the recognized shapes applies.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// Not expressible as a physical predicate; filters on it are skipped.
    Opaque,
    /// Boolean existence of an association.
    ExistsAssociation { association: String },
    /// `field <op> constant` on the entity itself.
    FieldComparison {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// `related.field` when the association exists, else false.
    RelatedFieldIfExists { association: String, field: String },
    /// Direct `association.field` access.
    AssociationField { association: String, field: String },
    /// Direct access to one of the entity's own physical columns.
    OwnField { field: String },
}

/// A read-only attribute produced by entity-specific logic rather than a
/// physical column.
#[derive(Clone)]
pub struct ComputedAttribute {
    pub name: String,
    /// Association paths the derivation reads - the static dependency
    /// manifest used for batch loading.
    pub dependencies: Vec<String>,
    pub derivation: Derivation,
    pub resolver: Option<ComputedResolver>,
}

impl ComputedAttribute {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            dependencies: vec![],
            derivation: Derivation::Opaque,
            resolver: None,
        }
    }

    pub fn depends_on<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn derived_as(mut self, derivation: Derivation) -> Self {
        self.derivation = derivation;
        self
    }

    pub fn resolver(
        mut self,
        f: impl Fn(&serde_json::Map<String, Value>) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.resolver = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for ComputedAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedAttribute")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("derivation", &self.derivation)
            .field("resolver", &self.resolver.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

// =============================================================================
// Named Scopes
// =============================================================================

/// A reusable, server-declared predicate fragment.
///
/// Receives the caller's positional parameters; returns `None` when the
/// parameters don't apply, which skips the scope with a warning.
pub type ScopeFn = Arc<dyn Fn(&[Value]) -> Option<Expr> + Send + Sync>;

// =============================================================================
// Entity Descriptor
// =============================================================================

/// Everything the engine knows about one entity type.
#[derive(Clone)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub fields: Vec<String>,
    /// Whether the table carries created_at/updated_at columns.
    pub timestamps: bool,
    pub associations: Vec<Association>,
    pub computed: Vec<ComputedAttribute>,
    pub scopes: HashMap<String, ScopeFn>,
}

impl EntityDescriptor {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".into(),
            fields: vec![],
            timestamps: false,
            associations: vec![],
            computed: vec![],
            scopes: HashMap::new(),
        }
    }

    pub fn primary_key(mut self, key: &str) -> Self {
        self.primary_key = key.into();
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// To-one association whose foreign key lives on this entity.
    ///
    /// The foreign key defaults to `<name>_id`, the owner key to the
    /// target's conventional `id`.
    pub fn belongs_to(mut self, name: &str, target: &str) -> Self {
        self.associations.push(Association {
            name: name.into(),
            target: target.into(),
            kind: AssociationKind::BelongsTo {
                foreign_key: format!("{}_id", name.to_snake_case()),
                owner_key: "id".into(),
            },
        });
        self
    }

    /// To-one association whose foreign key lives on the related entity.
    pub fn has_one(mut self, name: &str, target: &str) -> Self {
        let foreign_key = format!("{}_id", self.name.to_snake_case());
        self.associations.push(Association {
            name: name.into(),
            target: target.into(),
            kind: AssociationKind::HasOne {
                foreign_key,
                local_key: self.primary_key.clone(),
            },
        });
        self
    }

    /// To-many association whose foreign key lives on the related entity.
    pub fn has_many(mut self, name: &str, target: &str) -> Self {
        let foreign_key = format!("{}_id", self.name.to_snake_case());
        self.associations.push(Association {
            name: name.into(),
            target: target.into(),
            kind: AssociationKind::HasMany {
                foreign_key,
                local_key: self.primary_key.clone(),
            },
        });
        self
    }

    /// To-many association through a pivot table.
    ///
    /// Pivot naming follows convention: the two singular entity names,
    /// sorted, joined with `_` (posts/tags -> `post_tag`).
    pub fn many_to_many(mut self, name: &str, target: &str) -> Self {
        let own = self.name.to_snake_case().to_singular();
        let other = name.to_snake_case().to_singular();
        let mut parts = [own.clone(), other.clone()];
        parts.sort();
        self.associations.push(Association {
            name: name.into(),
            target: target.into(),
            kind: AssociationKind::ManyToMany {
                pivot_table: parts.join("_"),
                pivot_foreign_key: format!("{own}_id"),
                pivot_related_key: format!("{other}_id"),
                local_key: self.primary_key.clone(),
                related_key: "id".into(),
            },
        });
        self
    }

    /// Register an association with explicit keys.
    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    pub fn computed(mut self, attribute: ComputedAttribute) -> Self {
        self.computed.push(attribute);
        self
    }

    pub fn scope(
        mut self,
        name: &str,
        f: impl Fn(&[Value]) -> Option<Expr> + Send + Sync + 'static,
    ) -> Self {
        self.scopes.insert(name.into(), Arc::new(f));
        self
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// Is `name` a physical column of this entity?
    pub fn has_field(&self, name: &str) -> bool {
        name == self.primary_key
            || self.fields.iter().any(|f| f == name)
            || (self.timestamps && (name == "created_at" || name == "updated_at"))
    }

    pub fn find_association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn find_computed(&self, name: &str) -> Option<&ComputedAttribute> {
        self.computed.iter().find(|c| c.name == name)
    }

    pub fn find_scope(&self, name: &str) -> Option<&ScopeFn> {
        self.scopes.get(name)
    }
}

impl std::fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields)
            .field("timestamps", &self.timestamps)
            .field("associations", &self.associations)
            .field("computed", &self.computed)
            .field("scopes", &self.scopes.keys().collect::<Vec<_>>())
            .finish()
    }
}
