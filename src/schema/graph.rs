//! AssociationGraph - graph representation of the registered entities for
//! association path resolution.
//!
//! Nodes are entity names; each declared association contributes a named,
//! directed edge to its target entity. Dot-separated request paths are
//! validated by walking edges segment by segment.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::{Association, EntityDescriptor};

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while building or walking the association graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("entity '{entity}' has no association named '{name}'")]
    UnknownAssociation { entity: String, name: String },

    #[error("association '{entity}.{association}' targets unregistered entity '{target}'")]
    UnknownTarget {
        entity: String,
        association: String,
        target: String,
    },

    #[error("empty association path")]
    EmptyPath,
}

/// One resolved hop of an association path.
#[derive(Debug, Clone)]
pub struct ResolvedHop {
    pub association: Association,
    pub from: String,
    pub to: String,
}

/// A fully resolved association path.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub hops: Vec<ResolvedHop>,
}

impl ResolvedPath {
    /// The entity the path lands on.
    pub fn tail_entity(&self) -> &str {
        &self.hops.last().expect("resolved path has hops").to
    }

    /// The final hop's association.
    pub fn tail(&self) -> &ResolvedHop {
        self.hops.last().expect("resolved path has hops")
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// Graph of registered entities and their associations.
#[derive(Debug, Clone)]
pub struct AssociationGraph {
    graph: DiGraph<String, Association>,
    node_indices: HashMap<String, NodeIndex>,
}

impl AssociationGraph {
    /// Build the graph from registered descriptors.
    ///
    /// Fails fast on associations that target unregistered entities; that
    /// is a server configuration mistake, not a request-time condition.
    pub fn build<'a, I>(descriptors: I) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = &'a EntityDescriptor>,
    {
        let descriptors: Vec<&EntityDescriptor> = descriptors.into_iter().collect();
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for descriptor in &descriptors {
            let idx = graph.add_node(descriptor.name.clone());
            node_indices.insert(descriptor.name.clone(), idx);
        }

        for descriptor in &descriptors {
            let from = node_indices[&descriptor.name];
            for association in &descriptor.associations {
                let to = node_indices.get(&association.target).copied().ok_or_else(|| {
                    SchemaError::UnknownTarget {
                        entity: descriptor.name.clone(),
                        association: association.name.clone(),
                        target: association.target.clone(),
                    }
                })?;
                graph.add_edge(from, to, association.clone());
            }
        }

        Ok(Self {
            graph,
            node_indices,
        })
    }

    /// Look up a single association declared on `entity`.
    pub fn association_of(&self, entity: &str, name: &str) -> Option<&Association> {
        let idx = self.node_indices.get(entity)?;
        self.graph
            .edges(*idx)
            .map(|edge| edge.weight())
            .find(|assoc| assoc.name == name)
    }

    /// Resolve a dot-separated association path starting at `entity`.
    ///
    /// Every segment must name a declared association of the node reached
    /// so far.
    pub fn resolve_path(&self, entity: &str, path: &str) -> SchemaResult<ResolvedPath> {
        if path.is_empty() {
            return Err(SchemaError::EmptyPath);
        }
        if !self.node_indices.contains_key(entity) {
            return Err(SchemaError::UnknownEntity(entity.into()));
        }

        let mut current = entity.to_string();
        let mut hops = Vec::new();

        for segment in path.split('.') {
            let association = self
                .association_of(&current, segment)
                .cloned()
                .ok_or_else(|| SchemaError::UnknownAssociation {
                    entity: current.clone(),
                    name: segment.into(),
                })?;
            let to = association.target.clone();
            hops.push(ResolvedHop {
                association,
                from: current,
                to: to.clone(),
            });
            current = to;
        }

        Ok(ResolvedPath { hops })
    }

    /// The entity a path lands on, without materializing the hops.
    pub fn tail_entity_of(&self, entity: &str, path: &str) -> SchemaResult<String> {
        Ok(self.resolve_path(entity, path)?.tail_entity().to_string())
    }

    /// Number of registered entities.
    pub fn entity_count(&self) -> usize {
        self.node_indices.len()
    }
}
