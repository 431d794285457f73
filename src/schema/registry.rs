//! ModelRegistry - the server-side allow-list of entity descriptors.
//!
//! Clients never name entity types directly. They hold an opaque signed
//! token minted by the server; the registry verifies the signature and
//! resolves the token against registered descriptors only.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use super::graph::{AssociationGraph, SchemaResult};
use super::EntityDescriptor;

/// Errors raised while minting or resolving model tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed model token")]
    Malformed,

    #[error("model token signature mismatch")]
    BadSignature,

    #[error("unknown model: {0}")]
    UnknownModel(String),
}

/// Allow-listed entity descriptors plus the signing secret for tokens.
pub struct ModelRegistry {
    secret: Vec<u8>,
    entities: HashMap<String, Arc<EntityDescriptor>>,
}

impl ModelRegistry {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            entities: HashMap::new(),
        }
    }

    /// Register an entity descriptor under its name.
    pub fn register(mut self, descriptor: EntityDescriptor) -> Self {
        self.entities
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        self
    }

    /// Look up a descriptor by registered name (server-side use).
    pub fn get(&self, name: &str) -> Option<Arc<EntityDescriptor>> {
        self.entities.get(name).cloned()
    }

    /// Mint the opaque token for a registered entity.
    pub fn token_for(&self, name: &str) -> Result<String, TokenError> {
        if !self.entities.contains_key(name) {
            return Err(TokenError::UnknownModel(name.into()));
        }
        let payload = URL_SAFE_NO_PAD.encode(name.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(self.sign(name));
        Ok(format!("{payload}.{signature}"))
    }

    /// Resolve a client-supplied token to its descriptor.
    ///
    /// The token must decode, carry a valid signature, and name a
    /// registered entity. No part of the token is ever interpreted as a
    /// type name.
    pub fn resolve(&self, token: &str) -> Result<Arc<EntityDescriptor>, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let name_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let name = String::from_utf8(name_bytes).map_err(|_| TokenError::Malformed)?;

        let expected = URL_SAFE_NO_PAD.encode(self.sign(&name));
        if signature != expected {
            return Err(TokenError::BadSignature);
        }

        self.entities
            .get(&name)
            .cloned()
            .ok_or(TokenError::UnknownModel(name))
    }

    /// Build the association graph over all registered entities.
    pub fn graph(&self) -> SchemaResult<AssociationGraph> {
        AssociationGraph::build(self.entities.values().map(|d| d.as_ref()))
    }

    fn sign(&self, name: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update([0x1f]);
        hasher.update(name.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .finish()
    }
}
