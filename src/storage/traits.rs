//! Abstract storage traits for kbgraph.
//!
//! The store is reached only through a transaction scope. A scope is opened
//! with [`KnowledgeStore::begin`], does its reads and writes, and is either
//! committed explicitly or rolled back when dropped, so every exit path
//! releases it.

use thiserror::Error;

use crate::entity::{Entity, EntityId, Observation};
use crate::relation::{Relation, RelationKey};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// A relation with the same (from, to, type) key already exists.
    #[error("Duplicate relation: {0}")]
    DuplicateRelation(RelationKey),

    /// Some other unique or primary key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A row refers to an entity that does not exist.
    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store could not be opened.
    #[error("Connection error: {0}")]
    Connection(String),
}

impl StorageError {
    /// Returns true if the store rejected a write on a constraint.
    #[must_use]
    pub const fn is_constraint(&self) -> bool {
        matches!(
            self,
            Self::DuplicateRelation(_) | Self::DuplicateKey(_) | Self::DanglingReference(_)
        )
    }

    /// Returns true if the error leaves the store unusable for the current batch.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Backend(_) | Self::Serialization(_) | Self::Connection(_)
        )
    }
}

/// A persistent knowledge store.
pub trait KnowledgeStore {
    /// Opens a transaction scope.
    ///
    /// # Errors
    /// Returns `Backend` if the scope cannot be opened.
    fn begin(&mut self) -> Result<Box<dyn StoreTx + '_>, StorageError>;
}

/// Reads and writes inside one transaction scope.
///
/// Dropping a scope without calling [`StoreTx::commit`] discards its writes.
pub trait StoreTx {
    // Entities

    /// List all entities ordered by id.
    fn list_entities(&self) -> Result<Vec<Entity>, StorageError>;

    /// Get an entity by id.
    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, StorageError>;

    /// Find entities whose title matches exactly.
    fn find_entities_by_title(&self, title: &str) -> Result<Vec<Entity>, StorageError>;

    /// Insert an entity with its own id. Returns `DuplicateKey` if the id is taken.
    fn insert_entity(&mut self, entity: &Entity) -> Result<(), StorageError>;

    /// Set or clear an entity's folder. Returns `EntityNotFound` if absent.
    fn set_entity_folder(&mut self, id: EntityId, folder: Option<&str>)
        -> Result<(), StorageError>;

    /// Add a tag to an entity. Returns false if the tag was already present.
    fn add_entity_tag(&mut self, id: EntityId, tag: &str) -> Result<bool, StorageError>;

    /// Delete an entity row. Returns `EntityNotFound` if absent.
    fn delete_entity(&mut self, id: EntityId) -> Result<(), StorageError>;

    // Relations

    /// List all relations ordered by key.
    fn list_relations(&self) -> Result<Vec<Relation>, StorageError>;

    /// Relations whose source is `id`.
    fn relations_from(&self, id: EntityId) -> Result<Vec<Relation>, StorageError>;

    /// Relations whose target is `id`.
    fn relations_to(&self, id: EntityId) -> Result<Vec<Relation>, StorageError>;

    /// Returns true if a relation with this key exists.
    fn relation_exists(&self, key: &RelationKey) -> Result<bool, StorageError>;

    /// Insert a relation.
    ///
    /// # Errors
    /// - `DuplicateRelation`: the key is already present
    /// - `DanglingReference`: an endpoint does not exist
    fn insert_relation(&mut self, relation: &Relation) -> Result<(), StorageError>;

    /// Move a relation to new endpoints, keeping its type, label, and context.
    /// Returns false if no relation has `key`.
    ///
    /// # Errors
    /// - `DuplicateRelation`: the new key is already present
    /// - `DanglingReference`: a new endpoint does not exist
    fn repoint_relation(
        &mut self,
        key: &RelationKey,
        from_id: EntityId,
        to_id: EntityId,
    ) -> Result<bool, StorageError>;

    /// Delete a relation. Returns false if it did not exist.
    fn delete_relation(&mut self, key: &RelationKey) -> Result<bool, StorageError>;

    // Observations

    /// Insert an observation for an entity, returning the stored row.
    fn insert_observation(
        &mut self,
        entity_id: EntityId,
        content: &str,
    ) -> Result<Observation, StorageError>;

    /// Observations owned by `entity_id`, ordered by id.
    fn observations_for(&self, entity_id: EntityId) -> Result<Vec<Observation>, StorageError>;

    /// Move every observation of `from` to `to`. Returns the number moved.
    fn reassign_observations(&mut self, from: EntityId, to: EntityId)
        -> Result<usize, StorageError>;

    /// Persist every write made in this scope.
    fn commit(self: Box<Self>) -> Result<(), StorageError>;
}
