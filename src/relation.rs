//! Directed, typed edges between entities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Relation type emitted by the link proposer.
pub const RELATED_TO: &str = "related_to";

/// Logical uniqueness key of a relation.
///
/// The store rejects a second relation with the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationKey {
    /// Source entity.
    pub from_id: EntityId,
    /// Target entity.
    pub to_id: EntityId,
    /// Relation tag.
    pub relation_type: String,
}

impl RelationKey {
    /// Builds a key.
    #[must_use]
    pub fn new(from_id: EntityId, to_id: EntityId, relation_type: impl Into<String>) -> Self {
        Self {
            from_id,
            to_id,
            relation_type: relation_type.into(),
        }
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.from_id, self.to_id, self.relation_type)
    }
}

/// A directed, typed edge between two entities.
///
/// # Examples
///
/// ```
/// use kbgraph::{EntityId, Relation};
///
/// let rel = Relation::new(EntityId::new(32), EntityId::new(9), "part_of", "Project X", "manual");
/// assert_eq!(rel.key().to_string(), "(32, 9, part_of)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Source entity.
    pub from_id: EntityId,
    /// Target entity.
    pub to_id: EntityId,
    /// Relation tag.
    pub relation_type: String,
    /// Human-readable label.
    pub to_name: String,
    /// Provenance of the relation.
    pub context: String,
}

/// A relation proposed by the link proposer or supplied by a user, not yet persisted.
pub type CandidateRelation = Relation;

impl Relation {
    /// Builds a relation.
    #[must_use]
    pub fn new(
        from_id: EntityId,
        to_id: EntityId,
        relation_type: impl Into<String>,
        to_name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            from_id,
            to_id,
            relation_type: relation_type.into(),
            to_name: to_name.into(),
            context: context.into(),
        }
    }

    /// Returns the uniqueness key of this relation.
    #[must_use]
    pub fn key(&self) -> RelationKey {
        RelationKey::new(self.from_id, self.to_id, self.relation_type.clone())
    }

    /// Returns true if this relation refers to `id` at either end.
    #[must_use]
    pub fn touches(&self, id: EntityId) -> bool {
        self.from_id == id || self.to_id == id
    }
}
