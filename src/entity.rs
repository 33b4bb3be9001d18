//! Entity and observation records.
//!
//! Entities are created outside this crate (by the note-taking tools that
//! feed the store); here they are read, relabeled, tagged, or deleted during
//! a merge. Identity is the integer id assigned by the store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable integer identifier of an entity row.
///
/// # Examples
///
/// ```
/// use kbgraph::EntityId;
///
/// let id = EntityId::new(14);
/// assert_eq!(id.get(), 14);
/// assert_eq!(id.to_string(), "14");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Wraps a raw store id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw store id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<EntityId> for i64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// A titled, typed record in the knowledge store.
///
/// `entity_type` is kept as the raw string the store holds; its category is
/// derived on demand by a [`Classifier`](crate::Classifier) and never stored.
///
/// # Examples
///
/// ```
/// use kbgraph::{Entity, EntityId};
///
/// let entity = Entity::new(EntityId::new(1), "Ada Lovelace", "Person");
/// assert!(entity.folder.is_none());
/// assert!(entity.tags.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Store-assigned identifier.
    pub id: EntityId,

    /// Human-readable title.
    pub title: String,

    /// Declared type string, matched exactly against the category mapping.
    pub entity_type: String,

    /// Folder the backing file was filed under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,

    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Entity {
    /// Creates an entity with no folder and no tags.
    #[must_use]
    pub fn new(id: EntityId, title: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            entity_type: entity_type.into(),
            folder: None,
            tags: Vec::new(),
        }
    }

    /// Sets the folder.
    #[must_use]
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Adds a tag unless it is already present. Returns true if the tag was added.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Returns true if the entity carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Identifier of an observation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationId(pub i64);

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A content fragment owned by exactly one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Store-assigned identifier.
    pub id: ObservationId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Observation text.
    pub content: String,
}
