//! # kbgraph - maintenance utilities for a personal knowledge graph
//!
//! kbgraph works on a local store of entities, relations, and observations
//! (a personal notes/memory graph). It classifies entities into coarse
//! categories, proposes links between entities that share a category,
//! writes relations while skipping ones the store already has, and folds
//! duplicate entities into canonical ones.
//!
//! ## Core Concepts
//!
//! - **Entity**: a titled, typed record in the store
//! - **Relation**: a directed, typed edge, unique on `(from_id, to_id, relation_type)`
//! - **Observation**: a content fragment owned by exactly one entity
//! - **Category**: a grouping derived from the entity type, never stored
//!
//! ## Usage
//!
//! ```rust
//! use kbgraph::{CategoryMapping, Entity, EntityId, KnowledgeStore, LinkProposer, SqliteStore};
//! use kbgraph::operations::RelationWriter;
//!
//! let mut store = SqliteStore::open_in_memory()?;
//! let mut tx = store.begin()?;
//! tx.insert_entity(&Entity::new(EntityId::new(1), "A", "Person"))?;
//! tx.insert_entity(&Entity::new(EntityId::new(2), "B", "Person"))?;
//! tx.insert_entity(&Entity::new(EntityId::new(3), "C", "Note"))?;
//! tx.commit()?;
//!
//! let entities = store.begin()?.list_entities()?;
//! let proposer = LinkProposer::new(&CategoryMapping::default())?;
//! let candidates = proposer.propose(&entities);
//!
//! let report = RelationWriter::new(&mut store).write(&candidates)?;
//! assert_eq!(report.inserted(), 1);
//! # Ok::<(), kbgraph::KbError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod config;
pub mod entity;
pub mod error;
pub mod link;
pub mod relation;

pub mod operations;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use classify::{classify, Category, Classifier};
pub use config::{CategoryMapping, CategoryRule, Config, OrganizerRule};
pub use entity::{Entity, EntityId, Observation, ObservationId};
pub use error::{ExecutionError, KbError, KbResult, ValidationError};
pub use link::{CategoryGroup, LinkProposer};
pub use relation::{CandidateRelation, Relation, RelationKey, RELATED_TO};
pub use storage::{KnowledgeStore, SqliteStore, StorageError, StoreTx};
