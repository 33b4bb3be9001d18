//! Entity merger.
//!
//! Folds a duplicate entity into a canonical one: relations are re-pointed
//! (or dropped when the canonical side already has the equivalent edge),
//! observations change owner, and the duplicate row is deleted. Each merge
//! runs in its own transaction and commits only if every step succeeds.
//!
//! # Invariants
//!
//! - After a merge no relation references the duplicate id.
//! - The `(from_id, to_id, relation_type)` key stays unique.
//! - Every relation the duplicate had is represented by an equivalent one on
//!   the canonical entity. A relation between the two entities becomes a
//!   self-relation on the canonical one.

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::entity::EntityId;
use crate::error::{ExecutionError, KbError, KbResult, ValidationError};
use crate::relation::{Relation, RelationKey};
use crate::storage::{KnowledgeStore, StorageError, StoreTx};

/// Why a duplicate-side relation was removed instead of re-pointed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The canonical entity already has the equivalent relation.
    AlreadyPresent,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPresent => write!(f, "equivalent relation already on canonical entity"),
        }
    }
}

/// What one merge changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Surviving entity.
    pub canonical: EntityId,
    /// Removed entity.
    pub duplicate: EntityId,
    /// Relations moved onto the canonical entity, as `(old key, new key)`.
    pub repointed: Vec<(RelationKey, RelationKey)>,
    /// Relations deleted instead of moved.
    pub dropped: Vec<(RelationKey, DropReason)>,
    /// Number of observations that changed owner.
    pub observations_moved: usize,
}

/// A pair that could not be merged, and why.
#[derive(Debug)]
pub struct MergeFailure {
    /// Requested surviving entity.
    pub canonical: EntityId,
    /// Requested duplicate.
    pub duplicate: EntityId,
    /// The error that stopped this pair.
    pub error: KbError,
}

/// Outcome of a sequential batch of merges.
#[derive(Debug, Default)]
pub struct BatchMergeReport {
    /// Completed merges, in request order.
    pub merged: Vec<MergeReport>,
    /// Pairs that were skipped.
    pub failed: Vec<MergeFailure>,
}

/// Which end of a relation points at the duplicate.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    From,
    To,
}

/// Merges duplicate entities into canonical ones.
pub struct EntityMerger<'s> {
    store: &'s mut dyn KnowledgeStore,
}

impl<'s> EntityMerger<'s> {
    /// Creates a merger over `store`.
    pub fn new(store: &'s mut dyn KnowledgeStore) -> Self {
        Self { store }
    }

    /// Merges `duplicate` into `canonical`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::SelfMerge`] if both ids are the same
    /// - [`ExecutionError::EntityNotFound`] if either entity does not exist
    /// - a storage error if the store fails; nothing is persisted in that case
    #[instrument(skip(self), fields(canonical = %canonical, duplicate = %duplicate))]
    pub fn merge(&mut self, canonical: EntityId, duplicate: EntityId) -> KbResult<MergeReport> {
        if canonical == duplicate {
            return Err(ValidationError::SelfMerge { id: canonical }.into());
        }

        let mut tx = self.store.begin()?;
        for id in [canonical, duplicate] {
            if tx.get_entity(id)?.is_none() {
                return Err(ExecutionError::EntityNotFound { id }.into());
            }
        }

        let mut report = MergeReport {
            canonical,
            duplicate,
            repointed: Vec::new(),
            dropped: Vec::new(),
            observations_moved: 0,
        };

        let outgoing = tx.relations_from(duplicate)?;
        for relation in &outgoing {
            fold_relation(&mut *tx, relation, Endpoint::From, &mut report)?;
        }
        // Outgoing self-loops were already handled above.
        let incoming = tx.relations_to(duplicate)?;
        for relation in incoming.iter().filter(|r| r.from_id != duplicate) {
            fold_relation(&mut *tx, relation, Endpoint::To, &mut report)?;
        }

        report.observations_moved = tx.reassign_observations(duplicate, canonical)?;
        tx.delete_entity(duplicate)?;
        tx.commit()?;

        info!(
            repointed = report.repointed.len(),
            dropped = report.dropped.len(),
            observations_moved = report.observations_moved,
            "merged entity"
        );
        Ok(report)
    }

    /// Merges each `(canonical, duplicate)` pair in order.
    ///
    /// A pair that fails validation or names a missing entity is recorded in
    /// [`BatchMergeReport::failed`] and the batch continues. Each pair is fully
    /// committed before the next begins.
    ///
    /// # Errors
    ///
    /// Returns the first fatal storage error; pairs merged before it stay merged.
    pub fn merge_all(&mut self, pairs: &[(EntityId, EntityId)]) -> KbResult<BatchMergeReport> {
        let mut batch = BatchMergeReport::default();
        for &(canonical, duplicate) in pairs {
            match self.merge(canonical, duplicate) {
                Ok(report) => batch.merged.push(report),
                Err(error) if !error.is_fatal() => {
                    warn!(%canonical, %duplicate, %error, "merge skipped");
                    batch.failed.push(MergeFailure {
                        canonical,
                        duplicate,
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(batch)
    }
}

/// Moves one duplicate-side relation onto the canonical entity.
fn fold_relation(
    tx: &mut dyn StoreTx,
    relation: &Relation,
    endpoint: Endpoint,
    report: &mut MergeReport,
) -> Result<(), StorageError> {
    let old = relation.key();
    let (from_id, to_id) = match endpoint {
        Endpoint::From if relation.to_id == report.duplicate => {
            (report.canonical, report.canonical)
        }
        Endpoint::From => (report.canonical, relation.to_id),
        Endpoint::To => (relation.from_id, report.canonical),
    };
    let target = RelationKey::new(from_id, to_id, relation.relation_type.clone());

    if tx.relation_exists(&target)? {
        return drop_relation(tx, old, DropReason::AlreadyPresent, report);
    }

    match tx.repoint_relation(&old, from_id, to_id) {
        Ok(true) => {
            debug!(from = %old, to = %target, "repointed relation");
            report.repointed.push((old, target));
            Ok(())
        }
        Ok(false) => {
            debug!(key = %old, "relation vanished before repoint");
            Ok(())
        }
        Err(StorageError::DuplicateRelation(_)) => {
            drop_relation(tx, old, DropReason::AlreadyPresent, report)
        }
        Err(e) => Err(e),
    }
}

fn drop_relation(
    tx: &mut dyn StoreTx,
    key: RelationKey,
    reason: DropReason,
    report: &mut MergeReport,
) -> Result<(), StorageError> {
    tx.delete_relation(&key)?;
    debug!(key = %key, %reason, "dropped relation");
    report.dropped.push((key, reason));
    Ok(())
}
