//! Relation writer.
//!
//! Persists candidate or manually supplied relations in one transaction.
//! Constraint rejections are recorded per candidate and do not stop the
//! batch; backend failures roll the whole batch back.

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::error::KbResult;
use crate::relation::CandidateRelation;
use crate::storage::{KnowledgeStore, StorageError};

/// Why a candidate was not inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A relation with the same (from, to, type) key already exists.
    Duplicate,
    /// An endpoint does not reference an existing entity.
    MissingEndpoint(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => write!(f, "relation already exists"),
            Self::MissingEndpoint(detail) => write!(f, "missing endpoint ({detail})"),
        }
    }
}

/// Result of attempting one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The relation was inserted.
    Inserted,
    /// The relation was skipped.
    Skipped(SkipReason),
}

impl WriteOutcome {
    /// Returns true for [`WriteOutcome::Inserted`].
    #[must_use]
    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Per-candidate outcomes of one write batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Each candidate with what happened to it.
    pub outcomes: Vec<(CandidateRelation, WriteOutcome)>,
}

impl WriteReport {
    /// Number of inserted relations.
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_inserted()).count()
    }

    /// Number of skipped candidates.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.inserted()
    }

    /// Skipped candidates with their reasons.
    pub fn skips(&self) -> impl Iterator<Item = (&CandidateRelation, &SkipReason)> {
        self.outcomes.iter().filter_map(|(c, o)| match o {
            WriteOutcome::Skipped(reason) => Some((c, reason)),
            WriteOutcome::Inserted => None,
        })
    }
}

/// Writes relations into a knowledge store.
pub struct RelationWriter<'s> {
    store: &'s mut dyn KnowledgeStore,
}

impl<'s> RelationWriter<'s> {
    /// Creates a writer over `store`.
    pub fn new(store: &'s mut dyn KnowledgeStore) -> Self {
        Self { store }
    }

    /// Attempts every candidate, then commits the batch.
    ///
    /// Duplicates and dangling endpoints are skipped and reported; earlier
    /// inserts are kept. A relation from an entity to itself is written like
    /// any other.
    ///
    /// # Errors
    ///
    /// Returns a storage error (and persists nothing) if the store fails for
    /// any reason other than a constraint rejection.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub fn write(&mut self, candidates: &[CandidateRelation]) -> KbResult<WriteReport> {
        let mut tx = self.store.begin()?;
        let mut report = WriteReport {
            outcomes: Vec::with_capacity(candidates.len()),
        };

        for candidate in candidates {
            let outcome = match tx.insert_relation(candidate) {
                Ok(()) => WriteOutcome::Inserted,
                Err(StorageError::DuplicateRelation(_) | StorageError::DuplicateKey(_)) => {
                    WriteOutcome::Skipped(SkipReason::Duplicate)
                }
                Err(StorageError::DanglingReference(detail)) => {
                    WriteOutcome::Skipped(SkipReason::MissingEndpoint(detail))
                }
                Err(e) => return Err(e.into()),
            };

            match &outcome {
                WriteOutcome::Inserted => debug!(key = %candidate.key(), "inserted relation"),
                WriteOutcome::Skipped(reason) => {
                    warn!(key = %candidate.key(), %reason, "skipped relation");
                }
            }
            report.outcomes.push((candidate.clone(), outcome));
        }

        tx.commit()?;
        info!(
            inserted = report.inserted(),
            skipped = report.skipped(),
            "relation batch committed"
        );
        Ok(report)
    }
}
