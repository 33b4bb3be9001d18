//! Candidate-link inference.
//!
//! Entities that share a category are proposed as `related_to` pairs. Pairs
//! are unordered: for members `i < j` of a group only `(i, j)` is emitted, so
//! a category of `n` distinct entities yields exactly `n * (n - 1) / 2`
//! candidates. The fallback bucket is never linked.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::classify::{Category, Classifier};
use crate::config::CategoryMapping;
use crate::entity::{Entity, EntityId};
use crate::error::ValidationError;
use crate::relation::{CandidateRelation, RELATED_TO};

/// Entities of one category, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    /// Shared category.
    pub category: Category,
    /// Members, in the order they were supplied.
    pub entities: Vec<Entity>,
}

/// Proposes relations between entities of the same category.
#[derive(Debug, Clone)]
pub struct LinkProposer {
    classifier: Classifier,
}

impl LinkProposer {
    /// Builds a proposer over a category mapping.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the mapping lists a type under two
    /// categories or has an unusable category name.
    pub fn new(mapping: &CategoryMapping) -> Result<Self, ValidationError> {
        Ok(Self {
            classifier: Classifier::new(mapping)?,
        })
    }

    /// Builds a proposer from an existing classifier.
    #[must_use]
    pub const fn with_classifier(classifier: Classifier) -> Self {
        Self { classifier }
    }

    /// Returns the classifier in use.
    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Partitions entities by category.
    ///
    /// Groups follow mapping order, with the fallback bucket last when it has
    /// members. Empty categories are omitted. An id seen twice is kept only at
    /// its first position.
    #[must_use]
    pub fn group(&self, entities: &[Entity]) -> Vec<CategoryGroup> {
        let mut seen: HashSet<EntityId> = HashSet::with_capacity(entities.len());
        let mut buckets: HashMap<Category, Vec<Entity>> = HashMap::new();
        for entity in entities {
            if !seen.insert(entity.id) {
                debug!(id = %entity.id, "ignoring repeated entity");
                continue;
            }
            buckets
                .entry(self.classifier.classify(&entity.entity_type))
                .or_default()
                .push(entity.clone());
        }

        let mut groups = Vec::with_capacity(buckets.len());
        for category in self.classifier.categories() {
            if let Some(members) = buckets.remove(category) {
                groups.push(CategoryGroup {
                    category: category.clone(),
                    entities: members,
                });
            }
        }
        if let Some(members) = buckets.remove(&Category::uncategorized()) {
            groups.push(CategoryGroup {
                category: Category::uncategorized(),
                entities: members,
            });
        }
        groups
    }

    /// Emits one `related_to` candidate per unordered same-category pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use kbgraph::{CategoryMapping, Entity, EntityId, LinkProposer};
    ///
    /// let proposer = LinkProposer::new(&CategoryMapping::default()).unwrap();
    /// let entities = vec![
    ///     Entity::new(EntityId::new(1), "A", "Person"),
    ///     Entity::new(EntityId::new(2), "B", "Person"),
    ///     Entity::new(EntityId::new(3), "C", "Note"),
    /// ];
    /// let candidates = proposer.propose(&entities);
    /// assert_eq!(candidates.len(), 1);
    /// assert_eq!(candidates[0].to_name, "A related to B");
    /// ```
    #[must_use]
    pub fn propose(&self, entities: &[Entity]) -> Vec<CandidateRelation> {
        let mut candidates = Vec::new();
        for group in self.group(entities) {
            if group.category.is_uncategorized() {
                continue;
            }
            let before = candidates.len();
            let context = format!("auto-linked: shared category {}", group.category);
            for (i, left) in group.entities.iter().enumerate() {
                for right in &group.entities[i + 1..] {
                    candidates.push(CandidateRelation::new(
                        left.id,
                        right.id,
                        RELATED_TO,
                        format!("{} related to {}", left.title, right.title),
                        context.clone(),
                    ));
                }
            }
            debug!(
                category = %group.category,
                members = group.entities.len(),
                candidates = candidates.len() - before,
                "proposed links for category"
            );
        }
        candidates
    }
}
