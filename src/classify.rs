//! Entity type classification.
//!
//! Maps an entity's declared type string to one of a small set of coarse
//! categories. Matching is exact and case-sensitive; unmapped types fall into
//! the [`Category::UNCATEGORIZED`] bucket.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CategoryMapping;
use crate::error::ValidationError;

/// A coarse grouping derived from an entity type. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Name of the fallback bucket for unmapped types.
    pub const UNCATEGORIZED: &'static str = "Uncategorized";

    /// Creates a category with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The fallback category.
    #[must_use]
    pub fn uncategorized() -> Self {
        Self(Self::UNCATEGORIZED.to_string())
    }

    /// Returns true for the fallback category.
    #[must_use]
    pub fn is_uncategorized(&self) -> bool {
        self.0 == Self::UNCATEGORIZED
    }

    /// Returns the category name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classifies a type string against a mapping.
///
/// Scans categories in mapping order and returns the first whose type list
/// contains `entity_type` exactly. Unmapped types yield
/// [`Category::uncategorized`].
///
/// # Examples
///
/// ```
/// use kbgraph::{classify, CategoryMapping};
///
/// let mapping = CategoryMapping::default();
/// assert_eq!(classify("Person", &mapping).as_str(), "Professional");
/// assert!(classify("person", &mapping).is_uncategorized());
/// ```
#[must_use]
pub fn classify(entity_type: &str, mapping: &CategoryMapping) -> Category {
    mapping
        .rules()
        .iter()
        .find(|rule| rule.types.iter().any(|t| t == entity_type))
        .map_or_else(Category::uncategorized, |rule| Category::new(rule.category.clone()))
}

/// Indexed classifier built from a validated mapping.
#[derive(Debug, Clone)]
pub struct Classifier {
    index: HashMap<String, Category>,
    order: Vec<Category>,
}

impl Classifier {
    /// Builds a classifier, rejecting overlapping or malformed mappings.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found in `mapping`.
    pub fn new(mapping: &CategoryMapping) -> Result<Self, ValidationError> {
        mapping.validate()?;

        let mut index = HashMap::new();
        let mut order = Vec::with_capacity(mapping.rules().len());
        for rule in mapping.rules() {
            let category = Category::new(rule.category.clone());
            for entity_type in &rule.types {
                index.insert(entity_type.clone(), category.clone());
            }
            order.push(category);
        }

        Ok(Self { index, order })
    }

    /// Returns the category for `entity_type`.
    #[must_use]
    pub fn classify(&self, entity_type: &str) -> Category {
        self.index
            .get(entity_type)
            .cloned()
            .unwrap_or_else(Category::uncategorized)
    }

    /// Configured categories in mapping order (the fallback bucket excluded).
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryRule;

    fn mapping() -> CategoryMapping {
        CategoryMapping::new(vec![
            CategoryRule::new("Professional", ["Person", "Organization"]),
            CategoryRule::new("Knowledge", ["Note", "Concept"]),
        ])
    }

    #[test]
    fn test_exact_match() {
        let mapping = mapping();
        assert_eq!(classify("Person", &mapping), Category::new("Professional"));
        assert_eq!(classify("Note", &mapping), Category::new("Knowledge"));
    }

    #[test]
    fn test_case_sensitive() {
        let mapping = mapping();
        assert!(classify("person", &mapping).is_uncategorized());
        assert!(classify("NOTE", &mapping).is_uncategorized());
        assert!(classify(" Note", &mapping).is_uncategorized());
    }

    #[test]
    fn test_unmapped_and_empty() {
        let mapping = mapping();
        assert!(classify("Recipe", &mapping).is_uncategorized());
        assert!(classify("", &mapping).is_uncategorized());
        assert!(classify("Recipe", &CategoryMapping::new(Vec::new())).is_uncategorized());
    }

    #[test]
    fn test_free_function_first_match_wins() {
        let overlapping = CategoryMapping::new(vec![
            CategoryRule::new("A", ["Person"]),
            CategoryRule::new("B", ["Person"]),
        ]);
        assert_eq!(classify("Person", &overlapping), Category::new("A"));
    }

    #[test]
    fn test_classifier_rejects_overlap() {
        let overlapping = CategoryMapping::new(vec![
            CategoryRule::new("A", ["Person"]),
            CategoryRule::new("B", ["Person"]),
        ]);
        let err = Classifier::new(&overlapping).unwrap_err();
        assert!(matches!(err, ValidationError::OverlappingType { .. }));
    }

    #[test]
    fn test_classifier_agrees_with_function() {
        let mapping = CategoryMapping::default();
        let classifier = Classifier::new(&mapping).unwrap();
        for t in ["Person", "Note", "Tool", "Hobby", "Unknown", "", "person"] {
            assert_eq!(classifier.classify(t), classify(t, &mapping), "type {t:?}");
            // Repeated calls are stable.
            assert_eq!(classifier.classify(t), classifier.classify(t));
        }
    }

    #[test]
    fn test_categories_in_mapping_order() {
        let classifier = Classifier::new(&mapping()).unwrap();
        let names: Vec<&str> = classifier.categories().iter().map(Category::as_str).collect();
        assert_eq!(names, vec!["Professional", "Knowledge"]);
    }
}
