//! Configuration values.
//!
//! The type-to-category table and the organizer rules are plain values
//! handed to the components that need them. A JSON file may override any
//! part; missing fields fall back to the built-in defaults.
//!
//! ```json
//! {
//!   "database": "notes.db",
//!   "categories": [{ "category": "Professional", "types": ["Person"] }],
//!   "organizer": [{ "keyword": "meeting", "folder": "Notes/Meeting Notes", "tags": ["meeting"] }]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::Category;
use crate::error::{KbError, KbResult, ValidationError};

/// Default database file name.
pub const DEFAULT_DATABASE: &str = "knowledge.db";

/// One category and the exact type strings it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category name.
    pub category: String,
    /// Entity type strings mapped to this category.
    pub types: Vec<String>,
}

impl CategoryRule {
    /// Builds a rule.
    #[must_use]
    pub fn new<I, S>(category: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category: category.into(),
            types: types.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered type-to-category table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMapping(Vec<CategoryRule>);

impl CategoryMapping {
    /// Builds a mapping from rules, in precedence order.
    #[must_use]
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self(rules)
    }

    /// Rules in mapping order.
    #[must_use]
    pub fn rules(&self) -> &[CategoryRule] {
        &self.0
    }

    /// Checks that category names are usable and no type is listed twice.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for rule in &self.0 {
            let name = rule.category.trim();
            if name.is_empty() {
                return Err(ValidationError::EmptyCategoryName);
            }
            if name == Category::UNCATEGORIZED {
                return Err(ValidationError::ReservedCategory {
                    name: rule.category.clone(),
                });
            }
            for entity_type in &rule.types {
                if entity_type.is_empty() {
                    return Err(ValidationError::EmptyType {
                        category: rule.category.clone(),
                    });
                }
                if let Some(first) = seen.insert(entity_type, &rule.category) {
                    if first != rule.category {
                        return Err(ValidationError::OverlappingType {
                            entity_type: entity_type.clone(),
                            first: first.to_string(),
                            second: rule.category.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for CategoryMapping {
    fn default() -> Self {
        Self(vec![
            CategoryRule::new(
                "Professional",
                [
                    "Person",
                    "Journey",
                    "Network",
                    "Professional Achievement",
                    "Professional Journey",
                ],
            ),
            CategoryRule::new("Project", ["Creative Project", "Technical Project", "Project"]),
            CategoryRule::new(
                "Knowledge",
                ["Note", "Technical Document", "Technical Documentation"],
            ),
        ])
    }
}

/// Moves files whose name contains `keyword` into `folder` and tags the
/// matching entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerRule {
    /// Case-insensitive substring matched against file names.
    pub keyword: String,
    /// Destination folder, relative to the organizer's target root. May be nested.
    pub folder: String,
    /// Tags added to entities filed here. Empty means the folder name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl OrganizerRule {
    /// Builds a rule that tags with the folder name.
    #[must_use]
    pub fn new(keyword: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            folder: folder.into(),
            tags: Vec::new(),
        }
    }

    /// Replaces the tag list.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Tags applied to entities filed by this rule.
    #[must_use]
    pub fn effective_tags(&self) -> Vec<&str> {
        if self.tags.is_empty() {
            vec![self.folder.as_str()]
        } else {
            self.tags.iter().map(String::as_str).collect()
        }
    }
}

fn default_organizer_rules() -> Vec<OrganizerRule> {
    const ACTIVE: &str = "Projects/Active";
    const IDEAS: &str = "Ideas & Concepts";
    const SCRIPTS: &str = "Scripts & Automation";
    vec![
        OrganizerRule::new("project", ACTIVE).with_tags(["project", "active"]),
        OrganizerRule::new("completed", "Projects/Completed").with_tags(["project", "completed"]),
        OrganizerRule::new("idea", IDEAS).with_tags(["idea", "concept"]),
        OrganizerRule::new("concept", IDEAS).with_tags(["idea", "concept"]),
        OrganizerRule::new("contact", "People/Contacts").with_tags(["contact"]),
        OrganizerRule::new("mentor", "People/Mentors").with_tags(["mentor"]),
        OrganizerRule::new("article", "Resources/Articles").with_tags(["article"]),
        OrganizerRule::new("book", "Resources/Books").with_tags(["book"]),
        OrganizerRule::new("tool", "Resources/Tools").with_tags(["tool"]),
        OrganizerRule::new("meeting", "Notes/Meeting Notes").with_tags(["meeting"]),
        OrganizerRule::new("research", "Notes/Research").with_tags(["research"]),
        OrganizerRule::new("learning", "Notes/Learning").with_tags(["learning"]),
        OrganizerRule::new("script", SCRIPTS).with_tags(["script", "automation"]),
        OrganizerRule::new("workflow", SCRIPTS).with_tags(["script", "automation"]),
        OrganizerRule::new("archive", "Archive/Old Projects").with_tags(["archive"]),
    ]
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path of the SQLite database.
    pub database: PathBuf,
    /// Type-to-category table.
    pub categories: CategoryMapping,
    /// Filesystem organizer rules, in precedence order.
    pub organizer: Vec<OrganizerRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            categories: CategoryMapping::default(),
            organizer: default_organizer_rules(),
        }
    }
}

impl Config {
    /// Reads and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::Config`] if the file cannot be read or parsed, and
    /// [`KbError::Validation`] if its contents are inconsistent.
    pub fn load(path: &Path) -> KbResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| KbError::config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_json(&raw)
            .map_err(|e| KbError::config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        debug!(
            path = %path.display(),
            categories = config.categories.rules().len(),
            organizer_rules = config.organizer.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Parses configuration from a JSON string without validating it.
    ///
    /// # Errors
    ///
    /// Returns the parser error.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Validates the category table and organizer rules.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.categories.validate()?;
        for rule in &self.organizer {
            if rule.keyword.trim().is_empty() {
                return Err(ValidationError::EmptyField {
                    field: "organizer.keyword".to_string(),
                });
            }
            if rule.folder.trim().is_empty() {
                return Err(ValidationError::EmptyField {
                    field: "organizer.folder".to_string(),
                });
            }
            if rule.tags.iter().any(|t| t.trim().is_empty()) {
                return Err(ValidationError::EmptyField {
                    field: "organizer.tags".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.database, PathBuf::from(DEFAULT_DATABASE));
        assert!(!config.organizer.is_empty());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"database": "notes.db"}"#).unwrap();
        assert_eq!(config.database, PathBuf::from("notes.db"));
        assert_eq!(config.categories, CategoryMapping::default());
    }

    #[test]
    fn test_json_categories_replace_defaults() {
        let raw = r#"{"categories": [{"category": "Work", "types": ["Person", "Meeting"]}]}"#;
        let config = Config::from_json(raw).unwrap();
        assert_eq!(config.categories.rules().len(), 1);
        assert_eq!(config.categories.rules()[0].types, vec!["Person", "Meeting"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::from_json(r#"{"databse": "x.db"}"#).is_err());
    }

    #[test]
    fn test_overlap_rejected() {
        let mapping = CategoryMapping::new(vec![
            CategoryRule::new("Work", ["Person"]),
            CategoryRule::new("Life", ["Hobby", "Person"]),
        ]);
        match mapping.validate() {
            Err(ValidationError::OverlappingType { entity_type, first, second }) => {
                assert_eq!(entity_type, "Person");
                assert_eq!(first, "Work");
                assert_eq!(second, "Life");
            }
            other => panic!("expected overlap error, got {other:?}"),
        }
    }

    #[test]
    fn test_repeat_within_one_category_allowed() {
        let mapping = CategoryMapping::new(vec![CategoryRule::new("Work", ["Person", "Person"])]);
        mapping.validate().unwrap();
    }

    #[test]
    fn test_reserved_and_empty_names_rejected() {
        let reserved = CategoryMapping::new(vec![CategoryRule::new("Uncategorized", ["X"])]);
        assert!(matches!(
            reserved.validate(),
            Err(ValidationError::ReservedCategory { .. })
        ));

        let empty = CategoryMapping::new(vec![CategoryRule::new("  ", ["X"])]);
        assert!(matches!(empty.validate(), Err(ValidationError::EmptyCategoryName)));

        let empty_type = CategoryMapping::new(vec![CategoryRule::new("Work", [""])]);
        assert!(matches!(empty_type.validate(), Err(ValidationError::EmptyType { .. })));
    }

    #[test]
    fn test_empty_organizer_keyword_rejected() {
        let config = Config {
            organizer: vec![OrganizerRule::new("", "Misc")],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::EmptyField { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kbgraph.json");
        fs::write(&path, r#"{"organizer": [{"keyword": "trip", "folder": "Travel"}]}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.organizer, vec![OrganizerRule::new("trip", "Travel")]);

        assert_eq!(config.organizer[0].effective_tags(), vec!["Travel"]);

        let missing = Config::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, KbError::Config { .. }));
    }

    #[test]
    fn test_default_tables() {
        let config = Config::default();
        let names: Vec<&str> = config
            .categories
            .rules()
            .iter()
            .map(|r| r.category.as_str())
            .collect();
        assert_eq!(names, vec!["Professional", "Project", "Knowledge"]);

        let active = &config.organizer[0];
        assert_eq!(active.keyword, "project");
        assert_eq!(active.folder, "Projects/Active");
        assert_eq!(active.effective_tags(), vec!["project", "active"]);
        assert_eq!(config.organizer.len(), 15);
    }

    #[test]
    fn test_organizer_tags_from_json() {
        let raw = r#"{"organizer": [
            {"keyword": "idea", "folder": "Ideas", "tags": ["idea", "concept"]},
            {"keyword": "trip", "folder": "Travel"}
        ]}"#;
        let config = Config::from_json(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.organizer[0].effective_tags(), vec!["idea", "concept"]);
        assert!(config.organizer[1].tags.is_empty());
        assert_eq!(config.organizer[1].effective_tags(), vec!["Travel"]);

        let blank = Config {
            organizer: vec![OrganizerRule::new("x", "X").with_tags([" "])],
            ..Config::default()
        };
        assert!(matches!(blank.validate(), Err(ValidationError::EmptyField { .. })));
    }

    #[test]
    fn test_load_rejects_invalid_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"categories": [{"category": "A", "types": ["T"]}, {"category": "B", "types": ["T"]}]}"#,
        )
        .unwrap();
        assert!(Config::load(&path).unwrap_err().is_validation());
    }
}
