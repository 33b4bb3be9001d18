//! Filesystem organizer.
//!
//! Walks a directory, files each document whose name contains a configured
//! keyword under `<target>/<folder>/`, and tags the entities titled after the
//! file with that folder. An existing file at the destination is never
//! overwritten; the source is skipped instead.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::OrganizerRule;
use crate::entity::EntityId;
use crate::error::{ExecutionError, KbResult, ValidationError};
use crate::storage::KnowledgeStore;

/// A file matched by a rule and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    /// Current location.
    pub source: PathBuf,
    /// Location after the move.
    pub destination: PathBuf,
    /// Folder named by the matching rule.
    pub folder: String,
}

/// Why a matched file was left where it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveSkip {
    /// A file already exists at the destination.
    DestinationExists,
    /// The file already lives under the target root.
    AlreadyOrganized,
    /// The rename itself failed.
    Failed(String),
}

impl fmt::Display for MoveSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DestinationExists => write!(f, "destination already exists"),
            Self::AlreadyOrganized => write!(f, "already under the target folder"),
            Self::Failed(message) => write!(f, "move failed: {message}"),
        }
    }
}

/// What an organize pass did (or, for a dry run, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeReport {
    /// Files moved.
    pub moved: Vec<PlannedMove>,
    /// Matched files left in place.
    pub skipped: Vec<(PlannedMove, MoveSkip)>,
    /// Files no rule matched.
    pub unmatched: usize,
    /// Entities whose folder and tags were updated.
    pub tagged: Vec<EntityId>,
}

/// Keyword-driven file organizer.
#[derive(Debug, Clone)]
pub struct Organizer {
    rules: Vec<(Regex, OrganizerRule)>,
}

impl Organizer {
    /// Compiles the rules. Keywords are matched literally and case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty keyword or folder.
    pub fn new(rules: &[OrganizerRule]) -> Result<Self, ValidationError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
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
            let pattern = RegexBuilder::new(&regex::escape(rule.keyword.trim()))
                .case_insensitive(true)
                .build()
                .map_err(|e| ValidationError::InvalidInput {
                    reason: format!("keyword '{}': {e}", rule.keyword),
                })?;
            compiled.push((pattern, rule.clone()));
        }
        Ok(Self { rules: compiled })
    }

    /// Returns the first rule whose keyword occurs in `file_name`.
    #[must_use]
    pub fn match_rule(&self, file_name: &str) -> Option<&OrganizerRule> {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(file_name))
            .map(|(_, rule)| rule)
    }

    /// Files matching documents from `source` into folders under `target`.
    ///
    /// With `dry_run` set nothing is moved and the store is left untouched,
    /// but the report lists what would happen. A file that cannot be moved is
    /// reported in [`OrganizeReport::skipped`] and the pass continues. The
    /// entities for each moved file are tagged and committed right after the
    /// move, so the store never lags behind the filesystem.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `source` cannot be walked and a storage error
    /// if tagging fails. Files moved and tagged before the error stay so.
    #[instrument(
        skip_all,
        fields(source = %source.display(), target = %target.display(), dry_run = dry_run)
    )]
    pub fn organize(
        &self,
        source: &Path,
        target: &Path,
        store: &mut dyn KnowledgeStore,
        dry_run: bool,
    ) -> KbResult<OrganizeReport> {
        let source = fs::canonicalize(source).map_err(|e| ExecutionError::io(source, &e))?;
        let resolved_target = resolve(target)?;
        let files = collect_files(&source)?;
        let mut report = OrganizeReport::default();

        for path in files {
            let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            let Some(rule) = self.match_rule(&file_name) else {
                report.unmatched += 1;
                continue;
            };

            let folder_dir = target.join(&rule.folder);
            let planned = PlannedMove {
                destination: folder_dir.join(&file_name),
                folder: rule.folder.clone(),
                source: path,
            };

            if planned.source.starts_with(&resolved_target) {
                debug!(path = %planned.source.display(), "already organized");
                report.skipped.push((planned, MoveSkip::AlreadyOrganized));
                continue;
            }
            if planned.destination.exists() {
                warn!(
                    source = %planned.source.display(),
                    destination = %planned.destination.display(),
                    "destination exists, skipping"
                );
                report.skipped.push((planned, MoveSkip::DestinationExists));
                continue;
            }

            if !dry_run {
                if let Err(e) = move_file(&planned, &folder_dir) {
                    warn!(source = %planned.source.display(), error = %e, "move failed");
                    report.skipped.push((planned, MoveSkip::Failed(e.to_string())));
                    continue;
                }
            }
            debug!(
                source = %planned.source.display(),
                destination = %planned.destination.display(),
                dry_run,
                "filed document"
            );

            let title = planned
                .source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            report.tagged.extend(tag_entities(store, &title, rule, dry_run)?);
            report.moved.push(planned);
        }

        info!(
            moved = report.moved.len(),
            skipped = report.skipped.len(),
            unmatched = report.unmatched,
            tagged = report.tagged.len(),
            dry_run,
            "organize pass finished"
        );
        Ok(report)
    }
}

fn move_file(planned: &PlannedMove, folder_dir: &Path) -> Result<(), ExecutionError> {
    fs::create_dir_all(folder_dir).map_err(|e| ExecutionError::io(folder_dir, &e))?;
    fs::rename(&planned.source, &planned.destination)
        .map_err(|e| ExecutionError::io(&planned.source, &e))
}

/// Files the entities titled `title` under `rule` in their own transaction.
fn tag_entities(
    store: &mut dyn KnowledgeStore,
    title: &str,
    rule: &OrganizerRule,
    dry_run: bool,
) -> KbResult<Vec<EntityId>> {
    let mut tx = store.begin()?;
    let ids: Vec<EntityId> = tx
        .find_entities_by_title(title)?
        .into_iter()
        .map(|e| e.id)
        .collect();
    if dry_run || ids.is_empty() {
        return Ok(ids);
    }
    for &id in &ids {
        tx.set_entity_folder(id, Some(&rule.folder))?;
        for tag in rule.effective_tags() {
            tx.add_entity_tag(id, tag)?;
        }
    }
    tx.commit()?;
    Ok(ids)
}

/// Absolute form of `path` with symlinks and `..` resolved as far as the
/// path exists.
fn resolve(path: &Path) -> Result<PathBuf, ExecutionError> {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        match fs::canonicalize(existing) {
            Ok(base) => return Ok(rest.iter().rev().fold(base, |acc, part| acc.join(part))),
            Err(e) => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(ExecutionError::io(path, &e));
                };
                rest.push(name.to_os_string());
                existing = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
            }
        }
    }
}

/// Lists regular files under `root` in a stable order.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>, ExecutionError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ExecutionError::Io {
            path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::storage::SqliteStore;

    fn organizer() -> Organizer {
        Organizer::new(&[
            OrganizerRule::new("meeting", "Meetings"),
            OrganizerRule::new("journal", "Journal"),
            OrganizerRule::new("c++", "Code"),
        ])
        .unwrap()
    }

    #[test]
    fn test_match_is_case_insensitive_and_first_wins() {
        let organizer = organizer();
        assert_eq!(organizer.match_rule("Team MEETING notes.md").unwrap().folder, "Meetings");
        assert_eq!(
            organizer.match_rule("meeting-journal.md").unwrap().folder,
            "Meetings"
        );
        assert_eq!(organizer.match_rule("journal-2024.md").unwrap().folder, "Journal");
        assert!(organizer.match_rule("groceries.md").is_none());
    }

    #[test]
    fn test_keyword_is_literal() {
        let organizer = organizer();
        assert_eq!(organizer.match_rule("learning C++.md").unwrap().folder, "Code");
        assert!(organizer.match_rule("learning c.md").is_none());
    }

    #[test]
    fn test_empty_rule_rejected() {
        assert!(Organizer::new(&[OrganizerRule::new(" ", "X")]).is_err());
        assert!(Organizer::new(&[OrganizerRule::new("x", "")]).is_err());
    }

    #[test]
    fn test_moves_skips_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("inbox");
        let target = dir.path().join("vault");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::create_dir_all(target.join("Journal")).unwrap();
        fs::write(source.join("weekly meeting.md"), "agenda").unwrap();
        fs::write(source.join("nested").join("journal.md"), "new").unwrap();
        fs::write(target.join("Journal").join("journal.md"), "old").unwrap();
        fs::write(source.join("groceries.md"), "milk").unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_entity(&Entity::new(EntityId::new(1), "weekly meeting", "Note"))
                .unwrap();
            tx.commit().unwrap();
        }

        let report = organizer()
            .organize(&source, &target, &mut store, false)
            .unwrap();

        assert_eq!(report.moved.len(), 1);
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].1, MoveSkip::DestinationExists);
        assert_eq!(report.tagged, vec![EntityId::new(1)]);

        assert!(target.join("Meetings").join("weekly meeting.md").exists());
        assert!(!source.join("weekly meeting.md").exists());
        // Collision left both files alone.
        assert_eq!(
            fs::read_to_string(target.join("Journal").join("journal.md")).unwrap(),
            "old"
        );
        assert!(source.join("nested").join("journal.md").exists());

        let tx = store.begin().unwrap();
        let entity = tx.get_entity(EntityId::new(1)).unwrap().unwrap();
        assert_eq!(entity.folder.as_deref(), Some("Meetings"));
        assert_eq!(entity.tags, vec!["Meetings".to_string()]);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("inbox");
        let target = dir.path().join("vault");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("meeting.md"), "x").unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_entity(&Entity::new(EntityId::new(1), "meeting", "Note")).unwrap();
            tx.commit().unwrap();
        }

        let report = organizer()
            .organize(&source, &target, &mut store, true)
            .unwrap();
        assert_eq!(report.moved.len(), 1);
        assert_eq!(report.tagged, vec![EntityId::new(1)]);
        assert!(source.join("meeting.md").exists());
        assert!(!target.exists());

        let tx = store.begin().unwrap();
        let entity = tx.get_entity(EntityId::new(1)).unwrap().unwrap();
        assert!(entity.folder.is_none());
        assert!(entity.tags.is_empty());
    }

    #[test]
    fn test_target_inside_source_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().to_path_buf();
        let target = source.join("vault");
        fs::create_dir_all(target.join("Meetings")).unwrap();
        fs::write(target.join("Meetings").join("meeting.md"), "x").unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        let report = organizer()
            .organize(&source, &target, &mut store, false)
            .unwrap();
        assert!(report.moved.is_empty());
        assert_eq!(report.skipped[0].1, MoveSkip::AlreadyOrganized);
    }

    #[test]
    fn test_rule_tags_and_nested_folder() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("inbox");
        let target = dir.path().join("vault");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("compiler project.md"), "x").unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_entity(&Entity::new(EntityId::new(1), "compiler project", "Project"))
                .unwrap();
            tx.add_entity_tag(EntityId::new(1), "active").unwrap();
            tx.commit().unwrap();
        }

        let organizer = Organizer::new(&[
            OrganizerRule::new("project", "Projects/Active").with_tags(["project", "active"])
        ])
        .unwrap();
        let report = organizer.organize(&source, &target, &mut store, false).unwrap();
        assert_eq!(report.tagged, vec![EntityId::new(1)]);
        assert!(target
            .join("Projects")
            .join("Active")
            .join("compiler project.md")
            .exists());

        let tx = store.begin().unwrap();
        let entity = tx.get_entity(EntityId::new(1)).unwrap().unwrap();
        assert_eq!(entity.folder.as_deref(), Some("Projects/Active"));
        assert_eq!(entity.tags, vec!["active".to_string(), "project".to_string()]);
    }

    #[test]
    fn test_unusable_folder_is_skipped_and_earlier_moves_stay_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("inbox");
        let target = dir.path().join("out");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();
        // A plain file where the Meetings folder should go.
        fs::write(target.join("Meetings"), "not a folder").unwrap();
        fs::write(source.join("a_journal.md"), "x").unwrap();
        fs::write(source.join("b_meeting.md"), "y").unwrap();

        let mut store = SqliteStore::open_in_memory().unwrap();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_entity(&Entity::new(EntityId::new(1), "a_journal", "Note")).unwrap();
            tx.insert_entity(&Entity::new(EntityId::new(2), "b_meeting", "Note")).unwrap();
            tx.commit().unwrap();
        }

        let report = organizer()
            .organize(&source, &target, &mut store, false)
            .unwrap();
        assert_eq!(report.moved.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(report.skipped[0].1, MoveSkip::Failed(_)));
        assert_eq!(report.tagged, vec![EntityId::new(1)]);
        assert!(target.join("Journal").join("a_journal.md").exists());
        assert!(source.join("b_meeting.md").exists());

        let tx = store.begin().unwrap();
        let moved = tx.get_entity(EntityId::new(1)).unwrap().unwrap();
        assert_eq!(moved.folder.as_deref(), Some("Journal"));
        assert_eq!(moved.tags, vec!["Journal".to_string()]);
        let stuck = tx.get_entity(EntityId::new(2)).unwrap().unwrap();
        assert!(stuck.folder.is_none());
        assert!(stuck.tags.is_empty());
    }

    #[test]
    fn test_target_spelled_with_parent_component() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("inbox");
        fs::create_dir_all(source.join("sub")).unwrap();
        fs::create_dir_all(source.join("vault").join("Meetings")).unwrap();
        fs::write(source.join("vault").join("Meetings").join("meeting.md"), "x").unwrap();

        let target = source.join("sub").join("..").join("vault");
        let mut store = SqliteStore::open_in_memory().unwrap();
        let report = organizer()
            .organize(&source, &target, &mut store, false)
            .unwrap();
        assert!(report.moved.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].1, MoveSkip::AlreadyOrganized);
        assert!(source.join("vault").join("Meetings").join("meeting.md").exists());
    }

    #[test]
    fn test_resolve_keeps_missing_tail() {
        let dir = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        let resolved = resolve(&dir.path().join("not").join("yet")).unwrap();
        assert_eq!(resolved, base.join("not").join("yet"));
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = organizer()
            .organize(&dir.path().join("nope"), dir.path(), &mut store, false)
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
