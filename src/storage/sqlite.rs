//! `SQLite` storage backend.
//!
//! Entities, relations, and observations live in three tables. The store
//! enforces relation uniqueness on `(from_id, to_id, relation_type)` and
//! endpoint existence through foreign keys; constraint failures come back as
//! typed [`StorageError`] variants so callers can skip and continue.

use std::path::{Path, PathBuf};

use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row, Transaction};
use tracing::debug;

use crate::entity::{Entity, EntityId, Observation, ObservationId};
use crate::relation::{Relation, RelationKey};
use crate::storage::traits::{KnowledgeStore, StorageError, StoreTx};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS entity (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        folder TEXT,
        tags TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_entity_title ON entity(title);

    CREATE TABLE IF NOT EXISTS relation (
        from_id INTEGER NOT NULL REFERENCES entity(id),
        to_id INTEGER NOT NULL REFERENCES entity(id),
        relation_type TEXT NOT NULL,
        to_name TEXT NOT NULL DEFAULT '',
        context TEXT NOT NULL DEFAULT '',
        UNIQUE (from_id, to_id, relation_type)
    );
    CREATE INDEX IF NOT EXISTS idx_relation_to ON relation(to_id);

    CREATE TABLE IF NOT EXISTS observation (
        id INTEGER PRIMARY KEY,
        entity_id INTEGER NOT NULL REFERENCES entity(id),
        content TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_observation_entity ON observation(entity_id);
";

const ENTITY_COLUMNS: &str = "id, title, entity_type, folder, tags";
const RELATION_COLUMNS: &str = "from_id, to_id, relation_type, to_name, context";

/// Maps a rusqlite error onto the storage taxonomy.
fn map_err(err: rusqlite::Error) -> StorageError {
    match err {
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            let detail = message.unwrap_or_else(|| code.to_string());
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StorageError::DanglingReference(detail),
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    StorageError::DuplicateKey(detail)
                }
                _ => StorageError::Backend(detail),
            }
        }
        rusqlite::Error::FromSqlConversionFailure(column, _, cause) => {
            StorageError::Serialization(format!("column {column}: {cause}"))
        }
        other => StorageError::Backend(other.to_string()),
    }
}

fn encode_tags(tags: &[String]) -> Result<Option<String>, StorageError> {
    if tags.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(tags)
        .map(Some)
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

fn parse_entity_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    let tags_raw: Option<String> = row.get(4)?;
    let tags = match tags_raw.as_deref() {
        None | Some("") => Vec::new(),
        Some(raw) => serde_json::from_str::<Vec<String>>(raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
    };
    Ok(Entity {
        id: EntityId::new(row.get(0)?),
        title: row.get(1)?,
        entity_type: row.get(2)?,
        folder: row.get(3)?,
        tags,
    })
}

fn parse_relation_row(row: &Row<'_>) -> rusqlite::Result<Relation> {
    Ok(Relation {
        from_id: EntityId::new(row.get(0)?),
        to_id: EntityId::new(row.get(1)?),
        relation_type: row.get(2)?,
        to_name: row.get(3)?,
        context: row.get(4)?,
    })
}

fn parse_observation_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    Ok(Observation {
        id: ObservationId(row.get(0)?),
        entity_id: EntityId::new(row.get(1)?),
        content: row.get(2)?,
    })
}

/// `SQLite`-backed knowledge store.
///
/// Owns a single connection; the crate assumes one writer per database.
///
/// # Examples
///
/// ```
/// use kbgraph::{Entity, EntityId, KnowledgeStore, SqliteStore};
///
/// let mut store = SqliteStore::open_in_memory().unwrap();
/// let mut tx = store.begin().unwrap();
/// tx.insert_entity(&Entity::new(EntityId::new(1), "A", "Person")).unwrap();
/// tx.commit().unwrap();
///
/// let tx = store.begin().unwrap();
/// assert_eq!(tx.list_entities().unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (creating if needed) a database file and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if the file cannot be opened and `Backend` if the
    /// schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Connection(format!("{}: {e}", path.display())))?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        debug!(path = %path.display(), "opened knowledge store");
        Ok(store)
    }

    /// Opens a private in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let store = Self { conn, path: None };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(&self) -> Result<(), StorageError> {
        self.conn
            .pragma_update(None, "foreign_keys", "ON")
            .map_err(map_err)?;
        self.conn.execute_batch(SCHEMA).map_err(map_err)
    }
}

impl KnowledgeStore for SqliteStore {
    fn begin(&mut self) -> Result<Box<dyn StoreTx + '_>, StorageError> {
        let tx = self.conn.transaction().map_err(map_err)?;
        Ok(Box::new(SqliteTx { tx }))
    }
}

/// Transaction scope over a [`SqliteStore`]. Rolls back on drop.
struct SqliteTx<'c> {
    tx: Transaction<'c>,
}

impl SqliteTx<'_> {
    fn query_entities(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<Entity>, StorageError> {
        let mut stmt = self.tx.prepare(sql).map_err(map_err)?;
        let rows = stmt.query_map(args, parse_entity_row).map_err(map_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_err)
    }

    fn query_relations(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<Relation>, StorageError> {
        let mut stmt = self.tx.prepare(sql).map_err(map_err)?;
        let rows = stmt.query_map(args, parse_relation_row).map_err(map_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_err)
    }
}

impl StoreTx for SqliteTx<'_> {
    fn list_entities(&self) -> Result<Vec<Entity>, StorageError> {
        self.query_entities(
            &format!("SELECT {ENTITY_COLUMNS} FROM entity ORDER BY id"),
            params![],
        )
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, StorageError> {
        self.tx
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entity WHERE id = ?1"),
                params![id.get()],
                parse_entity_row,
            )
            .optional()
            .map_err(map_err)
    }

    fn find_entities_by_title(&self, title: &str) -> Result<Vec<Entity>, StorageError> {
        self.query_entities(
            &format!("SELECT {ENTITY_COLUMNS} FROM entity WHERE title = ?1 ORDER BY id"),
            params![title],
        )
    }

    fn insert_entity(&mut self, entity: &Entity) -> Result<(), StorageError> {
        let tags = encode_tags(&entity.tags)?;
        self.tx
            .execute(
                "INSERT INTO entity (id, title, entity_type, folder, tags) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entity.id.get(),
                    entity.title,
                    entity.entity_type,
                    entity.folder,
                    tags
                ],
            )
            .map_err(map_err)?;
        Ok(())
    }

    fn set_entity_folder(
        &mut self,
        id: EntityId,
        folder: Option<&str>,
    ) -> Result<(), StorageError> {
        let changed = self
            .tx
            .execute(
                "UPDATE entity SET folder = ?1 WHERE id = ?2",
                params![folder, id.get()],
            )
            .map_err(map_err)?;
        if changed == 0 {
            return Err(StorageError::EntityNotFound(id));
        }
        Ok(())
    }

    fn add_entity_tag(&mut self, id: EntityId, tag: &str) -> Result<bool, StorageError> {
        let mut entity = self.get_entity(id)?.ok_or(StorageError::EntityNotFound(id))?;
        if !entity.add_tag(tag) {
            return Ok(false);
        }
        let tags = encode_tags(&entity.tags)?;
        self.tx
            .execute(
                "UPDATE entity SET tags = ?1 WHERE id = ?2",
                params![tags, id.get()],
            )
            .map_err(map_err)?;
        Ok(true)
    }

    fn delete_entity(&mut self, id: EntityId) -> Result<(), StorageError> {
        let changed = self
            .tx
            .execute("DELETE FROM entity WHERE id = ?1", params![id.get()])
            .map_err(map_err)?;
        if changed == 0 {
            return Err(StorageError::EntityNotFound(id));
        }
        Ok(())
    }

    fn list_relations(&self) -> Result<Vec<Relation>, StorageError> {
        self.query_relations(
            &format!(
                "SELECT {RELATION_COLUMNS} FROM relation ORDER BY from_id, to_id, relation_type"
            ),
            params![],
        )
    }

    fn relations_from(&self, id: EntityId) -> Result<Vec<Relation>, StorageError> {
        self.query_relations(
            &format!(
                "SELECT {RELATION_COLUMNS} FROM relation WHERE from_id = ?1 ORDER BY to_id, relation_type"
            ),
            params![id.get()],
        )
    }

    fn relations_to(&self, id: EntityId) -> Result<Vec<Relation>, StorageError> {
        self.query_relations(
            &format!(
                "SELECT {RELATION_COLUMNS} FROM relation WHERE to_id = ?1 ORDER BY from_id, relation_type"
            ),
            params![id.get()],
        )
    }

    fn relation_exists(&self, key: &RelationKey) -> Result<bool, StorageError> {
        self.tx
            .query_row(
                "SELECT 1 FROM relation WHERE from_id = ?1 AND to_id = ?2 AND relation_type = ?3",
                params![key.from_id.get(), key.to_id.get(), key.relation_type],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(map_err)
    }

    fn insert_relation(&mut self, relation: &Relation) -> Result<(), StorageError> {
        self.tx
            .execute(
                "INSERT INTO relation (from_id, to_id, relation_type, to_name, context) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    relation.from_id.get(),
                    relation.to_id.get(),
                    relation.relation_type,
                    relation.to_name,
                    relation.context
                ],
            )
            .map_err(|e| match map_err(e) {
                StorageError::DuplicateKey(_) => StorageError::DuplicateRelation(relation.key()),
                other => other,
            })?;
        Ok(())
    }

    fn repoint_relation(
        &mut self,
        key: &RelationKey,
        from_id: EntityId,
        to_id: EntityId,
    ) -> Result<bool, StorageError> {
        let changed = self
            .tx
            .execute(
                "UPDATE relation SET from_id = ?1, to_id = ?2
                 WHERE from_id = ?3 AND to_id = ?4 AND relation_type = ?5",
                params![
                    from_id.get(),
                    to_id.get(),
                    key.from_id.get(),
                    key.to_id.get(),
                    key.relation_type
                ],
            )
            .map_err(|e| match map_err(e) {
                StorageError::DuplicateKey(_) => StorageError::DuplicateRelation(RelationKey::new(
                    from_id,
                    to_id,
                    key.relation_type.clone(),
                )),
                other => other,
            })?;
        Ok(changed > 0)
    }

    fn delete_relation(&mut self, key: &RelationKey) -> Result<bool, StorageError> {
        let changed = self
            .tx
            .execute(
                "DELETE FROM relation WHERE from_id = ?1 AND to_id = ?2 AND relation_type = ?3",
                params![key.from_id.get(), key.to_id.get(), key.relation_type],
            )
            .map_err(map_err)?;
        Ok(changed > 0)
    }

    fn insert_observation(
        &mut self,
        entity_id: EntityId,
        content: &str,
    ) -> Result<Observation, StorageError> {
        self.tx
            .execute(
                "INSERT INTO observation (entity_id, content) VALUES (?1, ?2)",
                params![entity_id.get(), content],
            )
            .map_err(map_err)?;
        Ok(Observation {
            id: ObservationId(self.tx.last_insert_rowid()),
            entity_id,
            content: content.to_string(),
        })
    }

    fn observations_for(&self, entity_id: EntityId) -> Result<Vec<Observation>, StorageError> {
        let mut stmt = self
            .tx
            .prepare("SELECT id, entity_id, content FROM observation WHERE entity_id = ?1 ORDER BY id")
            .map_err(map_err)?;
        let rows = stmt
            .query_map(params![entity_id.get()], parse_observation_row)
            .map_err(map_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_err)
    }

    fn reassign_observations(
        &mut self,
        from: EntityId,
        to: EntityId,
    ) -> Result<usize, StorageError> {
        self.tx
            .execute(
                "UPDATE observation SET entity_id = ?1 WHERE entity_id = ?2",
                params![to.get(), from.get()],
            )
            .map_err(map_err)
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let SqliteTx { tx } = *self;
        tx.commit().map_err(map_err)
    }
}
