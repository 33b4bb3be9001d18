//! Store wrapper that fails a chosen write, for rollback tests.

use std::cell::Cell;
use std::rc::Rc;

use super::{KnowledgeStore, SqliteStore, StorageError, StoreTx};
use crate::entity::{Entity, EntityId, Observation};
use crate::relation::{Relation, RelationKey};

/// Delegates to a [`SqliteStore`] but returns [`StorageError::Backend`] on the
/// `fail_at`-th write (1-based, counted across every scope it opens).
pub(crate) struct FaultyStore {
    inner: SqliteStore,
    fail_at: usize,
    writes: Rc<Cell<usize>>,
}

impl FaultyStore {
    pub(crate) fn new(inner: SqliteStore, fail_at: usize) -> Self {
        Self {
            inner,
            fail_at,
            writes: Rc::new(Cell::new(0)),
        }
    }

    pub(crate) fn into_inner(self) -> SqliteStore {
        self.inner
    }
}

impl KnowledgeStore for FaultyStore {
    fn begin(&mut self) -> Result<Box<dyn StoreTx + '_>, StorageError> {
        Ok(Box::new(FaultyTx {
            inner: self.inner.begin()?,
            fail_at: self.fail_at,
            writes: Rc::clone(&self.writes),
        }))
    }
}

struct FaultyTx<'a> {
    inner: Box<dyn StoreTx + 'a>,
    fail_at: usize,
    writes: Rc<Cell<usize>>,
}

impl FaultyTx<'_> {
    fn tick(&self) -> Result<(), StorageError> {
        let n = self.writes.get() + 1;
        self.writes.set(n);
        if n == self.fail_at {
            return Err(StorageError::Backend(format!("disk I/O error on write {n}")));
        }
        Ok(())
    }
}

impl StoreTx for FaultyTx<'_> {
    fn list_entities(&self) -> Result<Vec<Entity>, StorageError> {
        self.inner.list_entities()
    }

    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, StorageError> {
        self.inner.get_entity(id)
    }

    fn find_entities_by_title(&self, title: &str) -> Result<Vec<Entity>, StorageError> {
        self.inner.find_entities_by_title(title)
    }

    fn insert_entity(&mut self, entity: &Entity) -> Result<(), StorageError> {
        self.tick()?;
        self.inner.insert_entity(entity)
    }

    fn set_entity_folder(
        &mut self,
        id: EntityId,
        folder: Option<&str>,
    ) -> Result<(), StorageError> {
        self.tick()?;
        self.inner.set_entity_folder(id, folder)
    }

    fn add_entity_tag(&mut self, id: EntityId, tag: &str) -> Result<bool, StorageError> {
        self.tick()?;
        self.inner.add_entity_tag(id, tag)
    }

    fn delete_entity(&mut self, id: EntityId) -> Result<(), StorageError> {
        self.tick()?;
        self.inner.delete_entity(id)
    }

    fn list_relations(&self) -> Result<Vec<Relation>, StorageError> {
        self.inner.list_relations()
    }

    fn relations_from(&self, id: EntityId) -> Result<Vec<Relation>, StorageError> {
        self.inner.relations_from(id)
    }

    fn relations_to(&self, id: EntityId) -> Result<Vec<Relation>, StorageError> {
        self.inner.relations_to(id)
    }

    fn relation_exists(&self, key: &RelationKey) -> Result<bool, StorageError> {
        self.inner.relation_exists(key)
    }

    fn insert_relation(&mut self, relation: &Relation) -> Result<(), StorageError> {
        self.tick()?;
        self.inner.insert_relation(relation)
    }

    fn repoint_relation(
        &mut self,
        key: &RelationKey,
        from_id: EntityId,
        to_id: EntityId,
    ) -> Result<bool, StorageError> {
        self.tick()?;
        self.inner.repoint_relation(key, from_id, to_id)
    }

    fn delete_relation(&mut self, key: &RelationKey) -> Result<bool, StorageError> {
        self.tick()?;
        self.inner.delete_relation(key)
    }

    fn insert_observation(
        &mut self,
        entity_id: EntityId,
        content: &str,
    ) -> Result<Observation, StorageError> {
        self.tick()?;
        self.inner.insert_observation(entity_id, content)
    }

    fn observations_for(&self, entity_id: EntityId) -> Result<Vec<Observation>, StorageError> {
        self.inner.observations_for(entity_id)
    }

    fn reassign_observations(
        &mut self,
        from: EntityId,
        to: EntityId,
    ) -> Result<usize, StorageError> {
        self.tick()?;
        self.inner.reassign_observations(from, to)
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let FaultyTx { inner, .. } = *self;
        inner.commit()
    }
}
