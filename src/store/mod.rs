//! Persistence behind the import pipeline.

mod http;
mod sqlite;

pub use http::HttpStore;
pub use sqlite::SqliteStore;

use crate::entities::Entity;

/// A persisted record: `id`, every field, resolved reference ids, timestamps.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Create { id: String, record: Record },
    Update { id: String, record: Record },
}

impl Write {
    pub fn id(&self) -> &str {
        match self {
            Write::Create { id, .. } | Write::Update { id, .. } => id,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Write::Create { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Message returned by the persistence layer, shown verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("A record with the same key already exists")]
    Duplicate,
    #[error("Record {0} not found")]
    NotFound(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

pub trait EntityStore {
    /// Records of `entity`, optionally narrowed by column equality.
    fn list(&self, entity: &dyn Entity, filters: &Record) -> Result<Vec<Record>, StoreError>;

    fn create(&self, entity: &dyn Entity, id: &str, record: &Record) -> Result<Record, StoreError>;

    fn update(&self, entity: &dyn Entity, id: &str, record: &Record) -> Result<Record, StoreError>;

    fn delete(&self, entity: &dyn Entity, id: &str) -> Result<(), StoreError>;

    fn apply(&self, entity: &dyn Entity, write: &Write) -> Result<Record, StoreError> {
        match write {
            Write::Create { id, record } => self.create(entity, id, record),
            Write::Update { id, record } => self.update(entity, id, record),
        }
    }

    /// One result per write, in order. An outer `Err` means the whole batch
    /// failed and nothing can be attributed to individual rows.
    fn write_batch(
        &self,
        entity: &dyn Entity,
        writes: &[Write],
    ) -> Result<Vec<Result<Record, StoreError>>, StoreError> {
        Ok(writes.iter().map(|w| self.apply(entity, w)).collect())
    }
}

impl<S: EntityStore + ?Sized> EntityStore for &S {
    fn list(&self, entity: &dyn Entity, filters: &Record) -> Result<Vec<Record>, StoreError> {
        (**self).list(entity, filters)
    }

    fn create(&self, entity: &dyn Entity, id: &str, record: &Record) -> Result<Record, StoreError> {
        (**self).create(entity, id, record)
    }

    fn update(&self, entity: &dyn Entity, id: &str, record: &Record) -> Result<Record, StoreError> {
        (**self).update(entity, id, record)
    }

    fn delete(&self, entity: &dyn Entity, id: &str) -> Result<(), StoreError> {
        (**self).delete(entity, id)
    }

    fn write_batch(
        &self,
        entity: &dyn Entity,
        writes: &[Write],
    ) -> Result<Vec<Result<Record, StoreError>>, StoreError> {
        (**self).write_batch(entity, writes)
    }
}
