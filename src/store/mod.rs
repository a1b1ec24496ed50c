//! Outbound document-store capability interface.
//!
//! The executor talks to a store exclusively through [`DocumentStore`]. Every read takes a
//! `max_time`; a store that runs past it fails with code 50 / `MaxTimeMSExpired`.

pub mod eval;
pub mod memory;
pub mod pipeline;
pub mod update;

pub use memory::MemoryStore;

use crate::errors::StoreError;
use async_trait::async_trait;
use bson::{Bson, Document};
use std::time::Duration;

pub type StoreResult<T> = Result<T, StoreError>;

/// Options for `find` / `find_one`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: u64,
    /// `None` returns every match.
    pub limit: Option<u64>,
    pub max_time: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Pass-through options such as `allowDiskUse`.
    pub extra: Option<Document>,
    pub max_time: Duration,
}

/// An update is either an operator document (`$set`, `$inc`, …) or a full replacement.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSpec {
    Operators(Document),
    Replacement(Document),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub upsert: bool,
    pub multi: bool,
}

/// Which side of a find-and-modify to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    #[default]
    Before,
    After,
}

#[derive(Debug, Clone)]
pub enum FindAndModifyAction {
    Update(UpdateSpec),
    Delete,
}

#[derive(Debug, Clone, Default)]
pub struct FindAndModifyOptions {
    pub upsert: bool,
    pub return_document: ReturnDocument,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub max_time: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub name: Option<String>,
    pub unique: bool,
    pub sparse: bool,
}

/// An index is dropped by name or by its key specification.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexRef {
    Name(String),
    Keys(Document),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    InsertOne { document: Document },
    UpdateOne { filter: Document, update: Document, upsert: bool },
    UpdateMany { filter: Document, update: Document, upsert: bool },
    ReplaceOne { filter: Document, replacement: Document, upsert: bool },
    DeleteOne { filter: Document },
    DeleteMany { filter: Document },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneOutcome {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyOutcome {
    pub inserted_ids: Vec<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteOutcome {
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub deleted: u64,
    pub upserted: u64,
}

/// Capability interface mirroring the collection-level operation kinds.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ── Reads ──

    async fn find(&self, collection: &str, filter: &Document, options: &FindOptions) -> StoreResult<Vec<Document>>;
    async fn count(&self, collection: &str, filter: &Document, max_time: Duration) -> StoreResult<u64>;
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
        options: &AggregateOptions,
    ) -> StoreResult<Vec<Document>>;
    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: &Document,
        max_time: Duration,
    ) -> StoreResult<Vec<Bson>>;

    /// First match of `find` with a limit of one.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<Option<Document>> {
        let mut one = options.clone();
        one.limit = Some(1);
        Ok(self.find(collection, filter, &one).await?.into_iter().next())
    }

    // ── Writes ──

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<InsertOneOutcome>;
    /// Insert in order. When `ordered`, stop at the first failure; otherwise attempt every
    /// document and report the first failure afterwards. Successful inserts are kept either way.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>, ordered: bool) -> StoreResult<InsertManyOutcome>;
    async fn update(
        &self,
        collection: &str,
        filter: &Document,
        update: &UpdateSpec,
        options: UpdateOptions,
    ) -> StoreResult<UpdateOutcome>;
    /// Returns the number of deleted documents.
    async fn delete(&self, collection: &str, filter: &Document, many: bool) -> StoreResult<u64>;
    async fn find_and_modify(
        &self,
        collection: &str,
        filter: &Document,
        action: &FindAndModifyAction,
        options: &FindAndModifyOptions,
    ) -> StoreResult<Option<Document>>;
    /// Apply `models` in order with the same `ordered` semantics as [`Self::insert_many`].
    async fn bulk_write(&self, collection: &str, models: &[WriteModel], ordered: bool) -> StoreResult<BulkWriteOutcome>;

    // ── Indexes ──

    /// Returns the name of the created index.
    async fn create_index(&self, collection: &str, keys: &Document, options: &IndexOptions) -> StoreResult<String>;
    /// Returns the name of the dropped index.
    async fn drop_index(&self, collection: &str, index: &IndexRef) -> StoreResult<String>;
    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<Document>>;

    // ── Database ──

    /// Run a database-level command and return its reply document.
    async fn run_command(&self, command: &str, args: &[Bson], max_time: Duration) -> StoreResult<Document>;
}
