//! In-memory reference implementation of [`DocumentStore`].
//!
//! Collections are insertion-ordered vectors behind one `parking_lot` lock. Locks are only
//! taken after the artificial latency has elapsed, never across an await point.

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::eval::{as_f64, bad_value, bson_eq, compare_docs, get_path, matches, project, validate_sort};
use super::update::{apply_operators, apply_replacement, upsert_seed};
use super::{
    AggregateOptions, BulkWriteOutcome, DocumentStore, FindAndModifyAction, FindAndModifyOptions,
    FindOptions, IndexOptions, IndexRef, InsertManyOutcome, InsertOneOutcome, ReturnDocument,
    StoreResult, UpdateOptions, UpdateOutcome, UpdateSpec, WriteModel, pipeline,
};
use crate::errors::StoreError;

const ID_INDEX: &str = "_id_";
const DUPLICATE_KEY: (i32, &str) = (11000, "DuplicateKey");
const NAMESPACE_EXISTS: (i32, &str) = (48, "NamespaceExists");
const NAMESPACE_NOT_FOUND: (i32, &str) = (26, "NamespaceNotFound");
const INDEX_NOT_FOUND: (i32, &str) = (27, "IndexNotFound");
const INDEX_CONFLICT: (i32, &str) = (85, "IndexOptionsConflict");
const INVALID_OPTIONS: (i32, &str) = (72, "InvalidOptions");
const COMMAND_NOT_FOUND: (i32, &str) = (59, "CommandNotFound");

fn coded(message: impl Into<String>, (code, name): (i32, &str)) -> StoreError {
    StoreError::with_code(message, code, name)
}

#[derive(Debug, Clone)]
struct IndexEntry {
    name: String,
    keys: Document,
    unique: bool,
    sparse: bool,
}

impl IndexEntry {
    fn id_index() -> Self {
        Self { name: ID_INDEX.to_string(), keys: doc! {"_id": 1}, unique: true, sparse: false }
    }

    fn describe(&self) -> Document {
        let mut d = doc! {"v": 2, "key": self.keys.clone(), "name": self.name.clone()};
        if self.unique && self.name != ID_INDEX {
            d.insert("unique", true);
        }
        if self.sparse {
            d.insert("sparse", true);
        }
        d
    }

    /// Key tuple for `doc`, or `None` when a sparse index skips it.
    fn key_of(&self, doc: &Document) -> Option<Vec<Bson>> {
        let values: Vec<Option<&Bson>> = self.keys.keys().map(|f| get_path(doc, f)).collect();
        if self.sparse && values.iter().all(Option::is_none) {
            return None;
        }
        Some(values.into_iter().map(|v| v.cloned().unwrap_or(Bson::Null)).collect())
    }
}

#[derive(Debug)]
struct CollectionData {
    docs: Vec<Document>,
    indexes: Vec<IndexEntry>,
    options: Document,
}

impl Default for CollectionData {
    fn default() -> Self {
        Self { docs: Vec::new(), indexes: vec![IndexEntry::id_index()], options: Document::new() }
    }
}

impl CollectionData {
    /// Reject `candidate` if it collides with another document on a unique index.
    fn check_unique(&self, ns: &str, candidate: &Document, skip: Option<usize>) -> StoreResult<()> {
        for idx in self.indexes.iter().filter(|i| i.unique) {
            let Some(key) = idx.key_of(candidate) else { continue };
            let clash = self.docs.iter().enumerate().any(|(pos, other)| {
                Some(pos) != skip
                    && idx.key_of(other).is_some_and(|k| k.iter().zip(&key).all(|(a, b)| bson_eq(a, b)))
            });
            if clash {
                return Err(coded(
                    format!("E11000 duplicate key error collection: {ns} index: {} dup key: {key:?}", idx.name),
                    DUPLICATE_KEY,
                ));
            }
        }
        Ok(())
    }

    fn insert(&mut self, ns: &str, document: Document) -> StoreResult<Bson> {
        let document = with_id(document);
        self.check_unique(ns, &document, None)?;
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);
        self.docs.push(document);
        Ok(id)
    }

    /// Positions of matching documents, optionally sorted.
    fn select(&self, filter: &Document, sort: Option<&Document>, deadline: &Deadline) -> StoreResult<Vec<usize>> {
        let mut hits = Vec::new();
        for (pos, d) in self.docs.iter().enumerate() {
            deadline.check()?;
            if matches(d, filter)? {
                hits.push(pos);
            }
        }
        if let Some(spec) = sort {
            validate_sort(spec)?;
            hits.sort_by(|a, b| compare_docs(&self.docs[*a], &self.docs[*b], spec));
        }
        Ok(hits)
    }

    /// Modify the document at `pos` in place, keeping the unique indexes consistent.
    fn modify(&mut self, ns: &str, pos: usize, update: &UpdateSpec) -> StoreResult<bool> {
        let mut next = self.docs[pos].clone();
        let changed = match update {
            UpdateSpec::Operators(ops) => apply_operators(&mut next, ops, false)?,
            UpdateSpec::Replacement(r) => apply_replacement(&mut next, r)?,
        };
        if changed {
            self.check_unique(ns, &next, Some(pos))?;
            self.docs[pos] = next;
        }
        Ok(changed)
    }

    fn upsert(&mut self, ns: &str, filter: &Document, update: &UpdateSpec) -> StoreResult<Bson> {
        let doc = match update {
            UpdateSpec::Operators(ops) => {
                let mut seed = upsert_seed(filter)?;
                apply_operators(&mut seed, ops, true)?;
                seed
            }
            UpdateSpec::Replacement(r) => {
                let mut doc = Document::new();
                if let Some(id) = upsert_seed(filter)?.get("_id") {
                    doc.insert("_id", id.clone());
                }
                for (k, v) in r {
                    doc.insert(k.clone(), v.clone());
                }
                doc
            }
        };
        self.insert(ns, doc)
    }

    /// Apply one bulk model, folding its counts into `out`.
    fn write(&mut self, ns: &str, model: &WriteModel, out: &mut BulkWriteOutcome) -> StoreResult<()> {
        let (filter, update, options) = match model {
            WriteModel::InsertOne { document } => {
                self.insert(ns, document.clone())?;
                out.inserted += 1;
                return Ok(());
            }
            WriteModel::DeleteOne { filter } => {
                out.deleted += self.delete(filter, false)?;
                return Ok(());
            }
            WriteModel::DeleteMany { filter } => {
                out.deleted += self.delete(filter, true)?;
                return Ok(());
            }
            WriteModel::UpdateOne { filter, update, upsert } => {
                (filter, UpdateSpec::Operators(update.clone()), UpdateOptions { upsert: *upsert, multi: false })
            }
            WriteModel::UpdateMany { filter, update, upsert } => {
                (filter, UpdateSpec::Operators(update.clone()), UpdateOptions { upsert: *upsert, multi: true })
            }
            WriteModel::ReplaceOne { filter, replacement, upsert } => (
                filter,
                UpdateSpec::Replacement(replacement.clone()),
                UpdateOptions { upsert: *upsert, multi: false },
            ),
        };
        let r = self.update(ns, filter, &update, options)?;
        out.matched += r.matched;
        out.modified += r.modified;
        out.upserted += u64::from(r.upserted_id.is_some());
        Ok(())
    }

    fn update(&mut self, ns: &str, filter: &Document, update: &UpdateSpec, options: UpdateOptions) -> StoreResult<UpdateOutcome> {
        if options.multi && matches!(update, UpdateSpec::Replacement(_)) {
            return Err(bad_value("multi update is not supported for replacement-style update"));
        }
        let mut hits = self.select(filter, None, &Deadline::none())?;
        if !options.multi {
            hits.truncate(1);
        }
        if hits.is_empty() && options.upsert {
            let id = self.upsert(ns, filter, update)?;
            return Ok(UpdateOutcome { matched: 0, modified: 0, upserted_id: Some(id) });
        }
        let mut out = UpdateOutcome { matched: hits.len() as u64, ..UpdateOutcome::default() };
        for pos in hits {
            if self.modify(ns, pos, update)? {
                out.modified += 1;
            }
        }
        Ok(out)
    }

    fn delete(&mut self, filter: &Document, many: bool) -> StoreResult<u64> {
        let mut hits = self.select(filter, None, &Deadline::none())?;
        if !many {
            hits.truncate(1);
        }
        for pos in hits.iter().rev() {
            self.docs.remove(*pos);
        }
        Ok(hits.len() as u64)
    }
}

/// Ensure `_id` is present and first.
fn with_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }
    let mut out = doc! {"_id": ObjectId::new()};
    out.extend(document);
    out
}

/// Read deadline derived from `max_time`.
struct Deadline(Option<Instant>);

impl Deadline {
    fn after(max_time: Duration) -> Self {
        Self(if max_time.is_zero() { None } else { Instant::now().checked_add(max_time) })
    }

    const fn none() -> Self {
        Self(None)
    }

    fn check(&self) -> StoreResult<()> {
        match self.0 {
            Some(dl) if Instant::now() > dl => Err(StoreError::timeout("operation exceeded time limit")),
            _ => Ok(()),
        }
    }
}

/// Thread-safe in-memory database.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    collections: RwLock<BTreeMap<String, CollectionData>>,
    latency: RwLock<Duration>,
    started: Instant,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("test")
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: RwLock::new(BTreeMap::new()),
            latency: RwLock::new(Duration::ZERO),
            started: Instant::now(),
        }
    }

    /// Delay every call by `latency`; reads whose `max_time` is shorter fail with a timeout.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.name
    }

    /// Insert documents directly, bypassing latency. Returns how many were stored.
    ///
    /// # Errors
    /// Fails on a duplicate `_id` or other unique-index violation.
    pub fn seed(&self, collection: &str, documents: Vec<Document>) -> StoreResult<usize> {
        let ns = self.ns(collection);
        let mut cols = self.collections.write();
        let col = cols.entry(collection.to_string()).or_default();
        let n = documents.len();
        for d in documents {
            col.insert(&ns, d)?;
        }
        Ok(n)
    }

    #[must_use]
    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, |c| c.docs.len())
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    fn ns(&self, collection: &str) -> String {
        format!("{}.{collection}", self.name)
    }

    /// Sleep for the configured latency, failing with a timeout if it exceeds `max_time`.
    async fn delay(&self, max_time: Option<Duration>) -> StoreResult<()> {
        let latency = *self.latency.read();
        if latency.is_zero() {
            return Ok(());
        }
        match max_time {
            Some(limit) if !limit.is_zero() && latency > limit => {
                tokio::time::sleep(limit).await;
                Err(StoreError::timeout(format!(
                    "operation exceeded time limit of {} ms",
                    limit.as_millis()
                )))
            }
            _ => {
                tokio::time::sleep(latency).await;
                Ok(())
            }
        }
    }

    fn with_collection<T>(&self, collection: &str, f: impl FnOnce(&CollectionData) -> StoreResult<T>, empty: T) -> StoreResult<T> {
        let cols = self.collections.read();
        match cols.get(collection) {
            Some(c) => f(c),
            None => Ok(empty),
        }
    }

    fn with_collection_mut<T>(&self, collection: &str, f: impl FnOnce(&mut CollectionData, &str) -> StoreResult<T>) -> StoreResult<T> {
        let ns = self.ns(collection);
        let mut cols = self.collections.write();
        f(cols.entry(collection.to_string()).or_default(), &ns)
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn stats(&self, scale: i64) -> Document {
        let cols = self.collections.read();
        let objects = cols.values().map(|c| c.docs.len()).sum::<usize>() as i64;
        let data_size = cols
            .values()
            .flat_map(|c| c.docs.iter())
            .map(|d| d.to_string().len())
            .sum::<usize>() as i64;
        let indexes = cols.values().map(|c| c.indexes.len()).sum::<usize>() as i64;
        let avg_obj_size = if objects == 0 { 0.0 } else { data_size as f64 / objects as f64 };
        let scale = scale.max(1);
        let collections = cols.len() as i64;
        doc! {
            "db": self.name.clone(),
            "collections": collections,
            "objects": objects,
            "avgObjSize": avg_obj_size,
            "dataSize": data_size / scale,
            "indexes": indexes,
            "scaleFactor": scale,
            "ok": 1.0,
        }
    }

    fn collection_infos(&self, filter: Option<&Document>) -> StoreResult<Vec<Bson>> {
        let cols = self.collections.read();
        let mut out = Vec::new();
        for (name, col) in cols.iter() {
            let info = doc! {
                "name": name.clone(),
                "type": "collection",
                "options": col.options.clone(),
                "info": {"readOnly": false},
            };
            if filter.map_or(Ok(true), |f| matches(&info, f))? {
                out.push(Bson::Document(info));
            }
        }
        Ok(out)
    }

    fn create_collection(&self, name: &str, options: Document) -> StoreResult<Document> {
        let mut cols = self.collections.write();
        if cols.contains_key(name) {
            return Err(coded(format!("Collection {} already exists.", self.ns(name)), NAMESPACE_EXISTS));
        }
        cols.insert(name.to_string(), CollectionData { options, ..CollectionData::default() });
        Ok(doc! {"ok": 1.0})
    }

    fn drop_collection(&self, name: &str) -> Document {
        let dropped = self.collections.write().remove(name).is_some();
        doc! {"ok": 1.0, "dropped": dropped}
    }

    fn server_status(&self) -> Document {
        let uptime = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        doc! {
            "host": host_name(),
            "version": env!("CARGO_PKG_VERSION"),
            "process": env!("CARGO_PKG_NAME"),
            "uptimeMillis": uptime,
            "connections": {"current": 1, "available": 0},
            "ok": 1.0,
        }
    }

    /// Dispatch a `{<command>: …}` document as `runCommand` would.
    fn command_document(&self, cmd: &Document, max_time: Duration) -> StoreResult<Document> {
        let Some((name, arg)) = cmd.iter().next() else {
            return Err(bad_value("runCommand requires a non-empty command document"));
        };
        match name.as_str() {
            "ping" => Ok(doc! {"ok": 1.0}),
            "dbStats" => Ok(self.stats(cmd.get_i64("scale").or_else(|_| cmd.get_i32("scale").map(i64::from)).unwrap_or(1))),
            "listCollections" => {
                let infos = self.collection_infos(cmd.get_document("filter").ok())?;
                let ns = format!("{}.$cmd.listCollections", self.name);
                Ok(doc! {"cursor": {"id": 0_i64, "ns": ns, "firstBatch": infos}, "ok": 1.0})
            }
            "create" => {
                let coll = arg.as_str().ok_or_else(|| bad_value("create requires a collection name"))?;
                let mut options = cmd.clone();
                options.remove("create");
                self.create_collection(coll, options)
            }
            "drop" => {
                let coll = arg.as_str().ok_or_else(|| bad_value("drop requires a collection name"))?;
                if self.collections.write().remove(coll).is_none() {
                    return Err(coded("ns not found", NAMESPACE_NOT_FOUND));
                }
                Ok(doc! {"ns": self.ns(coll), "ok": 1.0})
            }
            "dropDatabase" => {
                self.collections.write().clear();
                Ok(doc! {"dropped": self.name.clone(), "ok": 1.0})
            }
            "count" => {
                let coll = arg.as_str().ok_or_else(|| bad_value("count requires a collection name"))?;
                let query = cmd.get_document("query").cloned().unwrap_or_default();
                let deadline = Deadline::after(max_time);
                let n = self.with_collection(coll, |c| Ok(c.select(&query, None, &deadline)?.len() as i64), 0)?;
                Ok(doc! {"n": n, "ok": 1.0})
            }
            "serverStatus" => Ok(self.server_status()),
            "buildInfo" | "buildinfo" => Ok(build_info()),
            "hostInfo" => Ok(host_info()),
            other => Err(coded(format!("no such command: '{other}'"), COMMAND_NOT_FOUND)),
        }
    }
}

fn host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn build_info() -> Document {
    doc! {
        "version": env!("CARGO_PKG_VERSION"),
        "storageEngines": ["memory"],
        "bits": 64,
        "ok": 1.0,
    }
}

fn host_info() -> Document {
    doc! {
        "system": {"hostname": host_name(), "cpuArch": std::env::consts::ARCH},
        "os": {"type": std::env::consts::OS},
        "ok": 1.0,
    }
}

fn index_name(keys: &Document) -> String {
    keys.iter().map(|(k, v)| format!("{k}_{v}")).collect::<Vec<_>>().join("_")
}

fn finish_find(docs: Vec<Document>, projection: Option<&Document>) -> StoreResult<Vec<Document>> {
    match projection {
        Some(p) if !p.is_empty() => docs.iter().map(|d| project(d, p)).collect(),
        _ => Ok(docs),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, filter: &Document, options: &FindOptions) -> StoreResult<Vec<Document>> {
        self.delay(Some(options.max_time)).await?;
        let deadline = Deadline::after(options.max_time);
        let docs = self.with_collection(
            collection,
            |c| {
                let hits = c.select(filter, options.sort.as_ref(), &deadline)?;
                let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
                let limit = options.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
                Ok(hits.into_iter().skip(skip).take(limit).map(|pos| c.docs[pos].clone()).collect())
            },
            Vec::new(),
        )?;
        finish_find(docs, options.projection.as_ref())
    }

    async fn count(&self, collection: &str, filter: &Document, max_time: Duration) -> StoreResult<u64> {
        self.delay(Some(max_time)).await?;
        let deadline = Deadline::after(max_time);
        self.with_collection(collection, |c| Ok(c.select(filter, None, &deadline)?.len() as u64), 0)
    }

    async fn aggregate(&self, collection: &str, stages: &[Document], options: &AggregateOptions) -> StoreResult<Vec<Document>> {
        self.delay(Some(options.max_time)).await?;
        let docs = self.with_collection(collection, |c| Ok(c.docs.clone()), Vec::new())?;
        pipeline::run(docs, stages)
    }

    async fn distinct(&self, collection: &str, field: &str, filter: &Document, max_time: Duration) -> StoreResult<Vec<Bson>> {
        self.delay(Some(max_time)).await?;
        let deadline = Deadline::after(max_time);
        self.with_collection(
            collection,
            |c| {
                let mut values: Vec<Bson> = Vec::new();
                for pos in c.select(filter, None, &deadline)? {
                    let candidates = match get_path(&c.docs[pos], field) {
                        Some(Bson::Array(items)) => items.clone(),
                        Some(v) => vec![v.clone()],
                        None => Vec::new(),
                    };
                    for v in candidates {
                        if !values.iter().any(|seen| bson_eq(seen, &v)) {
                            values.push(v);
                        }
                    }
                }
                Ok(values)
            },
            Vec::new(),
        )
    }

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<InsertOneOutcome> {
        self.delay(None).await?;
        let inserted_id = self.with_collection_mut(collection, |c, ns| c.insert(ns, document))?;
        Ok(InsertOneOutcome { inserted_id })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>, ordered: bool) -> StoreResult<InsertManyOutcome> {
        self.delay(None).await?;
        self.with_collection_mut(collection, |c, ns| {
            let mut inserted_ids = Vec::with_capacity(documents.len());
            let mut first_err = None;
            for d in documents {
                match c.insert(ns, d) {
                    Ok(id) => inserted_ids.push(id),
                    Err(e) if ordered => return Err(e),
                    Err(e) => {
                        first_err.get_or_insert(e);
                    }
                }
            }
            first_err.map_or(Ok(InsertManyOutcome { inserted_ids }), Err)
        })
    }

    async fn update(&self, collection: &str, filter: &Document, update: &UpdateSpec, options: UpdateOptions) -> StoreResult<UpdateOutcome> {
        self.delay(None).await?;
        self.with_collection_mut(collection, |c, ns| c.update(ns, filter, update, options))
    }

    async fn delete(&self, collection: &str, filter: &Document, many: bool) -> StoreResult<u64> {
        self.delay(None).await?;
        self.with_collection_mut(collection, |c, _| c.delete(filter, many))
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        filter: &Document,
        action: &FindAndModifyAction,
        options: &FindAndModifyOptions,
    ) -> StoreResult<Option<Document>> {
        self.delay(Some(options.max_time)).await?;
        let deadline = Deadline::after(options.max_time);
        let found = self.with_collection_mut(collection, |c, ns| {
            let hit = c.select(filter, options.sort.as_ref(), &deadline)?.first().copied();
            match (hit, action) {
                (Some(pos), FindAndModifyAction::Delete) => Ok(Some(c.docs.remove(pos))),
                (Some(pos), FindAndModifyAction::Update(update)) => {
                    let before = c.docs[pos].clone();
                    c.modify(ns, pos, update)?;
                    Ok(Some(match options.return_document {
                        ReturnDocument::Before => before,
                        ReturnDocument::After => c.docs[pos].clone(),
                    }))
                }
                (None, FindAndModifyAction::Update(update)) if options.upsert => {
                    c.upsert(ns, filter, update)?;
                    Ok(match options.return_document {
                        ReturnDocument::Before => None,
                        ReturnDocument::After => c.docs.last().cloned(),
                    })
                }
                (None, _) => Ok(None),
            }
        })?;
        match (found, options.projection.as_ref()) {
            (Some(d), Some(p)) if !p.is_empty() => project(&d, p).map(Some),
            (found, _) => Ok(found),
        }
    }

    async fn bulk_write(&self, collection: &str, models: &[WriteModel], ordered: bool) -> StoreResult<BulkWriteOutcome> {
        self.delay(None).await?;
        self.with_collection_mut(collection, |c, ns| {
            let mut out = BulkWriteOutcome::default();
            let mut first_err = None;
            for model in models {
                match c.write(ns, model, &mut out) {
                    Ok(()) => {}
                    Err(e) if ordered => return Err(e),
                    Err(e) => {
                        first_err.get_or_insert(e);
                    }
                }
            }
            first_err.map_or(Ok(out), Err)
        })
    }

    async fn create_index(&self, collection: &str, keys: &Document, options: &IndexOptions) -> StoreResult<String> {
        self.delay(None).await?;
        if keys.is_empty() {
            return Err(bad_value("Index keys cannot be empty."));
        }
        let name = options.name.clone().unwrap_or_else(|| index_name(keys));
        self.with_collection_mut(collection, |c, ns| {
            if let Some(existing) = c.indexes.iter().find(|i| i.name == name || i.keys == *keys) {
                if existing.name == name && existing.keys == *keys {
                    return Ok(name);
                }
                return Err(coded(
                    format!("Index already exists with a different name or keys: {}", existing.name),
                    INDEX_CONFLICT,
                ));
            }
            let entry = IndexEntry { name: name.clone(), keys: keys.clone(), unique: options.unique, sparse: options.sparse };
            if entry.unique {
                let mut seen: Vec<Vec<Bson>> = Vec::new();
                for key in c.docs.iter().filter_map(|d| entry.key_of(d)) {
                    if seen.iter().any(|k| k.iter().zip(&key).all(|(a, b)| bson_eq(a, b))) {
                        return Err(coded(
                            format!("E11000 duplicate key error collection: {ns} index: {name} dup key: {key:?}"),
                            DUPLICATE_KEY,
                        ));
                    }
                    seen.push(key);
                }
            }
            c.indexes.push(entry);
            Ok(name)
        })
    }

    async fn drop_index(&self, collection: &str, index: &IndexRef) -> StoreResult<String> {
        self.delay(None).await?;
        let mut cols = self.collections.write();
        let Some(c) = cols.get_mut(collection) else {
            return Err(coded(format!("ns not found {}", self.ns(collection)), NAMESPACE_NOT_FOUND));
        };
        let pos = c.indexes.iter().position(|i| match index {
            IndexRef::Name(n) => i.name == *n,
            IndexRef::Keys(k) => i.keys == *k,
        });
        let Some(pos) = pos else {
            let wanted = match index {
                IndexRef::Name(n) => n.clone(),
                IndexRef::Keys(k) => k.to_string(),
            };
            return Err(coded(format!("index not found with name [{wanted}]"), INDEX_NOT_FOUND));
        };
        if c.indexes[pos].name == ID_INDEX {
            return Err(coded("cannot drop _id index", INVALID_OPTIONS));
        }
        Ok(c.indexes.remove(pos).name)
    }

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<Document>> {
        self.delay(None).await?;
        let cols = self.collections.read();
        let Some(c) = cols.get(collection) else {
            return Err(coded(format!("ns does not exist: {}", self.ns(collection)), NAMESPACE_NOT_FOUND));
        };
        Ok(c.indexes.iter().map(IndexEntry::describe).collect())
    }

    async fn run_command(&self, command: &str, args: &[Bson], max_time: Duration) -> StoreResult<Document> {
        self.delay(Some(max_time)).await?;
        let arg_doc = |i: usize| args.get(i).and_then(Bson::as_document);
        let arg_str = |i: usize| args.get(i).and_then(Bson::as_str);
        match command {
            "ping" => Ok(doc! {"ok": 1.0}),
            "stats" => {
                let scale = arg_doc(0).and_then(|d| d.get("scale")).and_then(as_f64).unwrap_or(1.0);
                Ok(self.stats(scale as i64))
            }
            "getCollectionNames" => {
                let names = self.collection_names();
                Ok(doc! {"names": names, "ok": 1.0})
            }
            "getCollectionInfos" => {
                let infos = self.collection_infos(arg_doc(0))?;
                Ok(doc! {"collections": infos, "ok": 1.0})
            }
            "createCollection" => {
                let name = arg_str(0).ok_or_else(|| bad_value("createCollection requires a name"))?;
                self.create_collection(name, arg_doc(1).cloned().unwrap_or_default())
            }
            "dropCollection" => {
                let name = arg_str(0).ok_or_else(|| bad_value("dropCollection requires a name"))?;
                Ok(self.drop_collection(name))
            }
            "dropDatabase" => self.command_document(&doc! {"dropDatabase": 1}, max_time),
            "serverStatus" => Ok(self.server_status()),
            "buildInfo" => Ok(build_info()),
            "hostInfo" => Ok(host_info()),
            "version" => Ok(doc! {"version": env!("CARGO_PKG_VERSION")}),
            "getName" => Ok(doc! {"name": self.name.clone()}),
            "runCommand" | "adminCommand" => {
                let cmd = arg_doc(0).ok_or_else(|| bad_value(format!("{command} requires a command document")))?;
                self.command_document(cmd, max_time)
            }
            other => Err(coded(format!("no such command: '{other}'"), COMMAND_NOT_FOUND)),
        }
    }
}
