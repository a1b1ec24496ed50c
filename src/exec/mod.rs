//! Executor: runs a [`ParsedQuery`] against a [`DocumentStore`].
//!
//! `find` and `aggregate` are paginated; every other operation is single-shot and returns a
//! small result document. Store failures are classified into [`QueryError`]s, and a raised
//! [`CancellationToken`] aborts the in-flight store call with [`ExecuteError::Cancelled`].

pub mod cancel;
pub mod telemetry;

pub use cancel::CancellationToken;

use bson::{Bson, Document, doc};
use serde_json::json;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::QueryOptions;
use crate::errors::{ExecuteError, QueryError};
use crate::store::eval::truthy;
use crate::store::{
    AggregateOptions, DocumentStore, FindAndModifyAction, FindAndModifyOptions, FindOptions, IndexOptions, IndexRef,
    ReturnDocument, StoreResult, UpdateOptions, UpdateSpec, WriteModel,
};
use crate::types::{CollectionQuery, DbCommand, Operation, ParsedQuery, QueryResult, Value};
use crate::utils::devlog::QueryBench;
use crate::utils::json::{from_bson, from_document, to_bson, to_document, to_document_or_empty};
use telemetry::{Outcome, QueryRecord};

type ExecResult<T> = Result<T, ExecuteError>;

/// Run `parsed` to completion.
///
/// # Errors
/// `INVALID_OPTIONS` for out-of-range options, `BAD_VALUE` for arguments that cannot be
/// shaped into a store call, `TIMEOUT` when the store hits its deadline, and the store's own
/// code for anything else.
pub async fn execute(
    store: &dyn DocumentStore,
    parsed: &ParsedQuery,
    options: &QueryOptions,
) -> Result<QueryResult, QueryError> {
    // Nobody else holds this token, so cancellation cannot surface here.
    let token = CancellationToken::new();
    execute_with_cancel(store, parsed, options, &token).await.map_err(|e| match e {
        ExecuteError::Query(q) => q,
        ExecuteError::Cancelled => QueryError::new("query cancelled"),
    })
}

/// Like [`execute`], but aborts as soon as `token` is cancelled.
///
/// # Errors
/// [`ExecuteError::Cancelled`] on cancellation, otherwise the same errors as [`execute`].
pub async fn execute_with_cancel(
    store: &dyn DocumentStore,
    parsed: &ParsedQuery,
    options: &QueryOptions,
    token: &CancellationToken,
) -> ExecResult<QueryResult> {
    options.validate()?;
    let (collection, op) = match parsed {
        ParsedQuery::Collection(q) => (q.collection.as_str(), q.kind().name()),
        ParsedQuery::Command(c) => ("", c.command.as_str()),
    };
    let start = Instant::now();
    let ctx = Ctx { store, token, max_time: Duration::from_millis(options.timeout_ms) };
    let outcome = if token.is_cancelled() {
        Err(ExecuteError::Cancelled)
    } else {
        match parsed {
            ParsedQuery::Collection(q) => run_collection(&ctx, q, options).await,
            ParsedQuery::Command(c) => run_command(&ctx, c).await,
        }
    };
    let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (kind, count) = match &outcome {
        Ok(r) => (Outcome::Ok, r.documents.len()),
        Err(ExecuteError::Cancelled) => (Outcome::Cancelled, 0),
        Err(ExecuteError::Query(e)) if e.is_timeout() => (Outcome::Timeout, 0),
        Err(ExecuteError::Query(_)) => (Outcome::Failed, 0),
    };
    QueryBench::new(op, collection, elapsed, count, kind == Outcome::Ok).emit();
    telemetry::log_query(&QueryRecord { collection, op, duration_ms: elapsed, result_count: count, outcome: kind });
    match &outcome {
        Err(ExecuteError::Cancelled) => log::info!("{op} on '{collection}' cancelled after {elapsed} ms"),
        Err(ExecuteError::Query(e)) if e.is_timeout() => log::warn!(
            "{op} on '{collection}' timed out after {elapsed} ms (limit {} ms); narrow your filter or raise the timeout",
            options.timeout_ms
        ),
        Err(ExecuteError::Query(e)) => log::warn!("{op} on '{collection}' failed: {e}"),
        Ok(_) => log::debug!("{op} on '{collection}' returned {count} document(s) in {elapsed} ms"),
    }

    outcome.map(|mut r| {
        r.execution_time_ms = elapsed;
        r
    })
}

struct Ctx<'a> {
    store: &'a dyn DocumentStore,
    token: &'a CancellationToken,
    max_time: Duration,
}

impl Ctx<'_> {
    /// Await one store call, racing it against cancellation.
    async fn call<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> ExecResult<T> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(ExecuteError::Cancelled),
            r = fut => r.map_err(ExecuteError::from),
        }
    }
}

async fn run_command(ctx: &Ctx<'_>, cmd: &DbCommand) -> ExecResult<QueryResult> {
    let args = cmd.args.iter().map(to_bson).collect::<Result<Vec<_>, _>>()?;
    let reply = ctx.call(ctx.store.run_command(&cmd.command, &args, ctx.max_time)).await?;
    Ok(QueryResult::single_shot(vec![from_document(&reply)]))
}

async fn run_collection(ctx: &Ctx<'_>, q: &CollectionQuery, options: &QueryOptions) -> ExecResult<QueryResult> {
    let store = ctx.store;
    let coll = q.collection.as_str();
    let sort = optional_doc(q.sort.as_ref(), "sort")?;
    let docs = match &q.operation {
        Operation::Find { filter, projection } => return find_page(ctx, q, filter, projection.as_ref(), options).await,
        Operation::Aggregate { pipeline, options: extra } => {
            return aggregate_page(ctx, coll, pipeline, extra.as_ref(), options).await;
        }
        Operation::FindOne { filter, projection } => {
            let find = FindOptions {
                projection: optional_doc(projection.as_ref(), "projection")?,
                sort,
                max_time: ctx.max_time,
                ..FindOptions::default()
            };
            let found = ctx.call(store.find_one(coll, &to_document(filter, "filter")?, &find)).await?;
            found.iter().map(from_document).collect()
        }
        Operation::Count { filter } => {
            let n = ctx.call(store.count(coll, &to_document(filter, "filter")?, ctx.max_time)).await?;
            vec![json!({"count": n})]
        }
        Operation::Distinct { field, filter } => {
            let filter = to_document_or_empty(filter.as_ref(), "filter")?;
            let values = ctx.call(store.distinct(coll, field, &filter, ctx.max_time)).await?;
            values.iter().map(from_bson).collect()
        }
        Operation::InsertOne { document } => {
            let out = ctx.call(store.insert_one(coll, to_document(document, "document")?)).await?;
            vec![json!({"acknowledged": true, "insertedId": from_bson(&out.inserted_id)})]
        }
        Operation::InsertMany { documents, options: opts } => {
            let docs = documents.iter().map(|d| to_document(d, "document")).collect::<Result<Vec<_>, _>>()?;
            let ordered = flag_or(opts.as_ref(), "ordered", true);
            let out = ctx.call(store.insert_many(coll, docs, ordered)).await?;
            let ids: Vec<Value> = out.inserted_ids.iter().map(from_bson).collect();
            vec![json!({"acknowledged": true, "insertedCount": ids.len(), "insertedIds": ids})]
        }
        Operation::UpdateOne { filter, update, options: opts } | Operation::UpdateMany { filter, update, options: opts } => {
            let multi = matches!(q.operation, Operation::UpdateMany { .. });
            let spec = UpdateSpec::Operators(to_document(update, "update")?);
            let flags = UpdateOptions { upsert: flag(opts.as_ref(), "upsert"), multi };
            let out = ctx.call(store.update(coll, &to_document(filter, "filter")?, &spec, flags)).await?;
            vec![update_result(out.matched, out.modified, out.upserted_id.as_ref())]
        }
        Operation::ReplaceOne { filter, replacement, options: opts } => {
            let spec = UpdateSpec::Replacement(to_document(replacement, "replacement")?);
            let flags = UpdateOptions { upsert: flag(opts.as_ref(), "upsert"), multi: false };
            let out = ctx.call(store.update(coll, &to_document(filter, "filter")?, &spec, flags)).await?;
            vec![update_result(out.matched, out.modified, out.upserted_id.as_ref())]
        }
        Operation::DeleteOne { filter } | Operation::DeleteMany { filter } => {
            let many = matches!(q.operation, Operation::DeleteMany { .. });
            let n = ctx.call(store.delete(coll, &to_document(filter, "filter")?, many)).await?;
            vec![json!({"acknowledged": true, "deletedCount": n})]
        }
        Operation::FindOneAndUpdate { filter, update, options: opts } => {
            let action = FindAndModifyAction::Update(UpdateSpec::Operators(to_document(update, "update")?));
            find_and_modify(ctx, coll, filter, &action, opts.as_ref(), sort).await?
        }
        Operation::FindOneAndReplace { filter, replacement, options: opts } => {
            let action = FindAndModifyAction::Update(UpdateSpec::Replacement(to_document(replacement, "replacement")?));
            find_and_modify(ctx, coll, filter, &action, opts.as_ref(), sort).await?
        }
        Operation::FindOneAndDelete { filter, options: opts } => {
            find_and_modify(ctx, coll, filter, &FindAndModifyAction::Delete, opts.as_ref(), sort).await?
        }
        Operation::CreateIndex { keys, options: opts } => {
            let opts = to_document_or_empty(opts.as_ref(), "index options")?;
            let index = IndexOptions {
                name: opts.get_str("name").ok().map(str::to_string),
                unique: opts.get("unique").is_some_and(truthy),
                sparse: opts.get("sparse").is_some_and(truthy),
            };
            let name = ctx.call(store.create_index(coll, &to_document(keys, "index specification")?, &index)).await?;
            vec![json!({"createdIndex": name})]
        }
        Operation::DropIndex { index } => {
            let target = match index {
                Value::String(name) => IndexRef::Name(name.clone()),
                Value::Object(_) => IndexRef::Keys(to_document(index, "index")?),
                _ => return Err(QueryError::bad_value("dropIndex requires an index name or key specification").into()),
            };
            let dropped = ctx.call(store.drop_index(coll, &target)).await?;
            vec![json!({"ok": 1, "dropped": dropped})]
        }
        Operation::GetIndexes => {
            let indexes = ctx.call(store.list_indexes(coll)).await?;
            indexes.iter().map(from_document).collect()
        }
        Operation::BulkWrite { operations, options: opts } => {
            let models = operations.iter().map(write_model).collect::<Result<Vec<_>, _>>()?;
            let ordered = flag_or(opts.as_ref(), "ordered", true);
            let out = ctx.call(store.bulk_write(coll, &models, ordered)).await?;
            vec![json!({
                "acknowledged": true,
                "insertedCount": out.inserted,
                "matchedCount": out.matched,
                "modifiedCount": out.modified,
                "deletedCount": out.deleted,
                "upsertedCount": out.upserted,
            })]
        }
    };
    Ok(QueryResult::single_shot(docs))
}

async fn find_page(
    ctx: &Ctx<'_>,
    q: &CollectionQuery,
    filter: &Value,
    projection: Option<&Value>,
    options: &QueryOptions,
) -> ExecResult<QueryResult> {
    let filter = to_document(filter, "filter")?;
    let query_skip = q.skip.map_or(0, |s| s.max(0).unsigned_abs());
    let skip = options.page_skip().saturating_add(query_skip);
    // A zero limit means no limit; a negative one counts by magnitude.
    let limit = match q.limit {
        Some(l) if l != 0 => l.unsigned_abs().min(options.page_size),
        _ => options.page_size,
    };
    let find = FindOptions {
        projection: optional_doc(projection, "projection")?,
        sort: optional_doc(q.sort.as_ref(), "sort")?,
        skip,
        limit: Some(limit),
        max_time: ctx.max_time,
    };
    let docs = ctx.call(ctx.store.find(&q.collection, &filter, &find)).await?;
    let total = ctx.call(ctx.store.count(&q.collection, &filter, ctx.max_time)).await?;
    let has_more = skip.saturating_add(docs.len() as u64) < total;
    Ok(QueryResult {
        documents: docs.iter().map(from_document).collect(),
        total_count: total,
        execution_time_ms: 0,
        has_more,
        count_unavailable: false,
    })
}

async fn aggregate_page(
    ctx: &Ctx<'_>,
    coll: &str,
    pipeline: &[Value],
    extra: Option<&Value>,
    options: &QueryOptions,
) -> ExecResult<QueryResult> {
    let stages = pipeline.iter().map(|s| to_document(s, "pipeline stage")).collect::<Result<Vec<_>, _>>()?;
    let agg = AggregateOptions { extra: optional_doc(extra, "aggregate options")?, max_time: ctx.max_time };
    let skip = options.page_skip();
    let mut paged = stages.clone();
    paged.push(doc! {"$skip": i64::try_from(skip).unwrap_or(i64::MAX)});
    paged.push(doc! {"$limit": i64::try_from(options.page_size).unwrap_or(i64::MAX)});
    let docs = ctx.call(ctx.store.aggregate(coll, &paged, &agg)).await?;
    let returned = docs.len() as u64;

    let mut counting = stages;
    counting.push(doc! {"$count": "total"});
    let (total, count_unavailable) = match ctx.call(ctx.store.aggregate(coll, &counting, &agg)).await {
        Ok(rows) => (rows.first().and_then(|d| d.get("total")).and_then(count_value).unwrap_or(returned), false),
        Err(ExecuteError::Cancelled) => return Err(ExecuteError::Cancelled),
        Err(ExecuteError::Query(e)) => {
            log::warn!("count pipeline on '{coll}' failed, reporting the returned count instead: {e}");
            (returned, true)
        }
    };
    Ok(QueryResult {
        documents: docs.iter().map(from_document).collect(),
        total_count: total,
        execution_time_ms: 0,
        has_more: skip.saturating_add(returned) < total,
        count_unavailable,
    })
}

async fn find_and_modify(
    ctx: &Ctx<'_>,
    coll: &str,
    filter: &Value,
    action: &FindAndModifyAction,
    opts: Option<&Value>,
    chained_sort: Option<Document>,
) -> ExecResult<Vec<Value>> {
    let after = match opts.and_then(|o| o.get("returnDocument")).and_then(Value::as_str) {
        Some("after") => true,
        Some("before") => false,
        None => flag(opts, "returnNewDocument"),
        Some(other) => {
            return Err(QueryError::bad_value(format!("returnDocument must be 'before' or 'after', got '{other}'")).into());
        }
    };
    let options = FindAndModifyOptions {
        upsert: flag(opts, "upsert"),
        return_document: if after { ReturnDocument::After } else { ReturnDocument::Before },
        projection: optional_doc(opts.and_then(|o| o.get("projection")), "projection")?,
        sort: optional_doc(opts.and_then(|o| o.get("sort")), "sort")?.or(chained_sort),
        max_time: ctx.max_time,
    };
    let found = ctx.call(ctx.store.find_and_modify(coll, &to_document(filter, "filter")?, action, &options)).await?;
    Ok(found.iter().map(from_document).collect())
}

fn write_model(op: &Value) -> Result<WriteModel, QueryError> {
    let Value::Object(map) = op else {
        return Err(QueryError::bad_value("bulkWrite operations must be objects"));
    };
    let mut entries = map.iter();
    let (Some((name, body)), None) = (entries.next(), entries.next()) else {
        return Err(QueryError::bad_value("each bulkWrite operation must have exactly one key"));
    };
    let body = to_document(body, name)?;
    let field = |key: &str| -> Result<Document, QueryError> {
        body.get_document(key).cloned().map_err(|_| QueryError::bad_value(format!("{name} requires a '{key}' document")))
    };
    let upsert = body.get("upsert").is_some_and(truthy);
    Ok(match name.as_str() {
        "insertOne" => WriteModel::InsertOne { document: field("document")? },
        "updateOne" => WriteModel::UpdateOne { filter: field("filter")?, update: field("update")?, upsert },
        "updateMany" => WriteModel::UpdateMany { filter: field("filter")?, update: field("update")?, upsert },
        "replaceOne" => WriteModel::ReplaceOne { filter: field("filter")?, replacement: field("replacement")?, upsert },
        "deleteOne" => WriteModel::DeleteOne { filter: field("filter")? },
        "deleteMany" => WriteModel::DeleteMany { filter: field("filter")? },
        other => return Err(QueryError::bad_value(format!("Unsupported bulkWrite operation: {other}"))),
    })
}

fn optional_doc(value: Option<&Value>, what: &str) -> Result<Option<Document>, QueryError> {
    value.map(|v| to_document(v, what)).transpose()
}

fn flag(opts: Option<&Value>, key: &str) -> bool {
    flag_or(opts, key, false)
}

/// Boolean option with a default for when `key` is absent or not a bool/number.
fn flag_or(opts: Option<&Value>, key: &str, default: bool) -> bool {
    match opts.and_then(|o| o.get(key)) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => default,
    }
}

fn update_result(matched: u64, modified: u64, upserted: Option<&Bson>) -> Value {
    json!({
        "acknowledged": true,
        "matchedCount": matched,
        "modifiedCount": modified,
        "upsertedId": upserted.map_or(Value::Null, from_bson),
    })
}

fn count_value(v: &Bson) -> Option<u64> {
    match v {
        Bson::Int32(i) => u64::try_from(*i).ok(),
        Bson::Int64(i) => u64::try_from(*i).ok(),
        Bson::Double(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
        _ => None,
    }
}
