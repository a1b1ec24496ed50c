//! Parsed query descriptors and execution results.
//!
//! `ParsedQuery` serializes untagged, so a collection query renders as
//! `{"collection":…,"operation":…,…}` and a database command as `{"command":…,"args":[…]}`.
//! Fields an operation does not use are never serialized.

use serde::Serialize;
use std::fmt;

/// Decoded form of the notation dialect.
pub type Value = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedQuery {
    Collection(CollectionQuery),
    Command(DbCommand),
}

impl ParsedQuery {
    #[must_use]
    pub const fn as_collection(&self) -> Option<&CollectionQuery> {
        match self {
            Self::Collection(q) => Some(q),
            Self::Command(_) => None,
        }
    }

    #[must_use]
    pub const fn as_command(&self) -> Option<&DbCommand> {
        match self {
            Self::Command(c) => Some(c),
            Self::Collection(_) => None,
        }
    }
}

/// `db.<collection>.<operation>(…)` plus any chained `.sort/.limit/.skip`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionQuery {
    pub collection: String,
    #[serde(flatten)]
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
}

impl CollectionQuery {
    #[must_use]
    pub fn new(collection: impl Into<String>, operation: Operation) -> Self {
        Self { collection: collection.into(), operation, sort: None, limit: None, skip: None }
    }

    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.operation.kind()
    }
}

/// A database-level call such as `db.stats()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbCommand {
    pub command: String,
    pub args: Vec<Value>,
}

/// One variant per operation kind, each carrying only the arguments that kind uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Operation {
    Find {
        filter: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        projection: Option<Value>,
    },
    FindOne {
        filter: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        projection: Option<Value>,
    },
    Aggregate {
        pipeline: Vec<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    Count {
        filter: Value,
    },
    Distinct {
        field: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        filter: Option<Value>,
    },
    InsertOne {
        document: Value,
    },
    InsertMany {
        documents: Vec<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    UpdateOne {
        filter: Value,
        update: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    UpdateMany {
        filter: Value,
        update: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    ReplaceOne {
        filter: Value,
        replacement: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    DeleteOne {
        filter: Value,
    },
    DeleteMany {
        filter: Value,
    },
    FindOneAndUpdate {
        filter: Value,
        update: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    FindOneAndReplace {
        filter: Value,
        replacement: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    FindOneAndDelete {
        filter: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    CreateIndex {
        keys: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    /// `index` is either the index name (string) or its key specification (object).
    DropIndex {
        index: Value,
    },
    GetIndexes,
    BulkWrite {
        operations: Vec<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
}

impl Operation {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Find { .. } => OperationKind::Find,
            Self::FindOne { .. } => OperationKind::FindOne,
            Self::Aggregate { .. } => OperationKind::Aggregate,
            Self::Count { .. } => OperationKind::Count,
            Self::Distinct { .. } => OperationKind::Distinct,
            Self::InsertOne { .. } => OperationKind::InsertOne,
            Self::InsertMany { .. } => OperationKind::InsertMany,
            Self::UpdateOne { .. } => OperationKind::UpdateOne,
            Self::UpdateMany { .. } => OperationKind::UpdateMany,
            Self::ReplaceOne { .. } => OperationKind::ReplaceOne,
            Self::DeleteOne { .. } => OperationKind::DeleteOne,
            Self::DeleteMany { .. } => OperationKind::DeleteMany,
            Self::FindOneAndUpdate { .. } => OperationKind::FindOneAndUpdate,
            Self::FindOneAndReplace { .. } => OperationKind::FindOneAndReplace,
            Self::FindOneAndDelete { .. } => OperationKind::FindOneAndDelete,
            Self::CreateIndex { .. } => OperationKind::CreateIndex,
            Self::DropIndex { .. } => OperationKind::DropIndex,
            Self::GetIndexes => OperationKind::GetIndexes,
            Self::BulkWrite { .. } => OperationKind::BulkWrite,
        }
    }
}

/// The closed set of collection-level verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Find,
    FindOne,
    Aggregate,
    Count,
    Distinct,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    ReplaceOne,
    DeleteOne,
    DeleteMany,
    FindOneAndUpdate,
    FindOneAndReplace,
    FindOneAndDelete,
    CreateIndex,
    DropIndex,
    GetIndexes,
    BulkWrite,
}

impl OperationKind {
    pub const ALL: [Self; 19] = [
        Self::Find,
        Self::FindOne,
        Self::Aggregate,
        Self::Count,
        Self::Distinct,
        Self::InsertOne,
        Self::InsertMany,
        Self::UpdateOne,
        Self::UpdateMany,
        Self::ReplaceOne,
        Self::DeleteOne,
        Self::DeleteMany,
        Self::FindOneAndUpdate,
        Self::FindOneAndReplace,
        Self::FindOneAndDelete,
        Self::CreateIndex,
        Self::DropIndex,
        Self::GetIndexes,
        Self::BulkWrite,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Find => "find",
            Self::FindOne => "findOne",
            Self::Aggregate => "aggregate",
            Self::Count => "count",
            Self::Distinct => "distinct",
            Self::InsertOne => "insertOne",
            Self::InsertMany => "insertMany",
            Self::UpdateOne => "updateOne",
            Self::UpdateMany => "updateMany",
            Self::ReplaceOne => "replaceOne",
            Self::DeleteOne => "deleteOne",
            Self::DeleteMany => "deleteMany",
            Self::FindOneAndUpdate => "findOneAndUpdate",
            Self::FindOneAndReplace => "findOneAndReplace",
            Self::FindOneAndDelete => "findOneAndDelete",
            Self::CreateIndex => "createIndex",
            Self::DropIndex => "dropIndex",
            Self::GetIndexes => "getIndexes",
            Self::BulkWrite => "bulkWrite",
        }
    }

    /// Paginated kinds return pages of domain documents; everything else is single-shot.
    #[must_use]
    pub const fn is_paginated(self) -> bool {
        matches!(self, Self::Find | Self::Aggregate)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one successful execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub documents: Vec<Value>,
    pub total_count: u64,
    pub execution_time_ms: u64,
    pub has_more: bool,
    /// Set when `total_count` is a fallback because the count round trip failed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub count_unavailable: bool,
}

impl QueryResult {
    /// A non-paginated result: every returned document counts and nothing follows.
    #[must_use]
    pub fn single_shot(documents: Vec<Value>) -> Self {
        let total_count = documents.len() as u64;
        Self { documents, total_count, execution_time_ms: 0, has_more: false, count_unavailable: false }
    }
}
