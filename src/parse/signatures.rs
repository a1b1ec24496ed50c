//! Static grammar tables: database command signatures and collection operation contracts.
//!
//! Both tables are process-wide constants. Validation is driven entirely by these entries so
//! the parsers never special-case a name.

use crate::errors::ParseError;
use crate::types::{OperationKind, Value};

/// Expected shape of one positional command argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// The slot takes no argument.
    None,
    String,
    Object,
    Any,
}

impl ArgKind {
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::None => false,
            Self::String => value.is_string(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::None => "absent",
            Self::String => "a string",
            Self::Object => "an object",
            Self::Any => "any value",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSignature {
    pub name: &'static str,
    pub args: &'static [ArgKind],
    pub min_args: usize,
    pub max_args: usize,
}

impl CommandSignature {
    /// Check arity first, then each positional kind.
    ///
    /// # Errors
    /// Returns a `ParseError` naming the command and the violated bound or slot.
    pub fn validate(&self, args: &[Value]) -> Result<(), ParseError> {
        let got = args.len();
        if got < self.min_args {
            return Err(ParseError::new(format!(
                "{} requires at least {} argument(s), got {got}",
                self.name, self.min_args
            )));
        }
        if got > self.max_args {
            return Err(ParseError::new(format!(
                "{} accepts at most {} argument(s), got {got}",
                self.name, self.max_args
            )));
        }
        for (idx, (value, kind)) in args.iter().zip(self.args.iter()).enumerate() {
            if !kind.accepts(value) {
                return Err(ParseError::new(format!(
                    "{} argument {} must be {}",
                    self.name,
                    idx + 1,
                    kind.describe()
                )));
            }
        }
        Ok(())
    }
}

const fn sig(name: &'static str, args: &'static [ArgKind], min_args: usize, max_args: usize) -> CommandSignature {
    CommandSignature { name, args, min_args, max_args }
}

pub static COMMAND_SIGNATURES: &[CommandSignature] = &[
    sig("stats", &[ArgKind::Object], 0, 1),
    sig("getCollectionNames", &[ArgKind::None], 0, 0),
    sig("getCollectionInfos", &[ArgKind::Object], 0, 1),
    sig("createCollection", &[ArgKind::String, ArgKind::Object], 1, 2),
    sig("dropCollection", &[ArgKind::String], 1, 1),
    sig("dropDatabase", &[ArgKind::None], 0, 0),
    sig("runCommand", &[ArgKind::Object], 1, 1),
    sig("adminCommand", &[ArgKind::Object], 1, 1),
    sig("serverStatus", &[ArgKind::Object], 0, 1),
    sig("buildInfo", &[ArgKind::None], 0, 0),
    sig("hostInfo", &[ArgKind::None], 0, 0),
    sig("version", &[ArgKind::None], 0, 0),
    sig("getName", &[ArgKind::None], 0, 0),
];

#[must_use]
pub fn command_signature(name: &str) -> Option<&'static CommandSignature> {
    COMMAND_SIGNATURES.iter().find(|s| s.name == name)
}

#[must_use]
pub fn supported_commands() -> String {
    COMMAND_SIGNATURES.iter().map(|s| s.name).collect::<Vec<_>>().join(", ")
}

/// Minimum argument count and wording for each accepted operation name (aliases included).
#[derive(Debug, Clone, Copy)]
pub struct OperationContract {
    pub name: &'static str,
    pub kind: OperationKind,
    pub required_args: usize,
    pub requirement: &'static str,
}

impl OperationContract {
    /// # Errors
    /// Returns `<name> requires <requirement>` when fewer parts than required were given.
    pub fn check_arity(&self, got: usize) -> Result<(), ParseError> {
        if got < self.required_args {
            return Err(ParseError::new(format!("{} requires {}", self.name, self.requirement)));
        }
        Ok(())
    }
}

const fn op(name: &'static str, kind: OperationKind, required_args: usize, requirement: &'static str) -> OperationContract {
    OperationContract { name, kind, required_args, requirement }
}

pub static OPERATION_CONTRACTS: &[OperationContract] = &[
    op("find", OperationKind::Find, 0, ""),
    op("findOne", OperationKind::FindOne, 0, ""),
    op("aggregate", OperationKind::Aggregate, 0, ""),
    op("count", OperationKind::Count, 0, ""),
    op("countDocuments", OperationKind::Count, 0, ""),
    op("distinct", OperationKind::Distinct, 1, "a field name"),
    op("insertOne", OperationKind::InsertOne, 1, "a document argument"),
    op("insertMany", OperationKind::InsertMany, 1, "a documents argument"),
    op("updateOne", OperationKind::UpdateOne, 2, "filter and update arguments"),
    op("updateMany", OperationKind::UpdateMany, 2, "filter and update arguments"),
    op("replaceOne", OperationKind::ReplaceOne, 2, "filter and replacement arguments"),
    op("deleteOne", OperationKind::DeleteOne, 0, ""),
    op("deleteMany", OperationKind::DeleteMany, 0, ""),
    op("findOneAndUpdate", OperationKind::FindOneAndUpdate, 2, "filter and update arguments"),
    op("findOneAndReplace", OperationKind::FindOneAndReplace, 2, "filter and replacement arguments"),
    op("findOneAndDelete", OperationKind::FindOneAndDelete, 0, ""),
    op("createIndex", OperationKind::CreateIndex, 1, "an index specification"),
    op("dropIndex", OperationKind::DropIndex, 1, "an index name"),
    op("getIndexes", OperationKind::GetIndexes, 0, ""),
    op("indexes", OperationKind::GetIndexes, 0, ""),
    op("bulkWrite", OperationKind::BulkWrite, 1, "an operations argument"),
];

#[must_use]
pub fn operation_contract(name: &str) -> Option<&'static OperationContract> {
    OPERATION_CONTRACTS.iter().find(|c| c.name == name)
}

#[must_use]
pub fn supported_operations() -> String {
    OPERATION_CONTRACTS.iter().map(|c| c.name).collect::<Vec<_>>().join(", ")
}
