//! The fixed set of operations exposed by the gateway.
//!
//! Each [`Operation`] is bound to a target: the database handle itself, or a named
//! collection resolved from it. Collection-level operations take the collection name as
//! their first positional argument when called through
//! [`Gateway::dispatch`](crate::gateway::Gateway::dispatch).

use bson::Document;
use std::{fmt, str::FromStr};

use crate::{
    driver::{DeleteResult, DocumentCursor, InsertResult, UpdateResult},
    error::GatewayError,
};

/// What an operation is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationTarget {
    /// Called on the database handle.
    Database,
    /// Called on a named collection.
    Collection,
}

/// A named gateway operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Collection,
    Insert,
    Update,
    UpdateOne,
    Find,
    Remove,
    FindOne,
    Count,
}

impl Operation {
    /// Every operation, in table order.
    pub const ALL: [Operation; 8] = [
        Operation::Collection,
        Operation::Insert,
        Operation::Update,
        Operation::UpdateOne,
        Operation::Find,
        Operation::Remove,
        Operation::FindOne,
        Operation::Count,
    ];

    /// The driver-facing name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Collection => "collection",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::UpdateOne => "updateOne",
            Operation::Find => "find",
            Operation::Remove => "remove",
            Operation::FindOne => "findOne",
            Operation::Count => "count",
        }
    }

    pub fn target(&self) -> OperationTarget {
        match self {
            Operation::Collection => OperationTarget::Database,
            _ => OperationTarget::Collection,
        }
    }

    pub fn is_collection_operation(&self) -> bool {
        self.target() == OperationTarget::Collection
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| GatewayError::InvalidArgument(format!("unknown operation {s}")))
    }
}

/// The result of a dispatched operation, one variant per operation.
pub enum Outcome<C> {
    /// A resolved collection.
    Collection(C),
    Inserted(InsertResult),
    Updated(UpdateResult),
    Cursor(DocumentCursor),
    Removed(DeleteResult),
    Document(Option<Document>),
    Count(u64),
}

impl<C> Outcome<C> {
    pub fn into_collection(self) -> Option<C> {
        match self {
            Outcome::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn into_inserted(self) -> Option<InsertResult> {
        match self {
            Outcome::Inserted(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_updated(self) -> Option<UpdateResult> {
        match self {
            Outcome::Updated(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_cursor(self) -> Option<DocumentCursor> {
        match self {
            Outcome::Cursor(cursor) => Some(cursor),
            _ => None,
        }
    }

    pub fn into_removed(self) -> Option<DeleteResult> {
        match self {
            Outcome::Removed(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_document(self) -> Option<Option<Document>> {
        match self {
            Outcome::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_count(self) -> Option<u64> {
        match self {
            Outcome::Count(count) => Some(count),
            _ => None,
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for Outcome<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Collection(c) => f.debug_tuple("Collection").field(c).finish(),
            Outcome::Inserted(r) => f.debug_tuple("Inserted").field(r).finish(),
            Outcome::Updated(r) => f.debug_tuple("Updated").field(r).finish(),
            Outcome::Cursor(_) => f.write_str("Cursor(..)"),
            Outcome::Removed(r) => f.debug_tuple("Removed").field(r).finish(),
            Outcome::Document(d) => f.debug_tuple("Document").field(d).finish(),
            Outcome::Count(n) => f.debug_tuple("Count").field(n).finish(),
        }
    }
}
