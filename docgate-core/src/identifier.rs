//! Identifier normalization for operation arguments.
//!
//! Callers address documents with plain hex strings while the store keys them by
//! [`ObjectId`]. Before an argument list reaches the driver, every top-level `_id` field of a
//! document argument is rewritten to an `ObjectId`.
//!
//! The rewrite is shallow. Only the top level of each document argument is inspected, and
//! array arguments are passed through untouched even when their elements are documents.

use bson::{Binary, Bson, Document, oid::ObjectId, spec::BinarySubtype};

use crate::error::{GatewayError, GatewayResult};

/// Name of the identifier field.
pub const ID_FIELD: &str = "_id";

/// A positional argument handed to a dispatched operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A query, update or replacement document. Subject to identifier normalization.
    Document(Document),
    /// An ordered sequence, passed through as is.
    Array(Vec<Bson>),
    /// Any other value, e.g. a collection name.
    Value(Bson),
}

impl Arg {
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Arg::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Value(Bson::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Short description of the argument shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Document(_) => "document",
            Arg::Array(_) => "array",
            Arg::Value(_) => "value",
        }
    }
}

impl From<Document> for Arg {
    fn from(doc: Document) -> Self {
        Arg::Document(doc)
    }
}

impl From<Vec<Bson>> for Arg {
    fn from(values: Vec<Bson>) -> Self {
        Arg::Array(values)
    }
}

impl From<Vec<Document>> for Arg {
    fn from(docs: Vec<Document>) -> Self {
        Arg::Array(docs.into_iter().map(Bson::Document).collect())
    }
}

impl From<Bson> for Arg {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Document(doc) => Arg::Document(doc),
            Bson::Array(values) => Arg::Array(values),
            other => Arg::Value(other),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Value(Bson::String(value.to_string()))
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Value(Bson::String(value))
    }
}

/// Normalizes every document argument in place.
///
/// Stops at the first identifier that cannot be converted; arguments before it may
/// already have been rewritten.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIdentifier`] if an `_id` value cannot be converted.
pub fn normalize_args(args: &mut [Arg]) -> GatewayResult<()> {
    for arg in args.iter_mut() {
        if let Arg::Document(doc) = arg {
            normalize_document(doc)?;
        }
    }

    Ok(())
}

/// Rewrites a truthy top-level `_id` of `doc` to an [`ObjectId`].
///
/// Falsy identifiers (null, `false`, empty string, zero) and documents without `_id` are
/// left as they are. Nested documents are not inspected.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIdentifier`] if the value cannot be converted.
pub fn normalize_document(doc: &mut Document) -> GatewayResult<()> {
    let converted = match doc.get(ID_FIELD) {
        Some(value) if is_truthy(value) => to_object_id(value)?,
        _ => return Ok(()),
    };

    doc.insert(ID_FIELD, converted);

    Ok(())
}

/// Converts an external identifier representation to an [`ObjectId`].
///
/// Accepts a 24 character hex string, an existing `ObjectId`, or 12 bytes of generic binary.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIdentifier`] for anything else.
pub fn to_object_id(value: &Bson) -> GatewayResult<ObjectId> {
    match value {
        Bson::ObjectId(oid) => Ok(*oid),
        Bson::String(hex) => ObjectId::parse_str(hex).map_err(|e| invalid(value, e.to_string())),
        Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes,
        }) => <[u8; 12]>::try_from(bytes.as_slice())
            .map(ObjectId::from_bytes)
            .map_err(|_| invalid(value, format!("expected 12 bytes, got {}", bytes.len()))),
        other => Err(invalid(
            other,
            format!("cannot build an ObjectId from {:?}", other.element_type()),
        )),
    }
}

/// Truthiness of a value as a loosely typed caller would see it.
pub(crate) fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::String(s) => !s.is_empty(),
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0 && !n.is_nan(),
        _ => true,
    }
}

fn invalid(value: &Bson, reason: String) -> GatewayError {
    GatewayError::InvalidIdentifier {
        value: value.to_string(),
        reason,
    }
}
