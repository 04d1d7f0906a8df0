//! Filter and update evaluation for in-memory collections.
//!
//! Supports the subset of the document query language the in-memory driver needs:
//!
//! - Filters: field equality (dotted paths allowed, arrays match on any element),
//!   `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`, `$and`, `$or`
//! - Updates: `$set`, `$unset`, `$inc`, or a replacement document

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use crate::error::MemoryError;


/// Comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `1` and `1i64` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other type, compared by exact BSON equality.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}


/// Evaluates a filter document against stored documents.
pub(crate) struct FilterEvaluator<'a> {
    document: &'a Document,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> Result<bool, MemoryError> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in Self::clauses(key, condition)? {
                        if !self.matches(clause)? {
                            all = false;
                            break;
                        }
                    }
                    all
                },
                "$or" => {
                    let mut any = false;
                    for clause in Self::clauses(key, condition)? {
                        if self.matches(clause)? {
                            any = true;
                            break;
                        }
                    }
                    any
                },
                op if op.starts_with('$') => {
                    return Err(MemoryError::InvalidFilter(format!("unsupported operator {op}")));
                },
                field => self.matches_field(field, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> Result<Vec<Document>, MemoryError> {
        let mut matched = Vec::new();

        for document in documents {
            if FilterEvaluator::new(document).matches(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn clauses<'f>(key: &str, condition: &'f Bson) -> Result<Vec<&'f Document>, MemoryError> {
        match condition {
            Bson::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| {
                    item.as_document().ok_or_else(|| {
                        MemoryError::InvalidFilter(format!("{key} expects an array of documents"))
                    })
                })
                .collect(),
            _ => Err(MemoryError::InvalidFilter(format!("{key} expects a non-empty array"))),
        }
    }

    fn matches_field(&self, field: &str, condition: &Bson) -> Result<bool, MemoryError> {
        let value = lookup(self.document, field);

        match condition {
            Bson::Document(ops) if is_operator_document(ops) => {
                for (op, operand) in ops {
                    if !Self::apply_operator(field, value, op, operand)? {
                        return Ok(false);
                    }
                }

                Ok(true)
            },
            _ => Ok(equals(value, condition)),
        }
    }

    fn apply_operator(
        field: &str,
        value: Option<&Bson>,
        op: &str,
        operand: &Bson,
    ) -> Result<bool, MemoryError> {
        match op {
            "$eq" => Ok(equals(value, operand)),
            "$ne" => Ok(!equals(value, operand)),
            "$gt" | "$gte" | "$lt" | "$lte" => {
                let Some(value) = value else {
                    return Ok(false);
                };

                match Comparable::from(value).partial_cmp(&Comparable::from(operand)) {
                    Some(ordering) => Ok(match op {
                        "$gt" => ordering == Ordering::Greater,
                        "$gte" => ordering != Ordering::Less,
                        "$lt" => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    }),
                    None => Ok(false),
                }
            },
            "$in" | "$nin" => {
                let candidates = operand.as_array().ok_or_else(|| {
                    MemoryError::InvalidFilter(format!("{op} on {field} expects an array"))
                })?;
                let found = candidates
                    .iter()
                    .any(|candidate| equals(value, candidate));

                Ok(if op == "$in" { found } else { !found })
            },
            "$exists" => Ok(value.is_some() == truthy(operand)),
            other => Err(MemoryError::InvalidFilter(format!("unsupported operator {other} on {field}"))),
        }
    }
}


/// Applies an update document to `document`, returning whether it changed.
///
/// An update made only of `$`-operators is applied field by field. Otherwise the
/// update replaces the document, keeping its `_id`.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> Result<bool, MemoryError> {
    let before = document.clone();

    if is_operator_document(update) {
        for (op, fields) in update {
            let fields = fields.as_document().ok_or_else(|| {
                MemoryError::InvalidUpdate(format!("{op} expects a document"))
            })?;

            match op.as_str() {
                "$set" => {
                    for (field, value) in fields {
                        guard_id(field, document.get(field), Some(value))?;
                        document.insert(field.clone(), value.clone());
                    }
                },
                "$unset" => {
                    for (field, _) in fields {
                        guard_id(field, document.get(field), None)?;
                        document.remove(field);
                    }
                },
                "$inc" => {
                    for (field, amount) in fields {
                        let next = increment(field, document.get(field), amount)?;
                        document.insert(field.clone(), next);
                    }
                },
                other => return Err(MemoryError::InvalidUpdate(format!("unsupported operator {other}"))),
            }
        }
    } else if update.keys().any(|key| key.starts_with('$')) {
        return Err(MemoryError::InvalidUpdate("cannot mix operators and fields".to_string()));
    } else {
        let id = document.get("_id").cloned();

        if let (Some(current), Some(requested)) = (&id, update.get("_id")) {
            if current != requested {
                return Err(MemoryError::InvalidUpdate("_id is immutable".to_string()));
            }
        }

        let mut replacement = Document::new();
        if let Some(id) = id {
            replacement.insert("_id", id);
        }
        for (key, value) in update {
            if key != "_id" {
                replacement.insert(key.clone(), value.clone());
            }
        }

        *document = replacement;
    }

    Ok(*document != before)
}

fn guard_id(field: &str, current: Option<&Bson>, next: Option<&Bson>) -> Result<(), MemoryError> {
    if field == "_id" && current != next {
        return Err(MemoryError::InvalidUpdate("_id is immutable".to_string()));
    }

    Ok(())
}

fn increment(field: &str, current: Option<&Bson>, amount: &Bson) -> Result<Bson, MemoryError> {
    let not_numeric = || MemoryError::InvalidUpdate(format!("$inc on {field} requires numeric values"));

    Ok(match (current, amount) {
        (None, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => amount.clone(),
        (Some(Bson::Int32(a)), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(*a as i64 + *b as i64),
        },
        (Some(Bson::Int32(a)), Bson::Int64(b)) => Bson::Int64(add_i64(field, *a as i64, *b)?),
        (Some(Bson::Int64(a)), Bson::Int32(b)) => Bson::Int64(add_i64(field, *a, *b as i64)?),
        (Some(Bson::Int64(a)), Bson::Int64(b)) => Bson::Int64(add_i64(field, *a, *b)?),
        (Some(current), amount) => match (as_f64(current), as_f64(amount)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            _ => return Err(not_numeric()),
        },
        (None, _) => return Err(not_numeric()),
    })
}

fn add_i64(field: &str, a: i64, b: i64) -> Result<i64, MemoryError> {
    a.checked_add(b)
        .ok_or_else(|| MemoryError::InvalidUpdate(format!("$inc on {field} overflows a 64-bit integer")))
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn is_operator_document(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|key| key.starts_with('$'))
}

/// Resolves a dotted path, descending through embedded documents.
fn lookup<'d>(document: &'d Document, path: &str) -> Option<&'d Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Equality with query semantics: a missing field equals null, and an array field
/// matches when any of its elements does.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    let expected = Comparable::from(expected);

    match value {
        None => expected == Comparable::Null,
        Some(value) => match Comparable::from(value) {
            Comparable::Array(items) if !matches!(expected, Comparable::Array(_)) => {
                items.iter().any(|item| item == &expected)
            },
            value => value == expected,
        },
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}
