//! Errors raised by the in-memory driver.
//!
//! These are handed to the gateway wrapped in
//! [`GatewayError::Driver`](docgate_core::error::GatewayError::Driver) or
//! [`GatewayError::Connection`](docgate_core::error::GatewayError::Connection), and can be
//! recovered from there by downcasting the error source.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    /// The connection URL is not a `memory://host/database` URL.
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),
    /// The URL has been marked unreachable.
    #[error("Server unreachable: {0}")]
    Unreachable(String),
    /// Neither the URL nor the configuration names a database.
    #[error("No database named in {0}")]
    MissingDatabase(String),
    /// A document with the same `_id` already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Duplicate key {0} in collection {1}")]
    DuplicateKey(String, String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
}
