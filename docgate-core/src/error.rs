//! Error types and result types for gateway operations.
//!
//! Every fallible gateway call returns [`GatewayResult<T>`]. Failures raised by the
//! underlying driver are carried without translation, so callers can match the variant
//! and downcast its field to the driver's own error type.
//!
//! Errors are cheap to clone. Callers that queued behind a failed dial all receive a clone
//! of that dial's error.

use bson::error::Error as BsonError;
use std::sync::Arc;
use thiserror::Error;

/// A shared error produced by a driver implementation.
pub type DriverError = Arc<dyn std::error::Error + Send + Sync + 'static>;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents all possible errors that can occur when calling through the gateway.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// The driver failed to establish a connection. No handle was stored, so a later
    /// `connect` call may retry.
    #[error("Failed to connect to database: {0}")]
    Connection(#[source] DriverError),
    /// An operation was invoked before any successful `connect`.
    #[error("Database connection has not been initialized, call connect() first")]
    Uninitialized,
    /// An `_id` value could not be converted to an ObjectId.
    #[error("Invalid identifier {value}: {reason}")]
    InvalidIdentifier {
        /// Debug rendering of the rejected value.
        value: String,
        /// Why the conversion failed.
        reason: String,
    },
    /// The positional arguments handed to a dispatched operation have the wrong shape.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The driver failed while executing an operation.
    #[error("Driver error: {0}")]
    Driver(#[source] DriverError),
    /// Missing or invalid gateway configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Serialization/deserialization error when converting values to or from BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// Wraps a driver failure raised while executing an operation.
    pub fn driver<E>(err: E) -> Self
    where
        E: Into<BoxedError>,
    {
        let err: BoxedError = err.into();

        GatewayError::Driver(Arc::from(err))
    }

    /// Wraps a driver failure raised while dialing.
    pub fn connection<E>(err: E) -> Self
    where
        E: Into<BoxedError>,
    {
        let err: BoxedError = err.into();

        GatewayError::Connection(Arc::from(err))
    }

    /// Returns `true` for the "not connected yet" precondition failure.
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, GatewayError::Uninitialized)
    }
}

/// A specialized `Result` type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<BsonError> for GatewayError {
    fn from(err: BsonError) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}
