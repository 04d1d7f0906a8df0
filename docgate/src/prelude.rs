//! Convenient re-exports of commonly used types from docgate.
//!
//! ```ignore
//! use docgate::prelude::*;
//! ```
//!
//! This provides access to:
//! - The gateway, its operations and the shared gateway slot
//! - Driver traits and result types
//! - Configuration, status reporting and errors

pub use docgate_core::{
    config::GatewayConfig,
    connection::{Connection, ConnectionStatus, StatusListener, TracingStatus},
    document::DocumentExt,
    driver::{CollectionHandle, DatabaseHandle, DeleteResult, DocumentCursor, Driver, InsertResult, UpdateResult},
    error::{GatewayError, GatewayResult},
    gateway::{DataAccess, Gateway},
    identifier::Arg,
    operation::{Operation, OperationTarget, Outcome},
    shared::SharedGateway,
};
