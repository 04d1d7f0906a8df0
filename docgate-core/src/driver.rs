//! Driver abstraction consumed by the gateway.
//!
//! The gateway never talks to a database directly. It dials through a [`Driver`], keeps the
//! resulting [`DatabaseHandle`], and resolves [`CollectionHandle`]s from it to run the
//! collection-level operations.
//!
//! # Traits
//!
//! - [`Driver`]: dials a database from a [`GatewayConfig`]
//! - [`DatabaseHandle`]: an established connection, resolves named collections
//! - [`CollectionHandle`]: the collection-level operations
//!
//! Driver failures should be wrapped with [`GatewayError::driver`](crate::error::GatewayError::driver)
//! (or [`GatewayError::connection`](crate::error::GatewayError::connection) while dialing) so the
//! original error stays reachable by downcasting the variant's field.
//!
//! # Examples
//!
//! ```ignore
//! use docgate::driver::{Driver, DatabaseHandle, CollectionHandle};
//! use bson::doc;
//!
//! let handle = driver.connect(&GatewayConfig::new("memory://local/app")).await?;
//! let widgets = handle.collection("widgets");
//! widgets.insert(vec![doc! { "name": "a" }]).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::{config::GatewayConfig, error::GatewayResult};

/// A stream of documents returned by `find`.
///
/// Items are yielded as the driver produces them; errors raised while iterating are driver
/// errors.
pub type DocumentCursor = BoxStream<'static, GatewayResult<Document>>;

/// Result of an insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResult {
    /// Identifiers of the inserted documents, in input order.
    pub inserted_ids: Vec<Bson>,
}

/// Result of an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Number of documents matched by the filter.
    pub matched_count: u64,
    /// Number of documents actually modified.
    pub modified_count: u64,
    /// Identifier of an upserted document, if the driver performed an upsert.
    pub upserted_id: Option<Bson>,
}

/// Result of a remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Dials a database.
///
/// Implementations must be thread-safe. A failed dial must not leave any state behind that
/// would prevent a later dial from succeeding.
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// The handle type produced by a successful dial.
    type Handle: DatabaseHandle;

    /// Establishes a connection using `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Connection`](crate::error::GatewayError::Connection) carrying the
    /// driver's error when the database cannot be reached.
    async fn connect(&self, config: &GatewayConfig) -> GatewayResult<Self::Handle>;

    /// Releases a handle previously returned by [`Driver::connect`].
    ///
    /// The default implementation drops the handle.
    async fn disconnect(&self, handle: Self::Handle) -> GatewayResult<()> {
        drop(handle);

        Ok(())
    }
}

/// An established connection to a database.
///
/// Handles are cloned out of the gateway for every call, so cloning should be cheap
/// (reference counted).
pub trait DatabaseHandle: Clone + Send + Sync + Debug + 'static {
    /// The collection type resolved from this handle.
    type Collection: CollectionHandle;

    /// Name of the database this handle is bound to.
    fn name(&self) -> &str;

    /// Resolves the named collection. Collections are created lazily by the store.
    fn collection(&self, name: &str) -> Self::Collection;
}

/// Collection-level operations.
#[async_trait]
pub trait CollectionHandle: Send + Sync + Debug {
    /// Name of the collection.
    fn name(&self) -> &str;

    /// Inserts documents, returning their identifiers.
    async fn insert(&self, documents: Vec<Document>) -> GatewayResult<InsertResult>;

    /// Applies `update` to every document matching `filter`.
    ///
    /// `update` is either a document of update operators or a replacement document. Stores
    /// that cannot replace several documents at once (MongoDB) reject replacements here.
    async fn update(&self, filter: Document, update: Document) -> GatewayResult<UpdateResult>;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// Accepts update operators or a replacement document.
    async fn update_one(&self, filter: Document, update: Document) -> GatewayResult<UpdateResult>;

    /// Returns a cursor over the documents matching `filter`.
    async fn find(&self, filter: Document) -> GatewayResult<DocumentCursor>;

    /// Removes every document matching `filter`.
    async fn remove(&self, filter: Document) -> GatewayResult<DeleteResult>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(&self, filter: Document) -> GatewayResult<Option<Document>>;

    /// Counts the documents matching `filter`.
    async fn count(&self, filter: Document) -> GatewayResult<u64>;
}
