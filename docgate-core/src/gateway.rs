//! The data access gateway.
//!
//! [`Gateway`] owns a lazily established [`Connection`] and exposes the gateway operations
//! in two ways:
//!
//! - [`DataAccess`] - one typed method per operation
//! - [`Gateway::dispatch`] - a uniform positional calling convention taking an
//!   [`Operation`] and a list of [`Arg`]s, where collection-level operations consume the
//!   first argument as the collection name
//!
//! Both paths require a prior successful [`Gateway::connect`], rewrite top-level `_id`
//! fields of document arguments to ObjectIds, and return the driver's results and errors
//! unchanged.
//!
//! # Example
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryDriver};
//! use bson::doc;
//!
//! let gateway = Gateway::new(InMemoryDriver::new(), GatewayConfig::new("memory://local/app"));
//! gateway.connect(true).await?;
//!
//! gateway.insert("widgets", doc! { "name": "a" }).await?;
//! let widget = gateway
//!     .find_one("widgets", doc! { "_id": "507f1f77bcf86cd799439011" })
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::sync::Arc;
use tracing::debug;

use crate::{
    config::GatewayConfig,
    connection::{Connection, StatusListener},
    driver::{
        CollectionHandle, DatabaseHandle, DeleteResult, DocumentCursor, Driver, InsertResult,
        UpdateResult,
    },
    error::{GatewayError, GatewayResult},
    identifier::{Arg, normalize_args, normalize_document},
    operation::{Operation, Outcome},
};

/// The collection type resolved by a driver's handles.
pub type CollectionOf<D> = <<D as Driver>::Handle as DatabaseHandle>::Collection;

/// The gateway operations.
///
/// Every method fails with [`GatewayError::Uninitialized`] when called before a successful
/// connect, and with [`GatewayError::InvalidIdentifier`] when a top-level `_id` of a document
/// argument cannot be converted. Both checks happen before the driver is invoked.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// The collection type returned by [`DataAccess::collection`].
    type Collection: CollectionHandle;

    /// Resolves a named collection from the database handle.
    async fn collection(&self, name: &str) -> GatewayResult<Self::Collection>;

    /// Inserts a single document.
    async fn insert(&self, collection: &str, document: Document) -> GatewayResult<InsertResult>;

    /// Inserts a batch of documents.
    ///
    /// The batch is a single array argument, so identifiers inside it are not normalized.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> GatewayResult<InsertResult>;

    /// Applies `update` to every document matching `filter`.
    async fn update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> GatewayResult<UpdateResult>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> GatewayResult<UpdateResult>;

    /// Returns a cursor over the documents matching `filter`.
    async fn find(&self, collection: &str, filter: Document) -> GatewayResult<DocumentCursor>;

    /// Removes every document matching `filter`.
    async fn remove(&self, collection: &str, filter: Document) -> GatewayResult<DeleteResult>;

    /// Returns the first document matching `filter`.
    async fn find_one(&self, collection: &str, filter: Document)
    -> GatewayResult<Option<Document>>;

    /// Counts the documents matching `filter`.
    async fn count(&self, collection: &str, filter: Document) -> GatewayResult<u64>;
}

/// Lazily connected gateway over a [`Driver`].
///
/// Clones share the same connection, so a single gateway can be handed to every part of
/// an application.
#[derive(Debug)]
pub struct Gateway<D: Driver> {
    connection: Arc<Connection<D>>,
}

impl<D: Driver> Clone for Gateway<D> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
        }
    }
}

impl<D: Driver> From<Connection<D>> for Gateway<D> {
    fn from(connection: Connection<D>) -> Self {
        Self {
            connection: Arc::new(connection),
        }
    }
}

impl<D: Driver> Gateway<D> {
    /// Creates a gateway that will dial `driver` with `config` on first connect.
    pub fn new(driver: D, config: impl Into<GatewayConfig>) -> Self {
        Connection::new(driver, config.into()).into()
    }

    /// Creates a gateway that reports connection status to `listener`.
    pub fn with_listener(
        driver: D,
        config: impl Into<GatewayConfig>,
        listener: impl StatusListener + 'static,
    ) -> Self {
        Connection::new(driver, config.into())
            .with_listener(listener)
            .into()
    }

    pub fn connection(&self) -> &Connection<D> {
        &self.connection
    }

    /// Establishes the connection if needed and returns the database handle.
    ///
    /// Idempotent: once connected, returns the stored handle without dialing or emitting
    /// status notifications. When `verbose` is set, a dial reports its progress to the
    /// status listener.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Connection`] with the driver's error if the dial fails. The
    /// gateway stays unconnected and a later call may retry.
    pub async fn connect(&self, verbose: bool) -> GatewayResult<D::Handle> {
        self.connection.connect(verbose).await
    }

    /// Verbose [`Gateway::connect`].
    pub async fn connect_default(&self) -> GatewayResult<D::Handle> {
        self.connect(true).await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    /// Releases the database handle. The next `connect` dials again.
    pub async fn shutdown(&self) -> GatewayResult<()> {
        self.connection.shutdown().await
    }

    /// Invokes `op` with positional arguments.
    ///
    /// `Operation::Collection` takes the collection name as its only argument and is
    /// resolved on the database handle. Every other operation consumes its first argument
    /// as the collection name and passes the remaining, normalized arguments to the
    /// collection:
    ///
    /// | operation | arguments after the name |
    /// |---|---|
    /// | `insert` | a document, or an array of documents |
    /// | `update`, `updateOne` | filter document, update document |
    /// | `find`, `remove`, `findOne`, `count` | optional filter document |
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Uninitialized`] before a successful connect,
    /// [`GatewayError::InvalidIdentifier`] for an unconvertible `_id`,
    /// [`GatewayError::InvalidArgument`] when the arguments do not have the shape above, and
    /// the driver's own errors otherwise.
    pub async fn dispatch(
        &self,
        op: Operation,
        args: Vec<Arg>,
    ) -> GatewayResult<Outcome<CollectionOf<D>>> {
        let handle = self.connection.handle().await?;

        if op == Operation::Collection {
            let mut args = args;
            normalize_args(&mut args)?;

            let name = collection_name(op, args.first())?;
            expect_arity(op, &args, 1)?;

            return Ok(Outcome::Collection(handle.collection(name)));
        }

        let mut args = args.into_iter();
        let name = collection_name(op, args.next().as_ref())?.to_string();
        let mut rest = args.collect::<Vec<_>>();
        normalize_args(&mut rest)?;

        debug!(collection = %name, operation = %op, "dispatching operation");
        let collection = handle.collection(&name);

        Ok(match op {
            Operation::Insert => Outcome::Inserted(
                collection
                    .insert(insert_documents(op, rest)?)
                    .await?,
            ),
            Operation::Update => {
                let (filter, update) = filter_and_update(op, rest)?;
                Outcome::Updated(collection.update(filter, update).await?)
            }
            Operation::UpdateOne => {
                let (filter, update) = filter_and_update(op, rest)?;
                Outcome::Updated(collection.update_one(filter, update).await?)
            }
            Operation::Find => Outcome::Cursor(collection.find(filter_document(op, rest)?).await?),
            Operation::Remove => Outcome::Removed(collection.remove(filter_document(op, rest)?).await?),
            Operation::FindOne => {
                Outcome::Document(collection.find_one(filter_document(op, rest)?).await?)
            }
            Operation::Count => Outcome::Count(collection.count(filter_document(op, rest)?).await?),
            Operation::Collection => Outcome::Collection(collection),
        })
    }

    /// Reads the live handle and resolves `name` on it.
    async fn bind(&self, op: Operation, name: &str) -> GatewayResult<CollectionOf<D>> {
        let handle = self.connection.handle().await?;

        debug!(collection = %name, operation = %op, "dispatching operation");

        Ok(handle.collection(name))
    }
}

#[async_trait]
impl<D: Driver> DataAccess for Gateway<D> {
    type Collection = CollectionOf<D>;

    async fn collection(&self, name: &str) -> GatewayResult<Self::Collection> {
        Ok(self
            .connection
            .handle()
            .await?
            .collection(name))
    }

    async fn insert(&self, collection: &str, mut document: Document) -> GatewayResult<InsertResult> {
        let target = self.bind(Operation::Insert, collection).await?;
        normalize_document(&mut document)?;

        target.insert(vec![document]).await
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> GatewayResult<InsertResult> {
        self.bind(Operation::Insert, collection)
            .await?
            .insert(documents)
            .await
    }

    async fn update(
        &self,
        collection: &str,
        mut filter: Document,
        mut update: Document,
    ) -> GatewayResult<UpdateResult> {
        let target = self.bind(Operation::Update, collection).await?;
        normalize_document(&mut filter)?;
        normalize_document(&mut update)?;

        target.update(filter, update).await
    }

    async fn update_one(
        &self,
        collection: &str,
        mut filter: Document,
        mut update: Document,
    ) -> GatewayResult<UpdateResult> {
        let target = self.bind(Operation::UpdateOne, collection).await?;
        normalize_document(&mut filter)?;
        normalize_document(&mut update)?;

        target.update_one(filter, update).await
    }

    async fn find(&self, collection: &str, mut filter: Document) -> GatewayResult<DocumentCursor> {
        let target = self.bind(Operation::Find, collection).await?;
        normalize_document(&mut filter)?;

        target.find(filter).await
    }

    async fn remove(&self, collection: &str, mut filter: Document) -> GatewayResult<DeleteResult> {
        let target = self.bind(Operation::Remove, collection).await?;
        normalize_document(&mut filter)?;

        target.remove(filter).await
    }

    async fn find_one(
        &self,
        collection: &str,
        mut filter: Document,
    ) -> GatewayResult<Option<Document>> {
        let target = self.bind(Operation::FindOne, collection).await?;
        normalize_document(&mut filter)?;

        target.find_one(filter).await
    }

    async fn count(&self, collection: &str, mut filter: Document) -> GatewayResult<u64> {
        let target = self.bind(Operation::Count, collection).await?;
        normalize_document(&mut filter)?;

        target.count(filter).await
    }
}

fn collection_name(op: Operation, arg: Option<&Arg>) -> GatewayResult<&str> {
    match arg {
        Some(arg) => arg.as_str().ok_or_else(|| {
            GatewayError::InvalidArgument(format!(
                "{op} expects a collection name as its first argument, got a {}",
                arg.kind()
            ))
        }),
        None => Err(GatewayError::InvalidArgument(format!(
            "{op} expects a collection name"
        ))),
    }
}

fn expect_arity(op: Operation, args: &[Arg], arity: usize) -> GatewayResult<()> {
    if args.len() != arity {
        return Err(GatewayError::InvalidArgument(format!(
            "{op} expects {arity} argument(s), got {}",
            args.len()
        )));
    }

    Ok(())
}

fn into_document(op: Operation, arg: Arg) -> GatewayResult<Document> {
    match arg {
        Arg::Document(doc) => Ok(doc),
        other => Err(GatewayError::InvalidArgument(format!(
            "{op} expects a document, got a {}",
            other.kind()
        ))),
    }
}

fn insert_documents(op: Operation, args: Vec<Arg>) -> GatewayResult<Vec<Document>> {
    expect_arity(op, &args, 1)?;

    match args.into_iter().next() {
        Some(Arg::Document(doc)) => Ok(vec![doc]),
        Some(Arg::Array(values)) => values
            .into_iter()
            .map(|value| match value {
                Bson::Document(doc) => Ok(doc),
                other => Err(GatewayError::InvalidArgument(format!(
                    "{op} expects an array of documents, found {:?}",
                    other.element_type()
                ))),
            })
            .collect(),
        Some(other) => Err(GatewayError::InvalidArgument(format!(
            "{op} expects a document or an array of documents, got a {}",
            other.kind()
        ))),
        None => Err(GatewayError::InvalidArgument(format!(
            "{op} expects a document"
        ))),
    }
}

fn filter_and_update(op: Operation, args: Vec<Arg>) -> GatewayResult<(Document, Document)> {
    expect_arity(op, &args, 2)?;

    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(filter), Some(update)) => Ok((into_document(op, filter)?, into_document(op, update)?)),
        _ => Err(GatewayError::InvalidArgument(format!(
            "{op} expects a filter and an update document"
        ))),
    }
}

fn filter_document(op: Operation, args: Vec<Arg>) -> GatewayResult<Document> {
    let count = args.len();
    let mut args = args.into_iter();

    match (args.next(), args.next()) {
        (None, _) => Ok(Document::new()),
        (Some(arg), None) => into_document(op, arg),
        (Some(_), Some(_)) => Err(GatewayError::InvalidArgument(format!(
            "{op} expects at most 1 argument, got {count}"
        ))),
    }
}
