use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use bson::{Bson, Document, doc};
use mongodb::{
    Client, Collection as MongoCollection, Database,
    options::ClientOptions,
};
use tracing::debug;
use docgate_core::{
    config::GatewayConfig,
    driver::{
        CollectionHandle, DatabaseHandle, DeleteResult, DocumentCursor, Driver, InsertResult,
        UpdateResult,
    },
    error::{GatewayError, GatewayResult},
};


/// Dials MongoDB deployments with the official async driver.
///
/// The database comes from [`GatewayConfig::database`] or, failing that, from the default
/// database named in the connection string. A dial is only considered successful once the
/// server answers a `ping`.
#[derive(Debug, Default, Clone)]
pub struct MongoDbDriver;

impl MongoDbDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for MongoDbDriver {
    type Handle = MongoDbDatabase;

    async fn connect(&self, config: &GatewayConfig) -> GatewayResult<Self::Handle> {
        let options = ClientOptions::parse(&config.url)
            .await
            .map_err(GatewayError::connection)?;

        let name = config
            .database
            .clone()
            .or_else(|| options.default_database.clone())
            .ok_or_else(|| GatewayError::Configuration(
                "connection string names no database and none was configured".to_string(),
            ))?;

        let client = Client::with_options(options).map_err(GatewayError::connection)?;
        let database = client.database(&name);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(GatewayError::connection)?;

        debug!(database = %name, "connected to mongodb");

        Ok(MongoDbDatabase { client, database })
    }

    async fn disconnect(&self, handle: Self::Handle) -> GatewayResult<()> {
        handle.client.shutdown().await;

        Ok(())
    }
}


/// An established MongoDB connection bound to one database.
#[derive(Debug, Clone)]
pub struct MongoDbDatabase {
    client: Client,
    database: Database,
}

impl MongoDbDatabase {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl DatabaseHandle for MongoDbDatabase {
    type Collection = MongoDbCollection;

    fn name(&self) -> &str {
        self.database.name()
    }

    fn collection(&self, name: &str) -> Self::Collection {
        MongoDbCollection {
            inner: self.database.collection(name),
        }
    }
}


/// A MongoDB collection of untyped documents.
#[derive(Debug, Clone)]
pub struct MongoDbCollection {
    inner: MongoCollection<Document>,
}

impl MongoDbCollection {
    /// The underlying driver collection.
    pub fn inner(&self) -> &MongoCollection<Document> {
        &self.inner
    }
}

fn into_update_result(result: mongodb::results::UpdateResult) -> UpdateResult {
    UpdateResult {
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted_id: result.upserted_id,
    }
}

/// A non-empty update without `$` operators replaces the matched document.
fn is_replacement(update: &Document) -> bool {
    !update.is_empty() && !update.keys().any(|key| key.starts_with('$'))
}

#[async_trait]
impl CollectionHandle for MongoDbCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn insert(&self, documents: Vec<Document>) -> GatewayResult<InsertResult> {
        let mut inserted = self.inner
            .insert_many(documents)
            .await
            .map_err(GatewayError::driver)?
            .inserted_ids
            .into_iter()
            .collect::<Vec<(usize, Bson)>>();

        inserted.sort_by_key(|(index, _)| *index);

        Ok(InsertResult {
            inserted_ids: inserted
                .into_iter()
                .map(|(_, id)| id)
                .collect(),
        })
    }

    /// MongoDB only accepts update operators for multi-document updates, so a replacement
    /// document is rejected by the server here.
    async fn update(&self, filter: Document, update: Document) -> GatewayResult<UpdateResult> {
        Ok(into_update_result(
            self.inner
                .update_many(filter, update)
                .await
                .map_err(GatewayError::driver)?,
        ))
    }

    async fn update_one(&self, filter: Document, update: Document) -> GatewayResult<UpdateResult> {
        let result = if is_replacement(&update) {
            self.inner.replace_one(filter, update).await
        } else {
            self.inner.update_one(filter, update).await
        };

        Ok(into_update_result(result.map_err(GatewayError::driver)?))
    }

    async fn find(&self, filter: Document) -> GatewayResult<DocumentCursor> {
        Ok(
            self.inner
                .find(filter)
                .await
                .map_err(GatewayError::driver)?
                .map_err(GatewayError::driver)
                .boxed()
        )
    }

    async fn remove(&self, filter: Document) -> GatewayResult<DeleteResult> {
        Ok(DeleteResult {
            deleted_count: self.inner
                .delete_many(filter)
                .await
                .map_err(GatewayError::driver)?
                .deleted_count,
        })
    }

    async fn find_one(&self, filter: Document) -> GatewayResult<Option<Document>> {
        self.inner
            .find_one(filter)
            .await
            .map_err(GatewayError::driver)
    }

    async fn count(&self, filter: Document) -> GatewayResult<u64> {
        self.inner
            .count_documents(filter)
            .await
            .map_err(GatewayError::driver)
    }
}
