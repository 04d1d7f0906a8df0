//! In-memory driver implementation.
//!
//! Databases live in a process-local map keyed by the host and database name of the
//! connection URL, so every dial of the same URL sees the same data. Each dial still
//! produces a distinct handle session, which makes repeated dials observable.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use tracing::debug;
use uuid::Uuid;

use docgate_core::{
    config::GatewayConfig,
    driver::{
        CollectionHandle, DatabaseHandle, DeleteResult, DocumentCursor, Driver, InsertResult,
        UpdateResult,
    },
    error::{GatewayError, GatewayResult},
};

use crate::{
    error::MemoryError,
    evaluator::{FilterEvaluator, apply_update},
};

/// URL scheme understood by the in-memory driver.
pub const SCHEME: &str = "memory://";

type CollectionData = Vec<Document>;
type DatabaseMap = HashMap<String, CollectionData>;


/// Thread-safe in-memory driver.
///
/// Cloneable; clones share the same databases, unreachable set and dial counter.
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryDriver;
/// use docgate::prelude::*;
///
/// let driver = InMemoryDriver::new();
/// let gateway = Gateway::new(driver.clone(), GatewayConfig::new("memory://local/app"));
///
/// driver.set_unreachable("memory://local/app", true).await;
/// assert!(gateway.connect(false).await.is_err());
///
/// driver.set_unreachable("memory://local/app", false).await;
/// gateway.connect(false).await?;
/// assert_eq!(driver.dial_count(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryDriver {
    state: Arc<ServerState>,
}

#[derive(Debug)]
struct ServerState {
    databases: RwLock<HashMap<String, Arc<RwLock<DatabaseMap>>>>,
    unreachable: RwLock<HashSet<String>>,
    dials: AtomicUsize,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ServerState {
                databases: RwLock::new(HashMap::new()),
                unreachable: RwLock::new(HashSet::new()),
                dials: AtomicUsize::new(0),
            }),
        }
    }

    /// Marks `url` as unreachable (or reachable again). Dials to an unreachable URL fail
    /// with [`MemoryError::Unreachable`].
    pub async fn set_unreachable(&self, url: &str, unreachable: bool) {
        let mut urls = self.state.unreachable.write().await;

        if unreachable {
            urls.insert(url.to_string());
        } else {
            urls.remove(url);
        }
    }

    /// Number of dial attempts made so far, successful or not.
    pub fn dial_count(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for InMemoryDriver {
    type Handle = InMemoryDatabase;

    async fn connect(&self, config: &GatewayConfig) -> GatewayResult<Self::Handle> {
        self.state.dials.fetch_add(1, Ordering::SeqCst);

        let address = MemoryAddress::parse(&config.url).map_err(GatewayError::connection)?;

        if self.state.unreachable.read().await.contains(&config.url) {
            return Err(GatewayError::connection(MemoryError::Unreachable(config.url.clone())));
        }

        let name = config
            .database
            .clone()
            .or(address.database)
            .ok_or_else(|| GatewayError::connection(MemoryError::MissingDatabase(config.url.clone())))?;

        let data = self.state.databases
            .write()
            .await
            .entry(format!("{}/{}", address.host, name))
            .or_insert_with(|| Arc::new(RwLock::new(DatabaseMap::new())))
            .clone();

        debug!(database = %name, "dialed in-memory database");

        Ok(InMemoryDatabase {
            name,
            session: Uuid::new_v4(),
            data,
        })
    }
}


/// Host and optional database parsed from a `memory://host/database` URL.
#[derive(Debug, PartialEq)]
struct MemoryAddress {
    host: String,
    database: Option<String>,
}

impl MemoryAddress {
    fn parse(url: &str) -> Result<Self, MemoryError> {
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| MemoryError::InvalidUrl(url.to_string()))?;
        let rest = rest.split(['?', '#']).next().unwrap_or_default();

        let (host, database) = match rest.split_once('/') {
            Some((host, database)) => (host, Some(database.trim_end_matches('/'))),
            None => (rest, None),
        };

        if host.is_empty() {
            return Err(MemoryError::InvalidUrl(url.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            database: database
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        })
    }
}


/// Handle to an in-memory database.
#[derive(Clone, Debug)]
pub struct InMemoryDatabase {
    name: String,
    session: Uuid,
    data: Arc<RwLock<DatabaseMap>>,
}

impl InMemoryDatabase {
    /// Identifier of the dial that produced this handle. Clones share it.
    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Names of the collections that hold (or once held) documents.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self.data
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();
        names
    }
}

impl DatabaseHandle for InMemoryDatabase {
    type Collection = InMemoryCollection;

    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Self::Collection {
        InMemoryCollection {
            name: name.to_string(),
            data: Arc::clone(&self.data),
        }
    }
}


/// A named collection inside an [`InMemoryDatabase`].
///
/// Documents are kept in insertion order and every scan is linear.
#[derive(Clone, Debug)]
pub struct InMemoryCollection {
    name: String,
    data: Arc<RwLock<DatabaseMap>>,
}

impl InMemoryCollection {
    async fn apply(&self, filter: Document, update: Document, multi: bool) -> GatewayResult<UpdateResult> {
        let mut data = self.data.write().await;
        let mut result = UpdateResult::default();

        let stored = match data.get_mut(&self.name) {
            Some(stored) => stored,
            None => return Ok(result),
        };

        for document in stored.iter_mut() {
            if !FilterEvaluator::new(document)
                .matches(&filter)
                .map_err(GatewayError::driver)?
            {
                continue;
            }

            result.matched_count += 1;

            // Work on a copy so a rejected update leaves the stored document intact
            let mut next = document.clone();
            if apply_update(&mut next, &update).map_err(GatewayError::driver)? {
                *document = next;
                result.modified_count += 1;
            }

            if !multi {
                break;
            }
        }

        Ok(result)
    }

    async fn matching(&self, filter: &Document) -> GatewayResult<Vec<Document>> {
        let data = self.data.read().await;

        match data.get(&self.name) {
            Some(stored) => FilterEvaluator::filter_documents(stored, filter).map_err(GatewayError::driver),
            None => Ok(vec![]),
        }
    }
}

#[async_trait]
impl CollectionHandle for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, documents: Vec<Document>) -> GatewayResult<InsertResult> {
        let mut data = self.data.write().await;
        let stored = data
            .entry(self.name.clone())
            .or_default();

        let mut prepared: Vec<Document> = Vec::with_capacity(documents.len());

        for document in documents {
            let document = with_generated_id(document);
            let id = document.get("_id");

            if stored.iter().chain(prepared.iter()).any(|existing| existing.get("_id") == id) {
                return Err(GatewayError::driver(MemoryError::DuplicateKey(
                    id.map(Bson::to_string).unwrap_or_default(),
                    self.name.clone(),
                )));
            }

            prepared.push(document);
        }

        let inserted_ids = prepared
            .iter()
            .filter_map(|document| document.get("_id").cloned())
            .collect();

        stored.extend(prepared);

        Ok(InsertResult { inserted_ids })
    }

    async fn update(&self, filter: Document, update: Document) -> GatewayResult<UpdateResult> {
        self.apply(filter, update, true).await
    }

    async fn update_one(&self, filter: Document, update: Document) -> GatewayResult<UpdateResult> {
        self.apply(filter, update, false).await
    }

    async fn find(&self, filter: Document) -> GatewayResult<DocumentCursor> {
        let documents = self.matching(&filter).await?;

        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn remove(&self, filter: Document) -> GatewayResult<DeleteResult> {
        let mut data = self.data.write().await;

        let stored = match data.get_mut(&self.name) {
            Some(stored) => stored,
            None => return Ok(DeleteResult::default()),
        };

        let doomed = stored
            .iter()
            .map(|document| FilterEvaluator::new(document).matches(&filter))
            .collect::<Result<Vec<bool>, MemoryError>>()
            .map_err(GatewayError::driver)?;

        let mut flags = doomed.iter();
        stored.retain(|_| !flags.next().copied().unwrap_or(false));

        Ok(DeleteResult {
            deleted_count: doomed.iter().filter(|doomed| **doomed).count() as u64,
        })
    }

    async fn find_one(&self, filter: Document) -> GatewayResult<Option<Document>> {
        let data = self.data.read().await;

        let Some(stored) = data.get(&self.name) else {
            return Ok(None);
        };

        for document in stored {
            if FilterEvaluator::new(document)
                .matches(&filter)
                .map_err(GatewayError::driver)?
            {
                return Ok(Some(document.clone()));
            }
        }

        Ok(None)
    }

    async fn count(&self, filter: Document) -> GatewayResult<u64> {
        Ok(self.matching(&filter).await?.len() as u64)
    }
}

/// Puts a fresh ObjectId in front of a document that has no `_id`.
fn with_generated_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }

    let mut prepared = Document::new();
    prepared.insert("_id", ObjectId::new());
    for (key, value) in document {
        prepared.insert(key, value);
    }

    prepared
}
