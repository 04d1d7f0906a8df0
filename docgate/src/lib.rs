//! Main docgate crate: a lazily connected gateway in front of a document database.
//!
//! This crate is the primary entry point for users of docgate. It re-exports the core
//! types and provides access to the available drivers.
//!
//! # Features
//!
//! - **One shared connection** - Dialed on first `connect`, reused by every later call
//! - **Uniform operations** - `collection`, `insert`, `update`, `update_one`, `find`,
//!   `remove`, `find_one` and `count`, typed or dispatched by name
//! - **Identifier normalization** - `_id` hex strings become ObjectIds before reaching the driver
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryDriver};
//! use bson::doc;
//! use futures::TryStreamExt;
//!
//! #[tokio::main]
//! async fn main() -> GatewayResult<()> {
//!     let gateway = Gateway::new(InMemoryDriver::new(), "memory://local/app");
//!
//!     // Dial once, logging progress through `tracing`
//!     gateway.connect(true).await?;
//!
//!     let inserted = gateway.insert("users", doc! { "name": "Alice" }).await?;
//!     let id = inserted.inserted_ids[0].as_object_id().unwrap().to_hex();
//!
//!     // Plain hex strings are accepted wherever an `_id` is expected
//!     let alice = gateway.find_one("users", doc! { "_id": id.as_str() }).await?;
//!     println!("{alice:?}");
//!
//!     let everyone = gateway
//!         .find("users", doc! {})
//!         .await?
//!         .try_collect::<Vec<_>>()
//!         .await?;
//!     println!("{everyone:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Dispatch by name
//!
//! Operations can also be invoked with positional arguments, where collection-level
//! operations take the collection name first:
//!
//! ```ignore
//! let count = gateway
//!     .dispatch("count".parse()?, vec!["users".into(), doc! { "name": "Alice" }.into()])
//!     .await?
//!     .into_count();
//! ```
//!
//! # Drivers
//!
//! - [`memory`] - In-process driver for development and testing
//! - [`mongodb`] - MongoDB driver (requires `mongodb` feature)

pub mod prelude;

pub use docgate_core::{config, connection, document, driver, error, gateway, identifier, operation, shared};

// Re-export BSON types for convenience
pub use bson;

/// In-memory driver implementations.
pub mod memory {
    pub use docgate_memory::{InMemoryCollection, InMemoryDatabase, InMemoryDriver, MemoryError};
}

/// MongoDB driver implementations and the process-wide MongoDB gateway.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docgate_mongodb::{MongoDbCollection, MongoDbDatabase, MongoDbDriver};

    use docgate_core::{
        config::GatewayConfig,
        error::GatewayResult,
        gateway::Gateway,
        shared::SharedGateway,
    };

    static SHARED: SharedGateway<MongoDbDriver> = SharedGateway::new();

    /// Returns the process-wide MongoDB gateway, configured from the environment on first
    /// use (see [`GatewayConfig::from_env`]).
    pub fn shared() -> GatewayResult<&'static Gateway<MongoDbDriver>> {
        SHARED.get_or_try_init(|| Ok(Gateway::new(MongoDbDriver::new(), GatewayConfig::from_env()?)))
    }

    /// Connects the process-wide gateway. Later calls return the same handle.
    pub async fn connect(verbose: bool) -> GatewayResult<MongoDbDatabase> {
        shared()?.connect(verbose).await
    }
}
