//! In-memory driver for docgate.
//!
//! This crate provides a thread-safe, process-local implementation of the docgate driver
//! traits. It is intended for development and tests: it understands `memory://host/database`
//! URLs, evaluates a practical subset of the document query language, and lets tests
//! simulate unreachable servers and count dial attempts.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Shared data per URL** - Every dial of the same host and database sees the same documents
//! - **Query support** - Equality, comparison, membership, existence and logical operators
//! - **Update support** - `$set`, `$unset`, `$inc` and replacement documents
//! - **Dial simulation** - Unreachable URLs and an observable dial counter
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryDriver};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Gateway::new(InMemoryDriver::new(), "memory://local/app");
//!     gateway.connect(true).await?;
//!
//!     gateway.insert("widgets", doc! { "name": "a" }).await?;
//!     assert_eq!(gateway.count("widgets", doc! {}).await?, 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_memory;

pub mod driver;
pub mod error;
pub(crate) mod evaluator;

pub use driver::{InMemoryCollection, InMemoryDatabase, InMemoryDriver};
pub use error::MemoryError;
