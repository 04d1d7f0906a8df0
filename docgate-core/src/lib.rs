//! A thin gateway between application code and a document database driver.
//!
//! This crate is the core of the docgate project and provides:
//!
//! - **Configuration** ([`config`]) - Connection settings read from config files or the environment
//! - **Driver abstraction** ([`driver`]) - Traits a database driver implements to sit behind the gateway
//! - **Connection lifecycle** ([`connection`]) - A lazily dialed, shared connection with status reporting
//! - **Identifier normalization** ([`identifier`]) - Rewriting of `_id` string arguments to ObjectIds
//! - **Operations** ([`operation`]) - The fixed operation table and dispatch outcomes
//! - **Gateway** ([`gateway`]) - The typed and positional entry points
//! - **Shared gateway** ([`shared`]) - A process-wide gateway slot for `static` use
//! - **Documents** ([`document`]) - Conversions between serde types and BSON documents
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docgate::prelude::*;
//! use bson::doc;
//!
//! let gateway = Gateway::new(driver, GatewayConfig::from_env()?);
//! gateway.connect(true).await?;
//!
//! let user = gateway
//!     .find_one("users", doc! { "_id": "507f1f77bcf86cd799439011" })
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_core;

pub mod config;
pub mod connection;
pub mod document;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod identifier;
pub mod operation;
pub mod shared;
