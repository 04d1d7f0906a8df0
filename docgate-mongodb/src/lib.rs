//! MongoDB driver for docgate.
//!
//! This crate implements the docgate driver traits on top of the official `mongodb` crate,
//! so the gateway can sit in front of MongoDB Atlas or a self-hosted deployment.
//!
//! To use this driver, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docgate = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The connection string comes from [`GatewayConfig`](docgate_core::config::GatewayConfig).
//! The database is the configured one, or the default database of the connection string.
//! Driver errors are passed through unmodified as the source of the gateway error, so they
//! can be downcast to [`mongodb::error::Error`].
//!
//! # Example
//!
//! ```ignore
//! use docgate::{prelude::*, mongodb::MongoDbDriver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Gateway::new(MongoDbDriver::new(), "mongodb://localhost:27017/app");
//!     gateway.connect(true).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_mongodb;

pub mod driver;

pub use driver::{MongoDbCollection, MongoDbDatabase, MongoDbDriver};
