//! Lazily established, shared database connection.
//!
//! [`Connection`] dials on the first call to [`Connection::connect`] and keeps the resulting
//! handle for every later call. Dialing happens under the write half of an async read-write
//! lock with a second check of the slot, so callers racing on an empty slot share a single
//! dial and observe the same outcome. A failed dial leaves the slot without a handle, and
//! callers that arrive after it has settled dial again.

use mea::rwlock::RwLock;
use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{error, info};

use crate::{
    config::GatewayConfig,
    driver::Driver,
    error::{GatewayError, GatewayResult},
};

/// Connection status notifications emitted by a verbose `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// A dial is about to start.
    Connecting,
    /// The dial succeeded and the handle was stored.
    Connected,
    /// The dial failed.
    Failed,
}

/// Receives connection status notifications.
pub trait StatusListener: Send + Sync + Debug {
    fn on_status(&self, status: ConnectionStatus);
}

/// Default listener, writes status notifications as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusListener for TracingStatus {
    fn on_status(&self, status: ConnectionStatus) {
        match status {
            ConnectionStatus::Connecting => info!("Connecting to database.."),
            ConnectionStatus::Connected => info!("Connected to database"),
            ConnectionStatus::Failed => error!("Failed to connect to database"),
        }
    }
}

/// Owns the lifecycle of a single database handle.
#[derive(Debug)]
pub struct Connection<D: Driver> {
    driver: D,
    config: GatewayConfig,
    slot: RwLock<Slot<D::Handle>>,
    /// Number of settled dials. Only changes while the write lock is held.
    dials: AtomicU64,
    listener: Arc<dyn StatusListener>,
}

#[derive(Debug)]
struct Slot<H> {
    handle: Option<H>,
    /// Outcome of the last dial when it failed.
    failure: Option<GatewayError>,
}

impl<D: Driver> Connection<D> {
    pub fn new(driver: D, config: GatewayConfig) -> Self {
        Self {
            driver,
            config,
            slot: RwLock::new(Slot { handle: None, failure: None }),
            dials: AtomicU64::new(0),
            listener: Arc::new(TracingStatus),
        }
    }

    /// Replaces the status listener.
    pub fn with_listener(mut self, listener: impl StatusListener + 'static) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the stored handle, dialing first if there is none.
    ///
    /// When `verbose` is set and a dial is made, the listener is told before the dial and
    /// after its outcome. An existing handle is returned without any notification.
    ///
    /// # Errors
    ///
    /// Returns the driver's dial failure, normally [`GatewayError::Connection`]. Nothing is
    /// stored in that case. Callers that were waiting on that dial receive the same error
    /// without dialing or notifying.
    pub async fn connect(&self, verbose: bool) -> GatewayResult<D::Handle> {
        let seen = self.dials.load(Ordering::SeqCst);

        if let Some(handle) = self.slot.read().await.handle.as_ref() {
            return Ok(handle.clone());
        }

        let mut slot = self.slot.write().await;

        // Another caller may have finished dialing while we waited for the write lock.
        if let Some(handle) = slot.handle.as_ref() {
            return Ok(handle.clone());
        }

        if self.dials.load(Ordering::SeqCst) != seen {
            if let Some(err) = slot.failure.as_ref() {
                return Err(err.clone());
            }
        }

        if verbose {
            self.listener.on_status(ConnectionStatus::Connecting);
        }

        let outcome = self.driver.connect(&self.config).await;
        self.dials.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(handle) => {
                slot.handle = Some(handle.clone());
                slot.failure = None;

                if verbose {
                    self.listener.on_status(ConnectionStatus::Connected);
                }

                Ok(handle)
            }
            Err(err) => {
                slot.failure = Some(err.clone());

                if verbose {
                    self.listener.on_status(ConnectionStatus::Failed);
                }

                Err(err)
            }
        }
    }

    /// Returns the stored handle without dialing.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Uninitialized`] if no connection has been established.
    pub async fn handle(&self) -> GatewayResult<D::Handle> {
        self.slot
            .read()
            .await
            .handle
            .clone()
            .ok_or(GatewayError::Uninitialized)
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.read().await.handle.is_some()
    }

    /// Takes the stored handle out and hands it back to the driver.
    ///
    /// A later `connect` dials again. Does nothing when not connected.
    pub async fn shutdown(&self) -> GatewayResult<()> {
        let handle = self.slot.write().await.handle.take();

        match handle {
            Some(handle) => self.driver.disconnect(handle).await,
            None => Ok(()),
        }
    }
}
