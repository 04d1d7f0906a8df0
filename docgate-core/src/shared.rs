//! Process-wide gateway slot.
//!
//! A [`SharedGateway`] is meant to live in a `static`, giving every part of a process the
//! same [`Gateway`] and therefore the same lazily established connection.
//!
//! ```ignore
//! static DB: SharedGateway<MongoDbDriver> = SharedGateway::new();
//!
//! let gateway = DB.get_or_try_init(|| {
//!     Ok(Gateway::new(MongoDbDriver::new(), GatewayConfig::from_env()?))
//! })?;
//! gateway.connect(true).await?;
//! ```

use std::sync::OnceLock;

use crate::{
    driver::Driver,
    error::{GatewayError, GatewayResult},
    gateway::Gateway,
};

#[derive(Debug)]
pub struct SharedGateway<D: Driver> {
    cell: OnceLock<Gateway<D>>,
}

impl<D: Driver> SharedGateway<D> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Installs `gateway` unless one is already installed, and returns the installed one.
    pub fn init(&self, gateway: Gateway<D>) -> &Gateway<D> {
        self.cell.get_or_init(|| gateway)
    }

    /// Returns the installed gateway, building it with `build` if there is none.
    ///
    /// If several threads race here, more than one `build` may run but only one result
    /// is kept.
    pub fn get_or_try_init<F>(&self, build: F) -> GatewayResult<&Gateway<D>>
    where
        F: FnOnce() -> GatewayResult<Gateway<D>>,
    {
        if let Some(gateway) = self.cell.get() {
            return Ok(gateway);
        }

        let gateway = build()?;

        Ok(self.cell.get_or_init(|| gateway))
    }

    /// Returns the installed gateway.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Uninitialized`] if nothing has been installed yet.
    pub fn get(&self) -> GatewayResult<&Gateway<D>> {
        self.cell.get().ok_or(GatewayError::Uninitialized)
    }
}

impl<D: Driver> Default for SharedGateway<D> {
    fn default() -> Self {
        Self::new()
    }
}
