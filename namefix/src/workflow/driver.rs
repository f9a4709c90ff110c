//! Browser automation capability the reset workflow is written against.
//!
//! All calls block. Concrete drivers live outside this crate.

use std::time::Duration;
use crate::config::Locator;
use super::error::DriverError;

pub type DriverResult<T> = Result<T, DriverError>;

pub trait WebElement {
    fn get_attribute(&self, name: &str) -> DriverResult<Option<String>>;
    fn clear(&self) -> DriverResult<()>;
    fn send_keys(&self, text: &str) -> DriverResult<()>;
    fn click(&self) -> DriverResult<()>;
}

pub trait WebDriver {
    fn open(&mut self, url: &str) -> DriverResult<()>;
    fn find_element(&mut self, locator: &Locator) -> DriverResult<Box<dyn WebElement>>;
    /// Fails with [`DriverError::Timeout`] once `timeout` elapses.
    fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> DriverResult<Box<dyn WebElement>>;
    fn current_url(&mut self) -> DriverResult<String>;
    fn close(&mut self) -> DriverResult<()>;
}

/// Opens one automation session per workflow run.
pub trait DriverFactory: Send + 'static {
    fn connect(&self) -> DriverResult<Box<dyn WebDriver>>;
}

/// Owns an open session and closes it exactly once, on whichever path the
/// workflow leaves by. `Drop` covers unwinding out of a driver call.
pub struct SessionGuard {
    driver: Option<Box<dyn WebDriver>>,
}

impl SessionGuard {
    pub fn new(driver: Box<dyn WebDriver>) -> Self {
        Self { driver: Some(driver) }
    }

    pub fn driver(&mut self) -> DriverResult<&mut (dyn WebDriver + 'static)> {
        match self.driver.as_deref_mut() {
            Some(driver) => Ok(driver),
            None => Err(DriverError::Failed("session already closed".to_string())),
        }
    }

    pub fn close(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = driver.close() {
                tracing::warn!("Failed to close automation session: {}", e);
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.close();
    }
}
