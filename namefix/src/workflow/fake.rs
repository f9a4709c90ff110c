//! Scripted in-memory admin site for workflow tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use crate::config::Locator;
use super::driver::{DriverFactory, DriverResult, WebDriver, WebElement};
use super::error::DriverError;

#[derive(Clone, Default)]
pub(crate) struct FakeSite {
    /// What `current_url` reports after the login form is submitted
    pub(crate) after_login_url: String,
    /// Locators that never appear
    pub(crate) missing: Vec<Locator>,
    /// Pre-populated `value` of every element
    pub(crate) field_value: Option<String>,
    /// Cancelled from inside the first `open`, as if the user hit cancel mid-call
    pub(crate) cancel_on_open: Option<CancellationToken>,
    pub(crate) refuse_connect: bool,
    /// The driver panics inside `open`, as a buggy backend might
    pub(crate) panic_on_open: bool,
}

#[derive(Default)]
pub(crate) struct FakeLog {
    pub(crate) calls: Vec<String>,
    pub(crate) closes: usize,
}

#[derive(Clone)]
pub(crate) struct FakeFactory {
    site: FakeSite,
    pub(crate) log: Arc<Mutex<FakeLog>>,
}

impl FakeFactory {
    pub(crate) fn new(site: FakeSite) -> Self {
        Self {
            site,
            log: Arc::new(Mutex::new(FakeLog::default())),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().calls.clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

impl DriverFactory for FakeFactory {
    fn connect(&self) -> DriverResult<Box<dyn WebDriver>> {
        if self.site.refuse_connect {
            return Err(DriverError::Failed("browser failed to start".to_string()));
        }
        Ok(Box::new(FakeDriver {
            site: self.site.clone(),
            log: self.log.clone(),
        }))
    }
}

struct FakeDriver {
    site: FakeSite,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeDriver {
    fn record(&self, call: String) {
        self.log.lock().unwrap().calls.push(call);
    }

    fn element(&self, locator: &Locator) -> Box<dyn WebElement> {
        Box::new(FakeElement {
            locator: locator.to_string(),
            value: self.site.field_value.clone(),
            log: self.log.clone(),
        })
    }
}

impl WebDriver for FakeDriver {
    fn open(&mut self, url: &str) -> DriverResult<()> {
        self.record(format!("open {}", url));
        if let Some(token) = &self.site.cancel_on_open {
            token.cancel();
        }
        if self.site.panic_on_open {
            panic!("driver crashed opening {}", url);
        }
        Ok(())
    }

    fn find_element(&mut self, locator: &Locator) -> DriverResult<Box<dyn WebElement>> {
        if self.site.missing.contains(locator) {
            return Err(DriverError::Failed(format!("no such element: {}", locator)));
        }
        Ok(self.element(locator))
    }

    fn wait_for(&mut self, locator: &Locator, _timeout: Duration) -> DriverResult<Box<dyn WebElement>> {
        if self.site.missing.contains(locator) {
            return Err(DriverError::Timeout { locator: locator.to_string() });
        }
        Ok(self.element(locator))
    }

    fn current_url(&mut self) -> DriverResult<String> {
        Ok(self.site.after_login_url.clone())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

struct FakeElement {
    locator: String,
    value: Option<String>,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeElement {
    fn record(&self, call: String) {
        self.log.lock().unwrap().calls.push(call);
    }
}

impl WebElement for FakeElement {
    fn get_attribute(&self, name: &str) -> DriverResult<Option<String>> {
        Ok(if name == "value" { self.value.clone() } else { None })
    }

    fn clear(&self) -> DriverResult<()> {
        self.record(format!("clear {}", self.locator));
        Ok(())
    }

    fn send_keys(&self, text: &str) -> DriverResult<()> {
        self.record(format!("type {} {}", self.locator, text));
        Ok(())
    }

    fn click(&self) -> DriverResult<()> {
        self.record(format!("click {}", self.locator));
        Ok(())
    }
}
