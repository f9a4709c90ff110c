use std::collections::HashMap;
use std::sync::Arc;
use anyhow::{Context, Result};
use shared::types::{PrinterIdentity, ServiceRecord};
use crate::bus::{self, BusMessage, BusReceiver, BusSender};
use crate::config::Config;
use crate::mdns::browser::{BrowseSource, DiscoveryEngine};
use crate::registry::Registry;
use crate::workflow::driver::DriverFactory;
use crate::workflow::name::default_name;
use crate::workflow::{
    spawn_reset, Progress, RequestId, Stage, WorkflowHandle, WorkflowRequest, WorkflowStatus,
};

/// What handling one bus message changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Registry,
    Workflow(RequestId),
    Ignored,
}

/// Caller-side view of one reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowView {
    pub printer: PrinterIdentity,
    pub progress: Progress,
    pub message: String,
    /// Once terminal, later messages for this run are stale
    pub stage: Stage,
}

impl WorkflowView {
    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// Application state for one run of the tool, built in `main` and owned by
/// the control loop.
pub struct Session<S> {
    config: Arc<Config>,
    discovery: DiscoveryEngine<S>,
    registry: Registry,
    bus: BusSender,
    workflows: HashMap<RequestId, WorkflowView>,
    workers: HashMap<RequestId, WorkflowHandle>,
    next_request: u64,
}

impl<S: BrowseSource> Session<S> {
    /// Returns the session and the bus receiver the control loop drains.
    pub fn new(config: Arc<Config>, source: Arc<S>) -> (Self, BusReceiver) {
        // A zero-capacity channel cannot be built
        let (tx, rx) = bus::channel(config.discovery.bus_capacity.max(1));
        let discovery = DiscoveryEngine::new(source, config.discovery.clone(), tx.clone());

        let session = Self {
            config,
            discovery,
            registry: Registry::default(),
            bus: tx,
            workflows: HashMap::new(),
            workers: HashMap::new(),
            next_request: 1,
        };
        (session, rx)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn start(&mut self) -> Result<()> {
        let generation = self.discovery.start()?;
        self.registry = Registry::new(generation);
        Ok(())
    }

    pub async fn reload(&mut self) -> Result<()> {
        self.registry.reload(&mut self.discovery).await
    }

    /// Dispatch one message from the bus.
    pub fn handle(&mut self, message: BusMessage) -> Update {
        match message {
            BusMessage::Discovery { generation, event } => {
                if self.registry.apply(generation, event) {
                    Update::Registry
                } else {
                    Update::Ignored
                }
            }
            BusMessage::Workflow { request, status } => self.apply_status(request, status),
        }
    }

    fn apply_status(&mut self, request: RequestId, status: WorkflowStatus) -> Update {
        let Some(view) = self.workflows.get_mut(&request) else {
            tracing::debug!("Status for unknown request {} ignored", request);
            return Update::Ignored;
        };
        if view.is_finished() {
            tracing::debug!("Stale status for {} ignored: {}", request, status.message);
            return Update::Ignored;
        }

        view.progress.record(&status);
        view.message = status.message;
        view.stage = status.stage;
        if view.is_finished() {
            self.workers.remove(&request);
        }
        Update::Workflow(request)
    }

    /// Pre-filled answer for the new-name prompt.
    pub fn default_name(&self, printer: &PrinterIdentity) -> Option<String> {
        self.registry.select(printer).map(|r| default_name(&r.name))
    }

    /// Start a reset for a printer on its own worker thread.
    pub fn begin_reset<F: DriverFactory>(
        &mut self,
        printer: &PrinterIdentity,
        pin: impl Into<String>,
        name_override: Option<String>,
        factory: F,
    ) -> Result<RequestId> {
        let record: ServiceRecord = self
            .registry
            .select(printer)
            .with_context(|| format!("Printer {} is no longer available", printer))?;

        let id = RequestId(self.next_request);
        self.next_request += 1;

        let request = WorkflowRequest::for_record(
            id,
            &record,
            &self.config.admin.scheme,
            pin,
            name_override.filter(|name| !name.trim().is_empty()),
        );
        tracing::info!("Resetting {} as {}", record.display_name(), id);

        self.workflows.insert(
            id,
            WorkflowView {
                printer: printer.clone(),
                progress: Progress::default(),
                message: String::new(),
                stage: Stage::Idle,
            },
        );

        let surface = Arc::new(self.config.admin.clone());
        match spawn_reset(request, surface, factory, self.bus.clone()) {
            Ok(handle) => {
                self.workers.insert(handle.id(), handle);
                Ok(id)
            }
            Err(e) => {
                self.workflows.remove(&id);
                Err(e).context("Failed to spawn reset worker")
            }
        }
    }

    /// The caller stops watching immediately; the worker still winds down
    /// and closes its session on its own.
    pub fn cancel_reset(&mut self, request: RequestId) {
        if let Some(handle) = self.workers.remove(&request) {
            handle.cancel();
        }
        if let Some(view) = self.workflows.get_mut(&request) {
            if !view.is_finished() {
                view.stage = Stage::Canceled;
                view.message = "canceled".to_string();
            }
        }
    }

    pub fn workflow(&self, request: RequestId) -> Option<&WorkflowView> {
        self.workflows.get(&request)
    }

    /// Stop discovery and ask every running reset to cancel.
    pub async fn shutdown(&mut self) {
        self.discovery.stop().await;
        for (_, handle) in self.workers.drain() {
            handle.cancel();
        }
    }
}
