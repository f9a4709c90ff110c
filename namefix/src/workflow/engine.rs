use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use shared::types::ServiceRecord;
use crate::bus::{BusMessage, BusSender};
use crate::config::{AdminSurface, SettingsAccess};
use super::driver::{DriverFactory, SessionGuard, WebDriver};
use super::error::{DriverError, WorkflowError};
use super::name::resolve_new_name;
use super::status::{RequestId, Stage, WorkflowStatus};

/// One rename, built from a registry snapshot and the user's answers.
#[derive(Clone)]
pub struct WorkflowRequest {
    pub id: RequestId,
    /// Origin of the admin UI, e.g. "https://canoncfcad9.local."
    pub target: String,
    pub pin: String,
    pub advertised_name: String,
    pub name_override: Option<String>,
}

impl fmt::Debug for WorkflowRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRequest")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("pin", &"<redacted>")
            .field("advertised_name", &self.advertised_name)
            .field("name_override", &self.name_override)
            .finish()
    }
}

impl WorkflowRequest {
    /// Targets the advertised admin URL when there is one, else the server.
    pub fn for_record(
        id: RequestId,
        record: &ServiceRecord,
        scheme: &str,
        pin: impl Into<String>,
        name_override: Option<String>,
    ) -> Self {
        let target = record
            .admin_url
            .as_deref()
            .and_then(origin)
            .unwrap_or_else(|| format!("{}://{}", scheme, record.server));

        Self {
            id,
            target,
            pin: pin.into(),
            advertised_name: record.name.clone(),
            name_override,
        }
    }

    pub fn page_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.target.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// "scheme://host[:port]" part of an absolute URL.
fn origin(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(&['/', '?', '#'][..]).next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{}://{}", scheme, host))
}

fn is_landing_page(url: &str, suffix: &str) -> bool {
    let path = url.split(&['?', '#'][..]).next().unwrap_or_default();
    path.ends_with(suffix)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { new_name: String },
    Failed(WorkflowError),
    Canceled,
}

impl Outcome {
    pub fn status(&self) -> WorkflowStatus {
        match self {
            Outcome::Completed { new_name } => {
                WorkflowStatus::new(Stage::Completed, format!("renamed to {}", new_name), false)
            }
            Outcome::Failed(e) => WorkflowStatus::new(Stage::Failed, e.to_string(), false),
            Outcome::Canceled => WorkflowStatus::new(Stage::Canceled, "canceled", false),
        }
    }
}

/// Why the stage sequence stopped early.
enum Halt {
    Canceled,
    Failed(WorkflowError),
}

impl From<WorkflowError> for Halt {
    fn from(e: WorkflowError) -> Self {
        Halt::Failed(e)
    }
}

impl From<DriverError> for Halt {
    fn from(e: DriverError) -> Self {
        Halt::Failed(e.into())
    }
}

/// Login, open the settings editor, replace the name, submit.
///
/// Every call into the driver blocks, so `run` belongs on a worker thread;
/// see [`spawn_reset`].
pub struct ResetWorkflow {
    request: WorkflowRequest,
    surface: Arc<AdminSurface>,
    cancel: CancellationToken,
}

impl ResetWorkflow {
    pub fn new(request: WorkflowRequest, surface: Arc<AdminSurface>, cancel: CancellationToken) -> Self {
        Self {
            request,
            surface,
            cancel,
        }
    }

    /// Drives the workflow to a terminal stage. `emit` sees every status in
    /// order and exactly one terminal status, last.
    pub fn run(&self, factory: &dyn DriverFactory, emit: &mut dyn FnMut(WorkflowStatus)) -> Outcome {
        let id = self.request.id;
        tracing::info!("Reset {} started against {}", id, self.request.target);
        emit(WorkflowStatus::new(Stage::Connecting, "connecting", false));

        let outcome = match factory.connect() {
            Ok(driver) => {
                let mut session = SessionGuard::new(driver);
                let result = match session.driver() {
                    Ok(driver) => self.drive(driver, emit),
                    Err(e) => Err(e.into()),
                };
                session.close();

                match result {
                    Ok(new_name) => {
                        emit(WorkflowStatus::new(Stage::Submitting, "saved", true));
                        Outcome::Completed { new_name }
                    }
                    Err(Halt::Canceled) => Outcome::Canceled,
                    Err(Halt::Failed(e)) => Outcome::Failed(e),
                }
            }
            Err(e) => Outcome::Failed(e.into()),
        };

        match &outcome {
            Outcome::Failed(e) => tracing::warn!("Reset {} failed: {}", id, e),
            other => tracing::info!("Reset {} finished: {:?}", id, other),
        }
        emit(outcome.status());
        outcome
    }

    fn checkpoint(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Canceled);
        }
        Ok(())
    }

    fn drive(&self, driver: &mut dyn WebDriver, emit: &mut dyn FnMut(WorkflowStatus)) -> Result<String, Halt> {
        let surface = &*self.surface;
        let timeout = surface.wait_timeout();

        self.checkpoint()?;
        driver.open(&self.request.page_url(&surface.login_path))?;
        self.checkpoint()?;

        emit(WorkflowStatus::new(Stage::Authenticating, "logging in", true));
        if let Some(mode) = &surface.login_mode {
            driver.find_element(mode)?.click()?;
        }
        let password = driver
            .wait_for(&surface.password_field, timeout)
            .map_err(|e| WorkflowError::from_wait(e, "password field"))?;
        password.send_keys(&self.request.pin)?;
        driver.find_element(&surface.login_submit)?.click()?;

        let landed = driver.current_url()?;
        if !is_landing_page(&landed, &surface.landing_suffix) {
            tracing::debug!("Login landed on {}", landed);
            return Err(WorkflowError::AuthenticationFailure.into());
        }
        self.checkpoint()?;

        emit(WorkflowStatus::new(Stage::LoadingSettings, "opening settings", true));
        match &surface.settings {
            SettingsAccess::Direct { path } => driver.open(&self.request.page_url(path))?,
            SettingsAccess::EditButton { locator } => driver
                .wait_for(locator, timeout)
                .map_err(|e| WorkflowError::from_wait(e, "edit button"))?
                .click()?,
        }
        self.checkpoint()?;

        emit(WorkflowStatus::new(Stage::Editing, "reading printer name", false));
        let field = driver
            .wait_for(&surface.name_field, timeout)
            .map_err(|e| WorkflowError::from_wait(e, "name field"))?;
        let current = field
            .get_attribute("value")?
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.request.advertised_name.clone());
        let new_name = resolve_new_name(self.request.name_override.as_deref(), &current);
        self.checkpoint()?;

        emit(WorkflowStatus::new(
            Stage::Submitting,
            format!("renaming \"{}\" to \"{}\"", current, new_name),
            true,
        ));
        field.clear()?;
        field.send_keys(&new_name)?;
        driver.find_element(&surface.settings_submit)?.click()?;

        Ok(new_name)
    }
}

/// A reset running on its own thread.
pub struct WorkflowHandle {
    id: RequestId,
    cancel: CancellationToken,
    thread: JoinHandle<Outcome>,
}

impl WorkflowHandle {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Asks the worker to stop at its next stage boundary. The worker still
    /// closes its session and reports `Canceled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Blocks until the worker exits.
    pub fn join(self) -> Outcome {
        self.thread.join().unwrap_or_else(|_| {
            Outcome::Failed(WorkflowError::Automation("reset worker panicked".to_string()))
        })
    }
}

/// Start a reset on a dedicated thread. Statuses go onto the bus tagged
/// with the request id, in emission order.
pub fn spawn_reset<F: DriverFactory>(
    request: WorkflowRequest,
    surface: Arc<AdminSurface>,
    factory: F,
    bus: BusSender,
) -> std::io::Result<WorkflowHandle> {
    let id = request.id;
    let cancel = CancellationToken::new();
    let workflow = ResetWorkflow::new(request, surface, cancel.clone());

    let thread = thread::Builder::new()
        .name(format!("reset-{}", id.0))
        .spawn(move || {
            let mut emit = |status: WorkflowStatus| {
                if let Err(e) = bus.blocking_send(BusMessage::Workflow { request: id, status }) {
                    tracing::debug!("Bus closed, dropping status for {}: {}", id, e);
                }
            };
            // The session guard closes the driver while unwinding; the caller
            // still needs a terminal status
            panic::catch_unwind(AssertUnwindSafe(|| workflow.run(&factory, &mut emit)))
                .unwrap_or_else(|_| {
                    tracing::error!("Reset {} panicked", id);
                    let outcome = Outcome::Failed(WorkflowError::Automation(
                        "reset worker panicked".to_string(),
                    ));
                    emit(outcome.status());
                    outcome
                })
        })?;

    Ok(WorkflowHandle { id, cancel, thread })
}
