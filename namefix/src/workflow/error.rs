use thiserror::Error;

/// Failure reported by a browser automation driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("timed out waiting for {locator}")]
    Timeout { locator: String },

    #[error("{0}")]
    Failed(String),
}

/// Terminal failure of a reset workflow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("incorrect PIN?")]
    AuthenticationFailure,

    #[error("couldn't find {target}")]
    ElementWaitTimeout { target: &'static str },

    #[error("{0}")]
    Automation(String),
}

impl From<DriverError> for WorkflowError {
    fn from(e: DriverError) -> Self {
        WorkflowError::Automation(e.to_string())
    }
}

impl WorkflowError {
    /// Maps a bounded wait failure onto the stage target that was missing.
    pub fn from_wait(e: DriverError, target: &'static str) -> Self {
        match e {
            DriverError::Timeout { .. } => WorkflowError::ElementWaitTimeout { target },
            other => other.into(),
        }
    }
}
