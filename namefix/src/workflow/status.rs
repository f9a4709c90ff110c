use std::fmt;
use shared::protocol::TOTAL_STEPS;

/// Identifies one reset request; fences its messages on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Connecting,
    Authenticating,
    LoadingSettings,
    Editing,
    Submitting,
    Completed,
    Failed,
    Canceled,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed | Stage::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStatus {
    pub stage: Stage,
    pub message: String,
    /// Moves the step counter forward by one
    pub advance: bool,
}

impl WorkflowStatus {
    pub fn new(stage: Stage, message: impl Into<String>, advance: bool) -> Self {
        Self {
            stage,
            message: message.into(),
            advance,
        }
    }
}

/// Step counter for one workflow run, never past [`TOTAL_STEPS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    step: u8,
}

impl Progress {
    pub fn record(&mut self, status: &WorkflowStatus) {
        if status.advance {
            self.step = (self.step + 1).min(TOTAL_STEPS);
        }
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn total(&self) -> u8 {
        TOTAL_STEPS
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.step, TOTAL_STEPS)
    }
}
