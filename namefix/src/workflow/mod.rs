pub mod driver;
pub mod engine;
pub mod error;
pub mod name;
pub mod status;

#[cfg(test)]
pub(crate) mod fake;

pub use engine::{spawn_reset, WorkflowHandle, WorkflowRequest};
pub use status::{Progress, RequestId, Stage, WorkflowStatus};
