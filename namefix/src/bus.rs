use tokio::sync::mpsc;
use crate::mdns::browser::DiscoveryEvent;
use crate::workflow::{RequestId, WorkflowStatus};

/// Everything the control loop reacts to. Producers are the discovery tasks
/// and the reset workers; the control loop is the only consumer.
#[derive(Debug, Clone)]
pub enum BusMessage {
    Discovery {
        /// Browse session the event came from
        generation: u64,
        event: DiscoveryEvent,
    },
    Workflow {
        request: RequestId,
        status: WorkflowStatus,
    },
}

pub type BusSender = mpsc::Sender<BusMessage>;
pub type BusReceiver = mpsc::Receiver<BusMessage>;

pub fn channel(capacity: usize) -> (BusSender, BusReceiver) {
    mpsc::channel(capacity)
}
