use anyhow::Result;
use shared::types::{PrinterIdentity, ServiceRecord};
use crate::mdns::browser::{BrowseSource, DiscoveryEngine, DiscoveryEvent};

/// Printers currently on the network, in first-seen order.
///
/// Only the control loop touches this, one event at a time.
#[derive(Debug, Default)]
pub struct Registry {
    generation: u64,
    entries: Vec<ServiceRecord>,
}

impl Registry {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            entries: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entries(&self) -> &[ServiceRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply one discovery event. Events from another generation are
    /// discarded. Returns true if the registry changed.
    pub fn apply(&mut self, generation: u64, event: DiscoveryEvent) -> bool {
        if generation != self.generation {
            tracing::debug!(
                "Discarding event from generation {} (current {})",
                generation,
                self.generation
            );
            return false;
        }

        match event {
            DiscoveryEvent::Added(record) => self.apply_added(record),
            DiscoveryEvent::Removed(identity) => self.apply_removed(&identity),
        }
    }

    /// Insert, or update in place keeping the display position.
    pub fn apply_added(&mut self, record: ServiceRecord) -> bool {
        match self.entries.iter_mut().find(|e| e.identity == record.identity) {
            Some(existing) => {
                let changed = existing.server != record.server || existing.admin_url != record.admin_url;
                *existing = record;
                changed
            }
            None => {
                tracing::info!("Printer added: {}", record.display_name());
                self.entries.push(record);
                true
            }
        }
    }

    pub fn apply_removed(&mut self, identity: &PrinterIdentity) -> bool {
        match self.entries.iter().position(|e| &e.identity == identity) {
            Some(index) => {
                let record = self.entries.remove(index);
                tracing::info!("Printer removed: {}", record.display_name());
                true
            }
            None => false,
        }
    }

    pub fn select(&self, identity: &PrinterIdentity) -> Option<ServiceRecord> {
        self.entries.iter().find(|e| &e.identity == identity).cloned()
    }

    /// Restart discovery. Entries are cleared only once the old session has
    /// fully stopped; its late events no longer match the new generation.
    pub async fn reload<S: BrowseSource>(&mut self, discovery: &mut DiscoveryEngine<S>) -> Result<()> {
        discovery.stop().await;
        self.entries.clear();
        // Fence first so nothing from the old session slips in if start fails
        self.generation = discovery.generation() + 1;
        self.generation = discovery.start()?;
        tracing::info!("Registry reloaded (generation {})", self.generation);
        Ok(())
    }
}
