use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use anyhow::{Context, Result};
use shared::protocol::TXT_ADMIN_URL;
use shared::types::{PrinterIdentity, ServiceRecord};
use crate::bus::{BusMessage, BusSender};
use crate::config::DiscoveryConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    Added(ServiceRecord),
    Removed(PrinterIdentity),
}

/// Where browse events come from. Implemented for the mDNS daemon; tests
/// feed events through an in-memory channel instead.
pub trait BrowseSource: Send + Sync + 'static {
    fn subscribe(&self, service_type: &str) -> Result<flume::Receiver<ServiceEvent>>;
    fn unsubscribe(&self, service_type: &str) -> Result<()>;
}

impl BrowseSource for ServiceDaemon {
    fn subscribe(&self, service_type: &str) -> Result<flume::Receiver<ServiceEvent>> {
        self.browse(service_type)
            .with_context(|| format!("Failed to browse {}", service_type))
    }

    fn unsubscribe(&self, service_type: &str) -> Result<()> {
        self.stop_browse(service_type)
            .with_context(|| format!("Failed to stop browsing {}", service_type))
    }
}

struct ActiveBrowse {
    cancel: CancellationToken,
    tasks: TaskTracker,
}

/// Browses one service type and reports printers on the bus.
///
/// Every `start` opens a new generation; events are tagged with it so the
/// consumer can discard anything a superseded session still had in flight.
pub struct DiscoveryEngine<S> {
    source: Arc<S>,
    config: DiscoveryConfig,
    bus: BusSender,
    generation: u64,
    active: Option<ActiveBrowse>,
}

impl<S: BrowseSource> DiscoveryEngine<S> {
    pub fn new(source: Arc<S>, config: DiscoveryConfig, bus: BusSender) -> Self {
        Self {
            source,
            config,
            bus,
            generation: 0,
            active: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Begin browsing. Returns the generation that tags this session's events.
    /// Calling it while already running is a no-op.
    pub fn start(&mut self) -> Result<u64> {
        if self.active.is_some() {
            tracing::debug!("Discovery already running (generation {})", self.generation);
            return Ok(self.generation);
        }

        let receiver = self.source.subscribe(&self.config.service_type)?;
        self.generation += 1;

        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();
        let ctx = BrowseContext {
            generation: self.generation,
            bus: self.bus.clone(),
            cancel: cancel.clone(),
            tasks: tasks.clone(),
            resolve_timeout: self.config.resolve_timeout(),
        };
        tasks.spawn(run_browser(receiver, ctx));

        self.active = Some(ActiveBrowse { cancel, tasks });
        tracing::info!(
            "Browsing {} (generation {})",
            self.config.service_type,
            self.generation
        );
        Ok(self.generation)
    }

    /// Cancel the browse loop and every outstanding resolution, and wait for
    /// all of them to finish. Safe to call when not running.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cancel.cancel();
        if let Err(e) = self.source.unsubscribe(&self.config.service_type) {
            tracing::warn!("Failed to unsubscribe: {:#}", e);
        }

        active.tasks.close();
        active.tasks.wait().await;
        tracing::info!("Discovery generation {} stopped", self.generation);
    }
}

#[derive(Clone)]
struct BrowseContext {
    generation: u64,
    bus: BusSender,
    cancel: CancellationToken,
    tasks: TaskTracker,
    resolve_timeout: Duration,
}

impl BrowseContext {
    async fn emit(&self, event: DiscoveryEvent) {
        if self.cancel.is_cancelled() {
            return;
        }

        let message = BusMessage::Discovery {
            generation: self.generation,
            event,
        };

        // A full bus must not hold up stop()
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            result = self.bus.send(message) => {
                if let Err(e) = result {
                    tracing::debug!("Bus closed, dropping discovery event: {}", e);
                }
            }
        }
    }

    /// Bound one announcement's resolution on its own task. The task only
    /// reports expiry back to the browse loop; all emission stays in the loop
    /// so events for one printer reach the bus in the order they happened.
    fn arm_resolution_timer(
        &self,
        fullname: String,
        seq: u64,
        expired: mpsc::UnboundedSender<(String, u64)>,
    ) -> CancellationToken {
        let timer = self.cancel.child_token();
        if self.cancel.is_cancelled() {
            return timer;
        }

        let resolved = timer.clone();
        let timeout = self.resolve_timeout;
        self.tasks.spawn(async move {
            tokio::select! {
                _ = resolved.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let _ = expired.send((fullname, seq));
                }
            }
        });
        timer
    }
}

/// An announcement seen but not yet resolved.
struct Pending {
    seq: u64,
    timer: CancellationToken,
}

async fn run_browser(receiver: flume::Receiver<ServiceEvent>, ctx: BrowseContext) {
    let mut pending: HashMap<String, Pending> = HashMap::new();
    // Names whose resolution timed out; a late answer for them is dropped
    let mut expired: HashSet<String> = HashSet::new();
    let (expired_tx, mut expired_rx) = mpsc::unbounded_channel::<(String, u64)>();
    let mut next_seq = 0u64;

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                tracing::debug!("Browse loop {} cancelled", ctx.generation);
                break;
            }

            Some((fullname, seq)) = expired_rx.recv() => {
                if pending.get(&fullname).map(|p| p.seq) == Some(seq) {
                    tracing::debug!("Resolution of {} timed out, dropping", fullname);
                    pending.remove(&fullname);
                    expired.insert(fullname);
                }
            }

            event = receiver.recv_async() => {
                match event {
                    Ok(ServiceEvent::ServiceFound(_, fullname)) => {
                        if !pending.contains_key(&fullname) {
                            tracing::debug!("Found {}", fullname);
                            expired.remove(&fullname);
                            next_seq += 1;
                            let timer = ctx.arm_resolution_timer(
                                fullname.clone(),
                                next_seq,
                                expired_tx.clone(),
                            );
                            pending.insert(fullname, Pending { seq: next_seq, timer });
                        }
                    }
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        let fullname = info.get_fullname();
                        if let Some(entry) = pending.remove(fullname) {
                            entry.timer.cancel();
                            ctx.emit(DiscoveryEvent::Added(record_from_info(&info))).await;
                        } else if expired.contains(fullname) {
                            tracing::debug!("Late resolution of {} ignored", fullname);
                        } else {
                            // Refresh of an already known announcement
                            ctx.emit(DiscoveryEvent::Added(record_from_info(&info))).await;
                        }
                    }
                    Ok(ServiceEvent::ServiceRemoved(_, fullname)) => {
                        tracing::debug!("Removed {}", fullname);
                        if let Some(entry) = pending.remove(&fullname) {
                            entry.timer.cancel();
                        }
                        expired.remove(&fullname);
                        let identity = PrinterIdentity::from_service_name(&fullname);
                        ctx.emit(DiscoveryEvent::Removed(identity)).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Browse channel closed: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

fn record_from_info(info: &ServiceInfo) -> ServiceRecord {
    let admin_url = info
        .get_property_val_str(TXT_ADMIN_URL)
        .and_then(parse_admin_url);

    ServiceRecord::new(info.get_fullname(), info.get_hostname(), admin_url)
}

/// Accepts only absolute http(s) URLs with a host.
pub fn parse_admin_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let (scheme, rest) = raw.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return None;
    }

    let host = rest.split(&['/', '?', '#'][..]).next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }

    Some(raw.to_string())
}
