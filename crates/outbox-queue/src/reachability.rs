//! Network reachability monitoring.
//!
//! A monitor owns the decision of what counts as reachable and publishes
//! transitions through a `watch` channel. Subscribers only ever see the
//! latest state, so bursts of notifications collapse on their own.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use outbox_config::ReachabilityConfig;

/// Whether usable connectivity is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityState {
    Reachable,
    Unreachable,
}

impl ReachabilityState {
    pub fn is_reachable(self) -> bool {
        self == ReachabilityState::Reachable
    }
}

/// Kind of link the device is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// No network interface is up.
    Offline,
    /// Wi-Fi, ethernet, or any other unmetered link.
    Wifi,
    /// Cellular data only.
    Cellular,
}

/// Apply the cellular rule to a link and a probe result.
pub fn evaluate(link: LinkKind, probe_ok: bool, allow_cellular: bool) -> ReachabilityState {
    match link {
        LinkKind::Offline => ReachabilityState::Unreachable,
        LinkKind::Cellular if !allow_cellular => ReachabilityState::Unreachable,
        _ if probe_ok => ReachabilityState::Reachable,
        _ => ReachabilityState::Unreachable,
    }
}

/// Source of reachability state for the queue engine.
pub trait ReachabilityMonitor: Send + Sync {
    /// Current state.
    fn current_state(&self) -> ReachabilityState;

    /// Receiver notified on every state transition.
    fn subscribe(&self) -> watch::Receiver<ReachabilityState>;
}

/// Publishes transitions, ignoring writes that do not change the state.
struct StateCell {
    tx: watch::Sender<ReachabilityState>,
}

impl StateCell {
    fn new(initial: ReachabilityState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    fn publish(&self, state: ReachabilityState) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            info!("Reachability changed: {:?}", state);
        }
    }

    fn current(&self) -> ReachabilityState {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<ReachabilityState> {
        self.tx.subscribe()
    }
}

/// Reachability driven by the host application.
///
/// Platform code that already observes the network (OS callbacks, a
/// connectivity service) reports link changes here.
pub struct ManualReachability {
    cell: StateCell,
    link: Mutex<LinkKind>,
    allow_cellular: bool,
}

impl ManualReachability {
    /// Create a monitor starting on `link`.
    pub fn new(link: LinkKind, allow_cellular: bool) -> Self {
        Self {
            cell: StateCell::new(evaluate(link, true, allow_cellular)),
            link: Mutex::new(link),
            allow_cellular,
        }
    }

    /// A monitor that starts reachable over an unmetered link.
    pub fn reachable() -> Self {
        Self::new(LinkKind::Wifi, true)
    }

    /// A monitor that starts offline.
    pub fn unreachable(allow_cellular: bool) -> Self {
        Self::new(LinkKind::Offline, allow_cellular)
    }

    /// Report the current link.
    pub fn set_link(&self, link: LinkKind) {
        *self.link.lock() = link;
        self.cell.publish(evaluate(link, true, self.allow_cellular));
    }

    /// Shorthand for `Wifi` / `Offline`.
    pub fn set_reachable(&self, reachable: bool) {
        self.set_link(if reachable { LinkKind::Wifi } else { LinkKind::Offline });
    }

    pub fn link(&self) -> LinkKind {
        *self.link.lock()
    }
}

impl ReachabilityMonitor for ManualReachability {
    fn current_state(&self) -> ReachabilityState {
        self.cell.current()
    }

    fn subscribe(&self) -> watch::Receiver<ReachabilityState> {
        self.cell.subscribe()
    }
}

/// Reachability probed by opening TCP connections to a target.
///
/// A background task probes every `probe_interval`. Any probe failure
/// (resolution, refusal, timeout) reads as `Unreachable`. The link kind
/// defaults to `Wifi`; hosts that know they are on cellular report it with
/// [`ProbeReachability::set_link`] so `allow_cellular` applies.
pub struct ProbeReachability {
    shared: Arc<ProbeShared>,
    shutdown: CancellationToken,
}

struct ProbeShared {
    cell: StateCell,
    target: String,
    timeout: Duration,
    allow_cellular: bool,
    link: Mutex<LinkKind>,
    last_probe_ok: Mutex<bool>,
}

impl ProbeShared {
    async fn probe(&self) -> ReachabilityState {
        let ok = probe_target(&self.target, self.timeout).await;
        *self.last_probe_ok.lock() = ok;
        let state = evaluate(*self.link.lock(), ok, self.allow_cellular);
        self.cell.publish(state);
        state
    }
}

impl ProbeReachability {
    /// Start probing. Must be called within a tokio runtime.
    pub fn spawn(config: &ReachabilityConfig) -> Self {
        let shared = Arc::new(ProbeShared {
            cell: StateCell::new(ReachabilityState::Unreachable),
            target: config.socket_target(),
            timeout: config.probe_timeout(),
            allow_cellular: config.allow_cellular,
            link: Mutex::new(LinkKind::Wifi),
            last_probe_ok: Mutex::new(false),
        });
        let shutdown = CancellationToken::new();

        let interval = config.probe_interval().max(Duration::from_millis(10));
        let task_shared = shared.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        task_shared.probe().await;
                    }
                }
            }
            debug!("Reachability probe for {} stopped", task_shared.target);
        });

        info!("Probing reachability of {}", shared.target);
        Self { shared, shutdown }
    }

    /// Probe right away instead of waiting for the next tick.
    pub async fn probe_now(&self) -> ReachabilityState {
        self.shared.probe().await
    }

    /// Report the current link kind.
    pub fn set_link(&self, link: LinkKind) {
        *self.shared.link.lock() = link;
        let ok = *self.shared.last_probe_ok.lock();
        self.shared
            .cell
            .publish(evaluate(link, ok, self.shared.allow_cellular));
    }

    pub fn target(&self) -> &str {
        &self.shared.target
    }
}

impl ReachabilityMonitor for ProbeReachability {
    fn current_state(&self) -> ReachabilityState {
        self.shared.cell.current()
    }

    fn subscribe(&self) -> watch::Receiver<ReachabilityState> {
        self.shared.cell.subscribe()
    }
}

impl Drop for ProbeReachability {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Open and immediately drop a TCP connection to `target`.
async fn probe_target(target: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Reachability probe to {} failed: {}", target, e);
            false
        }
        Err(_) => {
            debug!("Reachability probe to {} timed out", target);
            false
        }
    }
}

#[cfg(test)]
#[path = "reachability_tests.rs"]
mod tests;
