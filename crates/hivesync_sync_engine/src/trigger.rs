//! Runs a sync cycle when the device comes back online.

use crate::engine::SyncEngine;
use crate::transport::SyncTransport;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Network reachability as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// The remote may be reachable.
    Online,
    /// No network.
    Offline,
}

/// What subscribers of a [`ConnectivityMonitor`] see.
///
/// `reconnects` counts offline→online transitions since the monitor was
/// created, so a drop and recovery that land between two reads of the
/// channel still show up as a larger count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    /// Last reported reachability.
    pub connectivity: Connectivity,
    /// Offline→online transitions so far.
    pub reconnects: u64,
}

impl ConnectivityState {
    /// Returns true if the remote may be reachable.
    pub fn is_online(&self) -> bool {
        self.connectivity == Connectivity::Online
    }
}

/// Source of connectivity events.
///
/// Platform glue calls [`ConnectivityMonitor::set_online`] and
/// [`ConnectivityMonitor::set_offline`]; consumers subscribe. Repeating the
/// current state is not an event.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor in the given state.
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _) = watch::channel(ConnectivityState {
            connectivity: initial,
            reconnects: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Reports that the network is back.
    pub fn set_online(&self) {
        self.set(Connectivity::Online);
    }

    /// Reports that the network is gone.
    pub fn set_offline(&self) {
        self.set(Connectivity::Offline);
    }

    /// Reports a state.
    pub fn set(&self, connectivity: Connectivity) {
        self.tx.send_if_modified(|state| {
            if state.connectivity == connectivity {
                return false;
            }
            if connectivity == Connectivity::Online {
                state.reconnects += 1;
            }
            state.connectivity = connectivity;
            true
        });
    }

    /// Last reported state.
    pub fn current(&self) -> Connectivity {
        self.tx.borrow().connectivity
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

/// Background tasks that turn offline→online transitions into sync cycles.
///
/// Each transition requests one cycle. Requests arriving while a cycle runs
/// collapse into a single follow-up. Stopping the trigger, by
/// [`SyncTrigger::shutdown`] or by dropping it, never cuts a cycle short:
/// the one in flight finishes and no new one starts.
pub struct SyncTrigger {
    stop: watch::Sender<bool>,
    listener: JoinHandle<()>,
    worker: Option<JoinHandle<()>>,
}

impl SyncTrigger {
    /// Starts listening on `connectivity`. Must be called inside a Tokio runtime.
    pub fn spawn<T>(engine: Arc<SyncEngine<T>>, mut connectivity: watch::Receiver<ConnectivityState>) -> Self
    where
        T: SyncTransport + 'static,
    {
        let wake = Arc::new(Notify::new());
        let (stop, mut stopped) = watch::channel(false);

        let listener = {
            let engine = Arc::clone(&engine);
            let wake = Arc::clone(&wake);
            tokio::spawn(async move {
                let initial = *connectivity.borrow_and_update();
                let mut seen = initial.reconnects;
                engine.set_offline(!initial.is_online());

                while connectivity.changed().await.is_ok() {
                    let now = *connectivity.borrow_and_update();
                    engine.set_offline(!now.is_online());
                    if !now.is_online() {
                        debug!("connectivity lost");
                    } else if now.reconnects > seen {
                        info!(reconnects = now.reconnects, "connectivity restored, requesting sync");
                        wake.notify_one();
                    }
                    seen = now.reconnects;
                }
                debug!("connectivity source closed, trigger listener exiting");
            })
        };

        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    () = wake.notified() => {}
                }
                match engine.sync_queued().await {
                    Ok(report) => debug!(pulled = report.pull.applied, "triggered sync done"),
                    Err(e) => warn!(error = %e, "triggered sync failed"),
                }
            }
            debug!("trigger worker stopped");
        });

        Self {
            stop,
            listener,
            worker: Some(worker),
        }
    }

    /// Stops reacting to connectivity and waits for a cycle in flight to
    /// finish.
    pub async fn shutdown(mut self) {
        self.halt();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "trigger worker ended abnormally");
            }
        }
    }

    fn halt(&self) {
        self.stop.send_replace(true);
        self.listener.abort();
    }
}

impl Drop for SyncTrigger {
    // The worker is detached rather than aborted; it exits after the
    // current cycle.
    fn drop(&mut self) {
        self.halt();
    }
}
