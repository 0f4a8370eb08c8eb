use log::{error, info, warn};
use std::sync::Arc;
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigSource, Settings};
use crate::hub::{Hub, Subscriber};
use crate::model::Outcome;
use crate::notify::{Mailer, dispatch, transition};
use crate::pool::WorkerPool;
use crate::probe::Probe;
use crate::scheduler::Scheduler;
use crate::store::ResultStore;

/// Inputs of the event loop besides ticks and probe completions.
pub struct Events {
    /// Live-update connections handed over by the transport.
    pub subscribers: mpsc::Receiver<Subscriber>,
    /// One message per reload request.
    pub reloads: mpsc::Receiver<()>,
    pub shutdown: CancellationToken,
}

/// Owns the configuration, the worker pool and the live subscriber, and
/// reacts to ticks, completions and lifecycle events from a single task.
pub struct Monitor<P, M, C> {
    settings: Settings,
    store: Arc<ResultStore>,
    prober: Arc<P>,
    mailer: Arc<M>,
    source: C,
}

impl<P: Probe, M: Mailer, C: ConfigSource> Monitor<P, M, C> {
    pub fn new(settings: Settings, prober: P, mailer: M, source: C) -> Self {
        let store = Arc::new(ResultStore::new(settings.inventory.clone()));

        Self {
            settings,
            store,
            prober: Arc::new(prober),
            mailer: Arc::new(mailer),
            source,
        }
    }

    /// Shared read side, for rendering and export.
    pub fn store(&self) -> Arc<ResultStore> {
        Arc::clone(&self.store)
    }

    /// Runs until `events.shutdown` is cancelled.
    ///
    /// Probes still in flight at that point are abandoned, not awaited.
    pub async fn run(self, events: Events) {
        let Monitor {
            mut settings,
            store,
            prober,
            mailer,
            source,
        } = self;
        let Events {
            mut subscribers,
            mut reloads,
            shutdown,
        } = events;

        info!("Starting website monitoring...");
        info!("{} sites in configuration", settings.inventory.len());
        info!("Check interval: {} seconds", settings.interval.as_secs());
        info!("Running {} workers", settings.workers);

        let (pool, mut completions) =
            WorkerPool::spawn(settings.workers, settings.inventory.len(), prober);
        let mut scheduler = Scheduler::start(settings.interval);
        let mut hub = Hub::new();

        loop {
            select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping monitor");
                    break;
                }
                () = scheduler.tick() => {
                    sweep(&pool, &settings).await;
                }
                Some(outcome) = completions.recv() => {
                    record(&store, &mailer, &mut hub, outcome);
                }
                Some(subscriber) = subscribers.recv() => {
                    hub.attach(subscriber);
                }
                () = hub.closed() => {
                    info!("live subscriber went away");
                    hub.detach();
                }
                Some(()) = reloads.recv() => {
                    reload(&source, &mut settings, &store, &pool, &mut scheduler);
                }
            }
        }

        info!("Website monitoring stopped gracefully");
    }
}

async fn sweep(pool: &WorkerPool, settings: &Settings) {
    info!("Checking website status...");

    for target in &settings.inventory {
        if let Err(e) = pool.submit(target.job(&settings.defaults)).await {
            error!("Could not queue check of {}: {e}", target.domain);
        }
    }
}

/// Stores a completion, alerting on a status flip, then pushes it live.
fn record<M: Mailer>(store: &ResultStore, mailer: &Arc<M>, hub: &mut Hub, outcome: Outcome) {
    if outcome.ok {
        info!("{}: UP", outcome.domain);
    } else {
        info!("{}: DOWN", outcome.domain);
    }

    let previous = store.swap(outcome.clone());
    if let Some(alert) = transition(previous.as_ref(), &outcome) {
        warn!("{} changed state, now {}", alert.domain, alert.state());
        dispatch(mailer, alert);
    }

    hub.push(&outcome);
}

fn reload<C: ConfigSource>(
    source: &C,
    settings: &mut Settings,
    store: &ResultStore,
    pool: &WorkerPool,
    scheduler: &mut Scheduler,
) {
    info!("Reloading configuration...");

    let fresh = match source.load() {
        Ok(fresh) => fresh,
        Err(e) => {
            error!("Could not reload configuration, keeping the previous one: {e}");
            return;
        }
    };

    for change in restart_only_changes(settings, &fresh, pool.size()) {
        warn!("{change}, only applied after a restart");
    }
    if scheduler.reschedule(fresh.interval) {
        info!("Check interval is now {} seconds", fresh.interval.as_secs());
    }

    store.replace_inventory(fresh.inventory.clone());
    *settings = fresh;
    info!(
        "Configuration reloaded, {} sites in configuration",
        settings.inventory.len()
    );
}

/// Settings that a running monitor cannot apply: the pool is never resized,
/// the server is bound once and the probe client is built once.
fn restart_only_changes(current: &Settings, fresh: &Settings, workers: usize) -> Vec<String> {
    let mut changes = Vec::new();
    if fresh.workers != workers {
        changes.push(format!(
            "worker count changed from {workers} to {}",
            fresh.workers
        ));
    }
    if fresh.port != current.port {
        changes.push(format!("port changed from {} to {}", current.port, fresh.port));
    }
    if fresh.timeout != current.timeout {
        changes.push(format!(
            "probe timeout changed from {}s to {}s",
            current.timeout.as_secs(),
            fresh.timeout.as_secs()
        ));
    }
    changes
}
