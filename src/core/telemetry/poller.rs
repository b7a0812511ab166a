//! The poll loop: identities, status fetch, parse, delta accounting,
//! persistence and broadcast, once per interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

use super::broadcaster::{Broadcaster, PublishReport};
use super::delta::DeltaTracker;
use super::identity::{IdentityMap, IdentityResolver};
use super::models::{PeerView, Snapshot, TelemetrySample};
use super::parser::StatusParser;
use super::source::StatusSource;
use super::store::SampleStore;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub config_dir: PathBuf,
    /// Upper bound on one store write
    pub store_timeout: Duration,
    /// Extra attempts after a failed (not timed out) store write
    pub store_retries: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            config_dir: PathBuf::from("/etc/wireguard/configs"),
            store_timeout: Duration::from_secs(2),
            store_retries: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Fetching,
    Parsing,
    Accounting,
    Publishing,
}

/// What one cycle produced
#[derive(Debug)]
pub struct CycleReport {
    pub snapshot: Arc<Snapshot>,
    pub samples: Vec<TelemetrySample>,
    /// Non-fatal conditions met along the way
    pub issues: Vec<Error>,
    pub publish: PublishReport,
}

pub struct Poller<S> {
    config: PollerConfig,
    source: S,
    store: Arc<dyn SampleStore>,
    broadcaster: Broadcaster,
    tracker: DeltaTracker,
    state: PollerState,
    latest_tx: watch::Sender<Arc<Snapshot>>,
}

impl<S: StatusSource + 'static> Poller<S> {
    pub fn new(
        config: PollerConfig,
        source: S,
        store: Arc<dyn SampleStore>,
        broadcaster: Broadcaster,
    ) -> Self {
        let (latest_tx, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            config,
            source,
            store,
            broadcaster,
            tracker: DeltaTracker::new(),
            state: PollerState::Idle,
            latest_tx,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn tracker_mut(&mut self) -> &mut DeltaTracker {
        &mut self.tracker
    }

    /// Receiver for the most recent snapshot (default until the first cycle)
    pub fn latest(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.latest_tx.subscribe()
    }

    fn transition(&mut self, next: PollerState) {
        log::trace!("Poller {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run a single cycle to completion. Never fails: every problem ends up
    /// in [`CycleReport::issues`] and the cycle still publishes.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut issues = Vec::new();

        self.transition(PollerState::Fetching);
        let identities = self.resolve_identities(&mut issues).await;
        let raw = match self.source.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                issues.push(e);
                String::new()
            }
        };

        self.transition(PollerState::Parsing);
        let outcome = StatusParser::parse_detailed(&raw);
        issues.extend(outcome.rejected);

        self.transition(PollerState::Accounting);
        let now = chrono::Utc::now().timestamp();
        let mut samples = Vec::with_capacity(outcome.records.len());
        let mut peers = Vec::with_capacity(outcome.records.len());

        for record in &outcome.records {
            let name = match identities.name_for(&record.virtual_ip) {
                Some(name) => name.to_string(),
                None => match &record.name_hint {
                    Some(hint) => hint.clone(),
                    None => {
                        issues.push(Error::IdentityUnresolved(record.virtual_ip.clone()));
                        record.virtual_ip.clone()
                    }
                },
            };

            let previous = self.tracker.last_totals(&name);
            let delta = self.tracker.observe(&name, record.rx_bytes, record.tx_bytes);
            if let (true, Some((prev_rx, prev_tx))) = (delta.regressed, previous) {
                issues.push(Error::CounterRegression {
                    client: name.clone(),
                    prev_rx,
                    rx: record.rx_bytes,
                    prev_tx,
                    tx: record.tx_bytes,
                });
            }

            samples.push(TelemetrySample {
                client_name: name.clone(),
                rx_delta: delta.rx,
                tx_delta: delta.tx,
                timestamp: now,
            });
            peers.push(PeerView::new(name, record, now));
        }

        if let Err(e) = self.persist(&samples).await {
            issues.push(e);
        }

        self.transition(PollerState::Publishing);
        let snapshot = Arc::new(Snapshot {
            total: identities.total_clients(),
            connected: peers,
            ts: now,
        });
        let publish = self.broadcaster.publish(Arc::clone(&snapshot));
        self.latest_tx.send_replace(Arc::clone(&snapshot));

        self.transition(PollerState::Idle);

        let report = CycleReport {
            snapshot,
            samples,
            issues,
            publish,
        };
        log_cycle(&report);
        report
    }

    async fn resolve_identities(&self, issues: &mut Vec<Error>) -> IdentityMap {
        let resolver = IdentityResolver::new(self.config.config_dir.clone());
        match tokio::task::spawn_blocking(move || resolver.resolve()).await {
            Ok(map) => map,
            Err(e) => {
                issues.push(Error::other(format!("identity scan failed: {}", e)));
                IdentityMap::default()
            }
        }
    }

    /// Write the cycle's samples with a bounded wait and a bounded retry.
    ///
    /// A timed-out write is not retried since it may still land.
    async fn persist(&self, samples: &[TelemetrySample]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let attempts = self.config.store_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let store = Arc::clone(&self.store);
            let batch = samples.to_vec();
            let job = tokio::task::spawn_blocking(move || store.record_all(&batch));

            match timeout(self.config.store_timeout, job).await {
                Ok(Ok(Ok(()))) => return Ok(()),
                Ok(Ok(Err(e))) => {
                    log::debug!("Store write attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(Error::persistence(e.to_string()));
                }
                Ok(Err(e)) => {
                    last_error = Some(Error::persistence(format!("store task failed: {}", e)));
                }
                Err(_) => {
                    last_error = Some(Error::persistence(format!(
                        "store write exceeded {:?}, {} sample(s) skipped",
                        self.config.store_timeout,
                        samples.len()
                    )));
                    break;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::persistence("store write failed")))
    }

    /// Drive cycles until `shutdown` fires or its sender goes away.
    ///
    /// A stop that arrives mid-cycle abandons that cycle: a pending status
    /// command is killed and nothing is published for it.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        log::info!(
            "Poller started (interval {:?}, config dir {:?})",
            self.config.interval,
            self.config.config_dir
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => {
                            log::debug!("Stop requested while {:?}, abandoning cycle", self.state);
                            self.transition(PollerState::Idle);
                            break;
                        }
                        _ = self.run_cycle() => {}
                    }
                }
            }
        }

        log::info!("Poller stopped");
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let latest = self.latest();
        let task = tokio::spawn(self.run(shutdown_rx));
        PollerHandle {
            shutdown_tx,
            latest,
            task,
        }
    }
}

fn log_cycle(report: &CycleReport) {
    for issue in &report.issues {
        if issue.kind().is_alert() {
            log::warn!("{}", issue);
        } else {
            log::debug!("{}", issue);
        }
    }

    log::trace!(
        "Cycle done: {} peer(s), {} sample(s), delivered to {} subscriber(s)",
        report.snapshot.connected.len(),
        report.samples.len(),
        report.publish.delivered
    );
}

/// Owner of a spawned poll loop
pub struct PollerHandle {
    shutdown_tx: broadcast::Sender<()>,
    latest: watch::Receiver<Arc<Snapshot>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn latest(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.latest.clone()
    }

    /// Sender of the loop's stop signal, for tasks that should stop with it
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Signal the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            log::error!("Poller task ended abnormally: {}", e);
        }
    }

    /// Wait for the loop to exit after someone else sent the signal
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            log::error!("Poller task ended abnormally: {}", e);
        }
    }
}
