// Timer-driven polling across scopes with a single merged event stream

use crate::error::Result;
use crate::events::{ChangeEvent, ChangeSubscriber, StatusSignal};
use crate::systemd::{Scope, ServiceManagerClient};
use crate::watcher::{ChangeClassifier, PendingTick, ScopedWatcher, Snapshot, WatcherState};
use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns one [`ScopedWatcher`] per scope and drives them on a fixed interval.
///
/// Cloning yields another handle to the same coordinator.
#[derive(Clone)]
pub struct WatcherCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    watchers: Vec<Arc<AsyncMutex<ScopedWatcher>>>,
    interval: Duration,
    // Nesting depth; emission is suppressed while non-zero
    paused: AtomicUsize,
    // Emission happens only while this lock is held
    gate: Mutex<Gate>,
}

#[derive(Default)]
struct Gate {
    running: bool,
    epoch: u64,
    // Passed to start(), dropped again by stop()
    session: Option<Arc<dyn ChangeSubscriber>>,
    subscribers: Vec<Arc<dyn ChangeSubscriber>>,
    timer: Option<JoinHandle<()>>,
}

impl Gate {
    fn audience(&self) -> impl Iterator<Item = &Arc<dyn ChangeSubscriber>> {
        self.session.iter().chain(self.subscribers.iter())
    }
}

type Prepared = (OwnedMutexGuard<ScopedWatcher>, Option<PendingTick>);

impl WatcherCoordinator {
    pub fn new(client: Arc<dyn ServiceManagerClient>, scopes: &[Scope], interval: Duration) -> Self {
        let mut scopes = scopes.to_vec();
        scopes.sort();
        scopes.dedup();

        let watchers = scopes
            .into_iter()
            .map(|scope| Arc::new(AsyncMutex::new(ScopedWatcher::new(scope, Arc::clone(&client)))))
            .collect();

        Self {
            inner: Arc::new(Inner {
                watchers,
                interval: interval.max(MIN_POLL_INTERVAL),
                paused: AtomicUsize::new(0),
                gate: Mutex::new(Gate::default()),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn is_running(&self) -> bool {
        self.inner.gate().running
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst) > 0
    }

    /// Register an observer that outlives stop/start cycles. Callbacks must
    /// not call back into the coordinator.
    pub fn subscribe(&self, subscriber: Arc<dyn ChangeSubscriber>) {
        self.inner.gate().subscribers.push(subscriber);
    }

    /// Begin polling, delivering to `subscriber` until the next `stop()`.
    /// Returns false (and does nothing) if already running.
    pub async fn start(&self, subscriber: Arc<dyn ChangeSubscriber>) -> bool {
        let epoch = {
            let mut gate = self.inner.gate();
            if gate.running {
                tracing::debug!("Watcher coordinator already running");
                return false;
            }
            gate.running = true;
            gate.epoch += 1;
            gate.session = Some(subscriber);
            gate.epoch
        };

        tracing::info!(
            "Starting watcher coordinator ({} scopes, every {:?})",
            self.inner.watchers.len(),
            self.inner.interval
        );

        self.inner.initialize_pending(epoch).await;

        let task = tokio::spawn(poll_loop(Arc::downgrade(&self.inner), epoch, self.inner.interval));

        let mut gate = self.inner.gate();
        if gate.running && gate.epoch == epoch {
            gate.timer = Some(task);
        } else {
            // stop() ran while we were initializing
            task.abort();
        }
        true
    }

    /// Cancel polling. No events are delivered after this returns, including
    /// from a tick that is mid-flight.
    pub fn stop(&self) {
        let mut gate = self.inner.gate();
        if !gate.running {
            return;
        }
        gate.running = false;
        gate.epoch += 1;
        gate.session = None;
        if let Some(task) = gate.timer.take() {
            task.abort();
        }
        tracing::info!("Watcher coordinator stopped");
    }

    /// Stop polling and retire every scope watcher for good
    pub async fn shutdown(&self) {
        self.stop();
        for watcher in &self.inner.watchers {
            watcher.lock().await.stop();
        }
    }

    /// Suppress emission. Snapshots keep updating so the baseline stays current.
    ///
    /// Pauses nest: emission resumes once every `pause()` has been matched
    /// by a `resume()`.
    pub fn pause(&self) {
        if self.inner.paused.fetch_add(1, Ordering::SeqCst) == 0 {
            tracing::info!("Change emission paused");
        }
    }

    /// Undo one `pause()`. Extra calls are ignored.
    pub fn resume(&self) {
        let previous = self
            .inner
            .paused
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| depth.checked_sub(1));
        if previous == Ok(1) {
            tracing::info!("Change emission resumed");
        }
    }

    /// Pause until the returned guard is dropped
    pub fn pause_guard(&self) -> PauseGuard {
        self.pause();
        PauseGuard {
            coordinator: self.clone(),
        }
    }

    /// Run one cycle now. Returns the number of events delivered.
    pub async fn tick_now(&self) -> usize {
        let epoch = {
            let gate = self.inner.gate();
            if !gate.running {
                return 0;
            }
            gate.epoch
        };
        self.inner.run_tick(epoch, true).await
    }

    /// Run one cycle with emission suppressed, folding any pending state
    /// into the baseline. Waits for an in-flight tick instead of skipping.
    pub async fn absorb(&self) {
        let epoch = self.inner.gate().epoch;
        let mut guards = Vec::with_capacity(self.inner.watchers.len());
        for watcher in &self.inner.watchers {
            guards.push(Arc::clone(watcher).lock_owned().await);
        }
        self.inner.prepare_and_publish(epoch, guards, false).await;
    }

    /// Last committed snapshot for a scope
    pub async fn snapshot(&self, scope: Scope) -> Option<Arc<Snapshot>> {
        for watcher in &self.inner.watchers {
            let watcher = watcher.lock().await;
            if watcher.scope() == scope {
                return watcher.snapshot();
            }
        }
        None
    }

    /// Current state of a scope's watcher
    pub async fn watcher_state(&self, scope: Scope) -> Option<WatcherState> {
        for watcher in &self.inner.watchers {
            let watcher = watcher.lock().await;
            if watcher.scope() == scope {
                return Some(watcher.state());
            }
        }
        None
    }

    /// All committed snapshots merged into one
    pub async fn combined_snapshot(&self) -> Snapshot {
        let mut parts = Vec::new();
        for watcher in &self.inner.watchers {
            if let Some(snapshot) = watcher.lock().await.snapshot() {
                parts.push(snapshot);
            }
        }
        Snapshot::merge(parts.iter().map(|s| s.as_ref()))
    }

    /// Diff a snapshot persisted by a previous session against the live state.
    ///
    /// For scopes that are not yet initialized the freshly fetched snapshot
    /// becomes the baseline. Scopes whose fetch fails contribute no events.
    pub async fn detect_offline_changes(&self, persisted: &Snapshot) -> Result<Vec<ChangeEvent>> {
        let observed_at = Utc::now();
        let recorded_scopes = persisted.scopes();
        let mut events = Vec::new();

        for watcher in &self.inner.watchers {
            let mut watcher = watcher.lock().await;
            let scope = watcher.scope();

            let current = match watcher.state() {
                WatcherState::Stopped => continue,
                WatcherState::Uninitialized => match watcher.fetch().await {
                    Ok(fresh) => {
                        watcher.seed(fresh.clone());
                        fresh
                    }
                    Err(e) => {
                        tracing::warn!("Skipping offline reconciliation for {}: {}", scope, e);
                        continue;
                    }
                },
                WatcherState::Initialized | WatcherState::Polling => match watcher.snapshot() {
                    Some(snapshot) => snapshot.as_ref().clone(),
                    None => continue,
                },
            };

            // Never observed last session: nothing to compare against
            if !recorded_scopes.contains(&scope) {
                tracing::debug!("No persisted {} units, skipping offline reconciliation", scope);
                continue;
            }

            let previous = persisted.for_scope(scope);
            events.extend(ChangeClassifier::diff(&previous, &current, observed_at));
        }

        if !events.is_empty() {
            tracing::info!("{} changes occurred while closed", events.len());
        }
        Ok(events)
    }
}

impl Inner {
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn initialize_pending(&self, epoch: u64) {
        let mut signals = Vec::new();
        for watcher in &self.watchers {
            let mut watcher = watcher.lock().await;
            if watcher.state() == WatcherState::Uninitialized {
                if let Err(e) = watcher.initialize().await {
                    tracing::warn!("{}; retrying on next tick", e);
                }
            }
            signals.extend(watcher.drain_signals());
        }

        let gate = self.gate();
        if gate.running && gate.epoch == epoch {
            notify_status(&gate, &signals);
        }
    }

    async fn run_tick(&self, epoch: u64, emit: bool) -> usize {
        let mut guards = Vec::new();
        for watcher in &self.watchers {
            match Arc::clone(watcher).try_lock_owned() {
                Ok(guard) => guards.push(guard),
                Err(_) => tracing::debug!("Previous tick still in flight, skipping scope"),
            }
        }
        if guards.is_empty() {
            return 0;
        }

        self.prepare_and_publish(epoch, guards, emit).await
    }

    async fn prepare_and_publish(
        &self,
        epoch: u64,
        guards: Vec<OwnedMutexGuard<ScopedWatcher>>,
        emit: bool,
    ) -> usize {
        let prepared = join_all(guards.into_iter().map(prepare)).await;
        self.publish(epoch, prepared, emit)
    }

    fn publish(&self, epoch: u64, prepared: Vec<Prepared>, emit: bool) -> usize {
        let gate = self.gate();
        if gate.epoch != epoch {
            tracing::debug!("Discarding tick results after stop");
            return 0;
        }

        let mut batch = Vec::new();
        let mut signals = Vec::new();
        for (mut watcher, pending) in prepared {
            if let Some(pending) = pending {
                batch.extend(watcher.commit(pending));
            }
            signals.extend(watcher.drain_signals());
        }

        if gate.running {
            notify_status(&gate, &signals);
        }

        if batch.is_empty() {
            return 0;
        }
        if !emit || !gate.running {
            tracing::debug!("Absorbed {} changes without emitting", batch.len());
            return 0;
        }
        if self.paused.load(Ordering::SeqCst) > 0 {
            tracing::info!("Suppressed {} changes while paused", batch.len());
            return 0;
        }

        for event in &batch {
            tracing::info!("Detected change: {}", event.describe());
        }
        for subscriber in gate.audience() {
            subscriber.on_change(&batch);
        }
        batch.len()
    }
}

/// Holds one level of pause on a coordinator
pub struct PauseGuard {
    coordinator: WatcherCoordinator,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.coordinator.resume();
    }
}

async fn prepare(mut watcher: OwnedMutexGuard<ScopedWatcher>) -> Prepared {
    if watcher.state() == WatcherState::Uninitialized {
        if let Err(e) = watcher.initialize().await {
            tracing::debug!("{}", e);
        }
        return (watcher, None);
    }

    match watcher.prepare_tick().await {
        Ok(pending) => (watcher, pending),
        // Failed fetch: keep the last good snapshot, emit nothing
        Err(_) => (watcher, None),
    }
}

fn notify_status(gate: &Gate, signals: &[StatusSignal]) {
    for signal in signals {
        for subscriber in gate.audience() {
            subscriber.on_status(signal);
        }
    }
}

async fn poll_loop(inner: Weak<Inner>, epoch: u64, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    // A firing that lands while a tick is still running is dropped, not queued
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        {
            let gate = inner.gate();
            if !gate.running || gate.epoch != epoch {
                break;
            }
        }
        inner.run_tick(epoch, true).await;
    }
}
