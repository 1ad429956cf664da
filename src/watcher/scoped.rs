// Per-scope watcher: owns the baseline snapshot and diffs each tick against it

use crate::error::{Result, WatchError};
use crate::events::{ChangeEvent, StatusSignal};
use crate::systemd::{Scope, ServiceManagerClient};
use crate::watcher::{ChangeClassifier, ScopeHealth, Snapshot, StateSnapshotBuilder};
use chrono::Utc;
use std::sync::Arc;

/// Lifecycle of a [`ScopedWatcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Uninitialized,
    Initialized,
    Polling,
    Stopped,
}

/// A fetched snapshot and the events it would produce, not yet committed
#[derive(Debug)]
pub struct PendingTick {
    snapshot: Arc<Snapshot>,
    events: Vec<ChangeEvent>,
}

impl PendingTick {
    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }
}

pub struct ScopedWatcher {
    scope: Scope,
    client: Arc<dyn ServiceManagerClient>,
    state: WatcherState,
    snapshot: Option<Arc<Snapshot>>,
    health: ScopeHealth,
    signals: Vec<StatusSignal>,
}

impl ScopedWatcher {
    pub fn new(scope: Scope, client: Arc<dyn ServiceManagerClient>) -> Self {
        Self {
            scope,
            client,
            state: WatcherState::Uninitialized,
            snapshot: None,
            health: ScopeHealth::new(scope),
            signals: Vec::new(),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn health(&self) -> &ScopeHealth {
        &self.health
    }

    /// The committed baseline, if initialized
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.clone()
    }

    /// Status transitions recorded since the last call
    pub fn drain_signals(&mut self) -> Vec<StatusSignal> {
        std::mem::take(&mut self.signals)
    }

    /// Query the service manager and build a fresh snapshot. Does not touch
    /// the baseline.
    pub async fn fetch(&self) -> Result<Snapshot> {
        let (units, unit_files) = tokio::try_join!(
            self.client.fetch_units(self.scope),
            self.client.fetch_unit_files(self.scope),
        )?;
        Ok(StateSnapshotBuilder::build(self.scope, &units, &unit_files))
    }

    /// Establish the baseline. On failure the watcher stays `Uninitialized`
    /// and never adopts an empty snapshot.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.state != WatcherState::Uninitialized {
            return Ok(());
        }

        match self.fetch().await {
            Ok(snapshot) => {
                self.note_success();
                tracing::info!("{} watcher initialized with {} units", self.scope, snapshot.len());
                self.adopt(snapshot);
                Ok(())
            }
            Err(e) => {
                self.note_failure(&e);
                Err(WatchError::Initialization {
                    scope: self.scope,
                    message: e.to_string(),
                }
                .into())
            }
        }
    }

    /// Adopt an externally fetched snapshot as the baseline. Ignored unless
    /// the watcher is still `Uninitialized`.
    pub fn seed(&mut self, snapshot: Snapshot) -> bool {
        if self.state != WatcherState::Uninitialized {
            return false;
        }
        self.adopt(snapshot.for_scope(self.scope));
        true
    }

    /// Fetch and classify without committing. `Ok(None)` once stopped.
    /// A failed fetch leaves the baseline untouched.
    pub async fn prepare_tick(&mut self) -> Result<Option<PendingTick>> {
        let baseline = match self.state {
            WatcherState::Stopped => return Ok(None),
            WatcherState::Uninitialized => return Err(WatchError::NotInitialized(self.scope).into()),
            WatcherState::Initialized | WatcherState::Polling => match &self.snapshot {
                Some(snapshot) => Arc::clone(snapshot),
                None => return Err(WatchError::NotInitialized(self.scope).into()),
            },
        };

        let fresh = match self.fetch().await {
            Ok(snapshot) => {
                self.note_success();
                snapshot
            }
            Err(e) => {
                self.note_failure(&e);
                return Err(e);
            }
        };

        let events = ChangeClassifier::diff(&baseline, &fresh, Utc::now());
        Ok(Some(PendingTick {
            snapshot: Arc::new(fresh),
            events,
        }))
    }

    /// Replace the baseline with a prepared snapshot and hand back its events
    pub fn commit(&mut self, pending: PendingTick) -> Vec<ChangeEvent> {
        if self.state == WatcherState::Stopped {
            return Vec::new();
        }

        tracing::debug!(
            "{} tick: {} units, {} events",
            self.scope,
            pending.snapshot.len(),
            pending.events.len()
        );
        self.snapshot = Some(pending.snapshot);
        self.state = WatcherState::Polling;
        pending.events
    }

    /// One poll-and-diff cycle
    pub async fn tick(&mut self) -> Result<Vec<ChangeEvent>> {
        match self.prepare_tick().await? {
            Some(pending) => Ok(self.commit(pending)),
            None => Ok(Vec::new()),
        }
    }

    pub fn stop(&mut self) {
        if self.state != WatcherState::Stopped {
            tracing::debug!("{} watcher stopped", self.scope);
            self.state = WatcherState::Stopped;
        }
    }

    fn adopt(&mut self, snapshot: Snapshot) {
        self.snapshot = Some(Arc::new(snapshot));
        self.state = WatcherState::Initialized;
    }

    fn note_success(&mut self) {
        if let Some(signal) = self.health.record_success() {
            self.signals.push(signal);
        }
    }

    fn note_failure(&mut self, error: &anyhow::Error) {
        if let Some(signal) = self.health.record_failure(error) {
            self.signals.push(signal);
        }
    }
}
