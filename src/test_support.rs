// Shared helpers for unit tests

use crate::events::{ChangeEvent, ChangeSubscriber, StatusSignal};
use crate::error::WatchError;
use crate::systemd::{
    ActiveState, EnabledState, MockServiceManagerClient, QueryKind, Scope, UnitFileStates, UnitRecord,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn unit(scope: Scope, name: &str, active: &str, sub: &str, enabled: &str) -> UnitRecord {
    UnitRecord {
        name: name.to_string(),
        scope,
        active_state: ActiveState::from(active),
        sub_state: sub.to_string(),
        enabled_state: EnabledState::from(enabled),
        load_state: "loaded".to_string(),
        description: format!("{} test unit", name),
    }
}

/// Mutable stand-in for what the service managers currently report
#[derive(Default)]
pub struct World {
    units: Mutex<BTreeMap<(Scope, String), UnitRecord>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl World {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, scope: Scope, name: &str, active: &str, sub: &str, enabled: &str) {
        self.units
            .lock()
            .unwrap()
            .insert((scope, name.to_string()), unit(scope, name, active, sub, enabled));
    }

    pub fn remove(&self, scope: Scope, name: &str) {
        self.units.lock().unwrap().remove(&(scope, name.to_string()));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of list-units calls served so far
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn units_for(&self, scope: Scope) -> anyhow::Result<Vec<UnitRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(query_failed(scope, QueryKind::ListUnits));
        }
        Ok(self
            .units
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.scope == scope)
            .map(|u| UnitRecord {
                // list-units does not report enablement
                enabled_state: EnabledState::Static,
                ..u.clone()
            })
            .collect())
    }

    fn unit_files_for(&self, scope: Scope) -> anyhow::Result<UnitFileStates> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(query_failed(scope, QueryKind::ListUnitFiles));
        }
        Ok(self
            .units
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.scope == scope)
            .map(|u| (u.name.clone(), u.enabled_state.clone()))
            .collect())
    }
}

fn query_failed(scope: Scope, query: QueryKind) -> anyhow::Error {
    WatchError::Query {
        scope,
        query,
        message: "Failed to connect to bus".to_string(),
    }
    .into()
}

/// A mock client that serves whatever `world` currently holds
pub fn mock_client(world: &Arc<World>) -> MockServiceManagerClient {
    let mut client = MockServiceManagerClient::new();

    let units_world = Arc::clone(world);
    client
        .expect_fetch_units()
        .returning(move |scope| units_world.units_for(scope));

    let files_world = Arc::clone(world);
    client
        .expect_fetch_unit_files()
        .returning(move |scope| files_world.unit_files_for(scope));

    client
}

/// Subscriber that keeps every batch it receives
#[derive(Default)]
pub struct Recorder {
    batches: Mutex<Vec<Vec<ChangeEvent>>>,
    statuses: Mutex<Vec<StatusSignal>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batches(&self) -> Vec<Vec<ChangeEvent>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.batches().into_iter().flatten().collect()
    }

    pub fn statuses(&self) -> Vec<StatusSignal> {
        self.statuses.lock().unwrap().clone()
    }
}

impl ChangeSubscriber for Recorder {
    fn on_change(&self, events: &[ChangeEvent]) {
        self.batches.lock().unwrap().push(events.to_vec());
    }

    fn on_status(&self, status: &StatusSignal) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}
