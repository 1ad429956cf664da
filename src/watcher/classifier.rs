// Maps a unit's (old, new) observation pair to semantic change kinds

use crate::events::{ChangeEvent, ChangeKind};
use crate::systemd::{EnabledState, UnitRecord};
use crate::watcher::Snapshot;
use chrono::{DateTime, Utc};

pub struct ChangeClassifier;

impl ChangeClassifier {
    /// All applicable kinds in priority order. Empty when nothing changed.
    pub fn classify(old: Option<&UnitRecord>, new: Option<&UnitRecord>) -> Vec<ChangeKind> {
        let (old, new) = match (old, new) {
            (None, None) => return Vec::new(),
            (None, Some(_)) => return vec![ChangeKind::Added],
            (Some(_), None) => return vec![ChangeKind::Removed],
            (Some(old), Some(new)) => (old, new),
        };

        let mut kinds = Vec::new();

        let failed = new.is_failed() && !old.is_failed();
        if failed {
            kinds.push(ChangeKind::Failed);
        }

        if !old.is_settled_active() && new.is_settled_active() {
            kinds.push(ChangeKind::Started);
        } else if !failed && old.is_active() && !new.is_active() {
            kinds.push(ChangeKind::Stopped);
        }

        if old.enabled_state != new.enabled_state {
            kinds.push(enablement_kind(&old.enabled_state, &new.enabled_state));
        }

        if kinds.is_empty() && state_differs(old, new) {
            kinds.push(ChangeKind::Changed);
        }

        kinds
    }

    /// The single most specific kind, if any
    pub fn classify_primary(old: Option<&UnitRecord>, new: Option<&UnitRecord>) -> Option<ChangeKind> {
        Self::classify(old, new).into_iter().next()
    }

    /// Classify every key in the union of two snapshots into events
    pub fn diff(old: &Snapshot, new: &Snapshot, observed_at: DateTime<Utc>) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for key in Snapshot::union_keys(old, new) {
            let before = old.get(key);
            let after = new.get(key);

            for kind in Self::classify(before, after) {
                events.push(ChangeEvent {
                    kind,
                    scope: key.scope,
                    name: key.name.clone(),
                    old_state: before.cloned(),
                    new_state: after.cloned(),
                    observed_at,
                });
            }
        }

        events
    }
}

fn enablement_kind(old: &EnabledState, new: &EnabledState) -> ChangeKind {
    if new.is_enabled() && !old.is_enabled() {
        ChangeKind::Enabled
    } else if *new == EnabledState::Disabled {
        ChangeKind::Disabled
    } else {
        ChangeKind::Changed
    }
}

// Description and load state are informational only
fn state_differs(old: &UnitRecord, new: &UnitRecord) -> bool {
    old.active_state != new.active_state
        || old.sub_state != new.sub_state
        || old.enabled_state != new.enabled_state
}
