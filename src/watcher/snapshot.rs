// Immutable per-scope snapshots and the builder that produces them

use crate::systemd::{EnabledState, Scope, UnitFileStates, UnitKey, UnitRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed state of a set of units at one instant, keyed by `(scope, name)`.
///
/// Serialized as a plain list of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<UnitRecord>", into = "Vec<UnitRecord>")]
pub struct Snapshot {
    units: BTreeMap<UnitKey, UnitRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &UnitKey) -> Option<&UnitRecord> {
        self.units.get(key)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &UnitKey> {
        self.units.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &UnitRecord> {
        self.units.values()
    }

    /// Units belonging to one scope
    pub fn for_scope(&self, scope: Scope) -> Snapshot {
        self.units
            .iter()
            .filter(|(key, _)| key.scope == scope)
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }

    /// Scopes with at least one unit in this snapshot
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = self.units.keys().map(|k| k.scope).collect();
        scopes.dedup();
        scopes
    }

    /// Combine snapshots of disjoint scopes. Later entries win on key collision.
    pub fn merge<'a>(parts: impl IntoIterator<Item = &'a Snapshot>) -> Snapshot {
        parts
            .into_iter()
            .flat_map(|s| s.units.iter())
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }

    /// Union of keys from two snapshots, in key order
    pub fn union_keys<'a>(old: &'a Snapshot, new: &'a Snapshot) -> Vec<&'a UnitKey> {
        let mut keys: Vec<&UnitKey> = old.units.keys().chain(new.units.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl FromIterator<(UnitKey, UnitRecord)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (UnitKey, UnitRecord)>>(iter: T) -> Self {
        Self {
            units: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<UnitRecord> for Snapshot {
    fn from_iter<T: IntoIterator<Item = UnitRecord>>(iter: T) -> Self {
        iter.into_iter().map(|r| (r.key(), r)).collect()
    }
}

impl From<Vec<UnitRecord>> for Snapshot {
    fn from(records: Vec<UnitRecord>) -> Self {
        records.into_iter().collect()
    }
}

impl From<Snapshot> for Vec<UnitRecord> {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.units.into_values().collect()
    }
}

/// Merges live unit records with unit file enablement into a snapshot
pub struct StateSnapshotBuilder;

impl StateSnapshotBuilder {
    /// Build the canonical snapshot for one scope.
    ///
    /// Enablement is looked up by exact unit name and defaults to `static`.
    /// Records reported for another scope are re-tagged with `scope`; when the
    /// manager lists a name twice the last row wins.
    pub fn build(scope: Scope, units: &[UnitRecord], unit_files: &UnitFileStates) -> Snapshot {
        units
            .iter()
            .map(|unit| {
                let enabled_state = unit_files
                    .get(&unit.name)
                    .cloned()
                    .unwrap_or(EnabledState::Static);
                UnitRecord {
                    scope,
                    enabled_state,
                    ..unit.clone()
                }
            })
            .collect()
    }
}
