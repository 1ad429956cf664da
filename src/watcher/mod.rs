// Service state watcher: snapshots, classification and polling

pub mod classifier;
pub mod coordinator;
pub mod health;
pub mod scoped;
pub mod snapshot;


pub use classifier::ChangeClassifier;
pub use coordinator::{PauseGuard, WatcherCoordinator, DEFAULT_POLL_INTERVAL};
pub use health::ScopeHealth;
pub use scoped::{PendingTick, ScopedWatcher, WatcherState};
pub use snapshot::{Snapshot, StateSnapshotBuilder};
