// Persisted state: last-known snapshot, change log, game-mode selection

use crate::error::{Result, WatchError};
use crate::events::{ChangeEvent, ChangeKind};
use crate::systemd::Scope;
use crate::watcher::Snapshot;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "snapshot.json";
const CHANGE_LOG_FILE: &str = "changes.json";
const GAME_MODE_FILE: &str = "game_mode.json";

/// Where a change-log entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    /// Picked up by the live watcher
    Detected,
    /// Happened while the watcher was not running
    Offline,
}

/// One retained change-log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub scope: Scope,
    pub unit: String,
    pub kind: ChangeKind,
    pub origin: ChangeOrigin,
    pub details: String,
}

impl ChangeLogEntry {
    pub fn from_event(event: &ChangeEvent, origin: ChangeOrigin) -> Self {
        Self {
            timestamp: event.observed_at,
            scope: event.scope,
            unit: event.name.clone(),
            kind: event.kind,
            origin,
            details: event.describe(),
        }
    }

    pub fn format_line(&self) -> String {
        format!(
            "{} {:<8} {:<8} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.kind.label(),
            match self.origin {
                ChangeOrigin::Detected => "detected",
                ChangeOrigin::Offline => "offline",
            },
            self.details
        )
    }
}

/// JSON-file store rooted at a directory
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot saved by a previous session, if any
    pub fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        self.read_json(SNAPSHOT_FILE)
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.write_json(SNAPSHOT_FILE, snapshot)
    }

    pub fn clear_snapshot(&self) -> Result<()> {
        let path = self.dir.join(SNAPSHOT_FILE);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WatchError::Io(e).into()),
        }
    }

    pub fn load_change_log(&self) -> Result<Vec<ChangeLogEntry>> {
        Ok(self.read_json(CHANGE_LOG_FILE)?.unwrap_or_default())
    }

    /// Append entries, keeping only the newest `limit`
    pub fn append_change_log(&self, entries: &[ChangeLogEntry], limit: usize) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut log = self.load_change_log()?;
        log.extend_from_slice(entries);
        if log.len() > limit {
            let excess = log.len() - limit;
            log.drain(..excess);
        }
        self.write_json(CHANGE_LOG_FILE, &log)
    }

    /// Write the change log as plain text lines
    pub fn export_change_log(&self, path: &Path) -> Result<usize> {
        let log = self.load_change_log()?;
        let mut text = String::new();
        for entry in &log {
            text.push_str(&entry.format_line());
            text.push('\n');
        }
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(log.len())
    }

    pub fn load_game_mode(&self) -> Result<Vec<String>> {
        Ok(self.read_json(GAME_MODE_FILE)?.unwrap_or_default())
    }

    pub fn save_game_mode(&self, units: &[String]) -> Result<()> {
        let mut units = units.to_vec();
        units.sort();
        units.dedup();
        self.write_json(GAME_MODE_FILE, &units)
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.dir.join(file);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WatchError::Io(e).into()),
        };

        let value = serde_json::from_str(&contents)
            .map_err(|e| WatchError::Persistence(format!("{}: {}", path.display(), e)))?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{}.tmp", file));
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
