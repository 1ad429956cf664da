#[cfg(test)]
mod tests {
    use crate::error::Result;
    use crate::events::{ChangeEvent, ChangeKind};
    use crate::store::*;
    use crate::systemd::{ActiveState, EnabledState, Scope, UnitRecord};
    use crate::watcher::Snapshot;
    use chrono::Utc;

    fn record(scope: Scope, name: &str, active: &str, sub: &str, enabled: &str) -> UnitRecord {
        UnitRecord {
            name: name.to_string(),
            scope,
            active_state: ActiveState::from(active),
            sub_state: sub.to_string(),
            enabled_state: EnabledState::from(enabled),
            load_state: "loaded".to_string(),
            description: String::new(),
        }
    }

    fn entry(unit: &str) -> ChangeLogEntry {
        let event = ChangeEvent {
            kind: ChangeKind::Stopped,
            scope: Scope::System,
            name: unit.to_string(),
            old_state: Some(record(Scope::System, unit, "active", "running", "enabled")),
            new_state: Some(record(Scope::System, unit, "inactive", "dead", "enabled")),
            observed_at: Utc::now(),
        };
        ChangeLogEntry::from_event(&event, ChangeOrigin::Detected)
    }

    #[test]
    fn test_missing_files_load_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = StateStore::new(dir.path().join("state"));

        assert!(store.load_snapshot()?.is_none());
        assert!(store.load_change_log()?.is_empty());
        assert!(store.load_game_mode()?.is_empty());
        store.clear_snapshot()?;
        Ok(())
    }

    #[test]
    fn test_snapshot_persists_both_scopes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = StateStore::new(dir.path());

        let snapshot: Snapshot = vec![
            record(Scope::System, "sshd.service", "active", "running", "enabled"),
            record(Scope::User, "sshd.service", "inactive", "dead", "disabled"),
        ]
        .into();

        store.save_snapshot(&snapshot)?;
        let loaded = store.load_snapshot()?.expect("snapshot saved");
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.len(), 2);

        store.clear_snapshot()?;
        assert!(store.load_snapshot()?.is_none());
        Ok(())
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = StateStore::new(dir.path());
        std::fs::write(dir.path().join("snapshot.json"), "{not json")?;

        let err = store.load_snapshot().unwrap_err();
        assert!(err.to_string().contains("Persistence error"));
        Ok(())
    }

    #[test]
    fn test_change_log_is_trimmed_to_limit() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = StateStore::new(dir.path());

        store.append_change_log(&[entry("a.service"), entry("b.service")], 3)?;
        store.append_change_log(&[entry("c.service"), entry("d.service")], 3)?;

        let log = store.load_change_log()?;
        let units: Vec<&str> = log.iter().map(|e| e.unit.as_str()).collect();
        assert_eq!(units, vec!["b.service", "c.service", "d.service"]);
        Ok(())
    }

    #[test]
    fn test_export_change_log() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = StateStore::new(dir.path());
        store.append_change_log(&[entry("nginx.service")], 10)?;

        let out = dir.path().join("export.txt");
        assert_eq!(store.export_change_log(&out)?, 1);

        let text = std::fs::read_to_string(out)?;
        assert!(text.contains("nginx.service"));
        assert!(text.contains("stopped"));
        assert!(text.contains("detected"));
        Ok(())
    }

    #[test]
    fn test_game_mode_round_trip_dedups() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = StateStore::new(dir.path());

        store.save_game_mode(&[
            "cups.service".to_string(),
            "bluetooth.service".to_string(),
            "cups.service".to_string(),
        ])?;
        assert_eq!(
            store.load_game_mode()?,
            vec!["bluetooth.service".to_string(), "cups.service".to_string()]
        );
        Ok(())
    }
}
