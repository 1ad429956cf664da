#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::error::Result;
    use crate::systemd::{ActionVerb, Scope};
    use std::time::Duration;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 3);
        assert!(config.watch_system);
        assert!(config.watch_user);
        assert!(config.detect_offline_changes);
        assert_eq!(config.query_timeout_secs, 10);
        assert_eq!(config.change_log_limit, 500);
        assert!(config.state_dir.is_none());
        assert!(config.log_file.is_none());
        assert!(!config.risky_patterns.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            poll_interval_secs: 5,
            watch_user: false,
            risky_patterns: vec!["critical-*".to_string()],
            ..Config::default()
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("critical-*"));
        assert!(yaml.contains("poll_interval_secs: 5"));

        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(deserialized.poll_interval_secs, 5);
        assert!(!deserialized.watch_user);
        assert_eq!(deserialized.risky_patterns, vec!["critical-*".to_string()]);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("poll_interval_secs: 7\n").unwrap();
        assert_eq!(config.poll_interval_secs, 7);
        assert!(config.watch_system);
        assert_eq!(config.change_log_limit, 500);
    }

    #[test]
    fn test_config_default_path() {
        let path = Config::default_path();
        assert!(path.is_ok());

        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("unitwatch"));
        assert!(path.to_string_lossy().ends_with("config.yaml"));
    }

    #[test]
    fn test_config_load_missing() -> Result<()> {
        let config = Config::load(Some("/nonexistent/config.yaml".into()))?;
        assert_eq!(config.poll_interval_secs, 3);
        Ok(())
    }

    #[test]
    fn test_config_save_load() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        let original_config = Config {
            poll_interval_secs: 9,
            state_dir: Some(temp_dir.path().join("state")),
            ..Config::default()
        };

        original_config.save(config_path.clone())?;
        let loaded_config = Config::load(Some(config_path))?;

        assert_eq!(loaded_config.poll_interval_secs, 9);
        assert_eq!(loaded_config.state_dir, original_config.state_dir);
        assert_eq!(loaded_config.risky_patterns, original_config.risky_patterns);
        Ok(())
    }

    #[test]
    fn test_config_rejects_no_scopes() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "watch_system: false\nwatch_user: false\n")?;

        assert!(Config::load(Some(config_path)).is_err());
        Ok(())
    }

    #[test]
    fn test_config_rejects_bad_pattern() {
        let config = Config {
            risky_patterns: vec!["[unclosed".to_string()],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scopes_and_intervals() {
        let config = Config {
            poll_interval_secs: 0,
            watch_system: false,
            ..Config::default()
        };
        assert_eq!(config.scopes(), vec![Scope::User]);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(Config::default().scopes(), vec![Scope::System, Scope::User]);
    }

    #[test]
    fn test_risky_patterns() {
        let config = Config::default();
        assert!(config.is_risky("systemd-journald.service"));
        assert!(config.is_risky("sshd.service"));
        assert!(config.is_risky("user@1000.service"));
        assert!(!config.is_risky("nginx.service"));
    }

    #[test]
    fn test_guarded_units_only_for_destructive_verbs() {
        let config = Config::default();
        let units = vec!["sshd.service".to_string(), "nginx.service".to_string()];
        assert_eq!(config.guarded_units(ActionVerb::Stop, &units), vec!["sshd.service"]);
        assert_eq!(config.guarded_units(ActionVerb::Restart, &units), vec!["sshd.service"]);
        assert!(config.guarded_units(ActionVerb::Start, &units).is_empty());
    }

    #[test]
    fn test_state_dir_override() -> Result<()> {
        let config = Config {
            state_dir: Some("/tmp/unitwatch-state".into()),
            ..Config::default()
        };
        assert_eq!(config.state_dir()?, std::path::PathBuf::from("/tmp/unitwatch-state"));
        Ok(())
    }
}
