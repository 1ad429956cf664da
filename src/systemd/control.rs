// Systemd unit control operations

use crate::error::{Result, WatchError};
use crate::systemd::Scope;
use crate::watcher::WatcherCoordinator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use tokio::process::Command;

/// Mutating verbs accepted by the action boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVerb {
    Enable,
    Disable,
    Start,
    Stop,
    Restart,
}

impl ActionVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionVerb::Enable => "enable",
            ActionVerb::Disable => "disable",
            ActionVerb::Start => "start",
            ActionVerb::Stop => "stop",
            ActionVerb::Restart => "restart",
        }
    }

    /// Verbs that take a running or boot-enabled unit away
    pub fn is_destructive(&self) -> bool {
        matches!(self, ActionVerb::Stop | ActionVerb::Disable | ActionVerb::Restart)
    }
}

impl fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionVerb {
    type Err = WatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enable" => Ok(ActionVerb::Enable),
            "disable" => Ok(ActionVerb::Disable),
            "start" => Ok(ActionVerb::Start),
            "stop" => Ok(ActionVerb::Stop),
            "restart" => Ok(ActionVerb::Restart),
            other => Err(WatchError::Config(format!("Unknown action '{}'", other))),
        }
    }
}

/// Mutation boundary: runs one verb over a batch of units
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run_action(&self, scope: Scope, verb: ActionVerb, units: Vec<String>) -> Result<()>;
}

/// systemctl-backed action runner
#[derive(Debug, Clone)]
pub struct SystemctlActions {
    program: String,
}

impl Default for SystemctlActions {
    fn default() -> Self {
        Self {
            program: "systemctl".to_string(),
        }
    }
}

#[async_trait]
impl ActionRunner for SystemctlActions {
    async fn run_action(&self, scope: Scope, verb: ActionVerb, units: Vec<String>) -> Result<()> {
        let mut command = Command::new(&self.program);
        if let Some(flag) = scope.systemctl_flag() {
            command.arg(flag);
        }
        command.arg(verb.as_str()).args(&units).stdin(Stdio::null());

        tracing::info!("Running systemctl {} {} ({})", verb, units.join(" "), scope);

        let output = command.output().await.map_err(|e| WatchError::Action {
            verb,
            units: units.join(" "),
            message: format!("failed to spawn {}: {}", self.program, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(WatchError::Action {
                verb,
                units: units.join(" "),
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            }
            .into());
        }

        Ok(())
    }
}

/// Issues mutations and keeps the watcher from reporting them as external changes
#[derive(Clone)]
pub struct ActionExecutor {
    runner: Arc<dyn ActionRunner>,
    coordinator: Option<WatcherCoordinator>,
}

impl ActionExecutor {
    pub fn new(runner: Arc<dyn ActionRunner>) -> Self {
        Self {
            runner,
            coordinator: None,
        }
    }

    /// Attach a coordinator whose emission is suppressed during bulk actions
    pub fn with_coordinator(mut self, coordinator: WatcherCoordinator) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Run a single action. Errors are returned verbatim and never retried.
    pub async fn execute(&self, scope: Scope, verb: ActionVerb, units: &[String]) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }
        for unit in units {
            validate_unit_name(unit)?;
        }

        match self.runner.run_action(scope, verb, units.to_vec()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!("Action {} failed: {}", verb, e);
                Err(e)
            }
        }
    }

    /// Run an action while the coordinator is paused, then fold the result
    /// into the baseline before resuming.
    pub async fn execute_bulk(&self, scope: Scope, verb: ActionVerb, units: &[String]) -> Result<()> {
        let Some(coordinator) = &self.coordinator else {
            return self.execute(scope, verb, units).await;
        };

        let _paused = coordinator.pause_guard();
        let result = self.execute(scope, verb, units).await;
        coordinator.absorb().await;

        result
    }
}

/// Validate unit name format and prevent argument injection
pub fn validate_unit_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(WatchError::InvalidUnitName("unit name cannot be empty".to_string()).into());
    }

    if name.len() > 256 || name.contains("..") || name.starts_with('-') {
        return Err(WatchError::InvalidUnitName(name.to_string()).into());
    }

    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@' | ':'));
    if !valid {
        return Err(WatchError::InvalidUnitName(name.to_string()).into());
    }

    Ok(())
}
