// Systemd unit data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope represents which service manager instance owns a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// System-level manager (PID 1)
    System,
    /// Per-user manager (runs in user session)
    User,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::System, Scope::User];

    /// Get display label for the scope
    pub fn label(&self) -> &'static str {
        match self {
            Scope::System => "system",
            Scope::User => "user",
        }
    }

    /// Get systemctl flag for this scope
    pub fn systemctl_flag(&self) -> Option<&'static str> {
        match self {
            Scope::System => None,
            Scope::User => Some("--user"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two read queries issued against a service manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    ListUnits,
    ListUnitFiles,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::ListUnits => f.write_str("list-units"),
            QueryKind::ListUnitFiles => f.write_str("list-unit-files"),
        }
    }
}

/// Runtime activation state as reported by `systemctl list-units`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActiveState {
    Active,
    Inactive,
    Failed,
    Activating,
    Deactivating,
    Reloading,
    Other(String),
}

impl ActiveState {
    pub fn as_str(&self) -> &str {
        match self {
            ActiveState::Active => "active",
            ActiveState::Inactive => "inactive",
            ActiveState::Failed => "failed",
            ActiveState::Activating => "activating",
            ActiveState::Deactivating => "deactivating",
            ActiveState::Reloading => "reloading",
            ActiveState::Other(s) => s,
        }
    }
}

impl From<&str> for ActiveState {
    fn from(value: &str) -> Self {
        match value {
            "active" => ActiveState::Active,
            "inactive" => ActiveState::Inactive,
            "failed" => ActiveState::Failed,
            "activating" => ActiveState::Activating,
            "deactivating" => ActiveState::Deactivating,
            "reloading" => ActiveState::Reloading,
            other => ActiveState::Other(other.to_string()),
        }
    }
}

impl From<String> for ActiveState {
    fn from(value: String) -> Self {
        ActiveState::from(value.as_str())
    }
}

impl From<ActiveState> for String {
    fn from(value: ActiveState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boot-time enablement as reported by `systemctl list-unit-files`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnabledState {
    Enabled,
    EnabledRuntime,
    Disabled,
    Static,
    Masked,
    MaskedRuntime,
    Indirect,
    Generated,
    Transient,
    Alias,
    Other(String),
}

impl EnabledState {
    pub fn as_str(&self) -> &str {
        match self {
            EnabledState::Enabled => "enabled",
            EnabledState::EnabledRuntime => "enabled-runtime",
            EnabledState::Disabled => "disabled",
            EnabledState::Static => "static",
            EnabledState::Masked => "masked",
            EnabledState::MaskedRuntime => "masked-runtime",
            EnabledState::Indirect => "indirect",
            EnabledState::Generated => "generated",
            EnabledState::Transient => "transient",
            EnabledState::Alias => "alias",
            EnabledState::Other(s) => s,
        }
    }

    /// Returns true if the unit starts on boot
    pub fn is_enabled(&self) -> bool {
        matches!(self, EnabledState::Enabled | EnabledState::EnabledRuntime)
    }
}

impl Default for EnabledState {
    fn default() -> Self {
        EnabledState::Static
    }
}

impl From<&str> for EnabledState {
    fn from(value: &str) -> Self {
        match value {
            "enabled" => EnabledState::Enabled,
            "enabled-runtime" => EnabledState::EnabledRuntime,
            "disabled" => EnabledState::Disabled,
            "static" => EnabledState::Static,
            "masked" => EnabledState::Masked,
            "masked-runtime" => EnabledState::MaskedRuntime,
            "indirect" => EnabledState::Indirect,
            "generated" => EnabledState::Generated,
            "transient" => EnabledState::Transient,
            "alias" => EnabledState::Alias,
            other => EnabledState::Other(other.to_string()),
        }
    }
}

impl From<String> for EnabledState {
    fn from(value: String) -> Self {
        EnabledState::from(value.as_str())
    }
}

impl From<EnabledState> for String {
    fn from(value: EnabledState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EnabledState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a unit across scopes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub scope: Scope,
    pub name: String,
}

impl UnitKey {
    pub fn new(scope: Scope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

/// UnitRecord is one service unit as observed at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub name: String,
    pub scope: Scope,
    pub active_state: ActiveState,
    pub sub_state: String,
    #[serde(default)]
    pub enabled_state: EnabledState,
    #[serde(default)]
    pub load_state: String,
    #[serde(default)]
    pub description: String,
}

impl UnitRecord {
    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.scope, self.name.clone())
    }

    /// Returns true if the unit is currently active
    pub fn is_active(&self) -> bool {
        self.active_state == ActiveState::Active
    }

    /// Returns true if the unit failed
    pub fn is_failed(&self) -> bool {
        self.active_state == ActiveState::Failed
    }

    /// Active and not sitting in a start/stop/reload substate
    pub fn is_settled_active(&self) -> bool {
        self.is_active() && !TRANSITIONAL_SUBSTATES.contains(&self.sub_state.as_str())
    }

    /// Compact `active/sub, enabled` form used in logs and CLI output
    pub fn summary(&self) -> String {
        format!("{}/{}, {}", self.active_state, self.sub_state, self.enabled_state)
    }
}

/// Service substates that mean the unit is still moving between states
pub const TRANSITIONAL_SUBSTATES: &[&str] = &[
    "start-pre",
    "start",
    "start-post",
    "reload",
    "auto-restart",
    "stop",
    "stop-sigterm",
    "stop-sigkill",
    "stop-post",
    "final-sigterm",
    "final-sigkill",
];

/// One row of `systemctl list-units --output=json`
#[derive(Debug, Clone, Deserialize)]
pub struct ListUnitsRow {
    pub unit: String,
    #[serde(default)]
    pub load: String,
    pub active: String,
    pub sub: String,
    #[serde(default)]
    pub description: String,
}

/// One row of `systemctl list-unit-files --output=json`
#[derive(Debug, Clone, Deserialize)]
pub struct ListUnitFilesRow {
    pub unit_file: String,
    pub state: String,
}
