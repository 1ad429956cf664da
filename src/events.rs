// Change events and the subscriber interface

use crate::error::WatchError;
use crate::systemd::{ActionVerb, Scope, UnitRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use tokio::sync::mpsc;

/// Semantic classification of a unit state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Started,
    Stopped,
    Failed,
    Enabled,
    Disabled,
    Changed,
}

impl ChangeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Started => "started",
            ChangeKind::Stopped => "stopped",
            ChangeKind::Failed => "failed",
            ChangeKind::Enabled => "enabled",
            ChangeKind::Disabled => "disabled",
            ChangeKind::Changed => "changed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One detected change for one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub scope: Scope,
    pub name: String,
    pub old_state: Option<UnitRecord>,
    pub new_state: Option<UnitRecord>,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Human readable one-liner, e.g. `[system] sshd.service stopped (active/running, enabled -> inactive/dead, enabled)`
    pub fn describe(&self) -> String {
        let state = |r: &Option<UnitRecord>| {
            r.as_ref()
                .map(|r| r.summary())
                .unwrap_or_else(|| "absent".to_string())
        };
        format!(
            "[{}] {} {} ({} -> {})",
            self.scope,
            self.name,
            self.kind,
            state(&self.old_state),
            state(&self.new_state)
        )
    }
}

/// Health status reported for a scope's query path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSignal {
    /// Queries for this scope started failing
    Degraded { scope: Scope, error: String },
    /// Queries succeed again after `failures` consecutive failures
    Recovered { scope: Scope, failures: u32 },
}

/// Observer of the watcher's output.
///
/// Callbacks run synchronously on the polling task and must not block.
pub trait ChangeSubscriber: Send + Sync {
    fn on_change(&self, events: &[ChangeEvent]);

    fn on_status(&self, _status: &StatusSignal) {}
}

impl<F> ChangeSubscriber for F
where
    F: Fn(&[ChangeEvent]) + Send + Sync,
{
    fn on_change(&self, events: &[ChangeEvent]) {
        self(events)
    }
}

/// Application events
#[derive(Debug)]
pub enum AppEvent {
    /// One merged batch from a coordinator tick
    Changes(Vec<ChangeEvent>),

    /// Query health changed for a scope
    Status(StatusSignal),

    /// Operator command read from stdin
    Command(ControlCommand),

    /// Request to quit
    Quit,
}

/// Forwards watcher output into an application event channel
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }
}

impl ChangeSubscriber for ChannelSubscriber {
    fn on_change(&self, events: &[ChangeEvent]) {
        if self.tx.send(AppEvent::Changes(events.to_vec())).is_err() {
            tracing::debug!("Event receiver dropped, discarding {} events", events.len());
        }
    }

    fn on_status(&self, status: &StatusSignal) {
        self.tx.send(AppEvent::Status(status.clone())).ok();
    }
}

/// A command typed into a running watch session, e.g. `stop --user a.service b.service`
/// or `game-mode on`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Action {
        scope: Scope,
        verb: ActionVerb,
        units: Vec<String>,
        force: bool,
    },
    GameMode { scope: Scope, enable: bool },
}

impl FromStr for ControlCommand {
    type Err = WatchError;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut scope = Scope::System;
        let mut force = false;
        let mut words = Vec::new();
        for word in line.split_whitespace() {
            match word {
                "--user" => scope = Scope::User,
                "--force" => force = true,
                other => words.push(other),
            }
        }

        match words.as_slice() {
            ["game-mode", "on"] => Ok(ControlCommand::GameMode { scope, enable: true }),
            ["game-mode", "off"] => Ok(ControlCommand::GameMode { scope, enable: false }),
            [verb, units @ ..] if !units.is_empty() => Ok(ControlCommand::Action {
                scope,
                verb: verb
                    .parse()
                    .map_err(|_| WatchError::Command(format!("unknown action '{}'", verb)))?,
                units: units.iter().map(|u| u.to_string()).collect(),
                force,
            }),
            _ => Err(WatchError::Command(format!(
                "'{}' (expected VERB [--user] [--force] UNIT... or game-mode on|off)",
                line.trim()
            ))),
        }
    }
}

/// Read operator commands from stdin, one per line.
///
/// Runs on a plain thread so a pending read never holds up runtime shutdown.
pub fn spawn_command_reader(tx: mpsc::UnboundedSender<AppEvent>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ControlCommand>() {
                Ok(command) => {
                    if tx.send(AppEvent::Command(command)).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
    });
}

/// Forward Ctrl-C as a quit event
pub async fn spawn_signal_handler(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tx.send(AppEvent::Quit).ok();
        }
    });
}
