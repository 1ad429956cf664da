// Headless application: runs the coordinator and consumes its event stream

use crate::config::Config;
use crate::error::{Result, WatchError};
use crate::events::{
    spawn_command_reader, spawn_signal_handler, AppEvent, ChangeEvent, ChannelSubscriber, ControlCommand,
    StatusSignal,
};
use crate::store::{ChangeLogEntry, ChangeOrigin, StateStore};
use crate::systemd::{ActionExecutor, ActionRunner, ActionVerb, ServiceManagerClient};
use crate::watcher::WatcherCoordinator;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Main application state
pub struct App {
    pub config: Config,
    pub store: StateStore,
    pub coordinator: WatcherCoordinator,
    pub executor: ActionExecutor,
    pub should_quit: bool,
    pub changes_seen: usize,
    tx: mpsc::UnboundedSender<AppEvent>,
    rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl App {
    pub fn new(
        config: Config,
        client: Arc<dyn ServiceManagerClient>,
        runner: Arc<dyn ActionRunner>,
    ) -> Result<Self> {
        let store = StateStore::new(config.state_dir()?);
        let coordinator = WatcherCoordinator::new(client, &config.scopes(), config.poll_interval());
        let executor = ActionExecutor::new(runner).with_coordinator(coordinator.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            store,
            coordinator,
            executor,
            should_quit: false,
            changes_seen: 0,
            tx,
            rx,
        })
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    /// Run until Ctrl-C, accepting action commands on stdin
    pub async fn run(&mut self) -> Result<()> {
        spawn_signal_handler(self.sender()).await;
        spawn_command_reader(self.sender());

        if self.config.detect_offline_changes {
            self.reconcile_offline().await?;
        }

        let subscriber = Arc::new(ChannelSubscriber::new(self.sender()));
        self.coordinator.start(subscriber).await;

        while let Some(event) = self.rx.recv().await {
            self.handle_event(event).await?;
            if self.should_quit {
                break;
            }
        }

        self.shutdown().await
    }

    /// Report what changed since the snapshot saved by the last session,
    /// then drop that snapshot.
    pub async fn reconcile_offline(&mut self) -> Result<usize> {
        let persisted = match self.store.load_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!("No previous snapshot, skipping offline reconciliation");
                return Ok(0);
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable snapshot: {}", e);
                self.store.clear_snapshot()?;
                return Ok(0);
            }
        };

        let events = self.coordinator.detect_offline_changes(&persisted).await?;
        self.record(&events, ChangeOrigin::Offline)?;
        self.store.clear_snapshot()?;
        Ok(events.len())
    }

    pub async fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Changes(events) => {
                self.record(&events, ChangeOrigin::Detected)?;
                self.persist_snapshot().await;
            }
            AppEvent::Status(StatusSignal::Degraded { scope, error }) => {
                eprintln!("! {} service manager unavailable: {}", scope, error);
            }
            AppEvent::Status(StatusSignal::Recovered { scope, failures }) => {
                eprintln!("  {} service manager reachable again after {} failed polls", scope, failures);
            }
            AppEvent::Command(command) => {
                // A failed action is reported, the session keeps running
                if let Err(e) = self.run_command(command).await {
                    eprintln!("! {}", e);
                }
            }
            AppEvent::Quit => {
                tracing::info!("Quit requested");
                self.should_quit = true;
            }
        }

        Ok(())
    }

    /// Run an operator action through the coordinator so its effects are
    /// folded into the baseline instead of being reported as changes.
    pub async fn run_command(&mut self, command: ControlCommand) -> Result<()> {
        let (scope, verb, units) = match command {
            ControlCommand::Action {
                scope,
                verb,
                units,
                force,
            } => {
                let guarded = self.config.guarded_units(verb, &units);
                if !force && !guarded.is_empty() {
                    return Err(WatchError::Command(format!(
                        "refusing to {} critical unit(s) {} without --force",
                        verb,
                        guarded.join(", ")
                    ))
                    .into());
                }
                (scope, verb, units)
            }
            ControlCommand::GameMode { scope, enable } => {
                let units = self.store.load_game_mode()?;
                if units.is_empty() {
                    return Err(WatchError::Command("no game-mode units selected".to_string()).into());
                }
                let verb = if enable { ActionVerb::Stop } else { ActionVerb::Start };
                (scope, verb, units)
            }
        };

        self.executor.execute_bulk(scope, verb, &units).await?;
        println!("{} {} ({}): ok", verb, units.join(" "), scope);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.coordinator.shutdown().await;
        self.persist_snapshot().await;
        println!("unitwatch stopped.");
        Ok(())
    }

    fn record(&mut self, events: &[ChangeEvent], origin: ChangeOrigin) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let prefix = match origin {
            ChangeOrigin::Detected => "",
            ChangeOrigin::Offline => "(while closed) ",
        };
        for event in events {
            println!("{}{}", prefix, event.describe());
        }

        let entries: Vec<ChangeLogEntry> = events
            .iter()
            .map(|e| ChangeLogEntry::from_event(e, origin))
            .collect();
        self.store.append_change_log(&entries, self.config.change_log_limit)?;
        self.changes_seen += events.len();
        Ok(())
    }

    async fn persist_snapshot(&self) {
        let snapshot = self.coordinator.combined_snapshot().await;
        if snapshot.is_empty() {
            return;
        }
        if let Err(e) = self.store.save_snapshot(&snapshot) {
            tracing::warn!("Failed to save snapshot: {}", e);
        }
    }
}
