// Unitwatch - Systemd Service Change Watcher
// Main entry point

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use unitwatch::app::App;
use unitwatch::config::Config;
use unitwatch::error::WatchError;
use unitwatch::store::StateStore;
use unitwatch::systemd::{ActionExecutor, ActionVerb, Scope, SystemctlActions, SystemctlClient};
use unitwatch::watcher::{ChangeClassifier, ScopedWatcher, Snapshot};

#[derive(Parser, Debug)]
#[command(name = "unitwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch system and user services and report changes until Ctrl-C.
    ///
    /// While watching, lines such as `stop a.service b.service`,
    /// `restart --user foo.service` or `game-mode on` typed on stdin run
    /// through the watcher and are not reported back as detected changes.
    Watch,
    /// Capture the current state of one scope
    Snapshot {
        /// Query the user service manager instead of the system one
        #[arg(long)]
        user: bool,
        /// Write the snapshot as JSON instead of printing it
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compare two saved snapshots
    Diff { old: PathBuf, new: PathBuf },
    /// Run enable/disable/start/stop/restart on one or more units.
    ///
    /// This runs outside any watch session, so a running `watch` reports the
    /// result as a detected change. Type the command into `watch` instead to
    /// keep it out of the change log.
    Action {
        verb: ActionVerb,
        #[arg(required = true)]
        units: Vec<String>,
        #[arg(long)]
        user: bool,
        /// Allow stopping or disabling units matching a risky pattern
        #[arg(long)]
        force: bool,
    },
    /// Show the recorded change log
    Log {
        /// Write the log to a text file instead
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Manage the set of units stopped by game mode
    GameMode {
        #[command(subcommand)]
        command: GameModeCommand,
        #[arg(long, global = true)]
        user: bool,
    },
}

#[derive(Subcommand, Debug)]
enum GameModeCommand {
    Show,
    Set {
        #[arg(required = true)]
        units: Vec<String>,
    },
    /// Stop the selected units (outside any watch session)
    On,
    /// Start the selected units again (outside any watch session)
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.clone())?;

    init_logging(&config, cli.debug)?;
    tracing::info!("unitwatch starting");

    match cli.command {
        Command::Watch => watch(config).await,
        Command::Snapshot { user, out } => snapshot(&config, scope_of(user), out.as_deref()).await,
        Command::Diff { old, new } => diff(&old, &new),
        Command::Action {
            verb,
            units,
            user,
            force,
        } => action(&config, verb, scope_of(user), &units, force).await,
        Command::Log { export } => log(&config, export.as_deref()),
        Command::GameMode { command, user } => game_mode(&config, command, scope_of(user)).await,
    }
}

fn init_logging(config: &Config, debug: bool) -> Result<()> {
    match &config.log_file {
        Some(path) => {
            let level = if debug {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            };
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("Cannot create log file {}", path.display()))?;
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::sync::Mutex::new(log_file))
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(if debug {
                    tracing::Level::DEBUG
                } else {
                    tracing::Level::INFO
                })
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn scope_of(user: bool) -> Scope {
    if user {
        Scope::User
    } else {
        Scope::System
    }
}

fn client(config: &Config) -> Arc<SystemctlClient> {
    Arc::new(SystemctlClient::new(config.query_timeout()))
}

async fn watch(config: Config) -> Result<()> {
    let client = client(&config);
    let mut app = App::new(config, client, Arc::new(SystemctlActions::default()))?;
    println!(
        "Watching {} services every {}s (Ctrl-C to stop)",
        app.config
            .scopes()
            .iter()
            .map(|s| s.label())
            .collect::<Vec<_>>()
            .join(" and "),
        app.coordinator.interval().as_secs()
    );
    app.run().await
}

async fn snapshot(config: &Config, scope: Scope, out: Option<&Path>) -> Result<()> {
    let watcher = ScopedWatcher::new(scope, client(config));
    let snapshot = watcher.fetch().await?;

    match out {
        Some(path) => {
            let json = serde_json::to_string_pretty(&snapshot)?;
            std::fs::write(path, json)?;
            println!("Saved {} {} units to {}", snapshot.len(), scope, path.display());
        }
        None => {
            for record in snapshot.records() {
                println!("{:<50} {}", record.name, record.summary());
            }
        }
    }

    Ok(())
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let snapshot = serde_json::from_str(&contents)
        .map_err(|e| WatchError::Persistence(format!("{}: {}", path.display(), e)))?;
    Ok(snapshot)
}

fn diff(old: &Path, new: &Path) -> Result<()> {
    let old = read_snapshot(old)?;
    let new = read_snapshot(new)?;

    let events = ChangeClassifier::diff(&old, &new, Utc::now());
    if events.is_empty() {
        println!("No changes");
    }
    for event in &events {
        println!("{}", event.describe());
    }
    Ok(())
}

async fn action(config: &Config, verb: ActionVerb, scope: Scope, units: &[String], force: bool) -> Result<()> {
    let guarded = config.guarded_units(verb, units);
    if !force && !guarded.is_empty() {
        bail!(
            "Refusing to {} critical unit(s) {} without --force",
            verb,
            guarded.join(", ")
        );
    }

    let executor = ActionExecutor::new(Arc::new(SystemctlActions::default()));
    executor.execute(scope, verb, units).await?;
    println!("{} {}: ok", verb, units.join(" "));
    Ok(())
}

fn log(config: &Config, export: Option<&Path>) -> Result<()> {
    let store = StateStore::new(config.state_dir()?);

    if let Some(path) = export {
        let count = store.export_change_log(path)?;
        println!("Exported {} entries to {}", count, path.display());
        return Ok(());
    }

    let entries = store.load_change_log()?;
    if entries.is_empty() {
        println!("No changes recorded");
    }
    for entry in entries {
        println!("{}", entry.format_line());
    }
    Ok(())
}

async fn game_mode(config: &Config, command: GameModeCommand, scope: Scope) -> Result<()> {
    let store = StateStore::new(config.state_dir()?);

    let verb = match command {
        GameModeCommand::Show => {
            for unit in store.load_game_mode()? {
                println!("{}", unit);
            }
            return Ok(());
        }
        GameModeCommand::Set { units } => {
            for unit in &units {
                unitwatch::systemd::validate_unit_name(unit)?;
            }
            store.save_game_mode(&units)?;
            println!("Game mode will manage {} unit(s)", store.load_game_mode()?.len());
            return Ok(());
        }
        GameModeCommand::On => ActionVerb::Stop,
        GameModeCommand::Off => ActionVerb::Start,
    };

    let units = store.load_game_mode()?;
    if units.is_empty() {
        bail!("No units selected, use `unitwatch game-mode set UNIT...` first");
    }

    let executor = ActionExecutor::new(Arc::new(SystemctlActions::default()));
    executor.execute(scope, verb, &units).await?;
    println!("Game mode {}: {} {}", if verb == ActionVerb::Stop { "on" } else { "off" }, verb, units.join(" "));
    Ok(())
}
