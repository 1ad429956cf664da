// Service manager queries via systemctl

use crate::error::{Result, WatchError};
use crate::systemd::{EnabledState, ListUnitFilesRow, ListUnitsRow, QueryKind, Scope, UnitRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Enablement lookup keyed by unit file name
pub type UnitFileStates = HashMap<String, EnabledState>;

/// Read-only access to a service manager.
///
/// Implementations hold no state between calls. Any failure (non-zero exit,
/// malformed output, timeout) is reported as [`WatchError::Query`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceManagerClient: Send + Sync {
    /// Live service units for a scope. `enabled_state` is left at its default.
    async fn fetch_units(&self, scope: Scope) -> Result<Vec<UnitRecord>>;

    /// Unit file enablement states for a scope.
    async fn fetch_unit_files(&self, scope: Scope) -> Result<UnitFileStates>;
}

/// systemctl-backed client
#[derive(Debug, Clone)]
pub struct SystemctlClient {
    program: String,
    timeout: Duration,
}

impl Default for SystemctlClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl SystemctlClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "systemctl".to_string(),
            timeout,
        }
    }

    /// Use a different executable in place of `systemctl`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Build the argument list for a query
    pub fn query_args(scope: Scope, query: QueryKind) -> Vec<&'static str> {
        let mut args = Vec::new();
        if let Some(flag) = scope.systemctl_flag() {
            args.push(flag);
        }
        match query {
            QueryKind::ListUnits => {
                args.extend(["list-units", "--type=service", "--all"]);
            }
            QueryKind::ListUnitFiles => {
                args.extend(["list-unit-files", "--type=service"]);
            }
        }
        args.extend(["--no-pager", "--plain", "--output=json"]);
        args
    }

    async fn run_query(&self, scope: Scope, query: QueryKind) -> Result<String> {
        let args = Self::query_args(scope, query);
        tracing::debug!("Running {} {}", self.program, args.join(" "));

        let query_error = |message: String| WatchError::Query {
            scope,
            query,
            message,
        };

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| query_error(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| query_error(format!("failed to spawn {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(query_error(message).into());
        }

        String::from_utf8(output.stdout)
            .map_err(|e| query_error(format!("output is not UTF-8: {}", e)).into())
    }
}

#[async_trait]
impl ServiceManagerClient for SystemctlClient {
    async fn fetch_units(&self, scope: Scope) -> Result<Vec<UnitRecord>> {
        let stdout = self.run_query(scope, QueryKind::ListUnits).await?;
        parse_units(&stdout, scope)
    }

    async fn fetch_unit_files(&self, scope: Scope) -> Result<UnitFileStates> {
        let stdout = self.run_query(scope, QueryKind::ListUnitFiles).await?;
        parse_unit_files(&stdout, scope)
    }
}

/// Parse `list-units` JSON into partial unit records
pub fn parse_units(json: &str, scope: Scope) -> Result<Vec<UnitRecord>> {
    let rows: Vec<ListUnitsRow> = serde_json::from_str(json).map_err(|e| WatchError::Query {
        scope,
        query: QueryKind::ListUnits,
        message: format!("malformed output: {}", e),
    })?;

    Ok(rows
        .into_iter()
        .map(|row| UnitRecord {
            name: row.unit,
            scope,
            active_state: row.active.into(),
            sub_state: row.sub,
            enabled_state: Default::default(),
            load_state: row.load,
            description: row.description,
        })
        .collect())
}

/// Parse `list-unit-files` JSON into a name -> state map
pub fn parse_unit_files(json: &str, scope: Scope) -> Result<UnitFileStates> {
    let rows: Vec<ListUnitFilesRow> =
        serde_json::from_str(json).map_err(|e| WatchError::Query {
            scope,
            query: QueryKind::ListUnitFiles,
            message: format!("malformed output: {}", e),
        })?;

    Ok(rows
        .into_iter()
        .map(|row| {
            // Older systemctl versions print the full path
            let name = row
                .unit_file
                .rsplit('/')
                .next()
                .unwrap_or(&row.unit_file)
                .to_string();
            (name, EnabledState::from(row.state))
        })
        .collect())
}
