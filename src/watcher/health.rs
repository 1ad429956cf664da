// Query health tracking per scope

use crate::events::StatusSignal;
use crate::systemd::Scope;

/// Counts consecutive query failures for one scope and reports transitions
/// between healthy and degraded.
#[derive(Debug, Clone)]
pub struct ScopeHealth {
    scope: Scope,
    consecutive_failures: u32,
}

impl ScopeHealth {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            consecutive_failures: 0,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures == 0
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a successful query. Returns a signal on recovery.
    pub fn record_success(&mut self) -> Option<StatusSignal> {
        if self.consecutive_failures == 0 {
            return None;
        }

        let failures = self.consecutive_failures;
        tracing::info!("{} queries recovered after {} failures", self.scope, failures);
        self.consecutive_failures = 0;

        Some(StatusSignal::Recovered {
            scope: self.scope,
            failures,
        })
    }

    /// Record a failed query. Returns a signal only for the first failure in a row.
    pub fn record_failure(&mut self, error: &anyhow::Error) -> Option<StatusSignal> {
        self.consecutive_failures += 1;
        let message = error.to_string();

        if self.consecutive_failures == 1 {
            tracing::warn!("{} query failed: {}", self.scope, message);
            Some(StatusSignal::Degraded {
                scope: self.scope,
                error: message,
            })
        } else {
            // Don't spam logs while the failure persists
            tracing::debug!(
                "{} query failed ({} in a row): {}",
                self.scope,
                self.consecutive_failures,
                message
            );
            None
        }
    }
}
