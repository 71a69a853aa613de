use std::cell::Cell;
use tracing::{debug, error, warn};

/// Error tracking for the synchronization loop
#[derive(Default)]
pub struct ErrorTracker {
    query_errors: Cell<u64>,
    overlay_errors: Cell<u64>,
    release_errors: Cell<u64>,
    degraded: Cell<bool>,
}

pub enum ErrorCategory {
    Query,
    Overlay,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub query_errors: u64,
    pub overlay_errors: u64,
    pub release_errors: u64,
    pub is_healthy: bool,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, category: ErrorCategory, operation: &str, error: impl std::fmt::Display) {
        match category {
            ErrorCategory::Query => {
                self.query_errors.set(self.query_errors.get() + 1);
                warn!("Query error in {}: {}", operation, error);
            }
            ErrorCategory::Overlay => {
                self.overlay_errors.set(self.overlay_errors.get() + 1);
                warn!("Overlay error in {}: {}", operation, error);
            }
            ErrorCategory::Release => {
                self.release_errors.set(self.release_errors.get() + 1);
                warn!("Release error in {}: {}", operation, error);
            }
        }
    }

    /// Log and swallow a failed cleanup step.
    pub fn release<T, E: std::fmt::Display>(&self, result: Result<T, E>, operation: &str) {
        if let Err(e) = result {
            self.record(ErrorCategory::Release, operation, e);
        }
    }

    pub fn health_check(&self) -> HealthStatus {
        let query = self.query_errors.get();
        let overlay = self.overlay_errors.get();
        let release = self.release_errors.get();

        HealthStatus {
            query_errors: query,
            overlay_errors: overlay,
            release_errors: release,
            is_healthy: query < 10 && overlay < 20,
        }
    }

    /// The current health, but only on the check where tracking first turns
    /// degraded. Counters never go down, so this fires at most once.
    pub fn newly_degraded(&self) -> Option<HealthStatus> {
        let health = self.health_check();
        let was_degraded = self.degraded.replace(!health.is_healthy);
        (!health.is_healthy && !was_degraded).then_some(health)
    }
}

/// Log the final error tally once the loop is done.
pub fn report(tracker: &ErrorTracker) {
    let health = tracker.health_check();
    if health.query_errors + health.overlay_errors + health.release_errors == 0 {
        return;
    }
    if health.is_healthy {
        debug!("Session errors: {:?}", health);
    } else {
        error!(
            "Session ended degraded: {} query, {} overlay, {} release errors",
            health.query_errors, health.overlay_errors, health.release_errors
        );
    }
}
