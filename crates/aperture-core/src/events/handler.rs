//! Event handler trait with no-op defaults.

use super::types::*;

/// Receiver for engine lifecycle events. All methods default to no-ops so
/// handlers implement only what they consume (a progress bar needs exactly
/// one method).
pub trait EngineEventHandler: Send + Sync {
    // ---- Run Lifecycle ----
    fn on_run_started(&self, _event: &RunStartedEvent) {}
    fn on_run_progress(&self, _event: &RunProgressEvent) {}
    fn on_run_complete(&self, _event: &RunCompleteEvent) {}
    fn on_run_error(&self, _event: &RunErrorEvent) {}

    // ---- Migrations ----
    fn on_migration_started(&self, _event: &MigrationStartedEvent) {}
    fn on_migration_complete(&self, _event: &MigrationCompleteEvent) {}

    // ---- Maintenance ----
    fn on_prune_complete(&self, _event: &PruneCompleteEvent) {}
}
