/*
 * This module consolidates the core, UI-agnostic logic of the application:
 * the selection model and its tri-state projection, the cancellable
 * background directory scan, the selective filesystem collector, the
 * exclusion pattern matcher, per-project configuration persistence, and the
 * writers for the tree-map export, the content dump, and the tar.gz backup.
 */
pub mod backup;
pub mod collector;
pub mod config;
pub mod exclusions;
pub mod models;
pub mod project;
pub mod projection;
pub mod reports;
pub mod scanner;
pub mod selection;

// Re-export key structures and enums
pub use models::{CheckState, CollectedItem, EntryKind, SnapshotEntry, TreeSnapshot};

// Re-export selection and projection items
pub use projection::{Projection, project_all};
pub use selection::SelectionStore;

// Re-export scan related items
pub use scanner::{
    MAX_SCAN_BUDGET, ScanHandle, ScanMessage, ScanOutcome, ScanReport, TimeoutDecision,
    spawn_scan,
};

// Re-export exclusion related items
pub use exclusions::{ExclusionMatcher, RemovalOutcome};

// Re-export config related items
pub use config::{ConfigManagerOperations, CoreConfigManager, LoadedConfig};

#[cfg(test)]
pub use config::ConfigError;

// Re-export project layout and writer entry points
pub use backup::export_backup;
pub use collector::collect;
pub use project::ProjectContext;
pub use reports::{export_content_dump, export_tree_map};
