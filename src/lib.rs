// Tracker Import - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod entities;    // Metadata entities: org units, programs, stages
pub mod error;
pub mod logging;
pub mod metadata;    // Read-only snapshot + provider trait
pub mod model;       // Bundle and tracker entities
pub mod pipeline;    // MATERIALIZED → VALIDATED → COMMITTED/REJECTED
pub mod preheat;
pub mod report;
pub mod validation;  // Rule chain

#[cfg(test)]
mod fixtures;

// Re-export commonly used types
pub use config::ImporterConfig;
pub use db::{AuditEntry, SqliteTrackerStore, StoreCounts, TrackerStore};
pub use entities::{OrganisationUnit, Program, ProgramStage, ProgramType};
pub use error::{Result, TrackerError};
pub use metadata::{MetadataDocument, MetadataProvider, MetadataSnapshot};
pub use model::{
    load_bundle, DataValue, Enrollment, EnrollmentStatus, Event, EventStatus, ImportStrategy,
    TrackedEntity, TrackerBundle, TrackerType,
};
pub use pipeline::{BundleRun, BundleState, Rejection, TrackerImportReport, TrackerImporter};
pub use preheat::TrackerPreheat;
pub use report::{
    CommitSummary, TrackerBundleReport, TrackerErrorCode, TrackerErrorReport, TrackerStatus,
    TrackerTypeReport, TrackerValidationReport, TrackerWarningReport,
};
pub use validation::{RuleChain, ValidationUnit};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
