// Camp Tracker Library - stage tracking for limb distribution camps
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod models;
pub mod objects;
pub mod scope;
pub mod stages;
pub mod store;
pub mod telemetry;
pub mod tracker;

// Re-export key types for easy access
pub use config::{config, init_config, CampTrackerConfig};
pub use models::{Beneficiary, BeneficiaryId, BeneficiaryRef, CampEvent, EventDraft, EventId, RegNumber, RegistrationDetails, TypeOfAid};
pub use objects::{
    InMemoryObjectStore, LocalObjectStore, ObjectStore, ObjectStoreError, PhotoCompression, PhotoKind,
};
pub use scope::{EventScope, EventSelector};
pub use stages::{StageAction, StageMachine, Step, StepPayload, TransitionError, TransitionPlan, TransitionRules};
pub use store::{BeneficiaryQuery, InMemoryRecordStore, RecordStore, StoreError};
#[cfg(feature = "database")]
pub use store::SqliteRecordStore;
pub use telemetry::{create_stage_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use tracker::{CampSummary, ExportRange, ExportRow, StageTracker, TrackerError, TransitionOutcome};
