// Record store - the hosted table the desks read from and write to
//
// Two implementations: an in-memory map for tests and single-process use,
// and SQLite behind the `database` feature. Both run every stage update
// through `guard_update` before committing it.

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{Beneficiary, BeneficiaryId, CampEvent, EventDraft, EventId, RegNumber, RegistrationDetails};
use crate::stages::{StageUpdate, Step};

pub use memory::InMemoryRecordStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteRecordStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Beneficiary {id} moved to {actual} before this update (expected {expected}); reload and retry")]
    StaleStep { id: String, expected: Step, actual: Step },

    #[error("Transition {from} -> {to} is not allowed")]
    IllegalTransition { from: Step, to: Step },

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Stored step '{0}' is not a known step")]
    UnknownStep(String),

    #[error("Stored value is malformed: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOrder {
    /// Oldest registration first, the order a desk works its queue in.
    #[default]
    CreatedAsc,
    CreatedDesc,
    CampDateDesc,
}

/// Filter-by-field select over beneficiary rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeneficiaryQuery {
    pub event_id: Option<EventId>,
    pub current_step: Option<Step>,
    pub reg_number: Option<RegNumber>,
    pub camp_date_from: Option<NaiveDate>,
    pub camp_date_to: Option<NaiveDate>,
    pub order: QueryOrder,
}

impl BeneficiaryQuery {
    pub fn for_event(event_id: EventId) -> Self {
        Self {
            event_id: Some(event_id),
            ..Default::default()
        }
    }

    pub fn at_step(mut self, step: Step) -> Self {
        self.current_step = Some(step);
        self
    }

    pub fn with_reg_number(mut self, reg_number: RegNumber) -> Self {
        self.reg_number = Some(reg_number);
        self
    }

    pub fn camp_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.camp_date_from = from;
        self.camp_date_to = to;
        self
    }

    pub fn ordered(mut self, order: QueryOrder) -> Self {
        self.order = order;
        self
    }

    pub fn matches(&self, b: &Beneficiary) -> bool {
        self.event_id.map_or(true, |e| b.event_id == e)
            && self.current_step.map_or(true, |s| b.current_step == s)
            && self.reg_number.as_ref().map_or(true, |r| &b.reg_number == r)
            && self.camp_date_from.map_or(true, |d| b.camp_date >= d)
            && self.camp_date_to.map_or(true, |d| b.camp_date <= d)
    }

    pub fn sort(&self, rows: &mut [Beneficiary]) {
        match self.order {
            QueryOrder::CreatedAsc => rows.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            QueryOrder::CreatedDesc => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            QueryOrder::CampDateDesc => rows.sort_by(|a, b| {
                b.camp_date
                    .cmp(&a.camp_date)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            }),
        }
    }
}

/// Storage-side transition check.
///
/// `stored` is the step currently persisted for the row. With enforcement
/// off the store accepts any write, last write wins.
pub fn guard_update(
    enforce: bool,
    id: &BeneficiaryId,
    stored: Step,
    update: &StageUpdate,
) -> Result<(), StoreError> {
    if !enforce {
        return Ok(());
    }
    if !update.is_legal() {
        return Err(StoreError::IllegalTransition {
            from: update.from,
            to: update.to,
        });
    }
    if stored != update.from {
        return Err(StoreError::StaleStep {
            id: id.to_string(),
            expected: update.from,
            actual: stored,
        });
    }
    Ok(())
}

/// Queryable table of events and beneficiary rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_event(&self, event: &CampEvent) -> Result<(), StoreError>;

    async fn get_event(&self, id: &EventId) -> Result<Option<CampEvent>, StoreError>;

    /// Most recent camp first.
    async fn list_events(&self) -> Result<Vec<CampEvent>, StoreError>;

    async fn update_event(&self, id: &EventId, draft: &EventDraft) -> Result<CampEvent, StoreError>;

    /// Refuses to delete an event that still has beneficiaries.
    async fn delete_event(&self, id: &EventId) -> Result<(), StoreError>;

    async fn count_beneficiaries(&self, event_id: &EventId) -> Result<u64, StoreError>;

    /// Fails with `Constraint` if the registration number is already taken
    /// within the event.
    async fn insert_beneficiary(&self, beneficiary: &Beneficiary) -> Result<(), StoreError>;

    async fn get_beneficiary(&self, id: &BeneficiaryId) -> Result<Option<Beneficiary>, StoreError>;

    async fn select_beneficiaries(&self, query: &BeneficiaryQuery) -> Result<Vec<Beneficiary>, StoreError>;

    /// Apply one stage update as a single row write and return the new row.
    async fn apply_stage_update(
        &self,
        id: &BeneficiaryId,
        update: &StageUpdate,
    ) -> Result<Beneficiary, StoreError>;

    /// Replace the registration details; step fields are left alone.
    async fn update_details(
        &self,
        id: &BeneficiaryId,
        details: &RegistrationDetails,
    ) -> Result<Beneficiary, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::beneficiary_at;
    use std::collections::BTreeMap;

    fn update(from: Step, to: Step) -> StageUpdate {
        StageUpdate {
            from,
            to,
            completed_steps: vec![],
            step_volunteers: BTreeMap::new(),
            writes: vec![],
        }
    }

    #[test]
    fn test_guard_detects_stale_rows() {
        let id = BeneficiaryId::new();
        let err = guard_update(true, &id, Step::Fitment, &update(Step::Measurement, Step::Fitment)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::StaleStep {
                expected: Step::Measurement,
                actual: Step::Fitment,
                ..
            }
        ));
    }

    #[test]
    fn test_guard_rejects_jumps_and_can_be_disabled() {
        let id = BeneficiaryId::new();
        let jump = update(Step::BeforePhoto, Step::Completed);
        assert!(matches!(
            guard_update(true, &id, Step::BeforePhoto, &jump),
            Err(StoreError::IllegalTransition { .. })
        ));
        assert!(guard_update(false, &id, Step::Fitment, &jump).is_ok());
    }

    #[test]
    fn test_query_matching() {
        let b = beneficiary_at(Step::Measurement);
        assert!(BeneficiaryQuery::for_event(b.event_id).at_step(Step::Measurement).matches(&b));
        assert!(!BeneficiaryQuery::for_event(b.event_id).at_step(Step::Fitment).matches(&b));
        assert!(!BeneficiaryQuery::for_event(EventId::new()).matches(&b));
        assert!(!BeneficiaryQuery::default()
            .camp_dates(b.camp_date.succ_opt(), None)
            .matches(&b));
    }
}
