// Stage tracker - the service every desk talks to
//
// Loads a beneficiary, asks the stage machine for a plan, and sends the plan
// to the record store as one write. Photos go to the object store first.

pub mod export;
pub mod summary;

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

use crate::models::{
    Beneficiary, BeneficiaryId, BeneficiaryRef, CampEvent, EventDraft, EventId, RegNumber, RegistrationDetails,
};
use crate::objects::{
    content_type_for, photo_object_name, ObjectStore, ObjectStoreError, PhotoCompression, PhotoKind,
};
use crate::scope::EventScope;
use crate::stages::{StageAction, StageMachine, Step, StepPayload, TransitionError, TransitionPlan, TransitionRules};
use crate::store::{BeneficiaryQuery, QueryOrder, RecordStore, StoreError};
use crate::telemetry::{create_stage_span, generate_correlation_id};

pub use export::{export_file_name, ExportRange, ExportRow};
pub use summary::{summarize, CampSummary};

/// Registration retries when another desk takes the same number first.
const REGISTER_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Objects(#[from] ObjectStoreError),

    #[error("No event selected; run `camp-tracker event select <id>` first")]
    NoEventSelected,

    #[error("Event {0} not found")]
    EventNotFound(String),

    #[error("Beneficiary {0} not found in this event")]
    BeneficiaryNotFound(String),

    #[error("Invalid details: {0}")]
    InvalidDetails(String),

    #[error("Beneficiary {id} belongs to a different event")]
    NotInEvent { id: BeneficiaryId, event_id: EventId },
}

impl TrackerError {
    /// True when the action was rejected before anything was written.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TrackerError::Transition(_)
                | TrackerError::InvalidDetails(_)
                | TrackerError::Store(StoreError::StaleStep { .. })
                | TrackerError::Store(StoreError::IllegalTransition { .. })
        )
    }
}

/// Result of an accepted stage action.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied {
        beneficiary: Beneficiary,
        from: Step,
        to: Step,
    },
    /// The beneficiary had already moved past `step`; nothing was written.
    AlreadyApplied { beneficiary: Beneficiary, step: Step },
}

impl TransitionOutcome {
    pub fn beneficiary(&self) -> &Beneficiary {
        match self {
            TransitionOutcome::Applied { beneficiary, .. } => beneficiary,
            TransitionOutcome::AlreadyApplied { beneficiary, .. } => beneficiary,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

pub struct StageTracker {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    rules: TransitionRules,
    max_photo_bytes: u64,
    compression: Option<PhotoCompression>,
}

impl StageTracker {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        rules: TransitionRules,
        max_photo_bytes: u64,
    ) -> Self {
        Self {
            records,
            objects,
            rules,
            max_photo_bytes,
            compression: Some(PhotoCompression::default()),
        }
    }

    /// Photo compression applied before upload; `None` stores photos as given.
    pub fn with_compression(mut self, compression: Option<PhotoCompression>) -> Self {
        self.compression = compression;
        self
    }

    pub fn rules(&self) -> &TransitionRules {
        &self.rules
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    // Events

    pub async fn create_event(&self, draft: EventDraft) -> Result<CampEvent, TrackerError> {
        draft.validate().map_err(TrackerError::InvalidDetails)?;
        let event = draft.into_event(Utc::now());
        self.records.insert_event(&event).await?;
        info!(event_id = %event.id, event_name = %event.event_name, event_date = %event.event_date, "Camp event created");
        Ok(event)
    }

    pub async fn list_events(&self) -> Result<Vec<CampEvent>, TrackerError> {
        Ok(self.records.list_events().await?)
    }

    pub async fn get_event(&self, id: &EventId) -> Result<CampEvent, TrackerError> {
        self.records
            .get_event(id)
            .await?
            .ok_or_else(|| TrackerError::EventNotFound(id.to_string()))
    }

    pub async fn update_event(&self, id: &EventId, draft: EventDraft) -> Result<CampEvent, TrackerError> {
        draft.validate().map_err(TrackerError::InvalidDetails)?;
        match self.records.update_event(id, &draft).await {
            Ok(event) => {
                info!(event_id = %event.id, "Camp event updated");
                Ok(event)
            }
            Err(StoreError::NotFound { .. }) => Err(TrackerError::EventNotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_event(&self, id: &EventId) -> Result<(), TrackerError> {
        match self.records.delete_event(id).await {
            Ok(()) => {
                info!(event_id = %id, "Camp event deleted");
                Ok(())
            }
            Err(StoreError::NotFound { .. }) => Err(TrackerError::EventNotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Scope for an existing event.
    pub async fn open_scope(&self, id: &EventId) -> Result<EventScope, TrackerError> {
        let event = self.get_event(id).await?;
        Ok(EventScope::from(&event))
    }

    // Registration desk

    /// Register a beneficiary into the event with the next sequential number.
    pub async fn register(
        &self,
        scope: &EventScope,
        details: RegistrationDetails,
    ) -> Result<Beneficiary, TrackerError> {
        let details = details
            .normalized(Utc::now().date_naive())
            .map_err(TrackerError::InvalidDetails)?;
        // A remembered selection can outlive its event
        self.get_event(&scope.event_id).await?;

        let mut attempt = 1;
        loop {
            let count = self.records.count_beneficiaries(&scope.event_id).await?;
            let beneficiary = Beneficiary::registered(
                scope.event_id,
                RegNumber::sequential(count + 1),
                scope.event_date,
                details.clone(),
                Utc::now(),
            );

            match self.records.insert_beneficiary(&beneficiary).await {
                Ok(()) => {
                    info!(
                        beneficiary.id = %beneficiary.id,
                        reg_number = %beneficiary.reg_number,
                        event_id = %scope.event_id,
                        "Beneficiary registered"
                    );
                    return Ok(beneficiary);
                }
                Err(StoreError::Constraint(reason)) if attempt < REGISTER_ATTEMPTS => {
                    warn!(attempt, "Registration number taken, retrying: {}", reason);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Beneficiaries waiting at `step`, oldest registration first.
    pub async fn queue(&self, scope: &EventScope, step: Step) -> Result<Vec<Beneficiary>, TrackerError> {
        let query = BeneficiaryQuery::for_event(scope.event_id)
            .at_step(step)
            .ordered(QueryOrder::CreatedAsc);
        Ok(self.records.select_beneficiaries(&query).await?)
    }

    /// Every beneficiary in the event, newest first.
    pub async fn list_beneficiaries(&self, scope: &EventScope) -> Result<Vec<Beneficiary>, TrackerError> {
        let query = BeneficiaryQuery::for_event(scope.event_id).ordered(QueryOrder::CreatedDesc);
        Ok(self.records.select_beneficiaries(&query).await?)
    }

    pub async fn find(&self, scope: &EventScope, reference: &BeneficiaryRef) -> Result<Beneficiary, TrackerError> {
        match reference {
            BeneficiaryRef::Id(id) => self.load(scope, id).await,
            BeneficiaryRef::RegNumber(reg) => {
                let query = BeneficiaryQuery::for_event(scope.event_id).with_reg_number(reg.clone());
                self.records
                    .select_beneficiaries(&query)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| TrackerError::BeneficiaryNotFound(reg.to_string()))
            }
        }
    }

    async fn load(&self, scope: &EventScope, id: &BeneficiaryId) -> Result<Beneficiary, TrackerError> {
        let beneficiary = self
            .records
            .get_beneficiary(id)
            .await?
            .ok_or_else(|| TrackerError::BeneficiaryNotFound(id.to_string()))?;
        if beneficiary.event_id != scope.event_id {
            return Err(TrackerError::NotInEvent {
                id: *id,
                event_id: beneficiary.event_id,
            });
        }
        Ok(beneficiary)
    }

    // Stage desks

    pub async fn advance(
        &self,
        scope: &EventScope,
        id: &BeneficiaryId,
        payload: StepPayload,
        volunteer: Option<String>,
    ) -> Result<TransitionOutcome, TrackerError> {
        self.transition(scope, id, StageAction::Advance { payload, volunteer })
            .await
    }

    pub async fn complete_without_payload(
        &self,
        scope: &EventScope,
        id: &BeneficiaryId,
        step: Step,
        volunteer: Option<String>,
    ) -> Result<TransitionOutcome, TrackerError> {
        self.transition(scope, id, StageAction::CompleteWithoutPayload { step, volunteer })
            .await
    }

    pub async fn revert(
        &self,
        scope: &EventScope,
        id: &BeneficiaryId,
        step: Step,
    ) -> Result<TransitionOutcome, TrackerError> {
        self.transition(scope, id, StageAction::Revert { step }).await
    }

    pub async fn cancel(
        &self,
        scope: &EventScope,
        id: &BeneficiaryId,
        reason: Option<String>,
    ) -> Result<TransitionOutcome, TrackerError> {
        self.transition(scope, id, StageAction::Cancel { reason }).await
    }

    /// Store a photo and advance the matching photo step with its URL.
    ///
    /// The step is checked before the upload, so a photo for a beneficiary
    /// at the wrong desk never reaches the object store. Photos are
    /// compressed to JPEG first unless compression is switched off; bytes
    /// that do not decode as an image are stored as given.
    pub async fn upload_photo(
        &self,
        scope: &EventScope,
        id: &BeneficiaryId,
        kind: PhotoKind,
        bytes: &[u8],
        extension: &str,
        volunteer: Option<String>,
    ) -> Result<TransitionOutcome, TrackerError> {
        let size = bytes.len() as u64;
        if size > self.max_photo_bytes {
            return Err(ObjectStoreError::TooLarge {
                size,
                limit: self.max_photo_bytes,
            }
            .into());
        }
        if bytes.is_empty() {
            return Err(TransitionError::ValidationFailed {
                step: kind.step(),
                reason: "Photo is empty".to_string(),
            }
            .into());
        }

        let beneficiary = self.load(scope, id).await?;
        let pending = photo_payload(kind, format!("pending://{kind}"));
        let action = StageAction::Advance {
            payload: pending,
            volunteer: volunteer.clone(),
        };
        if let TransitionPlan::AlreadyApplied { step, .. } = StageMachine::evaluate(&self.rules, &beneficiary, action)? {
            return Ok(TransitionOutcome::AlreadyApplied { beneficiary, step });
        }

        let (stored, extension) = self.prepare_photo(id, bytes, extension).await?;
        let name = photo_object_name(kind, id, &extension, Utc::now());
        let url = self
            .objects
            .upload(&name, &stored, content_type_for(&extension))
            .await?;
        info!(beneficiary.id = %id, object = %name, size = stored.len(), original_size = size, "Photo uploaded");

        let result = self.advance(scope, id, photo_payload(kind, url), volunteer).await;
        if !matches!(result, Ok(TransitionOutcome::Applied { .. })) {
            self.discard_photo(id, &name).await;
        }
        result
    }

    async fn prepare_photo(
        &self,
        id: &BeneficiaryId,
        bytes: &[u8],
        extension: &str,
    ) -> Result<(Vec<u8>, String), TrackerError> {
        let Some(compression) = self.compression else {
            return Ok((bytes.to_vec(), extension.to_string()));
        };

        let original = bytes.to_vec();
        let (original, compressed) = tokio::task::spawn_blocking(move || {
            let compressed = compression.compress(&original);
            (original, compressed)
        })
        .await
        .map_err(|e| ObjectStoreError::Compression(e.to_string()))?;

        match compressed {
            Ok(photo) => {
                debug!(
                    beneficiary.id = %id,
                    width = photo.width,
                    height = photo.height,
                    quality = photo.quality,
                    "Photo compressed"
                );
                Ok((photo.bytes, "jpg".to_string()))
            }
            Err(e) => {
                warn!(beneficiary.id = %id, "Photo not compressed, storing as given: {}", e);
                Ok((original, extension.to_string()))
            }
        }
    }

    /// Remove a photo whose step change did not land.
    async fn discard_photo(&self, id: &BeneficiaryId, name: &str) {
        match self.objects.delete(name).await {
            Ok(()) => warn!(beneficiary.id = %id, object = %name, "Removed photo whose step change did not land"),
            Err(e) => warn!(beneficiary.id = %id, object = %name, "Photo left orphaned in storage: {}", e),
        }
    }

    /// Edit registration details. Step fields are left alone.
    pub async fn update_details(
        &self,
        scope: &EventScope,
        id: &BeneficiaryId,
        details: RegistrationDetails,
    ) -> Result<Beneficiary, TrackerError> {
        self.load(scope, id).await?;
        let details = details
            .normalized(Utc::now().date_naive())
            .map_err(TrackerError::InvalidDetails)?;
        let updated = self.records.update_details(id, &details).await?;
        info!(beneficiary.id = %id, reg_number = %updated.reg_number, "Beneficiary details updated");
        Ok(updated)
    }

    // Reporting

    pub async fn summary(&self, scope: &EventScope) -> Result<CampSummary, TrackerError> {
        let rows = self
            .records
            .select_beneficiaries(&BeneficiaryQuery::for_event(scope.event_id))
            .await?;
        Ok(summarize(&rows))
    }

    /// Export rows by camp date, newest camp first. `scope` limits the export
    /// to one event; `None` exports every event in the range.
    pub async fn export(
        &self,
        scope: Option<&EventScope>,
        range: &ExportRange,
    ) -> Result<Vec<ExportRow>, TrackerError> {
        let mut query = BeneficiaryQuery::default()
            .camp_dates(range.from, range.to)
            .ordered(QueryOrder::CampDateDesc);
        query.event_id = scope.map(|s| s.event_id);

        let rows = self.records.select_beneficiaries(&query).await?;
        info!(rows = rows.len(), file = %export_file_name(range), "Export prepared");
        Ok(rows.iter().map(ExportRow::from).collect())
    }

    async fn transition(
        &self,
        scope: &EventScope,
        id: &BeneficiaryId,
        action: StageAction,
    ) -> Result<TransitionOutcome, TrackerError> {
        let correlation_id = generate_correlation_id();
        let span = create_stage_span(
            action.name(),
            Some(&scope.event_id.to_string()),
            Some(&id.to_string()),
            Some(&correlation_id),
        );

        async move {
            let beneficiary = self.load(scope, id).await?;
            let action_name = action.name();

            let plan = StageMachine::evaluate(&self.rules, &beneficiary, action).map_err(|e| {
                warn!(
                    beneficiary.id = %id,
                    reg_number = %beneficiary.reg_number,
                    action = action_name,
                    "Stage action rejected: {}",
                    e
                );
                e
            })?;

            match plan {
                TransitionPlan::AlreadyApplied { step, current } => {
                    info!(
                        beneficiary.id = %id,
                        reg_number = %beneficiary.reg_number,
                        step = %step,
                        current = %current,
                        "Step already applied, nothing to write"
                    );
                    Ok(TransitionOutcome::AlreadyApplied { beneficiary, step })
                }
                TransitionPlan::Apply(update) => {
                    let updated = match self.records.apply_stage_update(id, &update).await {
                        Ok(updated) => updated,
                        Err(e) => {
                            warn!(
                                beneficiary.id = %id,
                                reg_number = %beneficiary.reg_number,
                                from = %update.from,
                                to = %update.to,
                                "Stage update refused by store: {}",
                                e
                            );
                            return Err(e.into());
                        }
                    };
                    info!(
                        beneficiary.id = %id,
                        reg_number = %updated.reg_number,
                        from = %update.from,
                        to = %update.to,
                        action = action_name,
                        "Stage transition applied"
                    );
                    Ok(TransitionOutcome::Applied {
                        beneficiary: updated,
                        from: update.from,
                        to: update.to,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn photo_payload(kind: PhotoKind, photo_url: String) -> StepPayload {
    match kind {
        PhotoKind::Before => StepPayload::BeforePhoto { photo_url },
        PhotoKind::After => StepPayload::AfterPhoto { photo_url },
    }
}
