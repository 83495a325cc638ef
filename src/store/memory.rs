use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{guard_update, BeneficiaryQuery, RecordStore, StoreError};
use crate::models::{Beneficiary, BeneficiaryId, CampEvent, EventDraft, EventId, RegistrationDetails};
use crate::stages::StageUpdate;

/// Record store held entirely in memory.
///
/// Counts every write it accepts so tests can assert that rejected actions
/// never reached the store.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    events: RwLock<HashMap<EventId, CampEvent>>,
    beneficiaries: RwLock<HashMap<BeneficiaryId, Beneficiary>>,
    enforce_transitions: bool,
    writes: AtomicU64,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl InMemoryRecordStore {
    pub fn new(enforce_transitions: bool) -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            beneficiaries: RwLock::new(HashMap::new()),
            enforce_transitions,
            writes: AtomicU64::new(0),
        }
    }

    /// Number of writes (inserts, updates, deletes) accepted so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Overwrite a row as-is, bypassing every check. Stands in for an
    /// outside client writing directly to the table.
    pub async fn put_raw(&self, beneficiary: Beneficiary) {
        self.beneficiaries
            .write()
            .await
            .insert(beneficiary.id, beneficiary);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert_event(&self, event: &CampEvent) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.id) {
            return Err(StoreError::Constraint(format!("event {} already exists", event.id)));
        }
        events.insert(event.id, event.clone());
        self.record_write();
        Ok(())
    }

    async fn get_event(&self, id: &EventId) -> Result<Option<CampEvent>, StoreError> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn list_events(&self) -> Result<Vec<CampEvent>, StoreError> {
        let mut events: Vec<CampEvent> = self.events.read().await.values().cloned().collect();
        events.sort_by(|a, b| {
            b.event_date
                .cmp(&a.event_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(events)
    }

    async fn update_event(&self, id: &EventId, draft: &EventDraft) -> Result<CampEvent, StoreError> {
        let mut events = self.events.write().await;
        let event = events.get_mut(id).ok_or_else(|| not_found("Event", id))?;
        event.event_name = draft.event_name.trim().to_string();
        event.event_date = draft.event_date;
        event.location = draft.location.trim().to_string();
        self.record_write();
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), StoreError> {
        // Beneficiaries first, the order every writer takes these locks in
        let rows = self.beneficiaries.write().await;
        let mut events = self.events.write().await;
        if rows.values().any(|b| &b.event_id == id) {
            return Err(StoreError::Constraint(format!(
                "event {id} still has registered beneficiaries"
            )));
        }
        events.remove(id).ok_or_else(|| not_found("Event", id))?;
        self.record_write();
        Ok(())
    }

    async fn count_beneficiaries(&self, event_id: &EventId) -> Result<u64, StoreError> {
        let count = self
            .beneficiaries
            .read()
            .await
            .values()
            .filter(|b| &b.event_id == event_id)
            .count();
        Ok(count as u64)
    }

    async fn insert_beneficiary(&self, beneficiary: &Beneficiary) -> Result<(), StoreError> {
        let mut rows = self.beneficiaries.write().await;
        if !self.events.read().await.contains_key(&beneficiary.event_id) {
            return Err(StoreError::Constraint(format!(
                "event {} does not exist",
                beneficiary.event_id
            )));
        }
        let duplicate = rows.values().any(|b| {
            b.id == beneficiary.id
                || (b.event_id == beneficiary.event_id && b.reg_number == beneficiary.reg_number)
        });
        if duplicate {
            return Err(StoreError::Constraint(format!(
                "registration number {} already exists for this event",
                beneficiary.reg_number
            )));
        }
        rows.insert(beneficiary.id, beneficiary.clone());
        self.record_write();
        Ok(())
    }

    async fn get_beneficiary(&self, id: &BeneficiaryId) -> Result<Option<Beneficiary>, StoreError> {
        Ok(self.beneficiaries.read().await.get(id).cloned())
    }

    async fn select_beneficiaries(&self, query: &BeneficiaryQuery) -> Result<Vec<Beneficiary>, StoreError> {
        let mut rows: Vec<Beneficiary> = self
            .beneficiaries
            .read()
            .await
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        query.sort(&mut rows);
        Ok(rows)
    }

    async fn apply_stage_update(
        &self,
        id: &BeneficiaryId,
        update: &StageUpdate,
    ) -> Result<Beneficiary, StoreError> {
        // The write lock spans check and write, so the row cannot move between them.
        let mut rows = self.beneficiaries.write().await;
        let row = rows.get_mut(id).ok_or_else(|| not_found("Beneficiary", id))?;
        guard_update(self.enforce_transitions, id, row.current_step, update)?;
        update.apply_to(row, Utc::now());
        self.record_write();
        Ok(row.clone())
    }

    async fn update_details(
        &self,
        id: &BeneficiaryId,
        details: &RegistrationDetails,
    ) -> Result<Beneficiary, StoreError> {
        let mut rows = self.beneficiaries.write().await;
        let row = rows.get_mut(id).ok_or_else(|| not_found("Beneficiary", id))?;
        row.details = details.clone();
        row.updated_at = Utc::now();
        self.record_write();
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::beneficiary_at;
    use crate::stages::{FieldWrite, Step};
    use std::collections::BTreeMap;

    async fn open_event(store: &InMemoryRecordStore, b: &Beneficiary) {
        store
            .insert_event(&CampEvent {
                id: b.event_id,
                event_name: "Jaipur Camp".into(),
                event_date: b.camp_date,
                location: "Jaipur".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    fn forward(from: Step) -> StageUpdate {
        StageUpdate {
            from,
            to: from.successor().unwrap(),
            completed_steps: vec![Step::Registration, from],
            step_volunteers: BTreeMap::new(),
            writes: vec![FieldWrite::BeforePhotoUrl(Some("https://p/x.jpg".into()))],
        }
    }

    #[tokio::test]
    async fn test_update_applies_fields_and_counts_write() {
        let store = InMemoryRecordStore::default();
        let b = beneficiary_at(Step::BeforePhoto);
        open_event(&store, &b).await;
        store.insert_beneficiary(&b).await.unwrap();
        assert_eq!(store.write_count(), 2);

        let row = store.apply_stage_update(&b.id, &forward(Step::BeforePhoto)).await.unwrap();
        assert_eq!(row.current_step, Step::Measurement);
        assert_eq!(row.before_photo_url.as_deref(), Some("https://p/x.jpg"));
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_second_identical_update_is_stale() {
        let store = InMemoryRecordStore::default();
        let b = beneficiary_at(Step::BeforePhoto);
        open_event(&store, &b).await;
        store.insert_beneficiary(&b).await.unwrap();
        store.apply_stage_update(&b.id, &forward(Step::BeforePhoto)).await.unwrap();

        let err = store
            .apply_stage_update(&b.id, &forward(Step::BeforePhoto))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleStep { .. }));
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_last_write_wins_without_enforcement() {
        let store = InMemoryRecordStore::new(false);
        let b = beneficiary_at(Step::BeforePhoto);
        open_event(&store, &b).await;
        store.insert_beneficiary(&b).await.unwrap();
        store.apply_stage_update(&b.id, &forward(Step::BeforePhoto)).await.unwrap();
        let row = store.apply_stage_update(&b.id, &forward(Step::BeforePhoto)).await.unwrap();
        assert_eq!(row.current_step, Step::Measurement);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delete_event_and_registration_do_not_interleave() {
        for _ in 0..20 {
            let store = std::sync::Arc::new(InMemoryRecordStore::default());
            let b = beneficiary_at(Step::BeforePhoto);
            open_event(&store, &b).await;

            let (deleting, inserting) = (store.clone(), store.clone());
            let (event_id, row) = (b.event_id, b.clone());
            let delete = tokio::spawn(async move { deleting.delete_event(&event_id).await });
            let insert = tokio::spawn(async move { inserting.insert_beneficiary(&row).await });
            let deleted = delete.await.unwrap().is_ok();
            let inserted = insert.await.unwrap().is_ok();

            // Exactly one side wins, and no row outlives its event
            assert_ne!(deleted, inserted);
            let event_left = store.get_event(&event_id).await.unwrap().is_some();
            let row_left = store.get_beneficiary(&b.id).await.unwrap().is_some();
            assert_eq!(event_left, row_left);
        }
    }

    #[tokio::test]
    async fn test_event_with_rows_is_not_deleted() {
        let store = InMemoryRecordStore::default();
        let b = beneficiary_at(Step::BeforePhoto);
        open_event(&store, &b).await;
        store.insert_beneficiary(&b).await.unwrap();
        assert!(matches!(
            store.delete_event(&b.event_id).await,
            Err(StoreError::Constraint(_))
        ));
        assert!(store.get_event(&b.event_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_reg_number_is_a_constraint_error() {
        let store = InMemoryRecordStore::default();
        let first = beneficiary_at(Step::BeforePhoto);
        let mut second = beneficiary_at(Step::BeforePhoto);
        second.event_id = first.event_id;
        open_event(&store, &first).await;
        store.insert_beneficiary(&first).await.unwrap();
        assert!(matches!(
            store.insert_beneficiary(&second).await,
            Err(StoreError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn test_row_for_unknown_event_is_refused() {
        let store = InMemoryRecordStore::default();
        assert!(matches!(
            store.insert_beneficiary(&beneficiary_at(Step::BeforePhoto)).await,
            Err(StoreError::Constraint(_))
        ));
        assert_eq!(store.write_count(), 0);
    }
}
