//! Shared camp setup for integration tests: in-memory stores and one event.
#![allow(dead_code)]

use camp_tracker::stages::{ComfortLevel, ExtraItem, ExtraItemKind, FitmentData, MeasurementData};
use camp_tracker::{
    Beneficiary, EventDraft, EventScope, InMemoryObjectStore, InMemoryRecordStore, RegistrationDetails,
    StageTracker, StepPayload, TransitionRules,
};
use chrono::NaiveDate;
use std::sync::Arc;

pub const VOLUNTEER: &str = "Asha";

pub struct Camp {
    pub tracker: StageTracker,
    pub records: Arc<InMemoryRecordStore>,
    pub objects: Arc<InMemoryObjectStore>,
    pub scope: EventScope,
}

pub async fn camp() -> Camp {
    camp_with(TransitionRules::default(), true).await
}

pub async fn camp_with(rules: TransitionRules, enforce_transitions: bool) -> Camp {
    let records = Arc::new(InMemoryRecordStore::new(enforce_transitions));
    let objects = Arc::new(InMemoryObjectStore::new());
    let tracker = StageTracker::new(records.clone(), objects.clone(), rules, 5 * 1024 * 1024);
    let event = tracker
        .create_event(EventDraft {
            event_name: "Jaipur Camp".to_string(),
            event_date: camp_date(),
            location: "Jaipur".to_string(),
        })
        .await
        .expect("event should be created");
    Camp {
        tracker,
        records,
        objects,
        scope: EventScope::from(&event),
    }
}

pub fn camp_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 14).expect("valid date")
}

pub async fn register(camp: &Camp, name: &str) -> Beneficiary {
    camp.tracker
        .register(
            &camp.scope,
            RegistrationDetails {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("registration should succeed")
}

pub fn measurement() -> StepPayload {
    StepPayload::Measurement(MeasurementData {
        length: "42 cm".to_string(),
        circumference: "28 cm".to_string(),
        notes: None,
    })
}

pub fn fitment() -> StepPayload {
    StepPayload::Fitment(FitmentData {
        comfort_level: ComfortLevel::Good,
        adjustments_made: Some("Strap shortened".to_string()),
        fitment_notes: None,
    })
}

pub fn extra_items() -> StepPayload {
    StepPayload::ExtraItems {
        items: vec![ExtraItem::new(ExtraItemKind::Stick, 2)],
    }
}

pub fn volunteer() -> Option<String> {
    Some(VOLUNTEER.to_string())
}
