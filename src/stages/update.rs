use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::payload::{ExtraItem, FitmentData, MeasurementData};
use super::Step;
use crate::models::Beneficiary;

/// A single column write carried by a stage update. `None` nulls the column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldWrite {
    BeforePhotoUrl(Option<String>),
    MeasurementData(Option<MeasurementData>),
    FitmentData(Option<FitmentData>),
    ExtraItems(Option<Vec<ExtraItem>>),
    AfterPhotoUrl(Option<String>),
    CancelReason(Option<String>),
}

impl FieldWrite {
    /// Writes that null out every payload column owned by `step`.
    pub fn clear_for(step: Step) -> Vec<FieldWrite> {
        match step {
            Step::BeforePhoto => vec![FieldWrite::BeforePhotoUrl(None)],
            Step::Measurement => vec![FieldWrite::MeasurementData(None)],
            Step::Fitment => vec![FieldWrite::FitmentData(None)],
            Step::ExtraItems => vec![FieldWrite::ExtraItems(None)],
            Step::AfterPhoto => vec![FieldWrite::AfterPhotoUrl(None)],
            Step::Registration | Step::Completed | Step::Cancelled => Vec::new(),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            FieldWrite::BeforePhotoUrl(_) => "before_photo_url",
            FieldWrite::MeasurementData(_) => "measurement_data",
            FieldWrite::FitmentData(_) => "fitment_data",
            FieldWrite::ExtraItems(_) => "extra_items",
            FieldWrite::AfterPhotoUrl(_) => "after_photo_url",
            FieldWrite::CancelReason(_) => "cancel_reason",
        }
    }

    fn apply_to(&self, beneficiary: &mut Beneficiary) {
        match self {
            FieldWrite::BeforePhotoUrl(v) => beneficiary.before_photo_url = v.clone(),
            FieldWrite::MeasurementData(v) => beneficiary.measurement_data = v.clone(),
            FieldWrite::FitmentData(v) => beneficiary.fitment_data = v.clone(),
            FieldWrite::ExtraItems(v) => beneficiary.extra_items = v.clone(),
            FieldWrite::AfterPhotoUrl(v) => beneficiary.after_photo_url = v.clone(),
            FieldWrite::CancelReason(v) => beneficiary.cancel_reason = v.clone(),
        }
    }
}

/// The one partial update a transition sends to the record store.
///
/// Payload columns and the step change travel together, so a store with
/// per-row atomic updates applies the whole transition or none of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageUpdate {
    /// Step the beneficiary was at when the update was planned.
    pub from: Step,
    pub to: Step,
    pub completed_steps: Vec<Step>,
    pub step_volunteers: BTreeMap<Step, String>,
    pub writes: Vec<FieldWrite>,
}

impl StageUpdate {
    /// Whether `from -> to` is in the fixed transition table.
    pub fn is_legal(&self) -> bool {
        if self.from.is_terminal() {
            return false;
        }
        self.to == Step::Cancelled
            || self.from.successor() == Some(self.to)
            || self.from.predecessor() == Some(self.to)
    }

    pub fn apply_to(&self, beneficiary: &mut Beneficiary, now: DateTime<Utc>) {
        beneficiary.current_step = self.to;
        beneficiary.completed_steps = self.completed_steps.clone();
        beneficiary.step_volunteers = self.step_volunteers.clone();
        for write in &self.writes {
            write.apply_to(beneficiary);
        }
        beneficiary.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_table_allows_neighbours_and_cancel() {
        assert!(update(Step::Measurement, Step::Fitment).is_legal());
        assert!(update(Step::Measurement, Step::BeforePhoto).is_legal());
        assert!(update(Step::Measurement, Step::Cancelled).is_legal());
        assert!(!update(Step::Measurement, Step::AfterPhoto).is_legal());
        assert!(!update(Step::Completed, Step::AfterPhoto).is_legal());
        assert!(!update(Step::Cancelled, Step::BeforePhoto).is_legal());
    }

    #[test]
    fn test_clear_for_covers_owned_columns_only() {
        assert_eq!(FieldWrite::clear_for(Step::ExtraItems), vec![FieldWrite::ExtraItems(None)]);
        assert!(FieldWrite::clear_for(Step::Registration).is_empty());
        assert_eq!(FieldWrite::clear_for(Step::AfterPhoto)[0].column(), "after_photo_url");
    }
}
