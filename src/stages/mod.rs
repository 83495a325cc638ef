// Stage model - the fixed camp pipeline and the per-step payloads
//
// Every beneficiary walks the same linear pipeline. `Step` is the controlled
// variable persisted as `current_step`; everything else in this module hangs
// off the successor/predecessor table below.

pub mod machine;
pub mod payload;
pub mod update;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use machine::{StageAction, StageEvent, StageMachine, TransitionError, TransitionPlan, TransitionRules};
pub use payload::{ComfortLevel, ExtraItem, ExtraItemKind, FitmentData, MeasurementData, StepPayload};
pub use update::{FieldWrite, StageUpdate};

/// A value of `current_step`.
///
/// `Cancelled` is a terminal member of the same enum rather than a separate
/// status column, so a beneficiary always has exactly one active step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Registration,
    BeforePhoto,
    Measurement,
    Fitment,
    ExtraItems,
    AfterPhoto,
    Completed,
    Cancelled,
}

/// The linear pipeline, in order. `Cancelled` is deliberately absent.
pub const PIPELINE: [Step; 7] = [
    Step::Registration,
    Step::BeforePhoto,
    Step::Measurement,
    Step::Fitment,
    Step::ExtraItems,
    Step::AfterPhoto,
    Step::Completed,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown step '{0}'")]
pub struct UnknownStep(pub String);

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Registration => "registration",
            Step::BeforePhoto => "before_photo",
            Step::Measurement => "measurement",
            Step::Fitment => "fitment",
            Step::ExtraItems => "extra_items",
            Step::AfterPhoto => "after_photo",
            Step::Completed => "completed",
            Step::Cancelled => "cancelled",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Step::Registration => "Registration",
            Step::BeforePhoto => "Before Photo",
            Step::Measurement => "Measurement",
            Step::Fitment => "Fitment",
            Step::ExtraItems => "Extra Items",
            Step::AfterPhoto => "After Photo",
            Step::Completed => "Completed",
            Step::Cancelled => "Cancelled",
        }
    }

    /// Position in the pipeline; `None` for the cancelled side channel.
    pub fn position(&self) -> Option<usize> {
        PIPELINE.iter().position(|step| step == self)
    }

    pub fn successor(&self) -> Option<Step> {
        self.position().and_then(|idx| PIPELINE.get(idx + 1).copied())
    }

    pub fn predecessor(&self) -> Option<Step> {
        match self.position() {
            Some(idx) if idx > 0 => Some(PIPELINE[idx - 1]),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Completed | Step::Cancelled)
    }

    /// True when `self` lies strictly after `other` in the pipeline.
    pub fn is_past(&self, other: Step) -> bool {
        match (self.position(), other.position()) {
            (Some(mine), Some(theirs)) => mine > theirs,
            _ => false,
        }
    }

    /// Desks that historically asked the volunteer to sign their work.
    pub fn requires_volunteer(&self) -> bool {
        matches!(
            self,
            Step::Measurement | Step::Fitment | Step::ExtraItems | Step::AfterPhoto
        )
    }

    /// Desk number shown to volunteers (registration is desk 1).
    pub fn desk_number(&self) -> Option<usize> {
        match self {
            Step::Completed | Step::Cancelled => None,
            _ => self.position().map(|idx| idx + 1),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        PIPELINE
            .iter()
            .chain(std::iter::once(&Step::Cancelled))
            .find(|step| step.as_str() == normalized)
            .copied()
            .ok_or_else(|| UnknownStep(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_table_is_linear() {
        assert_eq!(Step::Registration.successor(), Some(Step::BeforePhoto));
        assert_eq!(Step::BeforePhoto.successor(), Some(Step::Measurement));
        assert_eq!(Step::Measurement.successor(), Some(Step::Fitment));
        assert_eq!(Step::Fitment.successor(), Some(Step::ExtraItems));
        assert_eq!(Step::ExtraItems.successor(), Some(Step::AfterPhoto));
        assert_eq!(Step::AfterPhoto.successor(), Some(Step::Completed));
        assert_eq!(Step::Completed.successor(), None);
        assert_eq!(Step::Cancelled.successor(), None);
    }

    #[test]
    fn test_predecessor_inverts_successor() {
        for window in PIPELINE.windows(2) {
            assert_eq!(window[1].predecessor(), Some(window[0]));
        }
        assert_eq!(Step::Registration.predecessor(), None);
        assert_eq!(Step::Cancelled.predecessor(), None);
    }

    #[test]
    fn test_parse_accepts_hyphens_and_case() {
        assert_eq!("before-photo".parse::<Step>().unwrap(), Step::BeforePhoto);
        assert_eq!("EXTRA_ITEMS".parse::<Step>().unwrap(), Step::ExtraItems);
        assert_eq!("cancelled".parse::<Step>().unwrap(), Step::Cancelled);
        assert!("shipping".parse::<Step>().is_err());
    }

    #[test]
    fn test_cancelled_is_never_past_anything() {
        for step in PIPELINE {
            assert!(!Step::Cancelled.is_past(step));
            assert!(!step.is_past(Step::Cancelled));
        }
        assert!(Step::Completed.is_past(Step::AfterPhoto));
        assert!(!Step::Fitment.is_past(Step::Fitment));
    }

    #[test]
    fn test_serde_uses_snake_case_names() {
        let json = serde_json::to_string(&Step::AfterPhoto).unwrap();
        assert_eq!(json, "\"after_photo\"");
        let back: Step = serde_json::from_str("\"before_photo\"").unwrap();
        assert_eq!(back, Step::BeforePhoto);
    }
}
