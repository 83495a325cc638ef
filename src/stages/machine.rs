use serde::{Deserialize, Serialize};
use statig::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

use super::payload::StepPayload;
use super::update::{FieldWrite, StageUpdate};
use super::Step;
use crate::models::Beneficiary;

/// An action a desk asks the tracker to perform on one beneficiary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageAction {
    Advance {
        payload: StepPayload,
        volunteer: Option<String>,
    },
    CompleteWithoutPayload {
        step: Step,
        volunteer: Option<String>,
    },
    Revert {
        step: Step,
    },
    Cancel {
        reason: Option<String>,
    },
}

impl StageAction {
    pub fn name(&self) -> &'static str {
        match self {
            StageAction::Advance { .. } => "advance",
            StageAction::CompleteWithoutPayload { .. } => "complete",
            StageAction::Revert { .. } => "revert",
            StageAction::Cancel { .. } => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// Enter the state persisted in the record.
    Restore(Step),
    Request(StageAction),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Validation failed at {step}: {reason}")]
    ValidationFailed { step: Step, reason: String },
    #[error("Beneficiary is at {actual}, not {expected}")]
    StepMismatch { expected: Step, actual: Step },
    #[error("Cannot {action} from {from}")]
    InvalidTransition { from: Step, action: &'static str },
    #[error("Beneficiary is already {step}; no further changes are allowed")]
    Terminal { step: Step },
    #[error("{step} cannot be completed without its payload")]
    NotSkippable { step: Step },
}

/// Outcome of planning an accepted action.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPlan {
    /// Send this update to the store.
    Apply(StageUpdate),
    /// The beneficiary is already past `step`; nothing to write.
    AlreadyApplied { step: Step, current: Step },
}

/// Knobs that loosen or tighten validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRules {
    pub require_volunteer: bool,
    /// Steps that may be completed without their payload.
    pub skippable_steps: Vec<Step>,
}

impl Default for TransitionRules {
    fn default() -> Self {
        Self {
            require_volunteer: true,
            skippable_steps: vec![Step::AfterPhoto],
        }
    }
}

/// Stage-progression state machine for one beneficiary.
///
/// Built fresh for every action: restored into the record's persisted step,
/// handed one request, then read back for its verdict.
#[derive(Debug)]
pub struct StageMachine {
    rules: TransitionRules,
    completed_steps: Vec<Step>,
    step_volunteers: BTreeMap<Step, String>,
    current: Option<Step>,
    verdict: Option<Result<TransitionPlan, TransitionError>>,
}

impl StageMachine {
    pub fn new(rules: TransitionRules, beneficiary: &Beneficiary) -> Self {
        Self {
            rules,
            completed_steps: beneficiary.completed_steps.clone(),
            step_volunteers: beneficiary.step_volunteers.clone(),
            current: None,
            verdict: None,
        }
    }

    /// Plan `action` against `beneficiary` without touching any store.
    pub fn evaluate(
        rules: &TransitionRules,
        beneficiary: &Beneficiary,
        action: StageAction,
    ) -> Result<TransitionPlan, TransitionError> {
        let from = beneficiary.current_step;
        let action_name = action.name();

        let mut machine = StageMachine::new(rules.clone(), beneficiary).state_machine();
        machine.handle(&StageEvent::Restore(from));
        machine.handle(&StageEvent::Request(action));

        machine
            .inner()
            .verdict
            .clone()
            .unwrap_or(Err(TransitionError::InvalidTransition {
                from,
                action: action_name,
            }))
    }

    pub fn current(&self) -> Option<Step> {
        self.current
    }
}

#[state_machine(initial = "State::unloaded()")]
impl StageMachine {
    #[state]
    fn unloaded(&mut self, event: &StageEvent) -> Outcome<State> {
        match event {
            StageEvent::Restore(step) => {
                self.current = Some(*step);
                Transition(Self::state_for(*step))
            }
            StageEvent::Request(_) => Handled,
        }
    }

    #[state]
    fn registration(&mut self, event: &StageEvent) -> Outcome<State> {
        self.on_request(Step::Registration, event)
    }

    #[state]
    fn before_photo(&mut self, event: &StageEvent) -> Outcome<State> {
        self.on_request(Step::BeforePhoto, event)
    }

    #[state]
    fn measurement(&mut self, event: &StageEvent) -> Outcome<State> {
        self.on_request(Step::Measurement, event)
    }

    #[state]
    fn fitment(&mut self, event: &StageEvent) -> Outcome<State> {
        self.on_request(Step::Fitment, event)
    }

    #[state]
    fn extra_items(&mut self, event: &StageEvent) -> Outcome<State> {
        self.on_request(Step::ExtraItems, event)
    }

    #[state]
    fn after_photo(&mut self, event: &StageEvent) -> Outcome<State> {
        self.on_request(Step::AfterPhoto, event)
    }

    #[state]
    fn completed(&mut self, event: &StageEvent) -> Outcome<State> {
        self.on_request(Step::Completed, event)
    }

    #[state]
    fn cancelled(&mut self, event: &StageEvent) -> Outcome<State> {
        self.on_request(Step::Cancelled, event)
    }
}

impl StageMachine {
    fn state_for(step: Step) -> State {
        match step {
            Step::Registration => State::registration(),
            Step::BeforePhoto => State::before_photo(),
            Step::Measurement => State::measurement(),
            Step::Fitment => State::fitment(),
            Step::ExtraItems => State::extra_items(),
            Step::AfterPhoto => State::after_photo(),
            Step::Completed => State::completed(),
            Step::Cancelled => State::cancelled(),
        }
    }

    fn on_request(&mut self, at: Step, event: &StageEvent) -> Outcome<State> {
        let StageEvent::Request(action) = event else {
            return Handled;
        };

        match self.plan(at, action) {
            Ok(TransitionPlan::Apply(update)) => {
                let to = update.to;
                tracing::debug!(from = %at, to = %to, action = action.name(), "Stage transition planned");
                self.current = Some(to);
                self.verdict = Some(Ok(TransitionPlan::Apply(update)));
                Transition(Self::state_for(to))
            }
            Ok(plan) => {
                tracing::debug!(at = %at, action = action.name(), "Stage already applied");
                self.verdict = Some(Ok(plan));
                Handled
            }
            Err(e) => {
                tracing::warn!(at = %at, action = action.name(), "Stage transition rejected: {}", e);
                self.verdict = Some(Err(e));
                Handled
            }
        }
    }

    fn plan(&self, at: Step, action: &StageAction) -> Result<TransitionPlan, TransitionError> {
        match action {
            StageAction::Advance { payload, volunteer } => {
                let step = payload.step();
                self.expect_open_at(at, step)?;
                if at.is_past(step) {
                    return Ok(TransitionPlan::AlreadyApplied { step, current: at });
                }
                payload
                    .validate()
                    .map_err(|reason| TransitionError::ValidationFailed { step, reason })?;
                let volunteer = self.checked_volunteer(step, volunteer)?;
                Ok(TransitionPlan::Apply(self.forward(step, volunteer, payload.field_writes())))
            }
            StageAction::CompleteWithoutPayload { step, volunteer } => {
                let step = *step;
                self.expect_open_at(at, step)?;
                if at.is_past(step) {
                    return Ok(TransitionPlan::AlreadyApplied { step, current: at });
                }
                if !self.rules.skippable_steps.contains(&step) {
                    return Err(TransitionError::NotSkippable { step });
                }
                let volunteer = self.checked_volunteer(step, volunteer)?;
                Ok(TransitionPlan::Apply(self.forward(step, volunteer, Vec::new())))
            }
            StageAction::Revert { step } => {
                let step = *step;
                if at.is_terminal() {
                    return Err(TransitionError::Terminal { step: at });
                }
                if at != step {
                    return Err(TransitionError::StepMismatch { expected: step, actual: at });
                }
                // Registration is only ever entered by creating the record.
                let reopened = match step.predecessor() {
                    Some(prev) if prev != Step::Registration => prev,
                    _ => {
                        return Err(TransitionError::InvalidTransition {
                            from: step,
                            action: "revert",
                        })
                    }
                };

                let mut writes = FieldWrite::clear_for(step);
                writes.extend(FieldWrite::clear_for(reopened));

                let completed_steps = self
                    .completed_steps
                    .iter()
                    .copied()
                    .filter(|s| *s != step && *s != reopened)
                    .collect();
                let mut step_volunteers = self.step_volunteers.clone();
                step_volunteers.remove(&step);
                step_volunteers.remove(&reopened);

                Ok(TransitionPlan::Apply(StageUpdate {
                    from: step,
                    to: reopened,
                    completed_steps,
                    step_volunteers,
                    writes,
                }))
            }
            StageAction::Cancel { reason } => {
                if at.is_terminal() {
                    return Err(TransitionError::Terminal { step: at });
                }
                let reason = reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string);
                Ok(TransitionPlan::Apply(StageUpdate {
                    from: at,
                    to: Step::Cancelled,
                    completed_steps: self.completed_steps.clone(),
                    step_volunteers: self.step_volunteers.clone(),
                    writes: vec![FieldWrite::CancelReason(reason)],
                }))
            }
        }
    }

    /// Rejects requests for `step` unless the beneficiary sits at it or has
    /// already moved past it along the pipeline.
    fn expect_open_at(&self, at: Step, step: Step) -> Result<(), TransitionError> {
        if at == Step::Cancelled {
            return Err(TransitionError::Terminal { step: at });
        }
        if at != step && !at.is_past(step) {
            return Err(TransitionError::StepMismatch { expected: step, actual: at });
        }
        Ok(())
    }

    fn checked_volunteer(
        &self,
        step: Step,
        volunteer: &Option<String>,
    ) -> Result<Option<String>, TransitionError> {
        let name = volunteer
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        if name.is_none() && self.rules.require_volunteer && step.requires_volunteer() {
            return Err(TransitionError::ValidationFailed {
                step,
                reason: "Please enter your volunteer name".to_string(),
            });
        }
        Ok(name)
    }

    fn forward(&self, step: Step, volunteer: Option<String>, writes: Vec<FieldWrite>) -> StageUpdate {
        // Callers only reach here for pipeline steps short of `completed`.
        let to = step.successor().unwrap_or(Step::Completed);

        let mut completed_steps = self.completed_steps.clone();
        if !completed_steps.contains(&step) {
            completed_steps.push(step);
        }
        let mut step_volunteers = self.step_volunteers.clone();
        if let Some(name) = volunteer {
            step_volunteers.insert(step, name);
        }

        StageUpdate {
            from: step,
            to,
            completed_steps,
            step_volunteers,
            writes,
        }
    }
}
