use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::Beneficiary;
use crate::stages::{ExtraItemKind, Step, PIPELINE};

/// Camp-wide counts shown on the summary screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampSummary {
    pub total_beneficiaries: u64,
    pub completed_beneficiaries: u64,
    pub cancelled_beneficiaries: u64,
    /// Beneficiaries per requested aid category.
    pub aid_types: BTreeMap<String, u64>,
    /// Quantities handed out per extra item.
    pub extra_items: BTreeMap<ExtraItemKind, u64>,
    /// How many beneficiaries have completed each step.
    pub step_counts: BTreeMap<Step, u64>,
    /// How many beneficiaries are waiting at each step right now.
    pub current_step_counts: BTreeMap<Step, u64>,
}

impl CampSummary {
    /// Whole-number percentage of beneficiaries who completed the camp.
    pub fn completion_rate(&self) -> u64 {
        self.percent_of_total(self.completed_beneficiaries)
    }

    pub fn step_count(&self, step: Step) -> u64 {
        self.step_counts.get(&step).copied().unwrap_or(0)
    }

    pub fn percent_of_total(&self, count: u64) -> u64 {
        if self.total_beneficiaries == 0 {
            return 0;
        }
        ((count as f64 / self.total_beneficiaries as f64) * 100.0).round() as u64
    }

    /// Pipeline steps with their completion counts, in desk order.
    pub fn progress(&self) -> Vec<(Step, u64)> {
        PIPELINE[..PIPELINE.len() - 1]
            .iter()
            .map(|step| (*step, self.step_count(*step)))
            .collect()
    }
}

pub fn summarize(beneficiaries: &[Beneficiary]) -> CampSummary {
    let mut summary = CampSummary {
        total_beneficiaries: beneficiaries.len() as u64,
        ..Default::default()
    };

    for b in beneficiaries {
        for category in b.details.type_of_aid.categories() {
            *summary.aid_types.entry(category.to_string()).or_default() += 1;
        }
        for item in b.extra_items.iter().flatten() {
            *summary.extra_items.entry(item.item).or_default() += u64::from(item.quantity);
        }
        for step in &b.completed_steps {
            *summary.step_counts.entry(*step).or_default() += 1;
        }
        *summary.current_step_counts.entry(b.current_step).or_default() += 1;

        match b.current_step {
            Step::Completed => summary.completed_beneficiaries += 1,
            Step::Cancelled => summary.cancelled_beneficiaries += 1,
            _ => {}
        }
    }

    summary
}
