use anyhow::{Context, Result};
use std::path::PathBuf;

use super::{print_beneficiary, print_outcome, with_workspace, Command};
use crate::models::BeneficiaryRef;
use crate::objects::PhotoKind;
use crate::stages::{ComfortLevel, ExtraItem, FitmentData, MeasurementData, Step, StepPayload};

pub struct QueueCommand {
    pub step: Step,
}

pub struct ShowCommand {
    pub beneficiary: BeneficiaryRef,
}

pub struct PhotoCommand {
    pub beneficiary: BeneficiaryRef,
    pub kind: PhotoKind,
    pub file: PathBuf,
    pub volunteer: Option<String>,
}

/// Any desk that advances with a typed payload.
pub struct AdvanceCommand {
    pub beneficiary: BeneficiaryRef,
    pub payload: DeskPayload,
    pub volunteer: Option<String>,
}

pub enum DeskPayload {
    Measurement(MeasurementData),
    Fitment(FitmentData),
    ExtraItems { items: Vec<ExtraItem>, suggested: bool },
}

pub struct CompleteCommand {
    pub beneficiary: BeneficiaryRef,
    pub step: Step,
    pub volunteer: Option<String>,
}

pub struct RevertCommand {
    pub beneficiary: BeneficiaryRef,
    pub step: Step,
}

pub struct CancelCommand {
    pub beneficiary: BeneficiaryRef,
    pub reason: Option<String>,
}

impl QueueCommand {
    pub fn new(step: Step) -> Self {
        Self { step }
    }
}

impl Command for QueueCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let queue = ws.tracker.queue(&scope, self.step).await?;

            let title = match self.step.desk_number() {
                Some(desk) => format!("DESK {} - {}", desk, self.step.display_name().to_uppercase()),
                None => self.step.display_name().to_uppercase(),
            };
            println!("📋 {title}");
            println!("───────────────");
            if queue.is_empty() {
                println!("🎉 Nobody waiting at {}", self.step.display_name());
                return Ok(());
            }
            for b in &queue {
                println!(
                    "   {}  {}  ({})",
                    b.reg_number,
                    b.details.name,
                    b.details.type_of_aid.display()
                );
            }
            println!();
            println!("📈 QUEUE DEPTH: {} waiting", queue.len());
            Ok(())
        })
        .await
    }
}

impl Command for ShowCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let beneficiary = ws.find(&scope, &self.beneficiary).await?;
            print_beneficiary(&beneficiary);
            Ok(())
        })
        .await
    }
}

impl Command for PhotoCommand {
    async fn execute(&self) -> Result<()> {
        let bytes = tokio::fs::read(&self.file)
            .await
            .with_context(|| format!("Failed to read photo {}", self.file.display()))?;
        let extension = self
            .file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_string();

        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let beneficiary = ws.find(&scope, &self.beneficiary).await?;
            println!("📷 Uploading {} photo for {}...", self.kind, beneficiary.reg_number);
            let outcome = ws
                .tracker
                .upload_photo(
                    &scope,
                    &beneficiary.id,
                    self.kind,
                    &bytes,
                    &extension,
                    self.volunteer.clone(),
                )
                .await?;
            print_outcome(&outcome);
            Ok(())
        })
        .await
    }
}

impl AdvanceCommand {
    pub fn measurement(
        beneficiary: BeneficiaryRef,
        length: String,
        circumference: String,
        notes: Option<String>,
        volunteer: Option<String>,
    ) -> Self {
        Self {
            beneficiary,
            payload: DeskPayload::Measurement(MeasurementData {
                length,
                circumference,
                notes,
            }),
            volunteer,
        }
    }

    pub fn fitment(
        beneficiary: BeneficiaryRef,
        comfort_level: ComfortLevel,
        adjustments_made: Option<String>,
        fitment_notes: Option<String>,
        volunteer: Option<String>,
    ) -> Self {
        Self {
            beneficiary,
            payload: DeskPayload::Fitment(FitmentData {
                comfort_level,
                adjustments_made,
                fitment_notes,
            }),
            volunteer,
        }
    }

    pub fn extra_items(
        beneficiary: BeneficiaryRef,
        items: Vec<ExtraItem>,
        suggested: bool,
        volunteer: Option<String>,
    ) -> Self {
        Self {
            beneficiary,
            payload: DeskPayload::ExtraItems { items, suggested },
            volunteer,
        }
    }
}

impl Command for AdvanceCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let beneficiary = ws.find(&scope, &self.beneficiary).await?;

            let payload = match &self.payload {
                DeskPayload::Measurement(data) => StepPayload::Measurement(data.clone()),
                DeskPayload::Fitment(data) => StepPayload::Fitment(data.clone()),
                DeskPayload::ExtraItems { items, suggested } => {
                    let mut items = items.clone();
                    if *suggested {
                        for item in beneficiary.details.type_of_aid.suggested_extra_items() {
                            if !items.iter().any(|i| i.item == item.item) {
                                items.push(item);
                            }
                        }
                    }
                    StepPayload::ExtraItems { items }
                }
            };

            let outcome = ws
                .tracker
                .advance(&scope, &beneficiary.id, payload, self.volunteer.clone())
                .await?;
            print_outcome(&outcome);
            Ok(())
        })
        .await
    }
}

impl Command for CompleteCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let beneficiary = ws.find(&scope, &self.beneficiary).await?;
            let outcome = ws
                .tracker
                .complete_without_payload(&scope, &beneficiary.id, self.step, self.volunteer.clone())
                .await?;
            print_outcome(&outcome);
            Ok(())
        })
        .await
    }
}

impl Command for RevertCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let beneficiary = ws.find(&scope, &self.beneficiary).await?;
            let outcome = ws.tracker.revert(&scope, &beneficiary.id, self.step).await?;
            println!("↩️  Sent back for rework");
            print_outcome(&outcome);
            Ok(())
        })
        .await
    }
}

impl Command for CancelCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let beneficiary = ws.find(&scope, &self.beneficiary).await?;
            let outcome = ws
                .tracker
                .cancel(&scope, &beneficiary.id, self.reason.clone())
                .await?;
            print_outcome(&outcome);
            Ok(())
        })
        .await
    }
}
