use anyhow::Result;

use super::register::apply_optional;
use super::{print_beneficiary, with_workspace, Command};
use crate::cli::EditArgs;
use crate::models::BeneficiaryRef;

pub struct EditCommand {
    pub beneficiary: BeneficiaryRef,
    pub changes: EditArgs,
}

impl EditCommand {
    pub fn new(beneficiary: BeneficiaryRef, changes: EditArgs) -> Self {
        Self { beneficiary, changes }
    }
}

impl Command for EditCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let current = ws.find(&scope, &self.beneficiary).await?;

            let mut details = current.details.clone();
            if let Some(name) = &self.changes.name {
                details.name = name.clone();
            }
            apply_optional(&mut details, &self.changes.optional)?;

            if details == current.details {
                println!("ℹ️  Nothing to change for {}", current.reg_number);
                return Ok(());
            }

            let updated = ws.tracker.update_details(&scope, &current.id, details).await?;
            println!("✏️  Updated registration details");
            print_beneficiary(&updated);
            Ok(())
        })
        .await
    }
}
