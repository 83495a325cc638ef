use anyhow::{anyhow, bail, Result};

use super::{print_beneficiary, with_workspace, Command};
use crate::cli::{DetailsArgs, OptionalDetails};
use crate::models::{RegistrationDetails, TypeOfAid};

pub struct RegisterCommand {
    pub details: DetailsArgs,
}

impl RegisterCommand {
    pub fn new(details: DetailsArgs) -> Self {
        Self { details }
    }
}

/// Fold the optional flags onto `details`, leaving unset flags alone.
pub(crate) fn apply_optional(details: &mut RegistrationDetails, args: &OptionalDetails) -> Result<()> {
    if let Some(v) = &args.father_name {
        details.father_name = Some(v.clone());
    }
    if let Some(dob) = args.dob {
        details.date_of_birth = Some(dob);
    }
    if let Some(age) = args.age {
        // Age is recomputed from a date of birth on every save
        if let Some(dob) = details.date_of_birth {
            bail!("--age cannot be set while a date of birth ({dob}) is on record; age is derived from it");
        }
        details.age = Some(age);
    }
    if let Some(v) = &args.address {
        details.address = Some(v.clone());
    }
    if let Some(v) = &args.state {
        details.state = Some(v.clone());
    }
    if let Some(v) = &args.phone {
        details.phone_number = Some(v.clone());
    }
    if let Some(v) = &args.aadhar {
        details.aadhar_number = Some(v.clone());
    }
    if !args.aid.is_empty() {
        let mut aid = TypeOfAid::default();
        for spec in &args.aid {
            aid.set_flag(spec).map_err(|e| anyhow!(e))?;
        }
        details.type_of_aid = aid;
    }
    if let Some(other) = &args.other_aid {
        details.type_of_aid.others = true;
        details.type_of_aid.others_specify = Some(other.clone());
    }
    Ok(())
}

impl Command for RegisterCommand {
    async fn execute(&self) -> Result<()> {
        let mut details = RegistrationDetails {
            name: self.details.name.clone(),
            ..Default::default()
        };
        apply_optional(&mut details, &self.details.optional)?;

        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let beneficiary = ws.tracker.register(&scope, details).await?;
            println!("📝 Registered into {}", scope.event_name);
            print_beneficiary(&beneficiary);
            println!();
            println!("👉 Next: desk 2 (Before Photo)");
            Ok(())
        })
        .await
    }
}
