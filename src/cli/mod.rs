use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::models::BeneficiaryRef;
use crate::objects::PhotoKind;
use crate::stages::{ComfortLevel, ExtraItem, Step};

pub mod commands;

#[derive(Parser)]
#[command(name = "camp-tracker")]
#[command(about = "Stage tracker for artificial-limb distribution camps")]
#[command(long_about = "Camp Tracker moves each registered beneficiary through the camp desks: \
                       before photo, measurement, fitment, extra items and after photo. \
                       Get started with 'camp-tracker event create' and 'camp-tracker event select'.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create, list, select, update or delete camp events
    Event {
        #[command(subcommand)]
        action: EventCommands,
    },
    /// Register a beneficiary into the selected event
    Register {
        #[command(flatten)]
        details: DetailsArgs,
    },
    /// List the beneficiaries waiting at a desk, oldest first
    Queue {
        /// Desk to list (before_photo, measurement, fitment, extra_items, after_photo)
        step: Step,
    },
    /// Show one beneficiary's record
    Show {
        /// Beneficiary id or registration number (REG-0001)
        beneficiary: BeneficiaryRef,
    },
    /// Upload a before or after photo and advance the photo desk
    Photo {
        beneficiary: BeneficiaryRef,
        #[arg(value_enum)]
        kind: PhotoArg,
        /// Image file to upload
        file: PathBuf,
        #[arg(long, help = "Volunteer recording this step")]
        volunteer: Option<String>,
    },
    /// Record stump measurements and advance to fitment
    Measure {
        beneficiary: BeneficiaryRef,
        #[arg(long, help = "Stump length, e.g. '42 cm'")]
        length: String,
        #[arg(long, help = "Stump circumference, e.g. '28 cm'")]
        circumference: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, help = "Volunteer recording this step")]
        volunteer: Option<String>,
    },
    /// Record the fitment outcome and advance to extra items
    Fit {
        beneficiary: BeneficiaryRef,
        #[arg(long, help = "excellent, good, fair or poor")]
        comfort: ComfortLevel,
        #[arg(long)]
        adjustments: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, help = "Volunteer recording this step")]
        volunteer: Option<String>,
    },
    /// Record extra items handed out and advance to the after photo
    Items {
        beneficiary: BeneficiaryRef,
        /// Items as name or name=qty (stick=2 shoes crutches walker elbow_stick)
        items: Vec<ExtraItem>,
        #[arg(long, help = "Use the items suggested by the aid requested at registration")]
        suggested: bool,
        #[arg(long, help = "Volunteer recording this step")]
        volunteer: Option<String>,
    },
    /// Complete a step without its payload (only for skippable steps)
    Complete {
        beneficiary: BeneficiaryRef,
        step: Step,
        #[arg(long, help = "Volunteer recording this step")]
        volunteer: Option<String>,
    },
    /// Send a beneficiary back to the previous desk
    Revert {
        beneficiary: BeneficiaryRef,
        /// The step the beneficiary is currently at
        step: Step,
    },
    /// Cancel a beneficiary's camp journey
    Cancel {
        beneficiary: BeneficiaryRef,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Edit registration details (step data is left alone)
    Edit {
        beneficiary: BeneficiaryRef,
        #[command(flatten)]
        changes: EditArgs,
    },
    /// Camp summary: totals, aid types, extra items and desk progress
    Summary,
    /// Export beneficiary rows as JSON for the camp report
    Export {
        #[arg(long, help = "First camp date to include (YYYY-MM-DD)")]
        from: Option<NaiveDate>,
        #[arg(long, help = "Last camp date to include (YYYY-MM-DD)")]
        to: Option<NaiveDate>,
        #[arg(long, help = "Export every event, not just the selected one")]
        all_events: bool,
        /// Output file path (default: stdout)
        #[arg(long, help = "File path to write JSON rows (prints to stdout if not specified)")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum EventCommands {
    /// Create a new camp event
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, help = "Camp date (YYYY-MM-DD)")]
        date: NaiveDate,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, help = "Select the new event straight away")]
        select: bool,
    },
    /// List camp events, most recent first
    List,
    /// Select the event later commands operate on
    Select { id: crate::models::EventId },
    /// Update an event's name, date or location
    Update {
        id: crate::models::EventId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Delete an event with no registered beneficiaries
    Delete { id: crate::models::EventId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PhotoArg {
    Before,
    After,
}

impl From<PhotoArg> for PhotoKind {
    fn from(arg: PhotoArg) -> Self {
        match arg {
            PhotoArg::Before => PhotoKind::Before,
            PhotoArg::After => PhotoKind::After,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct DetailsArgs {
    #[arg(long)]
    pub name: String,
    #[command(flatten)]
    pub optional: OptionalDetails,
}

#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[command(flatten)]
    pub optional: OptionalDetails,
}

#[derive(Debug, Clone, Default, Args)]
pub struct OptionalDetails {
    #[arg(long)]
    pub father_name: Option<String>,
    #[arg(long, help = "Date of birth (YYYY-MM-DD); age is derived from it")]
    pub dob: Option<NaiveDate>,
    #[arg(long, conflicts_with = "dob", help = "Age in years, for beneficiaries without a date of birth")]
    pub age: Option<u8>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub state: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub aadhar: Option<String>,
    /// Aid requested, repeatable: --aid left_below_knee --aid stick=2
    #[arg(long = "aid")]
    pub aid: Vec<String>,
    #[arg(long, help = "Description for the 'others' aid type")]
    pub other_aid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_desk_commands() {
        let cli = Cli::try_parse_from([
            "camp-tracker", "items", "REG-0004", "stick=2", "shoes", "--volunteer", "Asha",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Items { beneficiary, items, volunteer, .. }) => {
                assert_eq!(beneficiary.to_string(), "REG-0004");
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].quantity, 2);
                assert_eq!(volunteer.as_deref(), Some("Asha"));
            }
            _ => panic!("expected items command"),
        }

        let cli = Cli::try_parse_from(["camp-tracker", "queue", "before-photo"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Queue { step: Step::BeforePhoto })));
    }

    #[test]
    fn test_rejects_unknown_comfort_level() {
        assert!(Cli::try_parse_from([
            "camp-tracker", "fit", "REG-0001", "--comfort", "amazing",
        ])
        .is_err());
    }

    #[test]
    fn test_age_and_date_of_birth_are_exclusive() {
        assert!(Cli::try_parse_from([
            "camp-tracker", "register", "--name", "Asha", "--dob", "1980-06-01", "--age", "30",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["camp-tracker", "edit", "REG-0001", "--age", "30"]).is_ok());
    }
}
