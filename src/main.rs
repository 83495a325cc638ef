use anyhow::Result;
use clap::Parser;

use camp_tracker::cli::commands::desk::{
    AdvanceCommand, CancelCommand, CompleteCommand, PhotoCommand, QueueCommand, RevertCommand, ShowCommand,
};
use camp_tracker::cli::commands::edit::EditCommand;
use camp_tracker::cli::commands::event::{
    CreateEventCommand, DeleteEventCommand, ListEventsCommand, SelectEventCommand, UpdateEventCommand,
};
use camp_tracker::cli::commands::register::RegisterCommand;
use camp_tracker::cli::commands::report::{ExportCommand, SummaryCommand};
use camp_tracker::cli::commands::{show_how_to_get_started, Command};
use camp_tracker::cli::{Cli, Commands, EventCommands};
use camp_tracker::{config, init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(&config()?.observability)?;

    let result = match cli.command {
        // Default behavior: no subcommand - explain how to get started
        None => {
            tokio::runtime::Runtime::new()?.block_on(async {
                show_how_to_get_started().await
            })
        }
        Some(Commands::Event { action }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                match action {
                    EventCommands::Create { name, date, location, select } => {
                        CreateEventCommand::new(name, date, location, select).execute().await
                    }
                    EventCommands::List => ListEventsCommand.execute().await,
                    EventCommands::Select { id } => SelectEventCommand { id }.execute().await,
                    EventCommands::Update { id, name, date, location } => {
                        UpdateEventCommand { id, name, date, location }.execute().await
                    }
                    EventCommands::Delete { id } => DeleteEventCommand { id }.execute().await,
                }
            })
        }
        Some(Commands::Register { details }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                RegisterCommand::new(details).execute().await
            })
        }
        Some(Commands::Queue { step }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                QueueCommand::new(step).execute().await
            })
        }
        Some(Commands::Show { beneficiary }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                ShowCommand { beneficiary }.execute().await
            })
        }
        Some(Commands::Photo { beneficiary, kind, file, volunteer }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                PhotoCommand { beneficiary, kind: kind.into(), file, volunteer }.execute().await
            })
        }
        Some(Commands::Measure { beneficiary, length, circumference, notes, volunteer }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                AdvanceCommand::measurement(beneficiary, length, circumference, notes, volunteer)
                    .execute()
                    .await
            })
        }
        Some(Commands::Fit { beneficiary, comfort, adjustments, notes, volunteer }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                AdvanceCommand::fitment(beneficiary, comfort, adjustments, notes, volunteer)
                    .execute()
                    .await
            })
        }
        Some(Commands::Items { beneficiary, items, suggested, volunteer }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                AdvanceCommand::extra_items(beneficiary, items, suggested, volunteer)
                    .execute()
                    .await
            })
        }
        Some(Commands::Complete { beneficiary, step, volunteer }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                CompleteCommand { beneficiary, step, volunteer }.execute().await
            })
        }
        Some(Commands::Revert { beneficiary, step }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                RevertCommand { beneficiary, step }.execute().await
            })
        }
        Some(Commands::Cancel { beneficiary, reason }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                CancelCommand { beneficiary, reason }.execute().await
            })
        }
        Some(Commands::Edit { beneficiary, changes }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                EditCommand::new(beneficiary, changes).execute().await
            })
        }
        Some(Commands::Summary) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                SummaryCommand.execute().await
            })
        }
        Some(Commands::Export { from, to, all_events, output }) => {
            tokio::runtime::Runtime::new()?.block_on(async {
                ExportCommand { from, to, all_events, output }.execute().await
            })
        }
    };

    shutdown_telemetry();
    result
}
