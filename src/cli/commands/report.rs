use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

use super::{with_workspace, Command};
use crate::tracker::{export_file_name, ExportRange};

pub struct SummaryCommand;

pub struct ExportCommand {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub all_events: bool,
    pub output: Option<PathBuf>,
}

impl Command for SummaryCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let scope = ws.scope().await?;
            let summary = ws.tracker.summary(&scope).await?;

            println!("📊 CAMP SUMMARY - {} ({})", scope.event_name, scope.event_date);
            println!("──────────────────────────────");
            println!("👥 Total beneficiaries: {}", summary.total_beneficiaries);
            println!("✅ Completed: {}", summary.completed_beneficiaries);
            println!("🚫 Cancelled: {}", summary.cancelled_beneficiaries);
            println!("📈 Completion rate: {}%", summary.completion_rate());
            println!();

            println!("🦿 AID TYPES");
            if summary.aid_types.is_empty() {
                println!("   No aid types recorded");
            }
            for (aid, count) in &summary.aid_types {
                println!("   {aid}: {count}");
            }
            println!();

            println!("🎁 EXTRA ITEMS");
            if summary.extra_items.is_empty() {
                println!("   No extra items distributed");
            }
            for (item, quantity) in &summary.extra_items {
                println!("   {}: {}", item.display_name(), quantity);
            }
            println!();

            println!("🏁 PROGRESS BY STEP");
            for (step, count) in summary.progress() {
                println!(
                    "   {:<14} {} / {} ({}%)",
                    step.display_name(),
                    count,
                    summary.total_beneficiaries,
                    summary.percent_of_total(count)
                );
            }
            if !summary.current_step_counts.is_empty() {
                println!();
                println!("⏳ WAITING NOW");
                for (step, count) in &summary.current_step_counts {
                    println!("   {}: {}", step.display_name(), count);
                }
            }
            Ok(())
        })
        .await
    }
}

impl Command for ExportCommand {
    async fn execute(&self) -> Result<()> {
        let range = ExportRange::new(self.from, self.to).map_err(|e| anyhow!(e))?;

        with_workspace(|ws| async move {
            let scope = if self.all_events { None } else { Some(ws.scope().await?) };
            let rows = ws.tracker.export(scope.as_ref(), &range).await?;
            let json = serde_json::to_string_pretty(&rows)?;

            match &self.output {
                Some(path) => {
                    let path = if path.is_dir() {
                        path.join(export_file_name(&range))
                    } else {
                        path.clone()
                    };
                    tokio::fs::write(&path, json).await?;
                    println!("📤 Exported {} rows to {}", rows.len(), path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        })
        .await
    }
}
