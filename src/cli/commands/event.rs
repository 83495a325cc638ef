use anyhow::Result;
use chrono::NaiveDate;

use super::{with_workspace, Command};
use crate::models::{EventDraft, EventId};
use crate::scope::EventScope;

pub struct CreateEventCommand {
    pub draft: EventDraft,
    pub select: bool,
}

pub struct ListEventsCommand;

pub struct SelectEventCommand {
    pub id: EventId,
}

pub struct UpdateEventCommand {
    pub id: EventId,
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
}

pub struct DeleteEventCommand {
    pub id: EventId,
}

impl CreateEventCommand {
    pub fn new(name: String, date: NaiveDate, location: String, select: bool) -> Self {
        Self {
            draft: EventDraft {
                event_name: name,
                event_date: date,
                location,
            },
            select,
        }
    }
}

impl Command for CreateEventCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let event = ws.tracker.create_event(self.draft.clone()).await?;
            println!("📅 Created event: {}", event.event_name);
            println!("   🆔 {}", event.id);
            println!("   🗓️  Date: {}", event.event_date);
            if !event.location.is_empty() {
                println!("   📍 Location: {}", event.location);
            }

            if self.select {
                ws.selector.save(&EventScope::from(&event)).await?;
                println!("🎯 Selected as the current event");
            } else {
                println!("💡 Run 'camp-tracker event select {}' to work in this event", event.id);
            }
            Ok(())
        })
        .await
    }
}

impl Command for ListEventsCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let events = ws.tracker.list_events().await?;
            let selected = ws.selector.load().await?.map(|s| s.event_id);

            println!("📅 CAMP EVENTS");
            println!("───────────────");
            if events.is_empty() {
                println!("📋 No events yet");
                println!("   💡 Create one with: camp-tracker event create --name 'Camp' --date 2025-02-14");
                return Ok(());
            }
            for event in &events {
                let marker = if Some(event.id) == selected { "👉" } else { "  " };
                let count = ws.tracker.records().count_beneficiaries(&event.id).await?;
                println!(
                    "{} {}  {}  {}  ({} registered)",
                    marker, event.event_date, event.event_name, event.location, count
                );
                println!("     🆔 {}", event.id);
            }
            Ok(())
        })
        .await
    }
}

impl Command for SelectEventCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let scope = ws.tracker.open_scope(&self.id).await?;
            ws.selector.save(&scope).await?;
            println!("🎯 Working in {} ({})", scope.event_name, scope.event_date);
            Ok(())
        })
        .await
    }
}

impl Command for UpdateEventCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            let current = ws.tracker.get_event(&self.id).await?;
            let draft = EventDraft {
                event_name: self.name.clone().unwrap_or(current.event_name),
                event_date: self.date.unwrap_or(current.event_date),
                location: self.location.clone().unwrap_or(current.location),
            };
            let event = ws.tracker.update_event(&self.id, draft).await?;

            // Keep the remembered selection in step with the renamed event
            if let Some(selected) = ws.selector.load().await? {
                if selected.event_id == event.id {
                    ws.selector.save(&EventScope::from(&event)).await?;
                }
            }

            println!("✏️  Updated event: {} ({})", event.event_name, event.event_date);
            Ok(())
        })
        .await
    }
}

impl Command for DeleteEventCommand {
    async fn execute(&self) -> Result<()> {
        with_workspace(|ws| async move {
            ws.tracker.delete_event(&self.id).await?;
            if let Some(selected) = ws.selector.load().await? {
                if selected.event_id == self.id {
                    ws.selector.clear().await?;
                }
            }
            println!("🗑️  Deleted event {}", self.id);
            Ok(())
        })
        .await
    }
}
