use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::models::{CampEvent, EventId};

/// The camp every tracker call operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventScope {
    pub event_id: EventId,
    pub event_date: NaiveDate,
    pub event_name: String,
}

impl From<&CampEvent> for EventScope {
    fn from(event: &CampEvent) -> Self {
        Self {
            event_id: event.id,
            event_date: event.event_date,
            event_name: event.event_name.clone(),
        }
    }
}

/// Remembers the selected event between CLI invocations.
#[derive(Debug, Clone)]
pub struct EventSelector {
    path: PathBuf,
}

impl EventSelector {
    pub const FILE_NAME: &'static str = "current-event";

    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no event has been selected yet.
    pub async fn load(&self) -> Result<Option<EventScope>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let scope = serde_json::from_str(&content)
            .with_context(|| format!("Event selection in {} is corrupt", self.path.display()))?;
        Ok(Some(scope))
    }

    pub async fn save(&self, scope: &EventScope) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let serialized = serde_json::to_string_pretty(scope)?;

        // Write to temporary file first, then rename
        let temp_file = format!("{}.tmp", self.path.display());
        fs::write(&temp_file, serialized).await?;
        fs::rename(&temp_file, &self.path).await?;

        info!(event_id = %scope.event_id, event_name = %scope.event_name, "Event selected");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        if fs::try_exists(&self.path).await? {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> EventScope {
        EventScope {
            event_id: EventId::new(),
            event_date: NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
            event_name: "Jaipur Camp".into(),
        }
    }

    #[tokio::test]
    async fn test_selection_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let selector = EventSelector::new(dir.path().join("state"));
        assert_eq!(selector.load().await.unwrap(), None);

        let chosen = scope();
        selector.save(&chosen).await.unwrap();
        assert_eq!(EventSelector::new(dir.path().join("state")).load().await.unwrap(), Some(chosen));

        selector.clear().await.unwrap();
        assert_eq!(selector.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_selection_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let selector = EventSelector::new(dir.path());
        fs::write(selector.path(), "not json").await.unwrap();
        assert!(selector.load().await.is_err());
    }
}
