use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(EventId)
    }
}

/// A distribution camp. Every beneficiary belongs to exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampEvent {
    pub id: EventId,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

/// Editable fields of a camp event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub event_name: String,
    pub event_date: NaiveDate,
    pub location: String,
}

impl EventDraft {
    pub fn validate(&self) -> Result<(), String> {
        if self.event_name.trim().is_empty() {
            return Err("Event name is required".to_string());
        }
        Ok(())
    }

    pub fn into_event(self, created_at: DateTime<Utc>) -> CampEvent {
        CampEvent {
            id: EventId::new(),
            event_name: self.event_name.trim().to_string(),
            event_date: self.event_date,
            location: self.location.trim().to_string(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_requires_name() {
        let draft = EventDraft {
            event_name: " ".into(),
            event_date: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            location: "Jaipur".into(),
        };
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_event_id_round_trips_through_text() {
        let id = EventId::new();
        assert_eq!(id.to_string().parse::<EventId>().unwrap(), id);
        assert!("not-a-uuid".parse::<EventId>().is_err());
    }
}
