use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::update::FieldWrite;
use super::Step;

/// Data written by a desk when it advances a beneficiary.
///
/// Tagged by the step that owns it; a payload can only ever advance the step
/// named by its tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepPayload {
    BeforePhoto { photo_url: String },
    Measurement(MeasurementData),
    Fitment(FitmentData),
    ExtraItems { items: Vec<ExtraItem> },
    AfterPhoto { photo_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementData {
    pub length: String,
    pub circumference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitmentData {
    pub comfort_level: ComfortLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustments_made: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitment_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComfortLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ComfortLevel {
    pub fn description(&self) -> &'static str {
        match self {
            ComfortLevel::Excellent => "Excellent - Perfect fit",
            ComfortLevel::Good => "Good - Minor adjustments needed",
            ComfortLevel::Fair => "Fair - Some discomfort",
            ComfortLevel::Poor => "Poor - Major adjustments needed",
        }
    }
}

impl FromStr for ComfortLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excellent" => Ok(ComfortLevel::Excellent),
            "good" => Ok(ComfortLevel::Good),
            "fair" => Ok(ComfortLevel::Fair),
            "poor" => Ok(ComfortLevel::Poor),
            other => Err(format!(
                "unknown comfort level '{other}' (expected excellent, good, fair or poor)"
            )),
        }
    }
}

/// Items handed out at the extra-items desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraItemKind {
    Stick,
    Shoes,
    Crutches,
    Walker,
    ElbowStick,
}

pub const EXTRA_ITEM_CATALOG: [ExtraItemKind; 5] = [
    ExtraItemKind::Stick,
    ExtraItemKind::Shoes,
    ExtraItemKind::Crutches,
    ExtraItemKind::Walker,
    ExtraItemKind::ElbowStick,
];

impl ExtraItemKind {
    pub fn id(&self) -> &'static str {
        match self {
            ExtraItemKind::Stick => "stick",
            ExtraItemKind::Shoes => "shoes",
            ExtraItemKind::Crutches => "crutches",
            ExtraItemKind::Walker => "walker",
            ExtraItemKind::ElbowStick => "elbow_stick",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ExtraItemKind::Stick => "Walking Stick",
            ExtraItemKind::Shoes => "Shoes",
            ExtraItemKind::Crutches => "Crutches",
            ExtraItemKind::Walker => "Walker",
            ExtraItemKind::ElbowStick => "Elbow Stick",
        }
    }
}

impl fmt::Display for ExtraItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExtraItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        EXTRA_ITEM_CATALOG
            .iter()
            .find(|kind| kind.id() == normalized)
            .copied()
            .ok_or_else(|| format!("'{s}' is not in the extra item catalog"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraItem {
    pub item: ExtraItemKind,
    pub quantity: u32,
}

impl ExtraItem {
    pub fn new(item: ExtraItemKind, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

/// Parses `stick`, `stick=2` or `stick:2` (quantity defaults to 1).
impl FromStr for ExtraItem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, quantity) = match s.split_once(['=', ':']) {
            Some((name, qty)) => {
                let qty = qty
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("invalid quantity '{qty}' for item '{name}'"))?;
                (name, qty)
            }
            None => (s, 1),
        };
        Ok(ExtraItem::new(name.parse()?, quantity))
    }
}

impl fmt::Display for ExtraItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.item, self.quantity)
    }
}

impl StepPayload {
    /// The step this payload completes.
    pub fn step(&self) -> Step {
        match self {
            StepPayload::BeforePhoto { .. } => Step::BeforePhoto,
            StepPayload::Measurement(_) => Step::Measurement,
            StepPayload::Fitment(_) => Step::Fitment,
            StepPayload::ExtraItems { .. } => Step::ExtraItems,
            StepPayload::AfterPhoto { .. } => Step::AfterPhoto,
        }
    }

    /// Check required fields. Returns the human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StepPayload::BeforePhoto { photo_url } | StepPayload::AfterPhoto { photo_url } => {
                if photo_url.trim().is_empty() {
                    return Err("photo URL is required".to_string());
                }
            }
            StepPayload::Measurement(data) => {
                if data.length.trim().is_empty() || data.circumference.trim().is_empty() {
                    return Err("Please fill all required measurement fields (length and circumference)".to_string());
                }
            }
            // comfort_level is required by the type itself
            StepPayload::Fitment(_) => {}
            StepPayload::ExtraItems { items } => {
                let mut seen = HashSet::new();
                for item in items {
                    if item.quantity < 1 {
                        return Err(format!("quantity for {} must be at least 1", item.item));
                    }
                    if !seen.insert(item.item) {
                        return Err(format!("{} is listed more than once", item.item));
                    }
                }
            }
        }
        Ok(())
    }

    /// The field writes this payload contributes to a stage update.
    pub fn field_writes(&self) -> Vec<FieldWrite> {
        match self {
            StepPayload::BeforePhoto { photo_url } => {
                vec![FieldWrite::BeforePhotoUrl(Some(photo_url.trim().to_string()))]
            }
            StepPayload::Measurement(data) => {
                vec![FieldWrite::MeasurementData(Some(data.clone()))]
            }
            StepPayload::Fitment(data) => vec![FieldWrite::FitmentData(Some(data.clone()))],
            StepPayload::ExtraItems { items } => vec![FieldWrite::ExtraItems(Some(items.clone()))],
            StepPayload::AfterPhoto { photo_url } => {
                vec![FieldWrite::AfterPhotoUrl(Some(photo_url.trim().to_string()))]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(length: &str, circumference: &str) -> StepPayload {
        StepPayload::Measurement(MeasurementData {
            length: length.to_string(),
            circumference: circumference.to_string(),
            notes: None,
        })
    }

    #[test]
    fn test_measurement_requires_length_and_circumference() {
        assert!(measurement("42cm", "30cm").validate().is_ok());
        assert!(measurement("42cm", "  ").validate().is_err());
        assert!(measurement("", "30cm").validate().is_err());
    }

    #[test]
    fn test_extra_items_reject_duplicates_and_zero_quantity() {
        let ok = StepPayload::ExtraItems {
            items: vec![ExtraItem::new(ExtraItemKind::Stick, 2), ExtraItem::new(ExtraItemKind::Shoes, 1)],
        };
        assert!(ok.validate().is_ok());

        let empty = StepPayload::ExtraItems { items: vec![] };
        assert!(empty.validate().is_ok());

        let dup = StepPayload::ExtraItems {
            items: vec![ExtraItem::new(ExtraItemKind::Walker, 1), ExtraItem::new(ExtraItemKind::Walker, 1)],
        };
        assert!(dup.validate().unwrap_err().contains("more than once"));

        let zero = StepPayload::ExtraItems {
            items: vec![ExtraItem::new(ExtraItemKind::Crutches, 0)],
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_extra_item_parsing() {
        assert_eq!("stick".parse::<ExtraItem>().unwrap(), ExtraItem::new(ExtraItemKind::Stick, 1));
        assert_eq!(
            "elbow-stick=3".parse::<ExtraItem>().unwrap(),
            ExtraItem::new(ExtraItemKind::ElbowStick, 3)
        );
        assert!("wheelchair".parse::<ExtraItem>().is_err());
        assert!("shoes=two".parse::<ExtraItem>().is_err());
    }

    #[test]
    fn test_payload_tag_matches_step() {
        let payload = StepPayload::AfterPhoto { photo_url: "https://x/after.jpg".into() };
        assert_eq!(payload.step(), Step::AfterPhoto);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["step"], "after_photo");
    }

    #[test]
    fn test_blank_photo_url_is_rejected() {
        let payload = StepPayload::BeforePhoto { photo_url: "   ".into() };
        assert!(payload.validate().is_err());
    }
}
