use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::aid::TypeOfAid;
use super::event::EventId;
use crate::stages::{ExtraItem, FitmentData, MeasurementData, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeneficiaryId(pub Uuid);

impl BeneficiaryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BeneficiaryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BeneficiaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for BeneficiaryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(BeneficiaryId)
    }
}

/// Sequential display number, `REG-0001` style. Unique within an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegNumber(String);

impl RegNumber {
    pub const PREFIX: &'static str = "REG-";

    /// Number for the `n`th beneficiary of an event (1-based).
    pub fn sequential(n: u64) -> Self {
        Self(format!("{}{:04}", Self::PREFIX, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RegNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let digits = upper.strip_prefix(Self::PREFIX).unwrap_or(&upper);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("'{s}' is not a registration number (expected REG-0001)"));
        }
        let n: u64 = digits
            .parse()
            .map_err(|_| format!("'{s}' is not a registration number"))?;
        Ok(Self::sequential(n))
    }
}

/// How a desk refers to a beneficiary: by id or by registration number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeneficiaryRef {
    Id(BeneficiaryId),
    RegNumber(RegNumber),
}

impl FromStr for BeneficiaryRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<BeneficiaryId>() {
            return Ok(BeneficiaryRef::Id(id));
        }
        s.parse::<RegNumber>().map(BeneficiaryRef::RegNumber)
    }
}

impl fmt::Display for BeneficiaryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeneficiaryRef::Id(id) => id.fmt(f),
            BeneficiaryRef::RegNumber(reg) => reg.fmt(f),
        }
    }
}

/// Personal details captured at the registration desk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrationDetails {
    pub name: String,
    pub father_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<u8>,
    pub address: Option<String>,
    pub state: Option<String>,
    pub phone_number: Option<String>,
    pub aadhar_number: Option<String>,
    pub type_of_aid: TypeOfAid,
}

pub const MAX_AGE: u8 = 120;

/// Whole years between `dob` and `today`, floored at zero.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u8 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age.clamp(0, i32::from(u8::MAX)) as u8
}

fn tidy(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RegistrationDetails {
    /// Trim text fields, derive age from date of birth, and check bounds.
    pub fn normalized(self, today: NaiveDate) -> Result<Self, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("Name is required".to_string());
        }

        let age = match self.date_of_birth {
            Some(dob) => Some(age_on(dob, today)),
            None => self.age,
        };
        if let Some(age) = age {
            if age > MAX_AGE {
                return Err(format!("Age must be between 0 and {MAX_AGE}"));
            }
        }

        let mut type_of_aid = self.type_of_aid;
        if !type_of_aid.others {
            type_of_aid.others_specify = None;
        }

        Ok(Self {
            name,
            father_name: tidy(self.father_name),
            date_of_birth: self.date_of_birth,
            age,
            address: tidy(self.address),
            state: tidy(self.state),
            phone_number: tidy(self.phone_number),
            aadhar_number: tidy(self.aadhar_number),
            type_of_aid,
        })
    }
}

/// A beneficiary row as held by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: BeneficiaryId,
    pub event_id: EventId,
    pub reg_number: RegNumber,
    pub camp_date: NaiveDate,
    #[serde(flatten)]
    pub details: RegistrationDetails,
    pub current_step: Step,
    pub completed_steps: Vec<Step>,
    #[serde(default)]
    pub step_volunteers: BTreeMap<Step, String>,
    pub before_photo_url: Option<String>,
    pub measurement_data: Option<MeasurementData>,
    pub fitment_data: Option<FitmentData>,
    pub extra_items: Option<Vec<ExtraItem>>,
    pub after_photo_url: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Beneficiary {
    /// A freshly registered beneficiary, waiting at the before-photo desk.
    pub fn registered(
        event_id: EventId,
        reg_number: RegNumber,
        camp_date: NaiveDate,
        details: RegistrationDetails,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BeneficiaryId::new(),
            event_id,
            reg_number,
            camp_date,
            details,
            current_step: Step::BeforePhoto,
            completed_steps: vec![Step::Registration],
            step_volunteers: BTreeMap::new(),
            before_photo_url: None,
            measurement_data: None,
            fitment_data: None,
            extra_items: None,
            after_photo_url: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn extra_items_text(&self) -> String {
        match self.extra_items.as_deref() {
            Some(items) if !items.is_empty() => items
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            _ => "No extra items".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reg_number_formatting_and_parsing() {
        assert_eq!(RegNumber::sequential(1).as_str(), "REG-0001");
        assert_eq!(RegNumber::sequential(12345).as_str(), "REG-12345");
        assert_eq!("reg-0007".parse::<RegNumber>().unwrap(), RegNumber::sequential(7));
        assert_eq!("42".parse::<RegNumber>().unwrap(), RegNumber::sequential(42));
        assert!("REG-".parse::<RegNumber>().is_err());
        assert!("REG-12a".parse::<RegNumber>().is_err());
    }

    #[test]
    fn test_beneficiary_ref_prefers_uuid() {
        let id = BeneficiaryId::new();
        assert_eq!(id.to_string().parse::<BeneficiaryRef>().unwrap(), BeneficiaryRef::Id(id));
        assert_eq!(
            "REG-0003".parse::<BeneficiaryRef>().unwrap(),
            BeneficiaryRef::RegNumber(RegNumber::sequential(3))
        );
    }

    #[test]
    fn test_age_counts_whole_years() {
        assert_eq!(age_on(date(1990, 6, 15), date(2025, 6, 14)), 34);
        assert_eq!(age_on(date(1990, 6, 15), date(2025, 6, 15)), 35);
        assert_eq!(age_on(date(2030, 1, 1), date(2025, 6, 15)), 0);
    }

    #[test]
    fn test_normalized_derives_age_and_trims() {
        let details = RegistrationDetails {
            name: "  Meena Devi ".into(),
            date_of_birth: Some(date(1980, 1, 1)),
            age: Some(3),
            address: Some("   ".into()),
            ..Default::default()
        };
        let tidy = details.normalized(date(2025, 1, 2)).unwrap();
        assert_eq!(tidy.name, "Meena Devi");
        assert_eq!(tidy.age, Some(45));
        assert_eq!(tidy.address, None);
    }

    #[test]
    fn test_normalized_rejects_missing_name_and_old_age() {
        let today = date(2025, 1, 1);
        assert!(RegistrationDetails::default().normalized(today).is_err());
        let ancient = RegistrationDetails {
            name: "X".into(),
            age: Some(121),
            ..Default::default()
        };
        assert!(ancient.normalized(today).is_err());
    }

    #[test]
    fn test_new_registration_waits_for_before_photo() {
        let b = Beneficiary::registered(
            EventId::new(),
            RegNumber::sequential(1),
            date(2025, 3, 1),
            RegistrationDetails {
                name: "Ramesh".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(b.current_step, Step::BeforePhoto);
        assert_eq!(b.completed_steps, vec![Step::Registration]);
        assert_eq!(b.extra_items_text(), "No extra items");
    }
}
