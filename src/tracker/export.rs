use chrono::NaiveDate;
use serde::Serialize;

use crate::models::Beneficiary;

/// Inclusive camp-date window for an export. Open ends match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ExportRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, String> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(format!("Export range starts ({from}) after it ends ({to})"));
            }
        }
        Ok(Self { from, to })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            from: Some(day),
            to: Some(day),
        }
    }
}

/// `limb-distribution-{start}-to-{end}.json`
pub fn export_file_name(range: &ExportRange) -> String {
    let start = range.from.map_or_else(|| "all".to_string(), |d| d.to_string());
    let end = range.to.map_or_else(|| "all".to_string(), |d| d.to_string());
    format!("limb-distribution-{start}-to-{end}.json")
}

/// One spreadsheet-style row, keyed by the column headings volunteers read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Camp Date")]
    pub camp_date: NaiveDate,
    #[serde(rename = "Registration Number")]
    pub reg_number: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Father's Name")]
    pub father_name: Option<String>,
    #[serde(rename = "Date of Birth")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(rename = "Age")]
    pub age: Option<u8>,
    #[serde(rename = "Address")]
    pub address: Option<String>,
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "Phone Number")]
    pub phone_number: Option<String>,
    #[serde(rename = "Aadhar Number")]
    pub aadhar_number: Option<String>,
    #[serde(rename = "Type of Aid")]
    pub type_of_aid: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Extra Items")]
    pub extra_items: String,
    #[serde(rename = "Before Photo URL")]
    pub before_photo_url: Option<String>,
    #[serde(rename = "After Photo URL")]
    pub after_photo_url: Option<String>,
    /// dd/mm/yyyy
    #[serde(rename = "Registration Date")]
    pub registration_date: String,
}

impl From<&Beneficiary> for ExportRow {
    fn from(b: &Beneficiary) -> Self {
        let d = &b.details;
        Self {
            camp_date: b.camp_date,
            reg_number: b.reg_number.to_string(),
            name: d.name.clone(),
            father_name: d.father_name.clone(),
            date_of_birth: d.date_of_birth,
            age: d.age,
            address: d.address.clone(),
            state: d.state.clone(),
            phone_number: d.phone_number.clone(),
            aadhar_number: d.aadhar_number.clone(),
            type_of_aid: d.type_of_aid.display(),
            status: b.current_step.display_name().to_string(),
            extra_items: b.extra_items_text(),
            before_photo_url: b.before_photo_url.clone(),
            after_photo_url: b.after_photo_url.clone(),
            registration_date: b.created_at.format("%d/%m/%Y").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::beneficiary_at;
    use crate::stages::Step;

    #[test]
    fn test_row_uses_human_labels() {
        let mut b = beneficiary_at(Step::Fitment);
        b.details.type_of_aid.set_flag("stick=2").unwrap();
        let row = serde_json::to_value(ExportRow::from(&b)).unwrap();
        assert_eq!(row["Registration Number"], "REG-0001");
        assert_eq!(row["Type of Aid"], "Stick (Qty: 2)");
        assert_eq!(row["Status"], Step::Fitment.display_name());
        assert!(row.get("Father's Name").is_some());
    }

    #[test]
    fn test_range_validation_and_file_name() {
        let a = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        assert!(ExportRange::new(Some(b), Some(a)).is_err());
        let range = ExportRange::new(Some(a), Some(b)).unwrap();
        assert_eq!(
            export_file_name(&range),
            "limb-distribution-2025-02-01-to-2025-02-28.json"
        );
        assert_eq!(
            export_file_name(&ExportRange::default()),
            "limb-distribution-all-to-all.json"
        );
    }
}
