use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Measurement;
use crate::error::ScolioError;
use crate::utils::{format_date_of_birth, generate_record_id, now_iso8601};

/// Patient profile with its embedded measurement history.
///
/// Field names follow the stored blob layout (camelCase).
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub date_of_birth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub measurements: Vec<Measurement>, // 按追加顺序，最旧的在前
    pub created_at: String,
}

impl Patient {
    pub fn new(
        name: &str,
        date_of_birth: NaiveDate,
        profile_picture: Option<String>,
    ) -> Result<Self, ScolioError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ScolioError::InvalidInput("Please enter patient name".to_string()));
        }

        Ok(Self {
            id: generate_record_id(),
            name: name.to_string(),
            date_of_birth: format_date_of_birth(date_of_birth),
            profile_picture,
            measurements: Vec::new(),
            created_at: now_iso8601(),
        })
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn latest_measurement(&self) -> Option<&Measurement> {
        self.measurements.last()
    }

    /// Measurements newest first, the order the detail view lists them in.
    pub fn history(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.iter().rev()
    }

    /// "1 measurement" / "3 measurements"
    pub fn measurement_summary(&self) -> String {
        let count = self.measurement_count();
        format!("{} measurement{}", count, if count == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpinalLocation;
    use assert_matches::assert_matches;

    fn dob() -> NaiveDate {
        NaiveDate::from_ymd_opt(2012, 3, 7).unwrap()
    }

    #[test]
    fn test_new_patient_trims_name_and_formats_birth_date() {
        let p = Patient::new("  Ada  ", dob(), None).unwrap();
        assert_eq!(p.name, "Ada");
        assert_eq!(p.date_of_birth, "03/07/2012");
        assert!(p.measurements.is_empty());
        assert!(!p.id.is_empty());
    }

    #[test]
    fn test_new_patient_rejects_blank_name() {
        assert_matches!(Patient::new("   ", dob(), None), Err(ScolioError::InvalidInput(_)));
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut p = Patient::new("Ada", dob(), None).unwrap();
        for (i, angle) in [3.0, 6.0, 9.0].iter().enumerate() {
            p.measurements.push(Measurement::new(
                i.to_string(),
                "d".into(),
                *angle,
                SpinalLocation::Thoracic,
                None,
            ));
        }

        let angles: Vec<f64> = p.history().map(|m| m.angle).collect();
        assert_eq!(angles, vec![9.0, 6.0, 3.0]);
        assert_eq!(p.latest_measurement().map(|m| m.angle), Some(9.0));
        assert_eq!(p.measurement_summary(), "3 measurements");
    }

    #[test]
    fn test_json_uses_camel_case_fields() {
        let p = Patient::new("Ada", dob(), Some("file:///photo.jpg".into())).unwrap();
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("dateOfBirth").is_some());
        assert!(json.get("profilePicture").is_some());
        assert!(json.get("createdAt").is_some());

        let stored = r#"{"id":"1","name":"Bo","dateOfBirth":"01/02/2010","measurements":[],"createdAt":"x"}"#;
        let p: Patient = serde_json::from_str(stored).unwrap();
        assert_eq!(p.profile_picture, None);
        assert_eq!(p.measurement_summary(), "0 measurements");
    }
}
