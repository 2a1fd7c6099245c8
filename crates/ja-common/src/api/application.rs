use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::api::competence::TranslationDto;

/// Review state of one availability row. Stored as its snake_case label.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Unhandled,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Unhandled => "unhandled",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetenceClaim {
    pub competence_id: i32,
    pub years_of_experience: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilityPeriod {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// Payload accepted by `submit_application`. The username comes from the
/// authenticated identity, never from the request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationSubmission {
    pub username: String,
    #[serde(default)]
    pub competencies: Vec<CompetenceClaim>,
    #[serde(default)]
    pub periods: Vec<AvailabilityPeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub person_id: i32,
    pub competence_profiles: usize,
    pub availability_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    pub availability_id: i32,
    pub application_status: ApplicationStatus,
    pub version_number: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdateResponse {
    pub availability_id: i32,
    pub application_status: ApplicationStatus,
    pub version_number: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetenceProfileDto {
    pub competence_id: i32,
    pub years_of_experience: f64,
    pub translations: Vec<TranslationDto>,
}

/// One availability joined with its owner and the owner's competence profiles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationDto {
    pub availability_id: i32,
    pub person_id: i32,
    pub name: String,
    pub surname: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub application_status: ApplicationStatus,
    pub version_number: i32,
    pub created_at: DateTime<Utc>,
    pub competence_profiles: Vec<CompetenceProfileDto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_labels_match_stored_text() {
        assert_eq!(ApplicationStatus::Unhandled.as_str(), "unhandled");
        assert_eq!(ApplicationStatus::Accepted.as_str(), "accepted");
        assert_eq!(
            ApplicationStatus::from_str("rejected").unwrap(),
            ApplicationStatus::Rejected
        );
        assert!(ApplicationStatus::from_str("pending").is_err());
    }

    #[test]
    fn submission_parses_iso_dates() {
        let submission: ApplicationSubmission = serde_json::from_value(serde_json::json!({
            "username": "alice",
            "competencies": [{"competence_id": 3, "years_of_experience": 2.0}],
            "periods": [{"from_date": "2024-01-01", "to_date": "2024-01-10"}]
        }))
        .unwrap();

        assert_eq!(submission.competencies.len(), 1);
        assert_eq!(
            submission.periods[0].from_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }
}
