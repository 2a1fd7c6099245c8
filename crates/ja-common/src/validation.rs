//! Primitive input checks run before anything reaches the database.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::application::ApplicationSubmission;

static RE_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());

static RE_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap()
});

pub const MAX_YEARS_OF_EXPERIENCE: f64 = 100.0;

pub fn is_numeric(value: &str) -> bool {
    RE_NUMERIC.is_match(value)
}

pub fn is_alphanumeric(value: &str) -> bool {
    RE_ALPHANUMERIC.is_match(value)
}

pub fn is_email(value: &str) -> bool {
    value.len() <= 254 && RE_EMAIL.is_match(value)
}

/// Inclusive on both ends. NaN is never in range.
pub fn is_in_range(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

pub fn is_ordered_period(from: NaiveDate, to: NaiveDate) -> bool {
    from <= to
}

/// Rejects submissions that would fail inside the transaction for reasons the
/// caller can fix. Returns a human-readable reason.
pub fn check_submission(submission: &ApplicationSubmission) -> Result<(), String> {
    if !is_alphanumeric(&submission.username) {
        return Err("username must be alphanumeric".into());
    }

    if submission.competencies.is_empty() && submission.periods.is_empty() {
        return Err("application must contain at least one competence or period".into());
    }

    for claim in &submission.competencies {
        if claim.competence_id <= 0 {
            return Err(format!("invalid competence id: {}", claim.competence_id));
        }
        if !is_in_range(claim.years_of_experience, 0.0, MAX_YEARS_OF_EXPERIENCE) {
            return Err(format!(
                "years_of_experience for competence {} must be between 0 and {}",
                claim.competence_id, MAX_YEARS_OF_EXPERIENCE
            ));
        }
    }

    for period in &submission.periods {
        if !is_ordered_period(period.from_date, period.to_date) {
            return Err(format!(
                "period {} - {} ends before it starts",
                period.from_date, period.to_date
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::application::{AvailabilityPeriod, CompetenceClaim};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn submission() -> ApplicationSubmission {
        ApplicationSubmission {
            username: "alice".into(),
            competencies: vec![CompetenceClaim {
                competence_id: 3,
                years_of_experience: 2.0,
            }],
            periods: vec![AvailabilityPeriod {
                from_date: date(2024, 1, 1),
                to_date: date(2024, 1, 10),
            }],
        }
    }

    #[test]
    fn primitive_predicates() {
        assert!(is_numeric("12345"));
        assert!(!is_numeric("12a"));
        assert!(!is_numeric(""));

        assert!(is_alphanumeric("alice99"));
        assert!(!is_alphanumeric("alice_99"));
        assert!(!is_alphanumeric(""));

        assert!(is_email("alice@example.com"));
        assert!(is_email("a.b+c@mail.example.se"));
        assert!(!is_email("alice@"));
        assert!(!is_email("alice example.com"));

        assert!(is_in_range(0.0, 0.0, 1.0));
        assert!(is_in_range(1.0, 0.0, 1.0));
        assert!(!is_in_range(1.5, 0.0, 1.0));
        assert!(!is_in_range(f64::NAN, 0.0, 1.0));
    }

    #[test]
    fn accepts_well_formed_submission() {
        assert!(check_submission(&submission()).is_ok());
    }

    #[test]
    fn rejects_inverted_period() {
        let mut bad = submission();
        bad.periods[0] = AvailabilityPeriod {
            from_date: date(2024, 2, 1),
            to_date: date(2024, 1, 1),
        };

        let err = check_submission(&bad).unwrap_err();
        assert!(err.contains("ends before it starts"));
    }

    #[test]
    fn rejects_out_of_range_experience_and_empty_payload() {
        let mut bad = submission();
        bad.competencies[0].years_of_experience = -1.0;
        assert!(check_submission(&bad).is_err());

        let empty = ApplicationSubmission {
            username: "alice".into(),
            competencies: vec![],
            periods: vec![],
        };
        assert!(check_submission(&empty).is_err());
    }
}
