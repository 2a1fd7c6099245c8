use std::str::FromStr;

use deadpool_postgres::GenericClient;
use tokio_postgres::Row;
use tracing::{info, instrument, warn};

use crate::api::application::{
    ApplicationDto, ApplicationStatus, ApplicationSubmission, CompetenceProfileDto, StatusUpdate,
    StatusUpdateResponse, SubmissionReceipt,
};
use crate::api::competence::TranslationDto;
use crate::db::util::TimedClientExt;
use crate::db::{PgPool, db_error};
use crate::validation::check_submission;

db_error!(ApplicationStorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid application: {0}")]
    Validation(String),
    #[error(
        "availability {availability_id} was modified concurrently; current version is {current_version}"
    )]
    VersionConflict {
        availability_id: i32,
        current_version: i32,
    },
});

/// Profile columns of one joined row; absent when the owner has no profiles.
#[derive(Debug, Clone, PartialEq)]
struct ProfileCells {
    competence_id: i32,
    years_of_experience: f64,
    competence_exists: bool,
    translation: Option<TranslationDto>,
}

#[derive(Debug, Clone, PartialEq)]
struct JoinedRow {
    application: ApplicationDto,
    profile: Option<ProfileCells>,
}

fn parse_status(value: &str) -> Result<ApplicationStatus, ApplicationStorageError> {
    ApplicationStatus::from_str(value).map_err(|_| {
        ApplicationStorageError::integrity(format!("unknown application_status: {value}"))
    })
}

fn row_to_joined(row: &Row) -> Result<JoinedRow, ApplicationStorageError> {
    let status: String = row.try_get("application_status")?;

    let application = ApplicationDto {
        availability_id: row.try_get("availability_id")?,
        person_id: row.try_get("person_id")?,
        name: row.try_get("name")?,
        surname: row.try_get("surname")?,
        from_date: row.try_get("from_date")?,
        to_date: row.try_get("to_date")?,
        application_status: parse_status(&status)?,
        version_number: row.try_get("version_number")?,
        created_at: row.try_get("created_at")?,
        competence_profiles: Vec::new(),
    };

    let profile_competence_id: Option<i32> = row.try_get("profile_competence_id")?;
    let profile = match profile_competence_id {
        None => None,
        Some(competence_id) => {
            let joined_competence_id: Option<i32> = row.try_get("joined_competence_id")?;
            let language: Option<String> = row.try_get("language")?;
            let translation_name: Option<String> = row.try_get("translation_name")?;

            Some(ProfileCells {
                competence_id,
                years_of_experience: row.try_get("years_of_experience")?,
                competence_exists: joined_competence_id.is_some(),
                translation: language
                    .zip(translation_name)
                    .map(|(language, name)| TranslationDto { language, name }),
            })
        }
    };

    Ok(JoinedRow {
        application,
        profile,
    })
}

/// Folds the fan-out of availability × profile × translation rows, ordered by
/// availability id then competence id, into one entry per availability.
fn assemble_applications(
    rows: impl IntoIterator<Item = JoinedRow>,
) -> Result<Vec<ApplicationDto>, ApplicationStorageError> {
    let mut applications: Vec<ApplicationDto> = Vec::new();

    for JoinedRow {
        application,
        profile,
    } in rows
    {
        let starts_new = applications
            .last()
            .is_none_or(|last| last.availability_id != application.availability_id);
        if starts_new {
            applications.push(application);
        }

        let (Some(profile), Some(current)) = (profile, applications.last_mut()) else {
            continue;
        };

        if !profile.competence_exists {
            return Err(ApplicationStorageError::integrity(format!(
                "competence profile of person {} references missing competence {}",
                current.person_id, profile.competence_id
            )));
        }

        match current.competence_profiles.last_mut() {
            Some(last) if last.competence_id == profile.competence_id => {
                last.translations.extend(profile.translation);
            }
            _ => current.competence_profiles.push(CompetenceProfileDto {
                competence_id: profile.competence_id,
                years_of_experience: profile.years_of_experience,
                translations: profile.translation.into_iter().collect(),
            }),
        }
    }

    Ok(applications)
}

async fn resolve_person_id(
    client: &impl GenericClient,
    username: &str,
) -> Result<i32, ApplicationStorageError> {
    let row = client
        .timed_query_opt(
            "SELECT person_id FROM recruit.person WHERE username = $1",
            &[&username],
            "resolve_person_id",
        )
        .await?
        .ok_or_else(|| ApplicationStorageError::NotFound(format!("person {username}")))?;

    Ok(row.try_get("person_id")?)
}

async fn store_submission(
    pool: &PgPool,
    submission: &ApplicationSubmission,
) -> Result<SubmissionReceipt, ApplicationStorageError> {
    let mut client = pool.get().await?;
    let person_id = resolve_person_id(&client, &submission.username).await?;

    // Dropping `tx` without commit rolls back everything below.
    let tx = client.transaction().await?;

    let upsert_profile = tx
        .prepare_cached(
            "INSERT INTO recruit.competence_profile (person_id, competence_id, years_of_experience)
             VALUES ($1, $2, $3)
             ON CONFLICT (person_id, competence_id)
             DO UPDATE SET years_of_experience = EXCLUDED.years_of_experience",
        )
        .await?;

    for claim in &submission.competencies {
        tx.timed_execute(
            &upsert_profile,
            &[
                &person_id,
                &claim.competence_id,
                &claim.years_of_experience,
            ],
            "upsert_competence_profile",
        )
        .await?;
    }

    let insert_availability = tx
        .prepare_cached(
            "INSERT INTO recruit.availability
                (person_id, from_date, to_date, application_status, version_number)
             VALUES ($1, $2, $3, $4, 0)
             RETURNING availability_id",
        )
        .await?;

    let initial_status = ApplicationStatus::Unhandled.as_str();
    let mut availability_ids = Vec::with_capacity(submission.periods.len());
    for period in &submission.periods {
        let row = tx
            .timed_query_one(
                &insert_availability,
                &[
                    &person_id,
                    &period.from_date,
                    &period.to_date,
                    &initial_status,
                ],
                "insert_availability",
            )
            .await?;
        availability_ids.push(row.try_get("availability_id")?);
    }

    tx.commit().await?;

    Ok(SubmissionReceipt {
        person_id,
        competence_profiles: submission.competencies.len(),
        availability_ids,
    })
}

/// Stores every competence profile and availability of one submission in a
/// single transaction. Profiles already on file take the submitted experience.
#[instrument(skip(pool, submission), fields(username = %submission.username))]
pub async fn submit_application(
    pool: &PgPool,
    submission: &ApplicationSubmission,
) -> Result<SubmissionReceipt, ApplicationStorageError> {
    check_submission(submission).map_err(ApplicationStorageError::Validation)?;

    let receipt = store_submission(pool, submission)
        .await
        .map_err(|err| {
            if err.is_foreign_key_violation() {
                ApplicationStorageError::Validation(
                    "application references an unknown competence".into(),
                )
            } else {
                err.during("submit_application")
            }
        })?;

    info!(
        person_id = receipt.person_id,
        competence_profiles = receipt.competence_profiles,
        availabilities = receipt.availability_ids.len(),
        "application submitted"
    );
    Ok(receipt)
}

async fn fetch_applications(pool: &PgPool) -> Result<Vec<ApplicationDto>, ApplicationStorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare_cached(
            "SELECT
                a.availability_id,
                a.person_id,
                p.name,
                p.surname,
                a.from_date,
                a.to_date,
                a.application_status,
                a.version_number,
                a.created_at,
                cp.competence_id AS profile_competence_id,
                cp.years_of_experience,
                c.competence_id AS joined_competence_id,
                ct.language,
                ct.name AS translation_name
            FROM recruit.availability a
            JOIN recruit.person p ON p.person_id = a.person_id
            LEFT JOIN recruit.competence_profile cp ON cp.person_id = a.person_id
            LEFT JOIN recruit.competence c ON c.competence_id = cp.competence_id
            LEFT JOIN recruit.competence_translation ct ON ct.competence_id = c.competence_id
            ORDER BY a.availability_id, cp.competence_id, ct.language",
        )
        .await?;

    let rows = client.timed_query(&stmt, &[], "list_applications").await?;
    let joined = rows
        .iter()
        .map(row_to_joined)
        .collect::<Result<Vec<_>, _>>()?;

    assemble_applications(joined)
}

/// Every availability with its owner's name and competence profiles, read in
/// one statement.
#[instrument(skip(pool))]
pub async fn list_applications(
    pool: &PgPool,
) -> Result<Vec<ApplicationDto>, ApplicationStorageError> {
    fetch_applications(pool)
        .await
        .map_err(|err| err.during("list_applications"))
}

async fn compare_and_set_status(
    pool: &PgPool,
    update: &StatusUpdate,
) -> Result<StatusUpdateResponse, ApplicationStorageError> {
    let client = pool.get().await?;

    let updated = client
        .timed_query_opt(
            "UPDATE recruit.availability
             SET application_status = $1, version_number = version_number + 1
             WHERE availability_id = $2 AND version_number = $3
             RETURNING version_number",
            &[
                &update.application_status.as_str(),
                &update.availability_id,
                &update.version_number,
            ],
            "update_application_status",
        )
        .await?;

    if let Some(row) = updated {
        return Ok(StatusUpdateResponse {
            availability_id: update.availability_id,
            application_status: update.application_status,
            version_number: row.try_get("version_number")?,
        });
    }

    // Nothing matched: either the row is gone or its version moved on.
    let current = client
        .timed_query_opt(
            "SELECT version_number FROM recruit.availability WHERE availability_id = $1",
            &[&update.availability_id],
            "read_availability_version",
        )
        .await?;

    match current {
        None => Err(ApplicationStorageError::NotFound(format!(
            "availability {}",
            update.availability_id
        ))),
        Some(row) => Err(ApplicationStorageError::VersionConflict {
            availability_id: update.availability_id,
            current_version: row.try_get("version_number")?,
        }),
    }
}

/// Moves an availability to a new status if the caller saw the latest
/// version. The version advances by exactly one per successful call.
#[instrument(skip(pool))]
pub async fn update_application_status(
    pool: &PgPool,
    update: &StatusUpdate,
) -> Result<StatusUpdateResponse, ApplicationStorageError> {
    if update.version_number < 0 {
        return Err(ApplicationStorageError::Validation(
            "version_number must not be negative".into(),
        ));
    }

    let result = compare_and_set_status(pool, update)
        .await
        .map_err(|err| err.during("update_application_status"));

    match &result {
        Ok(response) => info!(
            availability_id = response.availability_id,
            status = response.application_status.as_str(),
            version_number = response.version_number,
            "application status updated"
        ),
        Err(ApplicationStorageError::VersionConflict {
            availability_id,
            current_version,
        }) => warn!(
            availability_id,
            presented_version = update.version_number,
            current_version,
            "stale application status update rejected"
        ),
        Err(_) => {}
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn application(availability_id: i32, person_id: i32) -> ApplicationDto {
        ApplicationDto {
            availability_id,
            person_id,
            name: "Alice".into(),
            surname: "Andersson".into(),
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            application_status: ApplicationStatus::Unhandled,
            version_number: 0,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
            competence_profiles: Vec::new(),
        }
    }

    fn profile(competence_id: i32, language: Option<&str>) -> ProfileCells {
        ProfileCells {
            competence_id,
            years_of_experience: 2.0,
            competence_exists: true,
            translation: language.map(|language| TranslationDto {
                language: language.into(),
                name: format!("competence {competence_id} ({language})"),
            }),
        }
    }

    fn joined(availability_id: i32, profile: Option<ProfileCells>) -> JoinedRow {
        JoinedRow {
            application: application(availability_id, 7),
            profile,
        }
    }

    #[test]
    fn nests_profiles_and_translations_per_availability() {
        let assembled = assemble_applications(vec![
            joined(1, Some(profile(3, Some("en")))),
            joined(1, Some(profile(3, Some("sv")))),
            joined(1, Some(profile(5, Some("en")))),
            joined(2, Some(profile(3, Some("en")))),
        ])
        .unwrap();

        assert_eq!(assembled.len(), 2);
        let first = &assembled[0];
        assert_eq!(first.competence_profiles.len(), 2);
        assert_eq!(first.competence_profiles[0].competence_id, 3);
        assert_eq!(first.competence_profiles[0].translations.len(), 2);
        assert_eq!(first.competence_profiles[1].translations.len(), 1);
        assert_eq!(assembled[1].competence_profiles.len(), 1);
    }

    #[test]
    fn keeps_availability_without_profiles() {
        let assembled = assemble_applications(vec![joined(4, None)]).unwrap();

        assert_eq!(assembled.len(), 1);
        assert!(assembled[0].competence_profiles.is_empty());
    }

    #[test]
    fn keeps_profile_of_untranslated_competence() {
        let assembled = assemble_applications(vec![joined(1, Some(profile(9, None)))]).unwrap();

        assert_eq!(assembled[0].competence_profiles.len(), 1);
        assert!(assembled[0].competence_profiles[0].translations.is_empty());
    }

    #[test]
    fn dangling_profile_is_an_integrity_fault() {
        let mut dangling = profile(9, None);
        dangling.competence_exists = false;

        let err = assemble_applications(vec![joined(1, Some(dangling))])
            .unwrap_err()
            .during("list_applications");

        assert!(matches!(err, ApplicationStorageError::Persistence { .. }));
        assert!(err.to_string().starts_with("list_applications failed:"));
        assert!(err.to_string().contains("missing competence 9"));
    }

    #[test]
    fn rejects_unknown_status_text() {
        assert_eq!(parse_status("accepted").unwrap(), ApplicationStatus::Accepted);
        assert!(parse_status("archived").is_err());
    }

    #[test]
    fn pooled_connections_serve_as_generic_clients() {
        fn assert_generic_client<C: GenericClient>() {}
        assert_generic_client::<deadpool_postgres::Object>();
        assert_generic_client::<deadpool_postgres::Transaction<'static>>();
    }

    #[test]
    fn version_conflict_names_current_version() {
        let err = ApplicationStorageError::VersionConflict {
            availability_id: 12,
            current_version: 4,
        };
        assert!(err.to_string().contains("current version is 4"));
        assert!(!err.is_unique_violation());
    }
}
