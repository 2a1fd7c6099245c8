use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use ja_common::api::application::{
    ApplicationDto, ApplicationStatus, ApplicationSubmission, AvailabilityPeriod, CompetenceClaim,
    StatusUpdate, StatusUpdateResponse, SubmissionReceipt,
};
use ja_common::api::person::Role;
use ja_common::db::{
    find_person_by_id, list_applications as fetch_applications,
    submit_application as store_application, update_application_status,
};
use ja_common::validation::check_submission;
use serde::Deserialize;

use crate::SharedState;
use crate::auth::AuthUser;
use crate::error::ApiError;

/// Submission body; the applicant is taken from the token.
#[derive(Debug, Deserialize)]
pub struct ApplicationRequest {
    #[serde(default)]
    pub competencies: Vec<CompetenceClaim>,
    #[serde(default)]
    pub periods: Vec<AvailabilityPeriod>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub application_status: ApplicationStatus,
    pub version_number: i32,
}

pub async fn submit_application(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(payload): Json<ApplicationRequest>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), ApiError> {
    auth.require(Role::Applicant)?;

    let mut submission = ApplicationSubmission {
        username: auth.username,
        competencies: payload.competencies,
        periods: payload.periods,
    };
    check_submission(&submission).map_err(ApiError::BadRequest)?;

    // The token may predate a username change; submit under the current name.
    submission.username = find_person_by_id(state.db.pool(), auth.person_id)
        .await?
        .and_then(|person| person.username)
        .ok_or_else(|| ApiError::NotFound(format!("person {} not found", auth.person_id)))?;

    let receipt = store_application(state.db.pool(), &submission).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_applications(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<Vec<ApplicationDto>>, ApiError> {
    auth.require(Role::Recruiter)?;

    let applications = fetch_applications(state.db.pool()).await?;
    Ok(Json(applications))
}

pub async fn update_status(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<StatusChangeRequest>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    auth.require(Role::Recruiter)?;

    let update = StatusUpdate {
        availability_id: id,
        application_status: payload.application_status,
        version_number: payload.version_number,
    };

    let response = update_application_status(state.db.pool(), &update).await?;
    Ok(Json(response))
}
