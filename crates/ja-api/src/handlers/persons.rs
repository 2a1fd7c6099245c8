use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use ja_common::api::person::{
    LoginRequest, NewPerson, PasswordSetRequest, PersonDto, PersonUpdate, Role,
};
use ja_common::db::{
    create_person, find_person_by_id, login as check_credentials,
    set_password_by_email, update_person as store_person_update,
};
use serde::Serialize;

use crate::SharedState;
use crate::auth::{AuthUser, issue_token};
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub person: PersonDto,
}

pub async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<NewPerson>,
) -> Result<(StatusCode, Json<PersonDto>), ApiError> {
    let person = create_person(state.db.pool(), &payload).await?;
    Ok((StatusCode::CREATED, Json(person)))
}

pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let person = check_credentials(state.db.pool(), &payload.username, &payload.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".into()))?;

    let token = issue_token(&state.config.auth, &person)?;
    Ok(Json(LoginResponse { token, person }))
}

pub async fn me(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<PersonDto>, ApiError> {
    let person = find_person_by_id(state.db.pool(), auth.person_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("person {} not found", auth.person_id)))?;

    Ok(Json(person))
}

pub async fn get_person(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<Json<PersonDto>, ApiError> {
    auth.require(Role::Recruiter)?;

    let person = find_person_by_id(state.db.pool(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;

    Ok(Json(person))
}

pub async fn update_person(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<PersonUpdate>,
) -> Result<Json<PersonDto>, ApiError> {
    auth.require_self_or_recruiter(id)?;

    let person = store_person_update(state.db.pool(), id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;

    Ok(Json(person))
}

pub async fn set_password(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(payload): Json<PasswordSetRequest>,
) -> Result<StatusCode, ApiError> {
    auth.require(Role::Recruiter)?;

    let changed = set_password_by_email(state.db.pool(), &payload.email, &payload.password).await?;
    if !changed {
        return Err(ApiError::NotFound(format!(
            "no person with email {}",
            payload.email
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}
