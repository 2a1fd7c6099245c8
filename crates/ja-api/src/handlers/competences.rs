use axum::{
    Json,
    extract::{Query, State},
};
use ja_common::api::competence::{CompetenceDto, CompetenceFilter};
use ja_common::db::list_competences as fetch_competences;

use crate::SharedState;
use crate::auth::AuthUser;
use crate::error::ApiError;

fn validate_filter(filter: &CompetenceFilter) -> Result<(), ApiError> {
    match filter.language.as_deref() {
        Some(language)
            if language.len() > 8 || !language.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            Err(ApiError::BadRequest(format!(
                "unsupported language filter: {language}"
            )))
        }
        _ => Ok(()),
    }
}

pub async fn list_competences(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Query(filter): Query<CompetenceFilter>,
) -> Result<Json<Vec<CompetenceDto>>, ApiError> {
    validate_filter(&filter)?;

    let competences = fetch_competences(state.db.pool(), &filter).await?;
    Ok(Json(competences))
}
