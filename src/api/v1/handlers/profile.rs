/*
 * Responsibility
 * - GET /self/profile: the profile of the certificate holder making the request
 * - Identity comes from AuthCtxExtractor (401 when absent)
 */
use axum::{Json, extract::State};

use crate::{
    api::v1::{dto::profile::ProfileResponse, extractors::auth_ctx::AuthCtxExtractor},
    error::AppError,
    state::AppState,
};

pub async fn get_self_profile(
    State(state): State<AppState>,
    AuthCtxExtractor(auth): AuthCtxExtractor,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state
        .profiles
        .find_by_id(auth.profile_id)
        .await?
        .ok_or(AppError::not_found("profile"))?;

    Ok(Json(profile.into()))
}
