/*
 * Responsibility
 * - /users/{subject} 系 handler (roles 参照 / identity cache の evict)
 * - 対象 subject は呼び出し元の client scope の中でだけ解決する
 */
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    api::v1::{dto::identity::UserRolesResponse, extractors::AuthCtxExtractor},
    error::AppError,
    services::identity::{ResolutionError, SubjectId},
    state::AppState,
};

pub async fn get_user_roles(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(subject): Path<String>,
) -> Result<Json<UserRolesResponse>, AppError> {
    let subject = SubjectId::parse(&subject)?;

    let user = state
        .resolver
        .resolve_subject(&subject, ctx.tenant().client_id.as_deref())
        .await
        .map_err(|err| match err {
            ResolutionError::UnknownUser => AppError::not_found("user"),
            other => {
                tracing::error!(error = %other, subject = %subject, "user lookup failed");
                other.into()
            }
        })?;

    Ok(Json(UserRolesResponse::from(&user)))
}

pub async fn evict_user_cache(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(subject): Path<String>,
) -> Result<StatusCode, AppError> {
    let subject = SubjectId::parse(&subject)?;

    let evicted = state
        .resolver
        .invalidate(&subject, ctx.tenant().client_id.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, subject = %subject, "identity cache eviction failed");
            AppError::Internal
        })?;

    tracing::info!(
        subject = %subject,
        evicted,
        by = %ctx.subject(),
        "identity cache entry evicted"
    );

    Ok(StatusCode::NO_CONTENT)
}
