/*
 * Responsibility
 * - GET /api/v1/me
 * - access middleware が解決済みの AuthCtx をそのまま返す (store へは行かない)
 */
use axum::Json;

use crate::api::v1::dto::identity::MeResponse;
use crate::api::v1::extractors::AuthCtxExtractor;

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<MeResponse> {
    Json(MeResponse::from(&ctx))
}
