/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - access (認証) は v1 全体に route_layer で掛ける
 * - permission (認可) は必要な routes だけに個別に掛ける
 */
use axum::{
    Router,
    routing::{delete, get},
};

use crate::api::v1::handlers::{
    identity::me,
    users::{evict_user_cache, get_user_roles},
};
use crate::middleware::auth::{access, permission};
use crate::state::AppState;

pub const USER_READ: &str = "user:read";
pub const USER_ADMIN: &str = "user:admin";

pub fn routes(state: AppState) -> Router<AppState> {
    let readers = permission::require(
        Router::new().route("/users/{subject}/roles", get(get_user_roles)),
        &state,
        &[USER_READ, USER_ADMIN],
    );

    let admins = permission::require(
        Router::new().route("/users/{subject}/cache", delete(evict_user_cache)),
        &state,
        &[USER_ADMIN],
    );

    let protected = Router::new()
        .route("/me", get(me))
        .merge(readers)
        .merge(admins);

    access::apply(protected, state)
}
