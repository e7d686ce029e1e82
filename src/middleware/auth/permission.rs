//! Route-level permission requirement (any-of).
//!
//! Must sit inside `access::apply`: it reads the `AuthCtx` the access middleware inserted.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::permission;
use crate::services::security::{SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::state::AppState;

#[derive(Clone)]
struct PermissionGate {
    required: Arc<[String]>,
    events: Arc<dyn SecurityEventSink>,
}

/// Require at least one of `required` on every route of `router`.
///
/// 例：
/// ```ignore
/// let admin = Router::new().route("/users/{subject}/cache", delete(evict_user_cache));
/// let admin = middleware::auth::permission::require(admin, &state, &["user:admin"]);
/// ```
pub fn require(router: Router<AppState>, state: &AppState, required: &[&str]) -> Router<AppState> {
    let gate = PermissionGate {
        required: required.iter().map(|p| (*p).to_string()).collect(),
        events: state.events.clone(),
    };
    router.route_layer(middleware::from_fn_with_state(gate, permission_middleware))
}

async fn permission_middleware(
    State(gate): State<PermissionGate>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ctx) = req.extensions().get::<AuthCtx>() else {
        // wiring error: permission layer without access layer
        tracing::error!("permission check reached without an authenticated context");
        return Err(AppError::Internal);
    };

    if !permission::authorize(&ctx.user, &gate.required[..]) {
        tracing::warn!(
            subject = %ctx.identity.subject,
            required = ?gate.required,
            "insufficient permissions"
        );
        gate.events.record(
            SecurityEvent::from_request(SecurityEventType::PermissionDenied, &req)
                .with_detail(format!("requires any of {}", gate.required.join(","))),
        );
        return Err(AppError::InsufficientPermissions);
    }

    Ok(next.run(req).await)
}
