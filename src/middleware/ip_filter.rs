//! IP allow-list filter.
//!
//! Runs before credential verification: a blocked address never reaches the
//! verifier, the identity cache or the user store.
//! An empty allow-list disables the check.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::security::{SecurityEvent, SecurityEventType, client_ip};
use crate::state::AppState;

pub fn apply(router: Router, state: AppState) -> Router {
    router.layer(middleware::from_fn_with_state(state, ip_filter_middleware))
}

async fn ip_filter_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if state.allowlist.is_empty() {
        return Ok(next.run(req).await);
    }

    let ip = client_ip::from_request(&req);
    if !state.allowlist.permits(ip) {
        tracing::warn!(
            client_ip = ip.map(|ip| ip.to_string()).as_deref().unwrap_or("unknown"),
            path = %req.uri().path(),
            "client address not in allow-list"
        );
        state.events.record(
            SecurityEvent::from_request(SecurityEventType::IpBlocked, &req)
                .with_detail("address not in allow-list"),
        );
        return Err(AppError::IpDenied);
    }

    Ok(next.run(req).await)
}
