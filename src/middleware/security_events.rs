//! 受信した全リクエストを `request_received` として security event に流す。
//!
//! Sits outside the IP filter so blocked requests are observed too.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::services::security::{SecurityEvent, SecurityEventType};
use crate::state::AppState;

pub fn apply(router: Router, state: AppState) -> Router {
    router.layer(middleware::from_fn_with_state(state, record_request))
}

async fn record_request(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    state
        .events
        .record(SecurityEvent::from_request(SecurityEventType::RequestReceived, &req));
    next.run(req).await
}
