//! access token 検証 → identity 組み立て → user 解決 → AuthCtx を extensions に入れる
//!
//! Stages run strictly in order and the first failure ends the request:
//! 1. credential を取り出して署名・期限を検証 (AccessTokenVerifier)
//! 2. claims から IdentityContext を組み立てる (mandatory scope binding は fail-closed)
//! 3. identity cache → user store で UserRecord を解決
//!
//! No cache or store access happens before step 1 succeeds.

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
use crate::services::identity::ResolutionError;
use crate::services::security::{SecurityEvent, SecurityEventType};
use crate::state::AppState;

/// 保護したい routes に認証を掛ける。
///
/// 例：
/// ```ignore
/// let protected = Router::new().route("/me", get(me));
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = match state.verifier.verify_request(req.headers()) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(error = %err, "access token verification failed");
            reject(&state, &req, err.to_string());
            return Err(err.into());
        }
    };

    let identity = match state.identity_builder.build(claims) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(error = %err, "identity context rejected");
            reject(&state, &req, err.to_string());
            return Err(err.into());
        }
    };

    let user = match state.resolver.resolve(&identity).await {
        Ok(user) => user,
        Err(ResolutionError::UnknownUser) => {
            tracing::warn!(subject = %identity.subject, "no active user for verified token");
            reject(&state, &req, "unknown user");
            return Err(AppError::UnknownUser);
        }
        Err(err) => {
            tracing::error!(error = %err, subject = %identity.subject, "identity resolution failed");
            return Err(err.into());
        }
    };

    tracing::debug!(
        subject = %identity.subject,
        client_id = identity.tenant.client_id.as_deref(),
        token_id = identity.token_id.as_deref(),
        "request authenticated"
    );

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(AuthCtx::new(identity, user));

    Ok(next.run(req).await)
}

fn reject(state: &AppState, req: &Request<Body>, detail: impl Into<String>) {
    state.events.record(
        SecurityEvent::from_request(SecurityEventType::AuthenticationFailed, req)
            .with_detail(detail),
    );
}
