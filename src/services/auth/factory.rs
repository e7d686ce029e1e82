/// Factory: build `AccessTokenVerifier` from application `AuthConfig`.
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::services::auth::access_jwt::{AccessTokenVerifier, VerifierSettings};

pub fn build_verifier(config: &AuthConfig) -> Result<Arc<AccessTokenVerifier>, AppError> {
    let verifier = AccessTokenVerifier::new(
        &config.verification_key,
        VerifierSettings {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            leeway_seconds: config.access_token_leeway_seconds,
            cookie_name: config.credential_cookie.clone(),
        },
    )
    .map_err(|e| {
        tracing::error!(error = %e, "failed to build access token verifier");
        AppError::Internal
    })?;

    Ok(Arc::new(verifier))
}
