/*
 * Responsibility
 * - アプリ共通の AppError 定義 (pipeline の失敗分類)
 * - IntoResponse 実装 (HTTP status / JSON error body `{error, detail?}`)
 * - 各 stage のエラー (verification / validation / resolution) を統一的に変換
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::VerificationError;
use crate::services::identity::{ResolutionError, context::ValidationError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing credential")]
    MissingCredential,
    #[error("malformed credential: {0}")]
    MalformedCredential(&'static str),
    #[error("invalid signature or expired credential")]
    InvalidSignatureOrExpired,
    #[error("malformed subject")]
    MalformedSubject,
    #[error("incomplete scope binding: {0}")]
    IncompleteScopeBinding(&'static str),
    #[error("unknown user")]
    UnknownUser,
    #[error("insufficient permissions")]
    InsufficientPermissions,
    #[error("identity store unavailable")]
    StoreUnavailable,
    #[error("ip denied")]
    IpDenied,
    #[error("payload too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: usize },
    #[error("request timeout")]
    RequestTimeout,
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredential
            | AppError::InvalidSignatureOrExpired
            | AppError::IncompleteScopeBinding(_)
            | AppError::UnknownUser => StatusCode::UNAUTHORIZED,
            AppError::MalformedCredential(_) | AppError::MalformedSubject => {
                StatusCode::BAD_REQUEST
            }
            AppError::InsufficientPermissions | AppError::IpDenied => StatusCode::FORBIDDEN,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingCredential => "missing_credential",
            AppError::MalformedCredential(_) => "malformed_credential",
            AppError::InvalidSignatureOrExpired => "invalid_signature_or_expired",
            AppError::MalformedSubject => "malformed_subject",
            AppError::IncompleteScopeBinding(_) => "incomplete_scope_binding",
            AppError::UnknownUser => "unknown_user",
            AppError::InsufficientPermissions => "insufficient_permissions",
            AppError::StoreUnavailable => "store_unavailable",
            AppError::IpDenied => "ip_denied",
            AppError::PayloadTooLarge { .. } => "payload_too_large",
            AppError::RequestTimeout => "request_timeout",
            AppError::NotFound { .. } => "not_found",
            AppError::Internal => "internal_error",
        }
    }

    // Short, machine-oriented. Never internal detail.
    fn detail(&self) -> Option<String> {
        match self {
            AppError::MalformedCredential(reason) => Some((*reason).to_string()),
            AppError::IncompleteScopeBinding(claim) => Some(format!("missing claim {claim}")),
            AppError::PayloadTooLarge { limit } => Some(format!("limit {limit} bytes")),
            AppError::NotFound { resource } => Some(format!("{resource} not found")),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code(),
            detail: self.detail(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<VerificationError> for AppError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::MissingCredential => AppError::MissingCredential,
            VerificationError::MalformedCredential(reason) => AppError::MalformedCredential(reason),
            // keep the jsonwebtoken reason in logs only
            VerificationError::InvalidSignatureOrExpired(_) => AppError::InvalidSignatureOrExpired,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::MalformedSubject => AppError::MalformedSubject,
            ValidationError::IncompleteScopeBinding(claim) => {
                AppError::IncompleteScopeBinding(claim)
            }
        }
    }
}

impl From<ResolutionError> for AppError {
    fn from(e: ResolutionError) -> Self {
        match e {
            ResolutionError::UnknownUser => AppError::UnknownUser,
            ResolutionError::StoreUnavailable(_) => AppError::StoreUnavailable,
        }
    }
}
