//! HTTP-level middleware (cross-cutting concerns).
//!
//! This module is for transport/infrastructure concerns that apply to all routes,
//! regardless of API version.
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id)
//! - Access logging / request tracing (TraceLayer)
//! - Global timeout
//! - Body size limit

use axum::Router;
use axum::body::Body;
use axum::error_handling::HandleErrorLayer;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Request, header, header::HeaderName};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::error::AppError;
use crate::services::security::events::REQUEST_ID_HEADER;

/// Apply request-id, access log and timeout to the given Router.
///
/// Order (outer → inner):
/// - request id is set first so every response, timeouts included, carries it
/// - elapsed timeouts become a JSON 408; the timed-out inner future is dropped,
///   which cancels in-flight cache/store calls
pub fn apply(router: Router, config: &HttpConfig) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let layers = ServiceBuilder::new()
        // Generate a request id if missing, then propagate it to the response.
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        // Make the service error `Infallible` by converting errors into responses.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                tracing::warn!("request timed out");
                AppError::RequestTimeout.into_response()
            } else {
                tracing::error!(error = %err, "unhandled middleware error");
                AppError::Internal.into_response()
            }
        }))
        // Access log / tracing for all requests.
        .layer(TraceLayer::new_for_http())
        // Bound request time (protects against hanging upstreams / slow clients).
        .layer(TimeoutLayer::new(config.request_timeout));

    router.layer(layers)
}

/// Reject bodies above `limit` bytes before any handler runs.
///
/// A declared `Content-Length` over the limit is answered up front. A body without a
/// declared length is buffered up to `limit` bytes and handed on as a fixed body, so routes
/// that never read their body still cannot be reached with an oversized one.
/// `RequestBodyLimitLayer` stays as the backstop for declared lengths.
pub fn limit_body(router: Router, limit: usize) -> Router {
    router
        .layer(RequestBodyLimitLayer::new(limit))
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn_with_state(limit, reject_oversized))
}

async fn reject_oversized(
    State(limit): State<usize>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match declared {
        Some(len) if len > limit as u64 => {
            tracing::warn!(content_length = len, limit, "request body too large");
            Err(AppError::PayloadTooLarge { limit })
        }
        Some(_) => Ok(next.run(req).await),
        None => {
            let (parts, body) = req.into_parts();
            let bytes = match Limited::new(body, limit).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(err) if err.is::<LengthLimitError>() => {
                    tracing::warn!(limit, "undeclared request body too large");
                    return Err(AppError::PayloadTooLarge { limit });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read request body");
                    return Err(AppError::Internal);
                }
            };
            Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
        }
    }
}
