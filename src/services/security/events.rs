//! Security-event emission.
//!
//! Events are append-only observations. `record` is synchronous and infallible so a broken
//! sink can never change how a request is answered.
use axum::http::{Request, header};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::security::client_ip;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    RequestReceived,
    IpBlocked,
    AuthenticationFailed,
    PermissionDenied,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestReceived => "request_received",
            Self::IpBlocked => "ip_blocked",
            Self::AuthenticationFailed => "authentication_failed",
            Self::PermissionDenied => "permission_denied",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
    pub endpoint: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

impl SecurityEvent {
    pub fn from_request<B>(event_type: SecurityEventType, req: &Request<B>) -> Self {
        let header_value = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            event_type,
            client_ip: client_ip::from_request(req).map(|ip| ip.to_string()),
            user_agent: header_value(header::USER_AGENT.as_str()),
            request_id: header_value(REQUEST_ID_HEADER),
            endpoint: req.uri().path().to_string(),
            method: req.method().to_string(),
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub trait SecurityEventSink: Send + Sync {
    fn record(&self, event: SecurityEvent);
}

/// Default sink: structured `tracing` records on the `security` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl SecurityEventSink for TracingEventSink {
    fn record(&self, event: SecurityEvent) {
        macro_rules! emit {
            ($level:ident) => {
                tracing::$level!(
                    target: "security",
                    event_type = event.event_type.as_str(),
                    client_ip = event.client_ip.as_deref().unwrap_or("unknown"),
                    user_agent = event.user_agent.as_deref(),
                    request_id = event.request_id.as_deref(),
                    endpoint = %event.endpoint,
                    method = %event.method,
                    timestamp = %event.timestamp.to_rfc3339(),
                    detail = event.detail.as_deref(),
                    "security event"
                )
            };
        }

        match event.event_type {
            SecurityEventType::RequestReceived => emit!(info),
            _ => emit!(warn),
        }
    }
}
