//! Verified claims → typed identity context.
//!
//! Which scope-binding claims are mandatory depends on the deployment's `BindingMode`.
//! A token that verifies but lacks a mandatory binding is rejected (fail-closed).
use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::auth::claims::{ClaimSet, ClaimValue, names};

const SUBJECT_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed subject")]
    MalformedSubject,
    #[error("missing mandatory scope binding '{0}'")]
    IncompleteScopeBinding(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingMode {
    /// Only `sub` is mandatory; users are global.
    Minimal,
    /// Client and provider ids are mandatory; users are bound per client.
    #[default]
    MultiTenant,
}

impl BindingMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minimal" => Some(Self::Minimal),
            "multi_tenant" | "multi-tenant" | "multitenant" => Some(Self::MultiTenant),
            _ => None,
        }
    }

    pub fn binds_client(&self) -> bool {
        matches!(self, Self::MultiTenant)
    }
}

/// Canonical subject identifier: 1..=255 chars of `[A-Za-z0-9-_.:@|]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let valid = !raw.is_empty()
            && raw.len() <= SUBJECT_MAX_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@' | '|'));

        if !valid {
            return Err(ValidationError::MalformedSubject);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenantScope {
    pub client_id: Option<String>,
    pub provider_id: Option<String>,
    pub container_id: Option<String>,
}

/// Per-request identity, attached to the request extensions after authentication.
#[derive(Debug, Clone)]
pub struct IdentityContext {
    pub subject: SubjectId,
    pub tenant: TenantScope,
    pub scope: Option<String>,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
    pub token_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub claims: Arc<ClaimSet>,
}

impl IdentityContext {
    /// Space-separated scope string split into tokens.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or_default().split_whitespace()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().any(|s| s == scope)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityContextBuilder {
    mode: BindingMode,
    require_container: bool,
}

impl IdentityContextBuilder {
    pub fn new(mode: BindingMode) -> Self {
        Self {
            mode,
            require_container: false,
        }
    }

    pub fn require_container(mut self, required: bool) -> Self {
        self.require_container = required;
        self
    }

    pub fn build(&self, claims: ClaimSet) -> Result<IdentityContext, ValidationError> {
        let subject = claims
            .text(names::SUBJECT)
            .ok_or(ValidationError::MalformedSubject)
            .and_then(SubjectId::parse)?;

        let tenant = TenantScope {
            client_id: bound(&claims, names::CLIENT_ID),
            provider_id: bound(&claims, names::PROVIDER_ID),
            container_id: bound(&claims, names::CONTAINER_ID),
        };

        if self.mode.binds_client() {
            if tenant.client_id.is_none() {
                return Err(ValidationError::IncompleteScopeBinding(names::CLIENT_ID));
            }
            if tenant.provider_id.is_none() {
                return Err(ValidationError::IncompleteScopeBinding(names::PROVIDER_ID));
            }
            if self.require_container && tenant.container_id.is_none() {
                return Err(ValidationError::IncompleteScopeBinding(names::CONTAINER_ID));
            }
        }

        Ok(IdentityContext {
            subject,
            tenant,
            scope: scope_string(&claims),
            issuer: claims.text(names::ISSUER).map(str::to_string),
            audience: claims.strings(names::AUDIENCE),
            token_id: claims.text(names::TOKEN_ID).map(str::to_string),
            expires_at: claims
                .timestamp(names::EXPIRES_AT)
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            claims: Arc::new(claims),
        })
    }
}

// Non-blank text claim.
fn bound(claims: &ClaimSet, name: &str) -> Option<String> {
    claims
        .text(name)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn scope_string(claims: &ClaimSet) -> Option<String> {
    [names::SCOPE, names::SCOPE_LIST]
        .into_iter()
        .find_map(|name| match claims.get(name)? {
            ClaimValue::Text(s) => Some(s.clone()),
            ClaimValue::List(items) => Some(items.join(" ")),
            _ => None,
        })
}
