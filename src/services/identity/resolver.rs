//! Cache-aside identity resolution.
//!
//! Read path: cache hit → done. Miss (or undecodable entry, or cache error) → user store,
//! then write back with a fixed TTL. The cache is never a source of truth; its failures are
//! logged and swallowed. Concurrent misses for one subject may each hit the store; the
//! writes carry the same value, so last-writer-wins is harmless.
use std::{sync::Arc, time::Duration};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::repos::{
    error::RepoError,
    user_repo::{UserRecord, UserStore},
};
use crate::services::cache::{CacheClient, CacheError, client::ttl_seconds};
use crate::services::identity::context::{BindingMode, IdentityContext, SubjectId};

pub const DEFAULT_IDENTITY_TTL_SECONDS: u64 = 600;

const KEY_PREFIX: &str = "idp:user";

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no active user for subject")]
    UnknownUser,
    #[error("identity store unavailable: {0}")]
    StoreUnavailable(#[from] RepoError),
}

/// How identity cache keys (and store lookups) are scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKeyScope {
    Subject,
    SubjectAndClient,
}

impl From<BindingMode> for CacheKeyScope {
    fn from(mode: BindingMode) -> Self {
        if mode.binds_client() {
            Self::SubjectAndClient
        } else {
            Self::Subject
        }
    }
}

/// Deterministic cache key. Hashing keeps keys fixed-length and keeps raw ids out of the cache.
pub fn cache_key(scope: CacheKeyScope, subject: &SubjectId, client_id: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    let tag = match scope {
        CacheKeyScope::Subject => "s",
        CacheKeyScope::SubjectAndClient => {
            hasher.update(client_id.unwrap_or_default().as_bytes());
            hasher.update(b"\n");
            "sc"
        }
    };
    hasher.update(subject.as_str().as_bytes());

    format!("{}:{}:{}", KEY_PREFIX, tag, hex::encode(hasher.finalize()))
}

pub struct IdentityResolver {
    cache: Arc<dyn CacheClient>,
    store: Arc<dyn UserStore>,
    key_scope: CacheKeyScope,
    ttl: Duration,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("cache", &self.cache.backend_name())
            .field("key_scope", &self.key_scope)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl IdentityResolver {
    pub fn new(
        cache: Arc<dyn CacheClient>,
        store: Arc<dyn UserStore>,
        key_scope: CacheKeyScope,
    ) -> Self {
        Self {
            cache,
            store,
            key_scope,
            ttl: ttl_seconds(DEFAULT_IDENTITY_TTL_SECONDS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Resolve the authenticated identity to its user record.
    pub async fn resolve(&self, identity: &IdentityContext) -> Result<UserRecord, ResolutionError> {
        self.resolve_subject(&identity.subject, identity.tenant.client_id.as_deref())
            .await
    }

    /// Resolve any subject within a client scope (the scope is ignored when keys are subject-only).
    pub async fn resolve_subject(
        &self,
        subject: &SubjectId,
        client_id: Option<&str>,
    ) -> Result<UserRecord, ResolutionError> {
        let client_scope = self.client_scope(client_id);
        let key = cache_key(self.key_scope, subject, client_scope);

        if let Some(user) = self.read_cached(&key).await {
            tracing::debug!(subject = %subject, "identity cache hit");
            return Ok(user);
        }

        let user = self
            .store
            .find_active(subject.as_str(), client_scope)
            .await?
            .ok_or(ResolutionError::UnknownUser)?;

        self.write_back(&key, &user).await;
        Ok(user)
    }

    /// Drop the cached record so the next request reloads it from the store.
    pub async fn invalidate(
        &self,
        subject: &SubjectId,
        client_id: Option<&str>,
    ) -> Result<bool, CacheError> {
        let key = cache_key(self.key_scope, subject, self.client_scope(client_id));
        Ok(self.cache.del(&key).await? > 0)
    }

    fn client_scope<'a>(&self, client_id: Option<&'a str>) -> Option<&'a str> {
        match self.key_scope {
            CacheKeyScope::Subject => None,
            CacheKeyScope::SubjectAndClient => client_id,
        }
    }

    async fn read_cached(&self, key: &str) -> Option<UserRecord> {
        let raw = match self.cache.get_string(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    backend = self.cache.backend_name(),
                    "identity cache read failed, falling back to store"
                );
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(error = %err, "undecodable identity cache entry, reloading");
                None
            }
        }
    }

    async fn write_back(&self, key: &str, user: &UserRecord) {
        let raw = match serde_json::to_string(user) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize user record for cache");
                return;
            }
        };

        if let Err(err) = self.cache.set_with_ttl(key, &raw, self.ttl).await {
            tracing::warn!(
                error = %err,
                backend = self.cache.backend_name(),
                "identity cache write failed"
            );
        }
    }
}
