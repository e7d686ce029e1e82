/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - verifier / identity builder / identity resolver / allow-list / security event sink
 * - Clone 前提で持つ (内部は Arc/Copy で cheap)
 * - 起動後は read-only (request ごとの可変状態は cache と event sink の先にしかない)
 */
use std::sync::Arc;

use crate::services::{
    auth::AccessTokenVerifier,
    identity::{IdentityContextBuilder, IdentityResolver},
    security::{IpAllowList, SecurityEventSink},
};

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<AccessTokenVerifier>,
    pub identity_builder: IdentityContextBuilder,
    pub resolver: Arc<IdentityResolver>,
    pub allowlist: Arc<IpAllowList>,
    pub events: Arc<dyn SecurityEventSink>,
}

impl AppState {
    pub fn new(
        verifier: Arc<AccessTokenVerifier>,
        identity_builder: IdentityContextBuilder,
        resolver: Arc<IdentityResolver>,
        allowlist: Arc<IpAllowList>,
        events: Arc<dyn SecurityEventSink>,
    ) -> Self {
        Self {
            verifier,
            identity_builder,
            resolver,
            allowlist,
            events,
        }
    }
}
