/*
 * Responsibility
 * - 認証済み identity / 解決済み user の response DTO
 * - token の生 claims はそのまま返さない (必要な項目だけ)
 */
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::v1::extractors::AuthCtx;
use crate::repos::user_repo::UserRecord;
use crate::services::auth::permission::PermissionSet;

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub client_id: Option<String>,
    pub provider_id: Option<String>,
    pub container_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserRolesResponse {
    pub id: Uuid,
    pub subject: String,
    pub client_id: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl From<&UserRecord> for UserRolesResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            subject: user.subject.clone(),
            client_id: user.client_id.clone(),
            roles: user.roles.iter().map(|r| r.name.clone()).collect(),
            permissions: PermissionSet::of(user)
                .sorted()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject: String,
    pub tenant: TenantResponse,
    pub scopes: Vec<String>,
    pub issuer: Option<String>,
    pub token_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub user: UserRolesResponse,
}

impl From<&AuthCtx> for MeResponse {
    fn from(ctx: &AuthCtx) -> Self {
        let identity = &ctx.identity;
        Self {
            subject: identity.subject.to_string(),
            tenant: TenantResponse {
                client_id: identity.tenant.client_id.clone(),
                provider_id: identity.tenant.provider_id.clone(),
                container_id: identity.tenant.container_id.clone(),
            },
            scopes: identity.scopes().map(str::to_string).collect(),
            issuer: identity.issuer.clone(),
            token_id: identity.token_id.clone(),
            expires_at: identity.expires_at,
            email: ctx.user.email.clone(),
            display_name: ctx.user.display_name.clone(),
            user: UserRolesResponse::from(&ctx.user),
        }
    }
}
