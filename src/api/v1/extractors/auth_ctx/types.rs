/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証・解決して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - JWT 検証 / identity 解決 / 認可ロジックは middleware/services 側の責務
 * - ここは「型（契約）」として固定化する
 */
use crate::repos::user_repo::UserRecord;
use crate::services::identity::{IdentityContext, SubjectId, TenantScope};

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `identity` は検証済み token から組み立てた request-scoped な identity
/// - `user` は identity cache (または user store) から解決した read-only のコピー
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub identity: IdentityContext,
    pub user: UserRecord,
}

impl AuthCtx {
    pub fn new(identity: IdentityContext, user: UserRecord) -> Self {
        Self { identity, user }
    }

    pub fn subject(&self) -> &SubjectId {
        &self.identity.subject
    }

    pub fn tenant(&self) -> &TenantScope {
        &self.identity.tenant
    }
}
