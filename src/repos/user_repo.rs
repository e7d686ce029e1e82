/*
 * Responsibility
 * - users / roles / permissions を SQLx で読み出す (pipeline は read-only)
 * - 1 subject 分の role→permission グラフを UserRecord に畳み込む
 * - DB エラーは RepoError に変換し、上位で StoreUnavailable として扱う
 */
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: Vec<Permission>,
}

/// Active user with its role graph, as the pipeline sees it.
///
/// The store owns the data; the pipeline only holds a cached read-only copy per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub subject: String,
    pub client_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub roles: Vec<Role>,
}

/// Source of truth for identities, consulted on identity-cache misses.
#[async_trait]
pub trait UserStore: Send + Sync {
    // Find an active user by subject. `client_id` narrows the lookup to one client
    // when the deployment binds users per client.
    async fn find_active(
        &self,
        subject: &str,
        client_id: Option<&str>,
    ) -> RepoResult<Option<UserRecord>>;
}

#[derive(Debug, FromRow)]
struct UserRoleRow {
    user_id: Uuid,
    subject: String,
    client_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    role_name: Option<String>,
    permission_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_active(
        &self,
        subject: &str,
        client_id: Option<&str>,
    ) -> RepoResult<Option<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRoleRow>(
            r#"
            SELECT
                u.id AS user_id,
                u.subject,
                u.client_id,
                u.email,
                u.display_name,
                r.name AS role_name,
                p.name AS permission_name
            FROM users u
            LEFT JOIN user_roles ur ON ur.user_id = u.id
            LEFT JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE u.subject = $1
              AND u.is_active
              AND ($2::text IS NULL OR u.client_id = $2)
            ORDER BY u.created_at, r.name, p.name
            "#,
        )
        .bind(subject)
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::Db)?;

        Ok(fold_rows(rows))
    }
}

// Rows arrive ordered by user, then role, then permission.
// Only the first matching user is kept.
fn fold_rows(rows: Vec<UserRoleRow>) -> Option<UserRecord> {
    let mut rows = rows.into_iter().peekable();
    let first = rows.peek()?;
    let user_id = first.user_id;

    let mut user = UserRecord {
        id: user_id,
        subject: first.subject.clone(),
        client_id: first.client_id.clone(),
        email: first.email.clone(),
        display_name: first.display_name.clone(),
        roles: Vec::new(),
    };

    for row in rows.filter(|r| r.user_id == user_id) {
        let Some(role_name) = row.role_name else {
            continue;
        };

        let role = match user.roles.iter_mut().position(|r| r.name == role_name) {
            Some(idx) => &mut user.roles[idx],
            None => {
                user.roles.push(Role {
                    name: role_name,
                    permissions: Vec::new(),
                });
                user.roles.last_mut()?
            }
        };

        if let Some(name) = row.permission_name
            && !role.permissions.iter().any(|p| p.name == name)
        {
            role.permissions.push(Permission { name });
        }
    }

    Some(user)
}
