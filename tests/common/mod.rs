#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use uuid::Uuid;

use identity_gate::config::HttpConfig;
use identity_gate::repos::error::{RepoError, RepoResult};
use identity_gate::repos::user_repo::{Permission, Role, UserRecord, UserStore};
use identity_gate::services::auth::AccessTokenVerifier;
use identity_gate::services::auth::access_jwt::{VerificationKey, VerifierSettings};
use identity_gate::services::cache::MemoryCache;
use identity_gate::services::identity::{
    BindingMode, CacheKeyScope, IdentityContextBuilder, IdentityResolver,
};
use identity_gate::services::security::{
    IpAllowList, SecurityEvent, SecurityEventSink, SecurityEventType,
};
use identity_gate::state::AppState;

pub const SECRET: &str = "integration-secret-at-least-32-bytes";
pub const ISSUER: &str = "https://auth.example.test";

/// In-memory user store keyed by (subject, client_id); counts lookups.
#[derive(Default)]
pub struct TestStore {
    users: HashMap<(String, Option<String>), UserRecord>,
    calls: AtomicUsize,
    down: bool,
}

impl TestStore {
    pub fn with(users: Vec<UserRecord>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|u| ((u.subject.clone(), u.client_id.clone()), u))
                .collect(),
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            down: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for TestStore {
    async fn find_active(
        &self,
        subject: &str,
        client_id: Option<&str>,
    ) -> RepoResult<Option<UserRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down {
            return Err(RepoError::Unavailable("connection refused".into()));
        }
        Ok(self
            .users
            .get(&(subject.to_string(), client_id.map(str::to_string)))
            .cloned())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl RecordingSink {
    pub fn of_type(&self, event_type: SecurityEventType) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

impl SecurityEventSink for RecordingSink {
    fn record(&self, event: SecurityEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Fixture {
    pub state: AppState,
    pub store: Arc<TestStore>,
    pub events: Arc<RecordingSink>,
}

pub fn fixture(store: TestStore, allowlist: &[&str]) -> Fixture {
    let store = Arc::new(store);
    let events = Arc::new(RecordingSink::default());

    let verifier = AccessTokenVerifier::new(
        &VerificationKey::Hs256Secret(SECRET.into()),
        VerifierSettings {
            issuer: Some(ISSUER.into()),
            ..VerifierSettings::default()
        },
    )
    .unwrap();

    let resolver = IdentityResolver::new(
        Arc::new(MemoryCache::new()),
        store.clone(),
        CacheKeyScope::SubjectAndClient,
    );

    let state = AppState::new(
        Arc::new(verifier),
        IdentityContextBuilder::new(BindingMode::MultiTenant),
        Arc::new(resolver),
        Arc::new(IpAllowList::compile(allowlist).unwrap()),
        events.clone(),
    );

    Fixture {
        state,
        store,
        events,
    }
}

impl Fixture {
    pub fn app(&self, http: &HttpConfig) -> Router {
        identity_gate::app::build_router(self.state.clone(), http)
    }
}

pub fn user(subject: &str, client: &str, roles: &[(&str, &[&str])]) -> UserRecord {
    UserRecord {
        id: Uuid::new_v4(),
        subject: subject.into(),
        client_id: Some(client.into()),
        email: Some(format!("{subject}@example.test")),
        display_name: None,
        roles: roles
            .iter()
            .map(|(name, perms)| Role {
                name: (*name).into(),
                permissions: perms
                    .iter()
                    .map(|p| Permission {
                        name: (*p).into(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn claims(sub: &str, client: &str, provider: &str) -> Value {
    json!({
        "sub": sub,
        "iss": ISSUER,
        "exp": chrono::Utc::now().timestamp() + 300,
        "jti": Uuid::new_v4().to_string(),
        "scope": "openid profile",
        "m9d_client_id": client,
        "m9d_provider_id": provider,
    })
}

pub fn sign(claims: &Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    req.body(Body::empty()).unwrap()
}

pub async fn json_body(resp: Response<Body>) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
