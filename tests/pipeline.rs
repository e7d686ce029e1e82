#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::routing::delete;
use axum::{Json, Router};
use serde_json::json;
use tower::ServiceExt;

use common::*;
use identity_gate::api::v1::extractors::AuthCtxExtractor;
use identity_gate::config::HttpConfig;
use identity_gate::middleware::auth::{access, permission};
use identity_gate::services::security::SecurityEventType;

fn admin_store() -> TestStore {
    TestStore::with(vec![
        user("u-1", "c-1", &[("admin", &["user:delete", "user:admin"])]),
        user("u-2", "c-1", &[("viewer", &["user:read"])]),
        user("u-3", "c-1", &[]),
    ])
}

// Protected route requiring `user:delete`, wrapped in the full perimeter.
fn widget_app(fx: &Fixture) -> Router {
    async fn remove(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<serde_json::Value> {
        Json(json!({"deleted_by": ctx.subject().as_str()}))
    }

    let routes = permission::require(
        Router::new().route("/widgets/{id}", delete(remove)),
        &fx.state,
        &["user:delete"],
    );
    let routes = access::apply(routes, fx.state.clone()).with_state(fx.state.clone());
    identity_gate::app::apply_perimeter(routes, fx.state.clone(), &HttpConfig::default())
}

fn delete_widget(token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri("/widgets/w-9")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn resolves_caches_and_authorizes_then_skips_store_on_repeat() {
    let fx = fixture(admin_store(), &[]);
    let app = widget_app(&fx);
    let token = sign(&claims("u-1", "c-1", "p-1"));

    let resp = app.clone().oneshot(delete_widget(&token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({"deleted_by": "u-1"}));
    assert_eq!(fx.store.calls(), 1);

    let resp = app.oneshot(delete_widget(&token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(fx.store.calls(), 1, "second request must be served from cache");
}

#[tokio::test]
async fn missing_credential_never_touches_store() {
    let fx = fixture(admin_store(), &[]);
    let resp = fx
        .app(&HttpConfig::default())
        .oneshot(get("/api/v1/me", None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "missing_credential");
    assert_eq!(fx.store.calls(), 0);
    assert_eq!(fx.events.of_type(SecurityEventType::AuthenticationFailed).len(), 1);
}

#[tokio::test]
async fn malformed_and_forged_tokens() {
    let fx = fixture(admin_store(), &[]);
    let app = fx.app(&HttpConfig::default());

    let resp = app
        .clone()
        .oneshot(get("/api/v1/me", Some("not-a-jwt")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "malformed_credential");

    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims("u-1", "c-1", "p-1"),
        &jsonwebtoken::EncodingKey::from_secret(b"another-secret-that-is-32-bytes-long"),
    )
    .unwrap();
    let resp = app.oneshot(get("/api/v1/me", Some(&forged))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "invalid_signature_or_expired");
    assert_eq!(fx.store.calls(), 0);
}

#[tokio::test]
async fn missing_client_binding_is_rejected_before_lookup() {
    let fx = fixture(admin_store(), &[]);
    let mut token_claims = claims("u-1", "c-1", "p-1");
    token_claims.as_object_mut().unwrap().remove("m9d_client_id");

    let resp = fx
        .app(&HttpConfig::default())
        .oneshot(get("/api/v1/me", Some(&sign(&token_claims))))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "incomplete_scope_binding");
    assert_eq!(body["detail"], "missing claim m9d_client_id");
    assert_eq!(fx.store.calls(), 0);
}

#[tokio::test]
async fn unknown_subject_is_unauthorized() {
    let fx = fixture(admin_store(), &[]);
    let token = sign(&claims("ghost", "c-1", "p-1"));

    let resp = fx
        .app(&HttpConfig::default())
        .oneshot(get("/api/v1/me", Some(&token)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "unknown_user");
}

#[tokio::test]
async fn same_subject_in_another_client_is_a_different_user() {
    let fx = fixture(admin_store(), &[]);
    let token = sign(&claims("u-1", "c-2", "p-1"));

    let resp = fx
        .app(&HttpConfig::default())
        .oneshot(get("/api/v1/me", Some(&token)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn insufficient_permission_is_forbidden_and_recorded() {
    let fx = fixture(admin_store(), &[]);
    let token = sign(&claims("u-2", "c-1", "p-1"));

    let resp = widget_app(&fx).oneshot(delete_widget(&token)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(resp).await["error"], "insufficient_permissions");
    let denied = fx.events.of_type(SecurityEventType::PermissionDenied);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].endpoint, "/widgets/w-9");
}

#[tokio::test]
async fn user_without_roles_is_denied() {
    let fx = fixture(admin_store(), &[]);
    let token = sign(&claims("u-3", "c-1", "p-1"));

    let resp = widget_app(&fx).oneshot(delete_widget(&token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn store_outage_is_a_server_error() {
    let fx = fixture(TestStore::unavailable(), &[]);
    let token = sign(&claims("u-1", "c-1", "p-1"));

    let resp = fx
        .app(&HttpConfig::default())
        .oneshot(get("/api/v1/me", Some(&token)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await["error"], "store_unavailable");
    assert_eq!(fx.store.calls(), 1);
}

#[tokio::test]
async fn cookie_credential_is_accepted() {
    let fx = fixture(admin_store(), &[]);
    let token = sign(&claims("u-1", "c-1", "p-1"));

    let req = Request::builder()
        .uri("/api/v1/me")
        .header(header::COOKIE, format!("theme=dark; access_token={token}"))
        .body(Body::empty())
        .unwrap();
    let resp = fx.app(&HttpConfig::default()).oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn me_returns_identity_and_permission_union() {
    let fx = fixture(admin_store(), &[]);
    let token = sign(&claims("u-1", "c-1", "p-1"));

    let resp = fx
        .app(&HttpConfig::default())
        .oneshot(get("/api/v1/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["subject"], "u-1");
    assert_eq!(body["tenant"]["client_id"], "c-1");
    assert_eq!(body["tenant"]["provider_id"], "p-1");
    assert_eq!(body["issuer"], ISSUER);
    assert_eq!(body["scopes"], json!(["openid", "profile"]));
    assert_eq!(body["user"]["roles"], json!(["admin"]));
    assert_eq!(body["user"]["permissions"], json!(["user:admin", "user:delete"]));
}

#[tokio::test]
async fn user_roles_lookup_is_scoped_to_caller_client() {
    let fx = fixture(admin_store(), &[]);
    let app = fx.app(&HttpConfig::default());
    let reader = sign(&claims("u-2", "c-1", "p-1"));

    let resp = app
        .clone()
        .oneshot(get("/api/v1/users/u-1/roles", Some(&reader)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["roles"], json!(["admin"]));

    let resp = app
        .clone()
        .oneshot(get("/api/v1/users/nobody/roles", Some(&reader)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(get("/api/v1/users/bad%20subject/roles", Some(&reader)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "malformed_subject");
}

#[tokio::test]
async fn cache_eviction_forces_reload() {
    let fx = fixture(admin_store(), &[]);
    let app = fx.app(&HttpConfig::default());
    let admin = sign(&claims("u-1", "c-1", "p-1"));
    let reader = sign(&claims("u-2", "c-1", "p-1"));

    // u-2 is resolved and cached
    app.clone()
        .oneshot(get("/api/v1/me", Some(&reader)))
        .await
        .unwrap();
    let evict = |token: &str| {
        Request::builder()
            .method("DELETE")
            .uri("/api/v1/users/u-2/cache")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };

    let resp = app.clone().oneshot(evict(&reader)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.clone().oneshot(evict(&admin)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let calls = fx.store.calls();

    app.oneshot(get("/api/v1/me", Some(&reader))).await.unwrap();
    assert_eq!(fx.store.calls(), calls + 1);
}

#[tokio::test]
async fn health_is_public() {
    let fx = fixture(admin_store(), &[]);
    let resp = fx
        .app(&HttpConfig::default())
        .oneshot(get("/health", None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn unknown_route_is_a_json_404() {
    let fx = fixture(admin_store(), &[]);
    let resp = fx
        .app(&HttpConfig::default())
        .oneshot(get("/nope", None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(resp).await,
        json!({"error": "not_found", "detail": "route not found"})
    );
}
