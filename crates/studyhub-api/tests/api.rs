//! End-to-end checks of the REST surface against the in-process store.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    routing::delete,
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use studyhub_api::{build_router, AppState};
use studyhub_common::auth::Claims;
use studyhub_common::config::{EngineConfig, StoreConfig};
use studyhub_db::storage::MemoryBlobStore;
use studyhub_db::Database;
use studyhub_engine::Engine;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

fn app_with_identity_url(identity_url: &str) -> Router {
    let (db, _store) = Database::memory(&StoreConfig::default());
    let config = EngineConfig {
        role_write_delay_ms: 0,
        ..EngineConfig::default()
    };
    let engine = Engine::new(db, config, Arc::new(MemoryBlobStore::default()));
    build_router(AppState {
        engine,
        jwt_secret: SECRET.into(),
        identity_url: identity_url.into(),
        http: reqwest::Client::new(),
    })
}

fn app() -> Router {
    app_with_identity_url("http://127.0.0.1:9")
}

fn token(uid: Uuid, name: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: uid.to_string(),
        email: Some(format!("{name}@example.com")),
        name: Some(name.into()),
        picture: None,
        iat: now,
        exp: now + 3600,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, as_user: Option<&str>, body: Option<Value>) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = as_user {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create(app: &Router, owner: &str, requires_approval: bool) -> Uuid {
    let res = call(
        app,
        Method::POST,
        "/api/v1/communities",
        Some(owner),
        Some(json!({"name": "Linear Algebra", "category": "math", "requiresApproval": requires_approval})),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    json_body(res).await["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let res = call(&app(), Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(json_body(res).await["status"], "ok");
}

#[tokio::test]
async fn missing_or_bad_tokens_are_rejected() {
    let app = app();
    let res = call(&app, Method::POST, "/api/v1/communities", None, Some(json!({}))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = call(&app, Method::GET, &format!("/api/v1/communities/{}", Uuid::now_v7()), Some("garbage"), None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["error"], "INVALID_TOKEN");
}

#[tokio::test]
async fn direct_join_then_leave() {
    let app = app();
    let owner = token(Uuid::now_v7(), "ada");
    let student = token(Uuid::now_v7(), "ben");
    let id = create(&app, &owner, false).await;

    let res = call(&app, Method::POST, &format!("/api/v1/communities/{id}/join"), Some(&student), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["outcome"], "joined");

    let res = call(&app, Method::GET, &format!("/api/v1/communities/{id}/membership"), Some(&student), None).await;
    assert_eq!(json_body(res).await["isMember"], true);

    let res = call(&app, Method::POST, &format!("/api/v1/communities/{id}/join"), Some(&student), None).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(res).await["error"], "ALREADY_MEMBER");

    let res = call(&app, Method::POST, &format!("/api/v1/communities/{id}/leave"), Some(&student), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = call(&app, Method::GET, &format!("/api/v1/communities/{id}"), Some(&owner), None).await;
    assert_eq!(json_body(res).await["memberCount"], 1);
}

#[tokio::test]
async fn approval_flow_over_http() {
    let app = app();
    let owner = token(Uuid::now_v7(), "ada");
    let student_id = Uuid::now_v7();
    let student = token(student_id, "ben");
    let id = create(&app, &owner, true).await;

    let res = call(
        &app,
        Method::POST,
        &format!("/api/v1/communities/{id}/join"),
        Some(&student),
        Some(json!({"message": "I take the evening section"})),
    )
    .await;
    let body = json_body(res).await;
    assert_eq!(body["outcome"], "requested");
    let request_id = body["id"].as_str().unwrap().to_string();

    let res = call(&app, Method::GET, &format!("/api/v1/communities/{id}/requests"), Some(&student), None).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = call(&app, Method::GET, &format!("/api/v1/communities/{id}/requests"), Some(&owner), None).await;
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 1);

    let res = call(&app, Method::POST, &format!("/api/v1/requests/{request_id}/approve"), Some(&owner), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["userId"], student_id.to_string());

    let res = call(&app, Method::POST, &format!("/api/v1/requests/{request_id}/reject"), Some(&owner), None).await;
    assert_eq!(json_body(res).await["error"], "ALREADY_REVIEWED");

    let res = call(&app, Method::GET, &format!("/api/v1/communities/{id}"), Some(&owner), None).await;
    let community = json_body(res).await;
    assert_eq!(community["memberCount"], 2);
    assert_eq!(community["pendingRequestsCount"], 0);
}

#[tokio::test]
async fn promotion_and_teardown() {
    let app = app();
    let owner = token(Uuid::now_v7(), "ada");
    let student_id = Uuid::now_v7();
    let student = token(student_id, "ben");
    let id = create(&app, &owner, false).await;
    call(&app, Method::POST, &format!("/api/v1/communities/{id}/join"), Some(&student), None).await;

    let res = call(
        &app,
        Method::PUT,
        &format!("/api/v1/communities/{id}/members/{student_id}/role"),
        Some(&owner),
        Some(json!({"role": "admin"})),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let admins = json_body(res).await["admins"].as_array().unwrap().clone();
    assert!(admins.contains(&json!(student_id.to_string())));

    let res = call(&app, Method::DELETE, &format!("/api/v1/communities/{id}"), Some(&owner), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["notified"], 1);

    let res = call(&app, Method::GET, &format!("/api/v1/communities/{id}"), Some(&owner), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn account_deletion_reaches_the_identity_service() {
    let mock = Router::new().route("/v1/accounts/{uid}", delete(|| async { StatusCode::NO_CONTENT }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, mock).await.unwrap() });

    let app = app_with_identity_url(&format!("http://{addr}"));
    let uid = Uuid::now_v7();
    let me = token(uid, "ada");
    create(&app, &me, false).await;

    let res = call(&app, Method::DELETE, "/api/v1/account", Some(&me), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let report = json_body(res).await;
    assert_eq!(report["identity"], "deleted");
    assert_eq!(report["communitiesDeleted"], 1);
}
