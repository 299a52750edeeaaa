//! HTTP API integration tests
//!
//! Drives the router with `tower::ServiceExt::oneshot` over the in-memory
//! store.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header::AUTHORIZATION, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use classroom_sync::backend::realtime::Outbound;
use classroom_sync::backend::routes::create_router;
use classroom_sync::backend::server::AppState;
use classroom_sync::backend::sync::ResolverRegistry;
use classroom_sync::shared::{CloseReason, Role};
use common::{connect, memory_state, next_outbound, subscribe};

async fn app() -> (Router, AppState) {
    let state = memory_state(ResolverRegistry::new()).await;
    (create_router(state.clone()), state)
}

fn bearer(state: &AppState, principal_id: &str, role: Role) -> String {
    let token = state.authenticator.create_token(principal_id, role).unwrap();
    format!("Bearer {}", token)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app().await;
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_catch_up_requires_token() {
    let (app, _) = app().await;
    let (status, body) = send(&app, get("/api/sync/grades/changes", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let (status, _) = send(
        &app,
        get("/api/sync/grades/changes", Some("Bearer not-a-token")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_catch_up_returns_changes_and_current_version() {
    let (app, state) = app().await;
    for i in 1..=3 {
        state
            .sync
            .tracker()
            .track_change("grades", &i.to_string(), &json!({"score": i}), "t1")
            .await
            .unwrap();
    }
    let auth = bearer(&state, "s1", Role::Student);

    let (status, body) = send(&app, get("/api/sync/grades/changes?since=1", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentVersion"], 3);
    let versions: Vec<i64> = body["changes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["version"].as_i64().unwrap())
        .collect();
    assert_eq!(versions, vec![2, 3]);
    assert_eq!(body["changes"][0]["entityType"], "grades");

    let (_, page) = send(&app, get("/api/sync/grades/changes?limit=1", Some(&auth))).await;
    assert_eq!(page["changes"].as_array().unwrap().len(), 1);
    assert_eq!(page["currentVersion"], 3);
}

#[tokio::test]
async fn test_catch_up_rejects_bad_input() {
    let (app, state) = app().await;
    let auth = bearer(&state, "s1", Role::Student);

    for uri in [
        "/api/sync/grades/changes?since=-1",
        "/api/sync/grades/changes?limit=0",
        "/api/sync/Not%20A%20Type/changes",
    ] {
        let (status, body) = send(&app, get(uri, Some(&auth))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["status"], 400);
    }
}

#[tokio::test]
async fn test_status_reports_versions_and_connections() {
    let (app, state) = app().await;
    state
        .sync
        .tracker()
        .track_change("attendance", "1", &json!({}), "t1")
        .await
        .unwrap();
    let registry = state.sync.registry().clone();
    let _rx = connect(&registry, "t1", Role::Teacher).await;
    subscribe(&registry, "t1", "attendance:1").await;

    let auth = bearer(&state, "admin", Role::Admin);
    let (status, body) = send(&app, get("/api/sync/status", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connections"], 1);
    assert_eq!(body["channels"], 1);
    assert_eq!(body["entities"][0]["entityType"], "attendance");
    assert_eq!(body["entities"][0]["currentVersion"], 1);
}

#[tokio::test]
async fn test_logout_revokes_token_and_closes_socket() {
    let (app, state) = app().await;
    let registry = state.sync.registry().clone();
    let mut rx = connect(&registry, "p1", Role::Parent).await;
    let auth = bearer(&state, "p1", Role::Parent);

    let logout = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/logout")
        .header(AUTHORIZATION, &auth)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, logout).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"loggedOut": true, "closedConnection": true}));
    assert_eq!(next_outbound(&mut rx).await, Outbound::Close(CloseReason::LoggedOut));

    let (status, _) = send(&app, get("/api/sync/status", Some(&auth))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _) = app().await;
    let (status, _) = send(&app, get("/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
