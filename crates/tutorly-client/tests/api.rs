//! `ApiClient` against a stub server.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use uuid::Uuid;

use tutorly_client::{ApiClient, ClientError, LinkRequest};
use tutorly_common::Role;
use tutorly_db::User;

const TOKEN: &str = "tok-123";

fn user() -> User {
    User {
        id: Uuid::nil(),
        email: "sam@example.test".into(),
        display_name: "Sam".into(),
        role: Role::Student,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn spawn_stub() -> anyhow::Result<String> {
    let app = Router::new()
        .route(
            "/api/auth/login",
            post(|| async { Json(json!({ "token": TOKEN, "user": user(), "expires_in_hours": 24 })) }),
        )
        .route(
            "/api/auth/me",
            get(|headers: HeaderMap| async move {
                if authorized(&headers) {
                    Ok(Json(user()))
                } else {
                    Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "Missing bearer token" }))))
                }
            }),
        )
        .route(
            "/api/journal/entries/{id}",
            get(|Path(_id): Path<Uuid>| async {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "Journal entry not found" })))
            }),
        )
        .route(
            "/api/journal/tags/suggestions",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/api/journal/search/suggestions",
            get(|| async { Json(json!(["Fractions", "Fraction drills"])) }),
        )
        .route(
            "/api/health",
            get(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "status": "degraded", "database": false, "version": "0.1.0" })),
                )
            }),
        )
        .route("/api/goals", get(|| async { Json(Value::Array(Vec::new())) }))
        .route(
            "/api/auth/students",
            post(|Json(body): Json<Value>| async move {
                if body["code"] == "ABCD-EF23" {
                    Ok(Json(user()))
                } else {
                    Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "link code is invalid or expired" }))))
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn test_login_keeps_token() -> anyhow::Result<()> {
    let mut client = ApiClient::new(spawn_stub().await?)?;

    assert!(matches!(client.me().await, Err(ClientError::Unauthorized)));

    let auth = client.login("sam@example.test", "correct horse").await?;
    assert_eq!(auth.token, TOKEN);
    assert_eq!(client.token(), Some(TOKEN));
    assert_eq!(client.me().await?.display_name, "Sam");
    Ok(())
}

#[tokio::test]
async fn test_error_body_becomes_api_error() -> anyhow::Result<()> {
    let client = ApiClient::new(spawn_stub().await?)?.with_token(TOKEN);
    match client.journal_entry(Uuid::new_v4()).await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Journal entry not found");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_suggestions_never_fail() -> anyhow::Result<()> {
    let client = ApiClient::new(spawn_stub().await?)?.with_token(TOKEN);
    assert_eq!(client.tag_suggestions("fra").await, Vec::<String>::new());
    assert_eq!(client.search_suggestions("Fra").await, vec!["Fractions", "Fraction drills"]);
    Ok(())
}

#[tokio::test]
async fn test_degraded_health_still_parses() -> anyhow::Result<()> {
    let client = ApiClient::new(spawn_stub().await?)?;
    let health = client.health().await?;
    assert_eq!(health.status, "degraded");
    assert!(!health.database);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = ApiClient::new(format!("http://{addr}"))?.with_token(TOKEN);
    let err = client.goals(None).await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    assert_eq!(err.to_string(), "Network error");
    // Suggestions swallow transport failures too.
    assert!(client.tag_suggestions("x").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_socket_url_follows_scheme() -> anyhow::Result<()> {
    let client = ApiClient::new("https://tutorly.example/")?.with_token("abc");
    assert_eq!(client.notification_socket_url()?, "wss://tutorly.example/ws/notifications?token=abc");

    let anonymous = ApiClient::new("http://localhost:3001")?;
    assert!(matches!(anonymous.notification_socket_url(), Err(ClientError::Unauthorized)));
    assert!(matches!(ApiClient::new("localhost:3001"), Err(ClientError::Url(_))));
    Ok(())
}

#[tokio::test]
async fn test_socket_url_encodes_token() -> anyhow::Result<()> {
    let client = ApiClient::new("http://localhost:3001")?.with_token("a b&admin=1");
    assert_eq!(
        client.notification_socket_url()?,
        "ws://localhost:3001/ws/notifications?token=a+b%26admin%3D1"
    );
    Ok(())
}

#[tokio::test]
async fn test_link_student_returns_student() -> anyhow::Result<()> {
    let client = ApiClient::new(spawn_stub().await?)?.with_token(TOKEN);

    let linked = client
        .link_student(&LinkRequest { code: "ABCD-EF23".into(), relationship: None })
        .await?;
    assert_eq!(linked.email, "sam@example.test");

    match client.link_student(&LinkRequest { code: "WRONG".into(), relationship: None }).await {
        Err(ClientError::Api { status, .. }) => assert_eq!(status, 400),
        other => panic!("expected Api error, got {other:?}"),
    }
    Ok(())
}
