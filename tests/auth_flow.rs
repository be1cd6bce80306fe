mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::util::ServiceExt;

use common::{host, spawn_app};

#[tokio::test]
async fn login_me_logout_round() -> Result<()> {
    let app = spawn_app().await?;
    app.signup("acme", "owner@acme.example").await?;
    let acme = host("acme");

    let (status, body) = app.login(Some(&acme), "owner@acme.example").await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/auth/me", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "saas");
    assert_eq!(body["data"]["user"]["permissions"], "all");

    let (status, body) = app.send("POST", "/auth/logout", Some(&acme), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["logged_out"], true);

    let (status, body) = app.get("/auth/me", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["redirect"], "/login.html");
    Ok(())
}

#[tokio::test]
async fn logout_prunes_lapsed_revocations() -> Result<()> {
    let app = spawn_app().await?;
    let (token, user_id, _) = app.signup("acme", "owner@acme.example").await?;

    let now = chrono::Utc::now();
    sqlx::query("INSERT INTO revoked_sessions (jti, user_id, revoked_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(now - chrono::Duration::days(3))
        .bind(now - chrono::Duration::days(2))
        .execute(&app.pool)
        .await?;

    let (status, body) = app.send("POST", "/auth/logout", Some(&host("acme")), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let remaining: Vec<String> = sqlx::query_scalar("SELECT jti FROM revoked_sessions")
        .fetch_all(&app.pool)
        .await?;
    assert_eq!(remaining.len(), 1, "only the fresh revocation should remain");
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() -> Result<()> {
    let app = spawn_app().await?;
    app.signup("acme", "owner@acme.example").await?;

    let (status, wrong) = app
        .post("/auth/login", None, None, json!({ "email": "owner@acme.example", "password": "nope-nope-nope" }))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown) = app.login(None, "ghost@acme.example").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong["message"], unknown["message"]);
    Ok(())
}

#[tokio::test]
async fn missing_and_forged_credentials_are_unauthenticated() -> Result<()> {
    let app = spawn_app().await?;

    let (status, body) = app.get("/podcast-interviews", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) = app.get("/podcast-interviews", None, Some("not-a-jwt")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn deactivated_user_loses_access_immediately() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (token, user_id) = app.seed_user(Some(tenant_id), "advisor", "adv@acme.example").await?;
    let acme = host("acme");

    let (status, _) = app.get("/auth/me", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .put(&format!("/users/{user_id}"), Some(&acme), Some(&owner), json!({ "status": "inactive" }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app.get("/auth/me", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn role_change_applies_to_existing_sessions() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (token, user_id) = app.seed_user(Some(tenant_id), "advisor", "adv@acme.example").await?;
    let acme = host("acme");

    let (status, _) = app.get("/invitations", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .put(&format!("/users/{user_id}"), Some(&acme), Some(&owner), json!({ "role": "client" }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app.get("/invitations", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "insufficient_permission");
    assert_eq!(body["redirect"], "/client-portal.html");
    Ok(())
}

#[tokio::test]
async fn stored_permissions_override_the_role_set() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (token, user_id) = app.seed_user(Some(tenant_id), "consultant", "c@acme.example").await?;
    let acme = host("acme");

    let (status, _) = app.get("/invitations", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(
            &format!("/users/{user_id}"),
            Some(&acme),
            Some(&owner),
            json!({ "permissions": ["users.view", "calls.view"] }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["permissions"], json!(["calls.view", "users.view"]));

    let (status, body) = app.get("/invitations", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    Ok(())
}

#[tokio::test]
async fn page_access_follows_the_page_map() -> Result<()> {
    let app = spawn_app().await?;
    let (_, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (token, _) = app.seed_user(Some(tenant_id), "client", "client@acme.example").await?;
    let acme = host("acme");

    let (status, body) = app
        .get("/auth/access?page=/podcast-interviews.html", Some(&acme), Some(&token))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["allowed"], true);
    assert_eq!(body["data"]["required_permission"], "calls.view");

    let (status, body) = app.get("/auth/access?page=invitations.create", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["redirect"], "/client-portal.html");

    let (status, body) = app.get("/auth/access?page=unlisted.html", Some(&acme), Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["required_permission"].is_null());
    Ok(())
}

#[tokio::test]
async fn unknown_routes_and_methods_use_the_error_envelope() -> Result<()> {
    let app = spawn_app().await?;

    let (status, body) = app.get("/nope", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, body) = app.send("DELETE", "/auth/login", None, None, None).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "method_not_allowed");
    Ok(())
}

#[tokio::test]
async fn preflight_is_answered_before_routing() -> Result<()> {
    let app = spawn_app().await?;

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/podcast-interviews")
        .header("origin", "https://acme.growthmanagerpro.com")
        .header("access-control-request-method", "PUT")
        .header("access-control-request-headers", "authorization, content-type")
        .body(Body::empty())?;

    let resp = app.app.clone().oneshot(req).await?;
    assert!(resp.status().is_success(), "preflight returned {}", resp.status());

    let headers = resp.headers();
    let methods = headers
        .get("access-control-allow-methods")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(methods.contains("PUT"), "allow-methods was {methods:?}");
    assert_eq!(headers.get("access-control-allow-origin").and_then(|v| v.to_str().ok()), Some("*"));
    Ok(())
}
