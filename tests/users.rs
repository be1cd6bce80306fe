mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{host, spawn_app, uuid_at};

#[tokio::test]
async fn listing_is_scoped_to_the_tenant() -> Result<()> {
    let app = spawn_app().await?;
    let (acme_owner, _, acme_id) = app.signup("acme", "owner@acme.example").await?;
    let (_, globex_user, _) = app.signup("globex", "owner@globex.example").await?;
    app.seed_user(Some(acme_id), "advisor", "adv@acme.example").await?;
    let acme = host("acme");

    let (status, body) = app.get("/users", Some(&acme), Some(&acme_owner)).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let emails: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|u| u["email"].as_str())
        .collect();
    assert_eq!(emails.len(), 2);
    assert!(emails.contains(&"adv@acme.example"));
    assert!(!emails.contains(&"owner@globex.example"));
    assert!(body["data"][0].get("password_hash").is_none());

    let (status, _) = app.get(&format!("/users/{globex_user}"), Some(&acme), Some(&acme_owner)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn viewing_and_editing_need_separate_permissions() -> Result<()> {
    let app = spawn_app().await?;
    let (_, owner_id, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (advisor, _) = app.seed_user(Some(tenant_id), "advisor", "adv@acme.example").await?;
    let (consultant, consultant_id) = app.seed_user(Some(tenant_id), "consultant", "c@acme.example").await?;
    let acme = host("acme");

    let (status, _) = app.get("/users", Some(&acme), Some(&advisor)).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/users", Some(&acme), Some(&consultant)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "insufficient_permission");

    let (status, body) = app
        .put(&format!("/users/{consultant_id}"), Some(&acme), Some(&advisor), json!({ "full_name": "Renamed" }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, _) = app
        .put(&format!("/users/{owner_id}"), Some(&acme), Some(&advisor), json!({ "permissions": ["calls.view"] }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn permission_overrides_are_validated() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (manager, manager_id) = app.seed_user(Some(tenant_id), "consultant", "m@acme.example").await?;
    let (_, target_id) = app.seed_user(Some(tenant_id), "consultant", "t@acme.example").await?;
    let acme = host("acme");

    let (status, body) = app
        .put(&format!("/users/{target_id}"), Some(&acme), Some(&owner), json!({ "permissions": ["calls.teleport"] }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("calls.teleport"));

    let (status, _) = app
        .put(
            &format!("/users/{manager_id}"),
            Some(&acme),
            Some(&owner),
            json!({ "permissions": ["users.view", "users.permissions", "calls.view"] }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    // a limited manager can hand out what they hold, nothing more
    let (status, body) = app
        .put(&format!("/users/{target_id}"), Some(&acme), Some(&manager), json!({ "permissions": ["calls.view"] }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["permissions"], json!(["calls.view"]));

    for grant in [json!(["billing.manage"]), json!("all")] {
        let (status, _) = app
            .put(&format!("/users/{target_id}"), Some(&acme), Some(&manager), json!({ "permissions": grant }))
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (status, body) = app
        .put(&format!("/users/{target_id}"), Some(&acme), Some(&owner), json!({ "permissions": "role" }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let stored: Option<String> = sqlx::query_scalar("SELECT permissions FROM users WHERE id = ?")
        .bind(target_id)
        .fetch_one(&app.pool)
        .await?;
    assert!(stored.is_none());
    assert!(body["data"]["permissions"].as_array().unwrap().contains(&json!("calls.view")));
    Ok(())
}

#[tokio::test]
async fn client_advisor_must_be_able_to_supervise() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (_, advisor_id) = app.seed_user(Some(tenant_id), "advisor", "adv@acme.example").await?;
    let (_, consultant_id) = app.seed_user(Some(tenant_id), "consultant", "c@acme.example").await?;
    let (_, client_id) = app.seed_user(Some(tenant_id), "client", "client@acme.example").await?;
    let acme = host("acme");
    let client_uri = format!("/users/{client_id}");

    let (status, _) = app
        .put(&client_uri, Some(&acme), Some(&owner), json!({ "advisor_id": consultant_id }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(&format!("/users/{consultant_id}"), Some(&acme), Some(&owner), json!({ "advisor_id": advisor_id }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(&client_uri, Some(&acme), Some(&owner), json!({ "advisor_id": advisor_id }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(uuid_at(&body["data"]["advisor_id"])?, advisor_id);

    // demoting the advisor releases their clients
    let (status, body) = app
        .put(&format!("/users/{advisor_id}"), Some(&acme), Some(&owner), json!({ "role": "consultant" }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, body) = app.get(&client_uri, Some(&acme), Some(&owner)).await?;
    assert!(body["data"]["advisor_id"].is_null());
    Ok(())
}

#[tokio::test]
async fn users_cannot_change_their_own_role_or_status() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, owner_id, _) = app.signup("acme", "owner@acme.example").await?;
    let acme = host("acme");
    let uri = format!("/users/{owner_id}");

    let (status, _) = app.put(&uri, Some(&acme), Some(&owner), json!({ "status": "inactive" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.put(&uri, Some(&acme), Some(&owner), json!({ "role": "client" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.put(&uri, Some(&acme), Some(&owner), json!({ "full_name": "Ada Owner" })).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["full_name"], "Ada Owner");

    let (status, _) = app.put(&uri, Some(&acme), Some(&owner), json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
