mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{host, spawn_app};

#[tokio::test]
async fn owner_assigns_and_advisor_disconnects() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (advisor, advisor_id) = app.seed_user(Some(tenant_id), "advisor", "adv@acme.example").await?;
    let (_, client_id) = app.seed_user(Some(tenant_id), "client", "client@acme.example").await?;
    let acme = host("acme");

    let (status, body) = app
        .post(&format!("/advisors/{advisor_id}/clients/{client_id}"), Some(&acme), Some(&owner), json!({}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .get(&format!("/advisors/{advisor_id}/clients"), Some(&acme), Some(&advisor))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let clients = body["data"].as_array().unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0]["id"], client_id.to_string());

    // advisors lack users.edit but may release their own clients
    let (status, body) = app
        .post(
            &format!("/advisors/{advisor_id}/clients/{client_id}/disconnect"),
            Some(&acme),
            Some(&advisor),
            json!({}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let advisor_of: Option<uuid::Uuid> = sqlx::query_scalar("SELECT advisor_id FROM users WHERE id = ?")
        .bind(client_id)
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(advisor_of, None);

    let status_after: String = sqlx::query_scalar("SELECT status FROM users WHERE id = ?")
        .bind(client_id)
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(status_after, "active");
    Ok(())
}

#[tokio::test]
async fn only_the_connected_advisor_may_disconnect() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (_, advisor_id) = app.seed_user(Some(tenant_id), "advisor", "adv@acme.example").await?;
    let (other, other_id) = app.seed_user(Some(tenant_id), "advisor", "other@acme.example").await?;
    let (_, client_id) = app.seed_user(Some(tenant_id), "client", "client@acme.example").await?;
    let acme = host("acme");

    app.post(&format!("/advisors/{advisor_id}/clients/{client_id}"), Some(&acme), Some(&owner), json!({}))
        .await?;

    let (status, body) = app
        .post(
            &format!("/advisors/{other_id}/clients/{client_id}/disconnect"),
            Some(&acme),
            Some(&other),
            json!({}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    assert_eq!(body["message"], "This client is not connected to you");

    let (status, _) = app
        .post(
            &format!("/advisors/{advisor_id}/clients/{client_id}/disconnect"),
            Some(&acme),
            Some(&other),
            json!({}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn assignment_validates_both_roles() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (_, consultant_id) = app.seed_user(Some(tenant_id), "consultant", "con@acme.example").await?;
    let (_, advisor_id) = app.seed_user(Some(tenant_id), "advisor", "adv@acme.example").await?;
    let (_, client_id) = app.seed_user(Some(tenant_id), "client", "client@acme.example").await?;
    let acme = host("acme");

    let (status, _) = app
        .post(&format!("/advisors/{consultant_id}/clients/{client_id}"), Some(&acme), Some(&owner), json!({}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(&format!("/advisors/{advisor_id}/clients/{consultant_id}"), Some(&acme), Some(&owner), json!({}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn users_of_other_tenants_are_invisible() -> Result<()> {
    let app = spawn_app().await?;
    let (owner, _, tenant_id) = app.signup("acme", "owner@acme.example").await?;
    let (_, _, globex_id) = app.signup("globex", "owner@globex.example").await?;
    let (_, advisor_id) = app.seed_user(Some(tenant_id), "advisor", "adv@acme.example").await?;
    let (_, foreign_client) = app.seed_user(Some(globex_id), "client", "client@globex.example").await?;

    let (status, _) = app
        .post(
            &format!("/advisors/{advisor_id}/clients/{foreign_client}"),
            Some(&host("acme")),
            Some(&owner),
            json!({}),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
