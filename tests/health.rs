mod common;

use anyhow::Result;
use axum::http::StatusCode;

#[tokio::test]
async fn health_endpoint_reports_db_ok() -> Result<()> {
    let app = common::spawn_app().await?;

    let (status, v) = app.get("/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK, "health endpoint did not return 200");
    assert_eq!(v["success"], true);

    let db_ok = v["data"]["db_ok"].as_bool().unwrap_or(false);
    assert!(db_ok, "expected db_ok: true, got: {}", v);

    Ok(())
}

#[tokio::test]
async fn health_ignores_unknown_tenants() -> Result<()> {
    let app = common::spawn_app().await?;

    let (status, _) = app.get("/api/health", Some(&common::host("nobody")), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
