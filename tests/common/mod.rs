#![allow(dead_code)]

use std::path::Path;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use growth_crm::config::AppConfig;
use growth_crm::create_app_with_config;
use growth_crm::jwt::JwtConfig;
use growth_crm::tenancy::TenancyConfig;

pub const ROOT_DOMAIN: &str = "growthmanagerpro.com";
pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub fn host(subdomain: &str) -> String {
    format!("{subdomain}.{ROOT_DOMAIN}")
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut AppConfig)) -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let mut config = AppConfig::new(JwtConfig::new("test-secret", 1), TenancyConfig::new(ROOT_DOMAIN));
    customize(&mut config);
    let app = create_app_with_config(pool.clone(), config).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    /// Send a JSON request and return the status with the decoded body.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        host: Option<&str>,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(host) = host {
            builder = builder.header("host", host);
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }

        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, host: Option<&str>, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.send("GET", uri, host, token, None).await
    }

    pub async fn post(&self, uri: &str, host: Option<&str>, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.send("POST", uri, host, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, host: Option<&str>, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.send("PUT", uri, host, token, Some(body)).await
    }

    /// Sign up a tenant and return its owner's token, user id and tenant id.
    pub async fn signup(&self, subdomain: &str, email: &str) -> Result<(String, Uuid, Uuid)> {
        let (status, body) = self
            .post(
                "/auth/signup",
                None,
                None,
                serde_json::json!({
                    "subdomain": subdomain,
                    "business_name": format!("{subdomain} advisory"),
                    "full_name": "Owner",
                    "email": email,
                    "password": PASSWORD,
                }),
            )
            .await?;
        if status != StatusCode::CREATED {
            anyhow::bail!("signup failed: {status} - {body}");
        }

        let data = &body["data"];
        let token = data["token"].as_str().context("missing token")?.to_string();
        let user_id = uuid_at(&data["user"]["id"])?;
        let tenant_id = uuid_at(&data["user"]["tenant_id"])?;
        Ok((token, user_id, tenant_id))
    }

    pub async fn login(&self, host: Option<&str>, email: &str) -> Result<(StatusCode, Value)> {
        self.post(
            "/auth/login",
            host,
            None,
            serde_json::json!({ "email": email, "password": PASSWORD }),
        )
        .await
    }

    /// Insert an active user directly and return a session token for them.
    pub async fn seed_user(&self, tenant_id: Option<Uuid>, role: &str, email: &str) -> Result<(String, Uuid)> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        let hash = growth_crm::utils::hash_password(PASSWORD)?;

        sqlx::query(
            "INSERT INTO users (id, email, full_name, password_hash, role, tenant_id, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?)",
        )
        .bind(id)
        .bind(email)
        .bind(email)
        .bind(hash)
        .bind(role)
        .bind(tenant_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let token = JwtConfig::new("test-secret", 1).encode(id)?;
        Ok((token, id))
    }
}

pub fn uuid_at(value: &Value) -> Result<Uuid> {
    let raw = value.as_str().with_context(|| format!("expected uuid string, got {value}"))?;
    Ok(Uuid::parse_str(raw)?)
}
