use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize, credential_from_headers, principal_for, AuthContext, Decision, Role, SESSION_COOKIE};
use crate::db::sessions::{prune_expired_sessions, revoke_session};
use crate::db::users::{ensure_email_available, fetch_user_by_id, find_user_by_email, insert_user, NewUser};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_activity_with_context, RequestContext};
use crate::models::api::ApiResponse;
use crate::models::tenant::TenantSignupRequest;
use crate::models::user::{AccessQuery, AccessResponse, AuthResponse, LoginRequest, MeResponse, User, UserStatus};
use crate::routes::tenants::fetch_tenant;
use crate::tenancy::{is_valid_subdomain, OriginHint, TenantAccess, TenantScope};
use crate::utils::{hash_password, is_valid_email, normalize_email, utc_now, verify_password};

const DEFAULT_TIER: &str = "starter";

fn session_cookie(token: &str, max_age_hours: i64) -> AppResult<HeaderValue> {
    let max_age = max_age_hours.max(0) * 3600;
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    ))
    .map_err(|err| AppError::internal(format!("invalid session cookie: {err}")))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account belongs to another tenant")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let hint = OriginHint::from_headers(&headers)?;
    let tenant = state.tenants.resolve(hint.as_ref(), TenantAccess::Standard).await?;

    let db_user = find_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    if user.status != UserStatus::Active {
        return Err(AppError::unauthorized("account is inactive"));
    }

    let principal = principal_for(user.clone());
    if let Decision::Deny(reason) = authorize(Some(&principal), &tenant, None) {
        return Err(reason.into_error(Some(&principal), &tenant));
    }
    if let (TenantScope::Unscoped, Some(home)) = (&tenant, user.tenant_id) {
        state.tenants.admit_home(home, TenantAccess::Standard).await?;
    }

    let now = utc_now();
    sqlx::query("UPDATE users SET last_login = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    let token = state.jwt.encode(user.id)?;
    let cookie = session_cookie(&token, state.jwt.exp_hours)?;

    log_activity_with_context(
        &state.events,
        "login",
        Some(user.id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );
    tracing::info!(user_id = %user.id, role = %user.role, "user logged in");

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(ApiResponse::ok(AuthResponse::new(token, user))),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "Auth",
    request_body = TenantSignupRequest,
    responses(
        (status = 201, description = "Tenant and owner account created", body = AuthResponse),
        (status = 400, description = "Invalid subdomain, email or password"),
        (status = 409, description = "Subdomain or email already taken")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<TenantSignupRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let subdomain = payload.subdomain.trim().to_ascii_lowercase();
    if !is_valid_subdomain(&subdomain) || state.tenants.config().is_reserved(&subdomain) {
        return Err(AppError::bad_request("subdomain is invalid or unavailable"));
    }
    if payload.business_name.trim().is_empty() || payload.full_name.trim().is_empty() {
        return Err(AppError::bad_request("business name and full name are required"));
    }

    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("invalid email format"));
    }
    ensure_email_available(&state.pool, &email).await?;
    let password_hash = hash_password(&payload.password)?;

    let tenant_id = Uuid::new_v4();
    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO tenants (id, subdomain, business_name, subscription_tier, subscription_status, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'trial', 'active', ?, ?)
        "#,
    )
    .bind(tenant_id)
    .bind(&subdomain)
    .bind(payload.business_name.trim())
    .bind(payload.subscription_tier.as_deref().unwrap_or(DEFAULT_TIER))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await;

    if let Err(err) = inserted {
        let err = AppError::from(err);
        return Err(if err.is_unique_violation() {
            AppError::conflict("subdomain already taken")
        } else {
            err
        });
    }

    let user_id = insert_user(
        &mut tx,
        NewUser {
            email: &email,
            full_name: &payload.full_name,
            password_hash: &password_hash,
            role: Role::tenant_owner(),
            tenant_id: Some(tenant_id),
            advisor_id: None,
        },
    )
    .await?;

    tx.commit().await?;

    let tenant = fetch_tenant(&state.pool, tenant_id).await?;
    let user: User = fetch_user_by_id(&state.pool, user_id).await?.try_into()?;

    log_activity(&state.events, "created", Some(user.id), &tenant);
    log_activity(&state.events, "registered", Some(user.id), &user);
    tracing::info!(tenant_id = %tenant.id, subdomain = %tenant.subdomain, "tenant signed up");

    let token = state.jwt.encode(user.id)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(AuthResponse::new(token, user)))))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me(State(state): State<AppState>, ctx: AuthContext) -> AppResult<Json<ApiResponse<MeResponse>>> {
    let principal = ctx.authorize(&state.guard, "auth.me")?;
    let user: User = fetch_user_by_id(&state.pool, principal.user_id).await?.try_into()?;

    let tenant = match ctx.tenant.tenant() {
        Some(tenant) => Some(tenant.clone()),
        None => match user.tenant_id {
            Some(id) => Some(fetch_tenant(&state.pool, id).await?),
            None => None,
        },
    };

    Ok(Json(ApiResponse::ok(MeResponse {
        landing_page: user.role.landing_page().to_string(),
        user,
        tenant,
    })))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session revoked"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    ctx: AuthContext,
) -> AppResult<impl IntoResponse> {
    let principal = ctx.require_principal()?;
    let credential = credential_from_headers(&headers).ok_or_else(|| AppError::unauthorized("authentication required"))?;
    let claims = state.jwt.decode(&credential)?;

    revoke_session(&state.pool, claims.jti, principal.user_id, claims.expires_at()).await?;
    prune_expired_sessions(&state.pool).await?;

    let user: User = fetch_user_by_id(&state.pool, principal.user_id).await?.try_into()?;
    log_activity(&state.events, "logout", Some(user.id), &user);

    Ok((
        AppendHeaders([(header::SET_COOKIE, session_cookie("", 0)?)]),
        Json(ApiResponse::ok(serde_json::json!({ "logged_out": true }))),
    ))
}

#[utoipa::path(
    get,
    path = "/auth/access",
    tag = "Auth",
    params(AccessQuery),
    responses(
        (status = 200, description = "Caller may open the page", body = AccessResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Wrong tenant or missing permission")
    )
)]
pub async fn access(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<AccessQuery>,
) -> AppResult<Json<ApiResponse<AccessResponse>>> {
    let page = query.page.trim().trim_start_matches('/').to_string();
    ctx.authorize(&state.guard, &page)?;

    Ok(Json(ApiResponse::ok(AccessResponse {
        required_permission: state.guard.pages().required(&page).map(str::to_string),
        allowed: true,
        page,
    })))
}
