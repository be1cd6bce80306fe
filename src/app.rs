use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{Guard, IdentityResolver, SqliteIdentityStore};
use crate::automation::Automation;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{advisors, auth, discovery_calls, health, invitations, podcast_interviews, sales_calls, tenants, users};
use crate::tenancy::{SqliteTenantStore, TenantResolver};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub tenants: TenantResolver,
    pub identity: IdentityResolver,
    pub guard: Guard,
    pub automation: Automation,
    pub events: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig, events: EventBus) -> Self {
        let jwt = Arc::new(config.jwt);
        let tenants = TenantResolver::new(Arc::new(SqliteTenantStore::new(pool.clone())), config.tenancy);
        let identity = IdentityResolver::new(jwt.clone(), Arc::new(SqliteIdentityStore::new(pool.clone())));
        let automation = Automation::new(pool.clone(), events.clone(), &config.automation);

        Self {
            pool,
            jwt,
            tenants,
            identity,
            guard: Guard::new(config.pages),
            automation,
            events,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AppConfig::from_env()?;
    create_app_with_config(pool, config).await
}

pub async fn create_app_with_config(pool: SqlitePool, config: AppConfig) -> Result<Router, AppError> {
    let (events, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, config, events);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .route("/access", get(auth::access));

    let tenant_routes = Router::new()
        .route("/", get(tenants::get_tenant))
        .route("/status", put(tenants::update_status));

    let invitation_routes = Router::new()
        .route("/", get(invitations::list_invitations).post(invitations::create_invitation))
        .route("/accept", post(invitations::accept_invitation))
        .route("/:id/revoke", post(invitations::revoke_invitation));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id", get(users::get_user).put(users::update_user));

    let advisor_routes = Router::new()
        .route("/:id/clients", get(advisors::list_clients))
        .route("/:id/clients/:client_id", post(advisors::assign_client))
        .route("/:id/clients/:client_id/disconnect", post(advisors::disconnect_client));

    let interview_routes = Router::new()
        .route("/", get(podcast_interviews::list_interviews).post(podcast_interviews::create_interview))
        .route(
            "/:id",
            get(podcast_interviews::get_interview)
                .put(podcast_interviews::update_interview)
                .delete(podcast_interviews::delete_interview),
        );

    let discovery_routes = Router::new()
        .route("/", get(discovery_calls::list_discovery_calls).post(discovery_calls::create_discovery_call))
        .route(
            "/:id",
            get(discovery_calls::get_discovery_call)
                .put(discovery_calls::update_discovery_call)
                .delete(discovery_calls::delete_discovery_call),
        );

    let sales_routes = Router::new()
        .route("/", get(sales_calls::list_sales_calls).post(sales_calls::create_sales_call))
        .route("/:id", get(sales_calls::get_sales_call));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/tenant", tenant_routes)
        .nest("/invitations", invitation_routes)
        .nest("/users", user_routes)
        .nest("/advisors", advisor_routes)
        .nest("/podcast-interviews", interview_routes)
        .nest("/discovery-calls", discovery_routes)
        .nest("/sales-calls", sales_routes)
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::map_response(json_method_not_allowed))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

async fn not_found() -> AppError {
    AppError::not_found("no such route")
}

/// Give axum's bare 405 responses the standard error envelope.
async fn json_method_not_allowed(response: Response) -> Response {
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return AppError::MethodNotAllowed.into_response();
    }
    response
}
