use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, automation, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::login,
		routes::auth::signup,
		routes::auth::me,
		routes::auth::logout,
		routes::auth::access,
		routes::tenants::get_tenant,
		routes::tenants::update_status,
		routes::invitations::list_invitations,
		routes::invitations::create_invitation,
		routes::invitations::accept_invitation,
		routes::invitations::revoke_invitation,
		routes::users::list_users,
		routes::users::get_user,
		routes::users::update_user,
		routes::advisors::list_clients,
		routes::advisors::assign_client,
		routes::advisors::disconnect_client,
		routes::podcast_interviews::list_interviews,
		routes::podcast_interviews::get_interview,
		routes::podcast_interviews::create_interview,
		routes::podcast_interviews::update_interview,
		routes::podcast_interviews::delete_interview,
		routes::discovery_calls::list_discovery_calls,
		routes::discovery_calls::get_discovery_call,
		routes::discovery_calls::create_discovery_call,
		routes::discovery_calls::update_discovery_call,
		routes::discovery_calls::delete_discovery_call,
		routes::sales_calls::list_sales_calls,
		routes::sales_calls::get_sales_call,
		routes::sales_calls::create_sales_call
	),
	components(
		schemas(
			routes::health::HealthResponse,
			authz::Role,
			authz::DenyReason,
			models::user::User,
			models::user::UserStatus,
			models::user::ClientSummary,
			models::user::LoginRequest,
			models::user::AuthResponse,
			models::user::MeResponse,
			models::user::AccessResponse,
			models::user::UserUpdateRequest,
			models::tenant::Tenant,
			models::tenant::TenantLimits,
			models::tenant::TenantStatus,
			models::tenant::SubscriptionStatus,
			models::tenant::TenantSignupRequest,
			models::tenant::TenantStatusUpdateRequest,
			models::invitation::Invitation,
			models::invitation::InvitationStatus,
			models::invitation::InvitationCreateRequest,
			models::invitation::InvitationCreated,
			models::invitation::InvitationAcceptRequest,
			models::podcast_interview::PodcastInterview,
			models::podcast_interview::PodcastInterviewCreateRequest,
			models::podcast_interview::PodcastInterviewUpdateRequest,
			models::podcast_interview::InterviewStats,
			models::podcast_interview::InterviewList,
			models::podcast_interview::InterviewUpdated,
			models::discovery_call::DiscoveryCall,
			models::discovery_call::DiscoveryCallCreateRequest,
			models::discovery_call::DiscoveryCallUpdateRequest,
			models::discovery_call::DiscoveryStats,
			models::discovery_call::DiscoveryCallList,
			models::discovery_call::DiscoveryCallUpdated,
			models::sales_call::SalesCall,
			models::sales_call::SalesCallCreateRequest,
			automation::AutomationReport,
			automation::CascadeOutcome
		)
	),
	tags(
		(name = "Health", description = "Liveness and database reachability"),
		(name = "Auth", description = "Sessions, signup and page access"),
		(name = "Tenant", description = "Billing view and subscription status"),
		(name = "Invitations", description = "Single-use invitations into a tenant"),
		(name = "Users", description = "Tenant user management"),
		(name = "Advisors", description = "Advisor and client connections"),
		(name = "Podcast Interviews", description = "Interviews; qualifying ones create discovery calls"),
		(name = "Discovery Calls", description = "Discovery calls; completed ones create sales calls"),
		(name = "Sales Calls", description = "Sales calls")
	)
)]
pub struct ApiDoc;

/// Every response is wrapped as `{ success, data, message? }`; the schemas
/// above describe `data`.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	normalize_path_operations(&mut doc);
	let root = doc.as_object_mut().context("OpenAPI root must be an object")?;
	ensure_security_components(root)?;
	root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	root.entry("openapi").or_insert_with(|| Value::String("3.1.0".to_string()));
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn normalize_path_operations(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		let snapshot = paths.clone();
		for (path, item) in snapshot {
			if let Some(ops) = item.as_object() {
				let mut normalized = Map::new();
				for (method, val) in ops {
					let key = method.to_lowercase();
					if let Some(existing) = normalized.get_mut(&key) {
						merge_values(existing, val);
					} else {
						normalized.insert(key, val.clone());
					}
				}
				paths.insert(path, Value::Object(normalized));
			}
		}
	}
}

fn ensure_security_components(root: &mut Map<String, Value>) -> anyhow::Result<()> {
	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.context("components must be an object")?;

	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.context("securitySchemes must be an object")?;

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
	schemes.insert(
		"sessionCookie".to_string(),
		json!({
			"type": "apiKey",
			"in": "cookie",
			"name": authz::SESSION_COOKIE
		}),
	);
	Ok(())
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let tls_enabled = std::env::var("TLS_CERT_PATH").is_ok() && std::env::var("TLS_KEY_PATH").is_ok();
	let scheme = if tls_enabled { "https" } else { "http" };
	let server_url = format!("{}://localhost:{}", scheme, port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

fn merge_values(target: &mut Value, addition: &Value) {
	match (target, addition) {
		(Value::Object(dest), Value::Object(src)) => {
			for (key, value) in src {
				if let Some(existing) = dest.get_mut(key) {
					merge_values(existing, value);
				} else {
					dest.insert(key.clone(), value.clone());
				}
			}
		}
		(Value::Array(dest), Value::Array(src)) => {
			for item in src {
				if !dest.contains(item) {
					dest.push(item.clone());
				}
			}
		}
		_ => {}
	}
}
