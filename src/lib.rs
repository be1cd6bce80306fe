pub mod app;
pub mod authz;
pub mod automation;
pub mod config;
pub mod db;
pub mod docs;
pub mod errors;
pub mod events;
pub mod jwt;
pub mod models;
pub mod routes;
pub mod tenancy;
pub mod utils;

pub use app::{create_app, create_app_with_config, AppState};
