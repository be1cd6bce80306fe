pub mod advisors;
pub mod auth;
pub mod discovery_calls;
pub mod health;
pub mod invitations;
pub mod podcast_interviews;
pub mod sales_calls;
pub mod tenants;
pub mod users;
