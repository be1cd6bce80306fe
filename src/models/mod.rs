pub mod api;
pub mod discovery_call;
pub mod invitation;
pub mod podcast_interview;
pub mod sales_call;
pub mod tenant;
pub mod user;
