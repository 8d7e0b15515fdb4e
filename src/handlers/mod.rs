pub mod actor;
pub mod asset_handlers;
pub mod health_handlers;
pub mod listing_handlers;
pub mod profile_handlers;
