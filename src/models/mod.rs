//! Core data models for the listing service.
//!
//! These entities describe listings, the image assets they reference and the
//! owner profiles used to contact a landlord. They serialize as camelCase JSON
//! via `serde`, matching the documents exchanged with clients.

pub mod asset;
pub mod listing;
pub mod profile;
