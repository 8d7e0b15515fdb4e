//! Represents the public profile of a listing owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Owner profile, stored under the owner's user id.
///
/// Profiles are soft-deleted: `is_deleted` hides them from lookups while the
/// row stays in place.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Identifier issued by the session provider; doubles as the document id.
    pub user_id: String,

    /// Unique handle, derived from the full name at sign up.
    pub username: String,

    pub full_name: String,

    /// Contact address used by "contact owner".
    pub email: String,

    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
