//! Owner profiles and the "contact owner" link.

use crate::models::profile::UserProfile;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{
    StoreError,
    document_store::ProfileStore,
    listing_repository::{ListingRepository, RepositoryError},
};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("{0} must be provided")]
    MissingField(&'static str),
    #[error("username `{0}` already exists, please choose a different one")]
    UsernameTaken(String),
    #[error("profile `{0}` not found")]
    NotFound(String),
    #[error("a profile already exists for `{0}`")]
    AlreadyExists(String),
    #[error("message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    Listing(#[from] RepositoryError),
    #[error("profile store failed to {operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Generated usernames tried before giving up on sign up.
const USERNAME_ATTEMPTS: usize = 2;

fn store_error(operation: &'static str, user_id: &str, source: StoreError) -> ProfileError {
    match source {
        StoreError::NotFound { .. } => ProfileError::NotFound(user_id.to_string()),
        StoreError::Conflict { kind: "username", id } => ProfileError::UsernameTaken(id),
        StoreError::Conflict { .. } => ProfileError::AlreadyExists(user_id.to_string()),
        source => {
            error!(operation, user_id, error = %source, "Profile store call failed");
            ProfileError::Store { operation, source }
        }
    }
}

fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ProfileError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ProfileError::MissingField(field));
    }
    Ok(value)
}

/// Username stem: first initial plus last name, lowercased, reduced to
/// `[a-z0-9]`, followed by `suffix`.
pub fn username_with_suffix(full_name: &str, suffix: u16) -> String {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    let first_initial = parts
        .first()
        .and_then(|part| part.chars().next())
        .map(|c| c.to_lowercase().to_string())
        .unwrap_or_default();
    let last_name = if parts.len() > 1 {
        parts[parts.len() - 1].to_lowercase()
    } else {
        String::new()
    };

    let mut username: String = format!("{}{}", first_initial, last_name)
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    username.push_str(&suffix.to_string());
    username
}

/// Username with a random four digit suffix.
pub fn create_username(full_name: &str) -> String {
    let suffix = rand::rng().random_range(1000..=9999);
    username_with_suffix(full_name, suffix)
}

/// A ready-to-open `mailto:` link addressed to a listing's owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactLink {
    pub owner_name: String,
    pub mailto: String,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    listings: ListingRepository,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>, listings: ListingRepository) -> Self {
        Self { store, listings }
    }

    /// Create the profile for a freshly signed up user.
    pub async fn create_profile(
        &self,
        user_id: &str,
        full_name: &str,
        email: &str,
    ) -> Result<UserProfile, ProfileError> {
        self.create_profile_with(user_id, full_name, email, create_username)
            .await
    }

    /// Sign up with usernames drawn from `next_username`. A clash on the
    /// generated username is retried with a fresh one.
    async fn create_profile_with(
        &self,
        user_id: &str,
        full_name: &str,
        email: &str,
        mut next_username: impl FnMut(&str) -> String + Send,
    ) -> Result<UserProfile, ProfileError> {
        let user_id = require(user_id, "user id")?;
        let full_name = require(full_name, "full name")?;
        let email = require(email, "email")?;

        let mut taken = String::new();
        for attempt in 1..=USERNAME_ATTEMPTS {
            let now = Utc::now();
            let profile = UserProfile {
                user_id: user_id.to_string(),
                username: next_username(full_name),
                full_name: full_name.to_string(),
                email: email.to_string(),
                is_deleted: false,
                created_at: now,
                updated_at: now,
            };

            match self.store.create_profile(profile).await {
                Ok(created) => {
                    info!(user_id, username = %created.username, "Profile created");
                    return Ok(created);
                }
                Err(StoreError::Conflict {
                    kind: "username",
                    id,
                }) => {
                    debug!(user_id, attempt, username = %id, "Generated username already taken");
                    taken = id;
                }
                Err(err) => return Err(store_error("create profile", user_id, err)),
            }
        }
        Err(ProfileError::UsernameTaken(taken))
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<UserProfile, ProfileError> {
        let user_id = require(user_id, "user id")?;
        self.store
            .get_profile(user_id)
            .await
            .map_err(|err| store_error("get profile", user_id, err))
    }

    /// Change username and full name. The new username must not belong to
    /// any other profile.
    pub async fn update_profile(
        &self,
        user_id: &str,
        username: &str,
        full_name: &str,
    ) -> Result<UserProfile, ProfileError> {
        let user_id = require(user_id, "user id")?;
        let username = require(username, "username")?;
        let full_name = require(full_name, "full name")?;

        let taken = self
            .store
            .username_taken(username, user_id)
            .await
            .map_err(|err| store_error("check username", user_id, err))?;
        if taken {
            return Err(ProfileError::UsernameTaken(username.to_string()));
        }

        self.store
            .update_profile(user_id, username, full_name)
            .await
            .map_err(|err| match err {
                StoreError::Conflict { .. } => ProfileError::UsernameTaken(username.to_string()),
                err => store_error("update profile", user_id, err),
            })
    }

    pub async fn soft_delete_profile(&self, user_id: &str) -> Result<UserProfile, ProfileError> {
        let user_id = require(user_id, "user id")?;
        self.store
            .soft_delete_profile(user_id)
            .await
            .map_err(|err| store_error("delete profile", user_id, err))
    }

    /// Build an email link to the owner of `listing_id`, with the listing
    /// name as subject and `message` as body.
    pub async fn contact_owner(
        &self,
        listing_id: Uuid,
        message: &str,
    ) -> Result<ContactLink, ProfileError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ProfileError::EmptyMessage);
        }

        let listing = self.listings.get(listing_id).await?;
        let owner = self.get_profile(&listing.fields.user_id).await?;

        Ok(ContactLink {
            owner_name: owner.full_name,
            mailto: format!(
                "mailto:{}?subject={}&body={}",
                owner.email,
                urlencoding::encode(&listing.fields.name),
                urlencoding::encode(message)
            ),
        })
    }
}
