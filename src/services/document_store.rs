//! src/services/document_store.rs
//!
//! Document store capability for listing and profile records, plus the
//! default SQLite backend. Records are keyed by opaque ids assigned by the
//! store; listings are queried with equality predicates only and the first
//! page is all a caller ever sees.

use crate::models::{
    asset::AssetId,
    listing::{Geolocation, Listing, ListingFields, ListingType},
    profile::UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use uuid::Uuid;

use super::{StoreError, StoreResult, is_unique_violation, violates_column};

/// Number of documents a list call returns.
pub const DEFAULT_PAGE_SIZE: usize = 25;

const LISTING_COLUMNS: &str = "id, listing_type, name, bedrooms, bathrooms, parking, furnished, \
     offer, address, description, regular_price, discounted_price, images, latitude, longitude, \
     user_id, created_at, updated_at";

const PROFILE_COLUMNS: &str =
    "user_id, username, full_name, email, is_deleted, created_at, updated_at";

/// Equality predicates applied by the store when listing records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListingFilter {
    pub user_id: Option<String>,
    pub listing_type: Option<ListingType>,
    pub offer: Option<bool>,
}

impl ListingFilter {
    pub fn owned_by(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

/// Create/get/update/delete/list over listing records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new listing; the store assigns id and timestamps.
    async fn create_listing(&self, fields: ListingFields) -> StoreResult<Listing>;

    async fn get_listing(&self, id: Uuid) -> StoreResult<Listing>;

    /// Overwrite the owner-controlled fields. `user_id` is never rewritten.
    async fn update_listing(&self, id: Uuid, fields: ListingFields) -> StoreResult<Listing>;

    async fn delete_listing(&self, id: Uuid) -> StoreResult<()>;

    /// First page of listings matching `filter`, newest first.
    async fn list_listings(&self, filter: &ListingFilter) -> StoreResult<Vec<Listing>>;
}

/// Owner profile documents, keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_profile(&self, profile: UserProfile) -> StoreResult<UserProfile>;

    /// Fetch a profile that has not been soft-deleted.
    async fn get_profile(&self, user_id: &str) -> StoreResult<UserProfile>;

    async fn update_profile(
        &self,
        user_id: &str,
        username: &str,
        full_name: &str,
    ) -> StoreResult<UserProfile>;

    async fn soft_delete_profile(&self, user_id: &str) -> StoreResult<UserProfile>;

    /// True when `username` belongs to a profile other than `user_id`.
    async fn username_taken(&self, username: &str, user_id: &str) -> StoreResult<bool>;
}

#[derive(FromRow)]
struct ListingRow {
    id: Uuid,
    listing_type: String,
    name: String,
    bedrooms: i64,
    bathrooms: i64,
    parking: bool,
    furnished: bool,
    offer: bool,
    address: String,
    description: String,
    regular_price: i64,
    discounted_price: Option<i64>,
    images: String,
    latitude: f64,
    longitude: f64,
    user_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = StoreError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let malformed = |reason: String| StoreError::Malformed {
            kind: "listing",
            id: row.id.to_string(),
            reason,
        };
        let listing_type = row.listing_type.parse::<ListingType>().map_err(malformed)?;
        let images: Vec<AssetId> = serde_json::from_str(&row.images)
            .map_err(|err| malformed(format!("images: {}", err)))?;
        let bedrooms = u32::try_from(row.bedrooms)
            .map_err(|_| malformed(format!("bedrooms {}", row.bedrooms)))?;
        let bathrooms = u32::try_from(row.bathrooms)
            .map_err(|_| malformed(format!("bathrooms {}", row.bathrooms)))?;

        Ok(Listing {
            id: row.id,
            fields: ListingFields {
                listing_type,
                name: row.name,
                bedrooms,
                bathrooms,
                parking: row.parking,
                furnished: row.furnished,
                offer: row.offer,
                address: row.address,
                description: row.description,
                regular_price: row.regular_price,
                discounted_price: row.discounted_price,
                images,
                geolocation: Geolocation::new(row.latitude, row.longitude),
                user_id: row.user_id,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn encode_images(id: Uuid, images: &[AssetId]) -> StoreResult<String> {
    serde_json::to_string(images).map_err(|err| StoreError::Malformed {
        kind: "listing",
        id: id.to_string(),
        reason: format!("images: {}", err),
    })
}

/// SQLite-backed document store. Shares its pool with the object store's
/// metadata tables.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Arc<SqlitePool>,
}

impl SqliteDocumentStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create_listing(&self, fields: ListingFields) -> StoreResult<Listing> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let images = encode_images(id, &fields.images)?;

        let sql = format!(
            "INSERT INTO listings ({LISTING_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {LISTING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(id)
            .bind(fields.listing_type.as_str())
            .bind(&fields.name)
            .bind(i64::from(fields.bedrooms))
            .bind(i64::from(fields.bathrooms))
            .bind(fields.parking)
            .bind(fields.furnished)
            .bind(fields.offer)
            .bind(&fields.address)
            .bind(&fields.description)
            .bind(fields.regular_price)
            .bind(fields.discounted_price)
            .bind(images)
            .bind(fields.geolocation.lat)
            .bind(fields.geolocation.lng)
            .bind(&fields.user_id)
            .bind(now)
            .bind(now)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                err if is_unique_violation(&err) => StoreError::Conflict {
                    kind: "listing",
                    id: id.to_string(),
                },
                other => StoreError::from(other),
            })?;

        row.try_into()
    }

    async fn get_listing(&self, id: Uuid) -> StoreResult<Listing> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?");
        sqlx::query_as::<_, ListingRow>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| StoreError::not_found("listing", id))?
            .try_into()
    }

    async fn update_listing(&self, id: Uuid, fields: ListingFields) -> StoreResult<Listing> {
        let images = encode_images(id, &fields.images)?;
        let sql = format!(
            "UPDATE listings SET
                listing_type = ?, name = ?, bedrooms = ?, bathrooms = ?, parking = ?,
                furnished = ?, offer = ?, address = ?, description = ?, regular_price = ?,
                discounted_price = ?, images = ?, latitude = ?, longitude = ?, updated_at = ?
             WHERE id = ?
             RETURNING {LISTING_COLUMNS}"
        );
        sqlx::query_as::<_, ListingRow>(&sql)
            .bind(fields.listing_type.as_str())
            .bind(&fields.name)
            .bind(i64::from(fields.bedrooms))
            .bind(i64::from(fields.bathrooms))
            .bind(fields.parking)
            .bind(fields.furnished)
            .bind(fields.offer)
            .bind(&fields.address)
            .bind(&fields.description)
            .bind(fields.regular_price)
            .bind(fields.discounted_price)
            .bind(images)
            .bind(fields.geolocation.lat)
            .bind(fields.geolocation.lng)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| StoreError::not_found("listing", id))?
            .try_into()
    }

    async fn delete_listing(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("listing", id));
        }
        Ok(())
    }

    async fn list_listings(&self, filter: &ListingFilter) -> StoreResult<Vec<Listing>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE 1 = 1"
        ));

        if let Some(user_id) = &filter.user_id {
            builder.push(" AND user_id = ");
            builder.push_bind(user_id.clone());
        }
        if let Some(kind) = filter.listing_type {
            builder.push(" AND listing_type = ");
            builder.push_bind(kind.as_str());
        }
        if let Some(offer) = filter.offer {
            builder.push(" AND offer = ");
            builder.push_bind(offer);
        }

        builder.push(" ORDER BY created_at DESC, rowid DESC LIMIT ");
        builder.push_bind(DEFAULT_PAGE_SIZE as i64);

        let rows: Vec<ListingRow> = builder.build_query_as().fetch_all(&*self.db).await?;
        rows.into_iter().map(Listing::try_from).collect()
    }
}

#[async_trait]
impl ProfileStore for SqliteDocumentStore {
    async fn create_profile(&self, profile: UserProfile) -> StoreResult<UserProfile> {
        let sql = format!(
            "INSERT INTO profiles ({PROFILE_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(&profile.user_id)
            .bind(&profile.username)
            .bind(&profile.full_name)
            .bind(&profile.email)
            .bind(profile.is_deleted)
            .bind(profile.created_at)
            .bind(profile.updated_at)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                err if is_unique_violation(&err) && violates_column(&err, "username") => {
                    StoreError::Conflict {
                        kind: "username",
                        id: profile.username.clone(),
                    }
                }
                err if is_unique_violation(&err) => StoreError::Conflict {
                    kind: "profile",
                    id: profile.user_id.clone(),
                },
                other => StoreError::from(other),
            })
    }

    async fn get_profile(&self, user_id: &str) -> StoreResult<UserProfile> {
        let sql =
            format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ? AND is_deleted = 0");
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| StoreError::not_found("profile", user_id))
    }

    async fn update_profile(
        &self,
        user_id: &str,
        username: &str,
        full_name: &str,
    ) -> StoreResult<UserProfile> {
        let sql = format!(
            "UPDATE profiles SET username = ?, full_name = ?, updated_at = ?
             WHERE user_id = ? AND is_deleted = 0
             RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(username)
            .bind(full_name)
            .bind(Utc::now())
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await
            .map_err(|err| match err {
                err if is_unique_violation(&err) => StoreError::Conflict {
                    kind: "username",
                    id: username.to_string(),
                },
                other => StoreError::from(other),
            })?
            .ok_or_else(|| StoreError::not_found("profile", user_id))
    }

    async fn soft_delete_profile(&self, user_id: &str) -> StoreResult<UserProfile> {
        let sql = format!(
            "UPDATE profiles SET is_deleted = 1, updated_at = ?
             WHERE user_id = ? AND is_deleted = 0
             RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(Utc::now())
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| StoreError::not_found("profile", user_id))
    }

    async fn username_taken(&self, username: &str, user_id: &str) -> StoreResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM profiles WHERE username = ? AND user_id != ?",
        )
        .bind(username)
        .bind(user_id)
        .fetch_one(&*self.db)
        .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn store() -> SqliteDocumentStore {
        let pool = db::memory_pool().await.unwrap();
        SqliteDocumentStore::new(Arc::new(pool))
    }

    fn fields(user_id: &str, kind: ListingType, offer: bool) -> ListingFields {
        ListingFields {
            listing_type: kind,
            name: "Harbour View Flat".into(),
            bedrooms: 2,
            bathrooms: 1,
            parking: true,
            furnished: false,
            offer,
            address: "1 Quay Road".into(),
            description: "Bright corner unit".into(),
            regular_price: 2_000,
            discounted_price: offer.then_some(1_500),
            images: vec![Uuid::new_v4(), Uuid::new_v4()],
            geolocation: Geolocation::new(51.5, -0.12),
            user_id: user_id.into(),
        }
    }

    #[tokio::test]
    async fn create_then_get_preserves_fields() {
        let store = store().await;
        let input = fields("owner-1", ListingType::Rent, true);

        let created = store.create_listing(input.clone()).await.unwrap();
        assert_eq!(created.fields, input);
        assert_eq!(created.created_at, created.updated_at);

        let fetched = store.get_listing(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn update_keeps_owner_and_creation_time() {
        let store = store().await;
        let created = store
            .create_listing(fields("owner-1", ListingType::Rent, false))
            .await
            .unwrap();

        let mut changed = fields("someone-else", ListingType::Sale, false);
        changed.name = "Renovated Townhouse".into();
        let updated = store.update_listing(created.id, changed).await.unwrap();

        assert_eq!(updated.fields.user_id, "owner-1");
        assert_eq!(updated.fields.listing_type, ListingType::Sale);
        assert_eq!(updated.fields.name, "Renovated Townhouse");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn missing_listing_reports_not_found() {
        let store = store().await;
        let id = Uuid::new_v4();

        assert!(store.get_listing(id).await.unwrap_err().is_not_found());
        assert!(store.delete_listing(id).await.unwrap_err().is_not_found());
        assert!(
            store
                .update_listing(id, fields("u", ListingType::Rent, false))
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn list_applies_equality_filters() {
        let store = store().await;
        store
            .create_listing(fields("a", ListingType::Rent, false))
            .await
            .unwrap();
        store
            .create_listing(fields("a", ListingType::Sale, true))
            .await
            .unwrap();
        store
            .create_listing(fields("b", ListingType::Rent, true))
            .await
            .unwrap();

        let all = store.list_listings(&ListingFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let owned = store.list_listings(&ListingFilter::owned_by("a")).await.unwrap();
        assert_eq!(owned.len(), 2);

        let offers = store
            .list_listings(&ListingFilter {
                listing_type: Some(ListingType::Rent),
                offer: Some(true),
                ..ListingFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].fields.user_id, "b");
    }

    #[tokio::test]
    async fn list_returns_first_page_only() {
        let store = store().await;
        for _ in 0..DEFAULT_PAGE_SIZE + 3 {
            store
                .create_listing(fields("a", ListingType::Rent, false))
                .await
                .unwrap();
        }
        let page = store.list_listings(&ListingFilter::default()).await.unwrap();
        assert_eq!(page.len(), DEFAULT_PAGE_SIZE);
    }

    fn profile(user_id: &str, username: &str) -> UserProfile {
        let now = Utc::now();
        UserProfile {
            user_id: user_id.into(),
            username: username.into(),
            full_name: "Ada Lovelace".into(),
            email: format!("{}@example.org", user_id),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn profiles_enforce_unique_usernames() {
        let store = store().await;
        store.create_profile(profile("u1", "alovelace1234")).await.unwrap();

        let err = store
            .create_profile(profile("u2", "alovelace1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { kind: "username", ref id } if id == "alovelace1234"));

        let err = store
            .create_profile(profile("u1", "adalovelace9999"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { kind: "profile", ref id } if id == "u1"));

        assert!(store.username_taken("alovelace1234", "u2").await.unwrap());
        assert!(!store.username_taken("alovelace1234", "u1").await.unwrap());
    }

    #[tokio::test]
    async fn soft_deleted_profiles_are_hidden() {
        let store = store().await;
        store.create_profile(profile("u1", "alovelace1234")).await.unwrap();

        let deleted = store.soft_delete_profile("u1").await.unwrap();
        assert!(deleted.is_deleted);
        assert!(store.get_profile("u1").await.unwrap_err().is_not_found());
        assert!(store.soft_delete_profile("u1").await.unwrap_err().is_not_found());
    }
}
