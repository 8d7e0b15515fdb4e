//! In-memory test doubles for the document store, object store and geocoding
//! lookup, with call recording and failure injection.

use crate::models::{
    asset::{AssetId, ImageAsset, ImageFile},
    listing::{Geolocation, Listing, ListingFields, ListingType},
    profile::UserProfile,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

use super::{
    StoreError, StoreResult,
    document_store::{DEFAULT_PAGE_SIZE, DocumentStore, ListingFilter, ProfileStore},
    geocoding::GeocodingLookup,
    object_store::{ObjectStore, PreviewTransform},
};

/// A small JPEG-looking file named `name`.
pub fn image(name: &str) -> ImageFile {
    ImageFile::new(name, None, b"\xff\xd8\xff\xe0".to_vec())
}

/// Valid rent listing fields owned by `user_id`.
pub fn listing_fields(user_id: &str) -> ListingFields {
    ListingFields {
        listing_type: ListingType::Rent,
        name: "Garden Cottage Two".into(),
        bedrooms: 2,
        bathrooms: 1,
        parking: false,
        furnished: true,
        offer: false,
        address: "4 Mill Lane".into(),
        description: "Quiet street, small garden".into(),
        regular_price: 1_500,
        discounted_price: None,
        images: vec![Uuid::new_v4()],
        geolocation: Geolocation::UNRESOLVED,
        user_id: user_id.into(),
    }
}

// =============================================================================
// Document store
// =============================================================================

#[derive(Default)]
pub struct MemoryDocumentStore {
    listings: Mutex<Vec<Listing>>,
    profiles: Mutex<Vec<UserProfile>>,
    fail_writes: AtomicBool,
    write_calls: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every create/update/delete fail until switched off again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Attempted listing writes, failed ones included.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.listings.lock().unwrap().len()
    }

    fn begin_write(&self) -> StoreResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        Ok(())
    }
}

fn filter_admits(filter: &ListingFilter, listing: &Listing) -> bool {
    filter
        .user_id
        .as_deref()
        .is_none_or(|user_id| listing.fields.user_id == user_id)
        && filter
            .listing_type
            .is_none_or(|kind| listing.fields.listing_type == kind)
        && filter.offer.is_none_or(|offer| listing.fields.offer == offer)
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_listing(&self, fields: ListingFields) -> StoreResult<Listing> {
        self.begin_write()?;
        let now = Utc::now();
        let listing = Listing {
            id: Uuid::new_v4(),
            fields,
            created_at: now,
            updated_at: now,
        };
        self.listings.lock().unwrap().push(listing.clone());
        Ok(listing)
    }

    async fn get_listing(&self, id: Uuid) -> StoreResult<Listing> {
        self.listings
            .lock()
            .unwrap()
            .iter()
            .find(|listing| listing.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("listing", id))
    }

    async fn update_listing(&self, id: Uuid, fields: ListingFields) -> StoreResult<Listing> {
        self.begin_write()?;
        let mut listings = self.listings.lock().unwrap();
        let listing = listings
            .iter_mut()
            .find(|listing| listing.id == id)
            .ok_or_else(|| StoreError::not_found("listing", id))?;
        let user_id = listing.fields.user_id.clone();
        listing.fields = ListingFields { user_id, ..fields };
        listing.updated_at = Utc::now();
        Ok(listing.clone())
    }

    async fn delete_listing(&self, id: Uuid) -> StoreResult<()> {
        self.begin_write()?;
        let mut listings = self.listings.lock().unwrap();
        let before = listings.len();
        listings.retain(|listing| listing.id != id);
        if listings.len() == before {
            return Err(StoreError::not_found("listing", id));
        }
        Ok(())
    }

    async fn list_listings(&self, filter: &ListingFilter) -> StoreResult<Vec<Listing>> {
        Ok(self
            .listings
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|listing| filter_admits(filter, listing))
            .take(DEFAULT_PAGE_SIZE)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileStore for MemoryDocumentStore {
    async fn create_profile(&self, profile: UserProfile) -> StoreResult<UserProfile> {
        let mut profiles = self.profiles.lock().unwrap();
        if profiles.iter().any(|p| p.user_id == profile.user_id) {
            return Err(StoreError::Conflict {
                kind: "profile",
                id: profile.user_id,
            });
        }
        if profiles.iter().any(|p| p.username == profile.username) {
            return Err(StoreError::Conflict {
                kind: "username",
                id: profile.username,
            });
        }
        profiles.push(profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self, user_id: &str) -> StoreResult<UserProfile> {
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.user_id == user_id && !p.is_deleted)
            .cloned()
            .ok_or_else(|| StoreError::not_found("profile", user_id))
    }

    async fn update_profile(
        &self,
        user_id: &str,
        username: &str,
        full_name: &str,
    ) -> StoreResult<UserProfile> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .iter_mut()
            .find(|p| p.user_id == user_id && !p.is_deleted)
            .ok_or_else(|| StoreError::not_found("profile", user_id))?;
        profile.username = username.to_string();
        profile.full_name = full_name.to_string();
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn soft_delete_profile(&self, user_id: &str) -> StoreResult<UserProfile> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .iter_mut()
            .find(|p| p.user_id == user_id && !p.is_deleted)
            .ok_or_else(|| StoreError::not_found("profile", user_id))?;
        profile.is_deleted = true;
        Ok(profile.clone())
    }

    async fn username_taken(&self, username: &str, user_id: &str) -> StoreResult<bool> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.username == username && p.user_id != user_id))
    }
}

// =============================================================================
// Object store
// =============================================================================

#[derive(Default)]
pub struct MemoryObjectStore {
    assets: Mutex<HashMap<AssetId, ImageAsset>>,
    deleted: Mutex<Vec<AssetId>>,
    put_calls: AtomicUsize,
    fail_put_at: Option<usize>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `call`-th put (zero-based).
    pub fn fail_put_at(mut self, call: usize) -> Self {
        self.fail_put_at = Some(call);
        self
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.assets.lock().unwrap().contains_key(&id)
    }

    pub fn filename(&self, id: AssetId) -> Option<String> {
        self.assets
            .lock()
            .unwrap()
            .get(&id)
            .map(|asset| asset.filename.clone())
    }

    pub fn content_type(&self, id: AssetId) -> Option<String> {
        self.assets
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|asset| asset.content_type.clone())
    }

    /// Ids removed through `delete`, in call order.
    pub fn deleted(&self) -> Vec<AssetId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.assets.lock().unwrap().len()
    }

    /// Drop an asset behind the manager's back, leaving references dangling.
    pub fn forget(&self, id: AssetId) {
        self.assets.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, file: ImageFile) -> StoreResult<ImageAsset> {
        let call = self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put_at == Some(call) {
            return Err(StoreError::Unavailable("injected upload failure".into()));
        }
        let asset = ImageAsset {
            id: Uuid::new_v4(),
            filename: file.filename,
            content_type: file.content_type,
            size_bytes: file.bytes.len() as i64,
            etag: format!("{:x}", md5::compute(&file.bytes)),
            created_at: Utc::now(),
        };
        self.assets.lock().unwrap().insert(asset.id, asset.clone());
        Ok(asset)
    }

    async fn delete(&self, id: AssetId) -> StoreResult<()> {
        if self.assets.lock().unwrap().remove(&id).is_none() {
            return Err(StoreError::not_found("asset", id));
        }
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }

    async fn preview_url(&self, id: AssetId, transform: &PreviewTransform) -> StoreResult<String> {
        if !self.contains(id) {
            return Err(StoreError::not_found("asset", id));
        }
        Ok(format!("memory://assets/{}?{}", id, transform.query_string()))
    }
}

// =============================================================================
// Geocoding lookup
// =============================================================================

pub struct StaticLookup {
    results: Option<Vec<Geolocation>>,
    calls: Mutex<Vec<String>>,
}

impl StaticLookup {
    pub fn found(results: Vec<Geolocation>) -> Self {
        Self {
            results: Some(results),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every search fails as if the provider were unreachable.
    pub fn failing() -> Self {
        Self {
            results: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeocodingLookup for StaticLookup {
    async fn search(&self, address: &str) -> Result<Vec<Geolocation>> {
        self.calls.lock().unwrap().push(address.to_string());
        self.results
            .clone()
            .ok_or_else(|| anyhow!("geocoding provider unreachable"))
    }
}
