//! Shared handler state: the services wired to their default backends.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{
    document_store::SqliteDocumentStore,
    geocoding::{GeocodingLookup, GeocodingResolver},
    image_assets::ImageAssetManager,
    lifecycle::ListingLifecycle,
    listing_repository::ListingRepository,
    object_store::DiskObjectStore,
    profile_service::ProfileService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    /// Kept concrete so asset routes can stream payloads back out.
    pub objects: DiskObjectStore,
    pub repository: ListingRepository,
    pub lifecycle: ListingLifecycle,
    pub profiles: ProfileService,
}

impl AppState {
    pub fn new(
        db: Arc<SqlitePool>,
        objects: DiskObjectStore,
        lookup: Arc<dyn GeocodingLookup>,
    ) -> Self {
        let documents = Arc::new(SqliteDocumentStore::new(db.clone()));
        let repository = ListingRepository::new(documents.clone());
        let assets = ImageAssetManager::new(Arc::new(objects.clone()));
        let lifecycle = ListingLifecycle::new(
            repository.clone(),
            assets,
            GeocodingResolver::new(lookup),
        );
        let profiles = ProfileService::new(documents, repository.clone());

        Self {
            db,
            objects,
            repository,
            lifecycle,
            profiles,
        }
    }
}
