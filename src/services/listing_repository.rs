//! Listing Repository: pass-through CRUD over the document store.
//!
//! No caching, no retries. Every store failure is logged and surfaced as a
//! `RepositoryError` for the lifecycle manager to report.

use crate::models::listing::{Listing, ListingFields, ListingType};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use super::{
    StoreError,
    document_store::{DocumentStore, ListingFilter},
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("listing `{0}` not found")]
    NotFound(Uuid),
    #[error("user id must be provided")]
    MissingUserId,
    #[error("listing store failed to {operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Ordering offered by the browse pages.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Cheapest first, by effective price.
    PriceLow,
    PriceHigh,
    Newest,
}

/// Browse query: equality predicates go to the store, the rest is applied
/// to the returned page.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct BrowseQuery {
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub offer: Option<bool>,
    pub user_id: Option<String>,
    /// Inclusive bounds on the regular price.
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub sort: Option<SortOrder>,
}

impl BrowseQuery {
    fn store_filter(&self) -> ListingFilter {
        ListingFilter {
            user_id: self.user_id.clone(),
            listing_type: self.listing_type,
            offer: self.offer,
        }
    }

    fn admits(&self, listing: &Listing) -> bool {
        let fields = &listing.fields;
        self.min_price.is_none_or(|min| fields.regular_price >= min)
            && self.max_price.is_none_or(|max| fields.regular_price <= max)
            && self.bedrooms.is_none_or(|n| fields.bedrooms == n)
            && self.bathrooms.is_none_or(|n| fields.bathrooms == n)
    }

    /// Filter and order an already fetched page.
    pub fn apply(&self, listings: Vec<Listing>) -> Vec<Listing> {
        let mut selected: Vec<Listing> = listings
            .into_iter()
            .filter(|listing| self.admits(listing))
            .collect();

        match self.sort {
            Some(SortOrder::PriceLow) => selected.sort_by_key(Listing::effective_price),
            Some(SortOrder::PriceHigh) => {
                selected.sort_by_key(|listing| std::cmp::Reverse(listing.effective_price()))
            }
            Some(SortOrder::Newest) => {
                selected.sort_by_key(|listing| std::cmp::Reverse(listing.created_at))
            }
            None => {}
        }
        selected
    }
}

#[derive(Clone)]
pub struct ListingRepository {
    store: Arc<dyn DocumentStore>,
}

fn store_error(operation: &'static str, id: Option<Uuid>, source: StoreError) -> RepositoryError {
    match (id, source) {
        (Some(id), source) if source.is_not_found() => RepositoryError::NotFound(id),
        (_, source) => {
            error!(operation, listing_id = ?id, error = %source, "Listing store call failed");
            RepositoryError::Store { operation, source }
        }
    }
}

impl ListingRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, fields: ListingFields) -> RepositoryResult<Listing> {
        self.store
            .create_listing(fields)
            .await
            .map_err(|err| store_error("create listing", None, err))
    }

    pub async fn get(&self, id: Uuid) -> RepositoryResult<Listing> {
        self.store
            .get_listing(id)
            .await
            .map_err(|err| store_error("get listing", Some(id), err))
    }

    pub async fn update(&self, id: Uuid, fields: ListingFields) -> RepositoryResult<Listing> {
        self.store
            .update_listing(id, fields)
            .await
            .map_err(|err| store_error("update listing", Some(id), err))
    }

    pub async fn delete(&self, id: Uuid) -> RepositoryResult<()> {
        self.store
            .delete_listing(id)
            .await
            .map_err(|err| store_error("delete listing", Some(id), err))
    }

    pub async fn list(&self, filter: &ListingFilter) -> RepositoryResult<Vec<Listing>> {
        self.store
            .list_listings(filter)
            .await
            .map_err(|err| store_error("list listings", None, err))
    }

    pub async fn list_by_owner(&self, user_id: &str) -> RepositoryResult<Vec<Listing>> {
        if user_id.trim().is_empty() {
            return Err(RepositoryError::MissingUserId);
        }
        self.list(&ListingFilter::owned_by(user_id)).await
    }

    pub async fn browse(&self, query: &BrowseQuery) -> RepositoryResult<Vec<Listing>> {
        let page = self.list(&query.store_filter()).await?;
        Ok(query.apply(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MemoryDocumentStore, listing_fields};

    async fn seeded() -> (Arc<MemoryDocumentStore>, ListingRepository) {
        let store = Arc::new(MemoryDocumentStore::new());
        let repo = ListingRepository::new(store.clone());

        let mut cheap = listing_fields("owner-a");
        cheap.regular_price = 900;
        cheap.bedrooms = 1;
        repo.create(cheap).await.unwrap();

        let mut offer = listing_fields("owner-a");
        offer.regular_price = 3_000;
        offer.offer = true;
        offer.discounted_price = Some(500);
        offer.bedrooms = 3;
        repo.create(offer).await.unwrap();

        let mut sale = listing_fields("owner-b");
        sale.listing_type = ListingType::Sale;
        sale.regular_price = 250_000;
        repo.create(sale).await.unwrap();

        (store, repo)
    }

    #[tokio::test]
    async fn browse_by_category_and_price() {
        let (_, repo) = seeded().await;

        let rent = repo
            .browse(&BrowseQuery {
                listing_type: Some(ListingType::Rent),
                max_price: Some(1_000),
                ..BrowseQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(rent.len(), 1);
        assert_eq!(rent[0].fields.regular_price, 900);
    }

    #[tokio::test]
    async fn price_sort_uses_effective_price() {
        let (_, repo) = seeded().await;

        let sorted = repo
            .browse(&BrowseQuery {
                listing_type: Some(ListingType::Rent),
                sort: Some(SortOrder::PriceLow),
                ..BrowseQuery::default()
            })
            .await
            .unwrap();

        let prices: Vec<i64> = sorted.iter().map(Listing::effective_price).collect();
        assert_eq!(prices, vec![500, 900]);
    }

    #[tokio::test]
    async fn offers_and_room_filters() {
        let (_, repo) = seeded().await;

        let offers = repo
            .browse(&BrowseQuery {
                offer: Some(true),
                bedrooms: Some(3),
                ..BrowseQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(offers.len(), 1);
        assert!(offers[0].fields.offer);
    }

    #[tokio::test]
    async fn list_by_owner_requires_user_id() {
        let (_, repo) = seeded().await;

        assert!(matches!(
            repo.list_by_owner("  ").await,
            Err(RepositoryError::MissingUserId)
        ));
        assert_eq!(repo.list_by_owner("owner-a").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_listing_maps_to_not_found() {
        let (_, repo) = seeded().await;
        let id = Uuid::new_v4();
        assert!(matches!(repo.get(id).await, Err(RepositoryError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn store_failures_propagate_without_retry() {
        let (store, repo) = seeded().await;
        store.fail_writes(true);
        let calls_before = store.write_calls();

        let err = repo.create(listing_fields("owner-a")).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Store { operation: "create listing", .. }));
        assert_eq!(store.write_calls(), calls_before + 1);
    }
}
