//! Address geocoding.
//!
//! `GeocodingLookup` is the remote capability; `GeocodingResolver` is what
//! the lifecycle manager calls. The resolver never fails: any lookup problem
//! is logged and reported as "no coordinates".

use crate::models::listing::Geolocation;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Read-only address search against a geocoding provider.
#[async_trait]
pub trait GeocodingLookup: Send + Sync {
    /// Candidate coordinates for `address`, best match first.
    async fn search(&self, address: &str) -> Result<Vec<Geolocation>>;
}

/// Nominatim API search result.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

fn parse_places(places: Vec<NominatimPlace>) -> Result<Vec<Geolocation>> {
    places
        .into_iter()
        .map(|place| {
            let lat: f64 = place
                .lat
                .parse()
                .map_err(|e| anyhow!("Invalid latitude in response: {}", e))?;
            let lng: f64 = place
                .lon
                .parse()
                .map_err(|e| anyhow!("Invalid longitude in response: {}", e))?;
            Ok(Geolocation::new(lat, lng))
        })
        .collect()
}

/// Geocoding lookup backed by Nominatim (OpenStreetMap).
pub struct NominatimLookup {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl NominatimLookup {
    /// `timeout` of `None` keeps the transport default.
    pub fn new(
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        })
    }

    fn search_url(&self, address: &str) -> String {
        format!(
            "{}/search?format=json&limit=1&q={}",
            self.base_url,
            urlencoding::encode(address)
        )
    }
}

#[async_trait]
impl GeocodingLookup for NominatimLookup {
    async fn search(&self, address: &str) -> Result<Vec<Geolocation>> {
        let places: Vec<NominatimPlace> = self
            .client
            .get(self.search_url(address))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .context("Geocoding API request failed")?
            .error_for_status()
            .context("Geocoding API returned an error status")?
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        parse_places(places)
    }
}

/// Turns a free-text address into coordinates, or `None`.
#[derive(Clone)]
pub struct GeocodingResolver {
    lookup: Arc<dyn GeocodingLookup>,
}

impl GeocodingResolver {
    pub fn new(lookup: Arc<dyn GeocodingLookup>) -> Self {
        Self { lookup }
    }

    /// First match for `address`. Empty results, error statuses and transport
    /// failures all yield `None`; callers substitute the unresolved sentinel.
    #[instrument(skip(self))]
    pub async fn resolve(&self, address: &str) -> Option<Geolocation> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }

        match self.lookup.search(address).await {
            Ok(results) => {
                let first = results.into_iter().next();
                match first {
                    Some(location) => debug!(?location, "Geocoded address"),
                    None => debug!("Address not found by geocoding lookup"),
                }
                first
            }
            Err(err) => {
                warn!(error = %err, "Geocoding lookup failed");
                None
            }
        }
    }
}
