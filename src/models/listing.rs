//! Represents a property listing, the core domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::asset::AssetId;

/// Whether a property is offered for rent or for sale.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    #[default]
    Rent,
    Sale,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Rent => "rent",
            ListingType::Sale => "sale",
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rent" => Ok(ListingType::Rent),
            "sale" => Ok(ListingType::Sale),
            other => Err(format!("unknown listing type `{}`", other)),
        }
    }
}

/// A `[latitude, longitude]` pair.
///
/// `[0, 0]` is reserved as the "unresolved" sentinel and is never produced by
/// a successful geocoding lookup.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Geolocation {
    pub lat: f64,
    pub lng: f64,
}

impl Geolocation {
    pub const UNRESOLVED: Geolocation = Geolocation { lat: 0.0, lng: 0.0 };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_resolved(&self) -> bool {
        *self != Self::UNRESOLVED
    }
}

impl Default for Geolocation {
    fn default() -> Self {
        Self::UNRESOLVED
    }
}

impl From<[f64; 2]> for Geolocation {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<Geolocation> for [f64; 2] {
    fn from(value: Geolocation) -> Self {
        [value.lat, value.lng]
    }
}

/// Every stored attribute of a listing that the owner controls.
///
/// The document store assigns `id`, `created_at` and `updated_at` on top of
/// these when the record is written.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingFields {
    #[serde(rename = "type")]
    pub listing_type: ListingType,

    /// Display name, 10 to 32 characters.
    pub name: String,

    pub bedrooms: u32,
    pub bathrooms: u32,
    pub parking: bool,
    pub furnished: bool,

    /// When set, `discounted_price` is present and below `regular_price`.
    pub offer: bool,

    pub address: String,
    pub description: String,
    pub regular_price: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<i64>,

    /// Ordered asset ids; the first entry is the cover image.
    pub images: Vec<AssetId>,

    pub geolocation: Geolocation,

    /// Owning user. Set at creation and never rewritten.
    pub user_id: String,
}

/// A persisted listing as returned by the document store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,

    #[serde(flatten)]
    pub fields: ListingFields,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn cover_image(&self) -> Option<AssetId> {
        self.fields.images.first().copied()
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.fields.user_id == user_id
    }

    /// Price a visitor actually pays: the discounted price while on offer.
    pub fn effective_price(&self) -> i64 {
        match (self.fields.offer, self.fields.discounted_price) {
            (true, Some(discounted)) => discounted,
            _ => self.fields.regular_price,
        }
    }
}
