//! Typed form state for creating or editing a listing, and its validation.
//!
//! Fields are set through one setter per category (text, numeric, boolean,
//! file list). `validate` is the only way to obtain a `ValidatedListing`, so
//! nothing reaches the image or document stores without passing the rules
//! below.

use crate::models::{
    asset::{AssetId, ImageFile},
    listing::{Geolocation, Listing, ListingFields, ListingType},
};
use std::ops::RangeInclusive;
use thiserror::Error;

pub const MAX_IMAGES: usize = 6;
pub const NAME_LENGTH: RangeInclusive<usize> = 10..=32;
pub const ROOM_COUNT: RangeInclusive<i64> = 1..=50;
pub const PRICE_RANGE: RangeInclusive<i64> = 50..=400_000_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must be between 10 and 32 characters (got {0})")]
    NameLength(usize),
    #[error("address is required")]
    MissingAddress,
    #[error("description is required")]
    MissingDescription,
    #[error("bedrooms must be between 1 and 50 (got {0})")]
    Bedrooms(i64),
    #[error("bathrooms must be between 1 and 50 (got {0})")]
    Bathrooms(i64),
    #[error("regular price must be between 50 and 400000000 (got {0})")]
    RegularPrice(i64),
    #[error("discounted price is required for an offer")]
    MissingDiscountedPrice,
    #[error("discounted price must be at least 50 (got {0})")]
    DiscountedPrice(i64),
    #[error("discounted price ({discounted}) must be less than regular price ({regular})")]
    DiscountNotBelowRegular { regular: i64, discounted: i64 },
    #[error("a listing needs between 1 and 6 images (got {0})")]
    ImageCount(usize),
    #[error("cannot remove the last image of a listing")]
    LastImage,
    #[error("image {index} does not exist (listing has {len})")]
    ImageIndex { index: usize, len: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextField {
    Name,
    Address,
    Description,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericField {
    Bedrooms,
    Bathrooms,
    RegularPrice,
    DiscountedPrice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BooleanField {
    Parking,
    Furnished,
    Offer,
}

/// In-progress form values. Numbers are kept wide so out-of-range input is
/// reported by validation instead of being lost in a conversion.
#[derive(Clone, Debug)]
pub struct ListingForm {
    listing_type: ListingType,
    name: String,
    address: String,
    description: String,
    bedrooms: i64,
    bathrooms: i64,
    regular_price: i64,
    discounted_price: Option<i64>,
    parking: bool,
    furnished: bool,
    offer: bool,
    files: Vec<ImageFile>,
}

impl Default for ListingForm {
    fn default() -> Self {
        Self {
            listing_type: ListingType::Rent,
            name: String::new(),
            address: String::new(),
            description: String::new(),
            bedrooms: 1,
            bathrooms: 1,
            regular_price: 0,
            discounted_price: None,
            parking: false,
            furnished: false,
            offer: false,
            files: Vec::new(),
        }
    }
}

impl ListingForm {
    /// Pre-fill from a stored listing for editing. No files are selected.
    pub fn from_listing(listing: &Listing) -> Self {
        let fields = &listing.fields;
        Self {
            listing_type: fields.listing_type,
            name: fields.name.clone(),
            address: fields.address.clone(),
            description: fields.description.clone(),
            bedrooms: i64::from(fields.bedrooms),
            bathrooms: i64::from(fields.bathrooms),
            regular_price: fields.regular_price,
            discounted_price: fields.discounted_price,
            parking: fields.parking,
            furnished: fields.furnished,
            offer: fields.offer,
            files: Vec::new(),
        }
    }

    pub fn set_type(&mut self, listing_type: ListingType) {
        self.listing_type = listing_type;
    }

    pub fn set_text(&mut self, field: TextField, value: impl Into<String>) {
        let value = value.into().trim().to_string();
        match field {
            TextField::Name => self.name = value,
            TextField::Address => self.address = value,
            TextField::Description => self.description = value,
        }
    }

    pub fn set_number(&mut self, field: NumericField, value: i64) {
        match field {
            NumericField::Bedrooms => self.bedrooms = value,
            NumericField::Bathrooms => self.bathrooms = value,
            NumericField::RegularPrice => self.regular_price = value,
            NumericField::DiscountedPrice => self.discounted_price = Some(value),
        }
    }

    pub fn clear_discounted_price(&mut self) {
        self.discounted_price = None;
    }

    pub fn set_flag(&mut self, field: BooleanField, value: bool) {
        match field {
            BooleanField::Parking => self.parking = value,
            BooleanField::Furnished => self.furnished = value,
            BooleanField::Offer => self.offer = value,
        }
    }

    /// Replace the selected files. Rejected, leaving the previous selection
    /// in place, when `existing + files` would exceed the image limit.
    pub fn set_files(&mut self, files: Vec<ImageFile>, existing: usize) -> Result<(), ValidationError> {
        let total = existing + files.len();
        if total > MAX_IMAGES {
            return Err(ValidationError::ImageCount(total));
        }
        self.files = files;
        Ok(())
    }

    pub fn files(&self) -> &[ImageFile] {
        &self.files
    }

    /// Check every field constraint. `existing_images` counts images already
    /// attached to the listing being edited (zero when creating).
    pub fn validate(&self, existing_images: usize) -> Result<ValidatedListing, ValidationError> {
        let name_len = self.name.chars().count();
        if !NAME_LENGTH.contains(&name_len) {
            return Err(ValidationError::NameLength(name_len));
        }
        if self.address.is_empty() {
            return Err(ValidationError::MissingAddress);
        }
        if self.description.is_empty() {
            return Err(ValidationError::MissingDescription);
        }
        if !ROOM_COUNT.contains(&self.bedrooms) {
            return Err(ValidationError::Bedrooms(self.bedrooms));
        }
        if !ROOM_COUNT.contains(&self.bathrooms) {
            return Err(ValidationError::Bathrooms(self.bathrooms));
        }
        if !PRICE_RANGE.contains(&self.regular_price) {
            return Err(ValidationError::RegularPrice(self.regular_price));
        }

        let discounted_price = if self.offer {
            let discounted = self
                .discounted_price
                .ok_or(ValidationError::MissingDiscountedPrice)?;
            if discounted >= self.regular_price {
                return Err(ValidationError::DiscountNotBelowRegular {
                    regular: self.regular_price,
                    discounted,
                });
            }
            if discounted < *PRICE_RANGE.start() {
                return Err(ValidationError::DiscountedPrice(discounted));
            }
            Some(discounted)
        } else {
            None
        };

        let image_count = existing_images + self.files.len();
        if image_count == 0 || image_count > MAX_IMAGES {
            return Err(ValidationError::ImageCount(image_count));
        }

        Ok(ValidatedListing {
            listing_type: self.listing_type,
            name: self.name.clone(),
            bedrooms: self.bedrooms as u32,
            bathrooms: self.bathrooms as u32,
            parking: self.parking,
            furnished: self.furnished,
            offer: self.offer,
            address: self.address.clone(),
            description: self.description.clone(),
            regular_price: self.regular_price,
            discounted_price,
        })
    }
}

/// Form values that passed validation, waiting for images and coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedListing {
    pub listing_type: ListingType,
    pub name: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub parking: bool,
    pub furnished: bool,
    pub offer: bool,
    pub address: String,
    pub description: String,
    pub regular_price: i64,
    pub discounted_price: Option<i64>,
}

impl ValidatedListing {
    pub fn into_fields(
        self,
        images: Vec<AssetId>,
        geolocation: Geolocation,
        user_id: String,
    ) -> ListingFields {
        ListingFields {
            listing_type: self.listing_type,
            name: self.name,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            parking: self.parking,
            furnished: self.furnished,
            offer: self.offer,
            address: self.address,
            description: self.description,
            regular_price: self.regular_price,
            discounted_price: self.discounted_price,
            images,
            geolocation,
            user_id,
        }
    }
}
