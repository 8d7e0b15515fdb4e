//! HTTP handlers for listings.
//!
//! Create and update take `multipart/form-data`: an optional `listing` part
//! carrying the JSON fields and any number of `images` file parts. Each
//! request runs one lifecycle session from start to submit.

use crate::{
    errors::AppError,
    handlers::actor::Actor,
    models::{asset::ImageFile, listing::ListingType},
    services::{
        lifecycle::{ListingSession, SubmissionOutcome},
        listing_form::{BooleanField, ListingForm, NumericField, TextField},
        listing_repository::BrowseQuery,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

const LISTING_PART: &str = "listing";
const IMAGES_PART: &str = "images";

/// Listing fields as sent by clients. Absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPayload {
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub regular_price: Option<i64>,
    pub discounted_price: Option<i64>,
    pub parking: Option<bool>,
    pub furnished: Option<bool>,
    pub offer: Option<bool>,
}

impl ListingPayload {
    pub fn apply(self, form: &mut ListingForm) {
        if let Some(listing_type) = self.listing_type {
            form.set_type(listing_type);
        }

        let text = [
            (TextField::Name, self.name),
            (TextField::Address, self.address),
            (TextField::Description, self.description),
        ];
        for (field, value) in text {
            if let Some(value) = value {
                form.set_text(field, value);
            }
        }

        let numbers = [
            (NumericField::Bedrooms, self.bedrooms),
            (NumericField::Bathrooms, self.bathrooms),
            (NumericField::RegularPrice, self.regular_price),
            (NumericField::DiscountedPrice, self.discounted_price),
        ];
        for (field, value) in numbers {
            if let Some(value) = value {
                form.set_number(field, value);
            }
        }

        let flags = [
            (BooleanField::Parking, self.parking),
            (BooleanField::Furnished, self.furnished),
            (BooleanField::Offer, self.offer),
        ];
        for (field, value) in flags {
            if let Some(value) = value {
                form.set_flag(field, value);
            }
        }

        if self.offer == Some(false) {
            form.clear_discounted_price();
        }
    }
}

#[derive(Debug, Default)]
struct ListingUpload {
    payload: Option<ListingPayload>,
    files: Vec<ImageFile>,
}

async fn read_upload(mut multipart: Multipart) -> Result<ListingUpload, AppError> {
    let mut upload = ListingUpload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            LISTING_PART => {
                let data = field.bytes().await?;
                upload.payload = Some(serde_json::from_slice(&data)?);
            }
            IMAGES_PART => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                upload
                    .files
                    .push(ImageFile::new(filename, content_type, data));
            }
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    Ok(upload)
}

async fn fill_and_submit(
    state: &AppState,
    session: &mut ListingSession,
    upload: ListingUpload,
) -> Result<Json<SubmissionOutcome>, AppError> {
    if let Some(payload) = upload.payload {
        payload.apply(&mut session.form);
    }
    if !upload.files.is_empty() {
        let existing = session.existing_images().len();
        session
            .form
            .set_files(upload.files, existing)
            .map_err(|err| AppError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()))?;
    }

    let outcome = state.lifecycle.submit(session).await?;
    Ok(Json(outcome))
}

/// `GET /listings` - browse with optional filters and sort.
pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<impl IntoResponse, AppError> {
    let listings = state.repository.browse(&query).await?;
    Ok(Json(listings))
}

/// `POST /listings`
pub async fn create_listing(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_upload(multipart).await?;
    let mut session = state.lifecycle.start_create(actor.0);
    let outcome = fill_and_submit(&state, &mut session, upload).await?;
    Ok((StatusCode::CREATED, outcome))
}

/// `GET /listings/{id}` - listing with preview URLs for its images.
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let gallery = state.lifecycle.gallery(id).await?;
    Ok(Json(gallery))
}

/// `PUT /listings/{id}` - edit; new images are appended after existing ones.
pub async fn update_listing(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_upload(multipart).await?;
    let mut session = state.lifecycle.start_edit(actor.0, id).await?;
    fill_and_submit(&state, &mut session, upload).await
}

/// `DELETE /listings/{id}`
pub async fn delete_listing(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.lifecycle.delete_listing(&actor.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /listings/{id}/images/{index}` - delete one attached image now and
/// save the listing without it.
pub async fn remove_listing_image(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<impl IntoResponse, AppError> {
    let mut session = state.lifecycle.start_edit(actor.0, id).await?;
    state
        .lifecycle
        .remove_existing_image(&mut session, index)
        .await?;
    let outcome = state.lifecycle.submit(&mut session).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub message: String,
}

/// `POST /listings/{id}/contact` - mailto link for the listing's owner.
pub async fn contact_owner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ContactRequest>,
) -> Result<impl IntoResponse, AppError> {
    let link = state.profiles.contact_owner(id, &request.message).await?;
    Ok(Json(link))
}
