//! Listing Lifecycle Manager.
//!
//! Drives one form session from `Editing` through validation, image upload,
//! geocoding and persistence. Images uploaded during a submission are
//! tracked and deleted again if the submission does not complete, so a
//! failed submit leaves no orphaned assets behind.

use crate::models::{
    asset::AssetId,
    listing::{Geolocation, Listing},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    geocoding::GeocodingResolver,
    image_assets::{BatchUploadError, DeleteError, ImageAssetManager},
    listing_form::{ListingForm, ValidationError},
    listing_repository::{ListingRepository, RepositoryError},
};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upload(#[from] BatchUploadError),
    #[error(transparent)]
    Delete(#[from] DeleteError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("listing `{0}` belongs to another user")]
    Forbidden(Uuid),
    #[error("images can only be removed while editing a listing")]
    NotEditing,
    #[error("this form session has already been submitted")]
    SessionClosed,
}

impl SubmitError {
    /// Message suitable for showing next to the form.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Validation(err) => err.to_string(),
            SubmitError::Upload(err) => format!(
                "Image upload failed for file {}. Please try again.",
                err.failed_index + 1
            ),
            SubmitError::Delete(_) => "Could not remove the image. Please try again.".into(),
            SubmitError::Repository(RepositoryError::NotFound(_)) => "Listing not found.".into(),
            SubmitError::Repository(_) => "Could not save the listing. Please try again.".into(),
            SubmitError::Forbidden(_) => "You can only change your own listings.".into(),
            SubmitError::NotEditing | SubmitError::SessionClosed => self.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionState {
    Editing,
    Validating,
    UploadingImages,
    Geocoding,
    Persisting,
    Done,
    Failed,
}

/// Where the presentation layer should go after a successful submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NextView {
    Profile,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub listing: Listing,
    pub next_view: NextView,
    /// States the submission passed through, oldest first.
    pub steps: Vec<SubmissionState>,
}

#[derive(Clone, Debug)]
enum SessionMode {
    Create,
    Edit(Listing),
}

/// Transient state of one create or edit form. Owned by a single actor and
/// discarded when the actor navigates away.
#[derive(Debug)]
pub struct ListingSession {
    actor: String,
    mode: SessionMode,
    existing_images: Vec<AssetId>,
    state: SubmissionState,
    history: Vec<SubmissionState>,
    pub form: ListingForm,
}

impl ListingSession {
    fn new(actor: String, mode: SessionMode) -> Self {
        let (form, existing_images) = match &mode {
            SessionMode::Create => (ListingForm::default(), Vec::new()),
            SessionMode::Edit(listing) => (
                ListingForm::from_listing(listing),
                listing.fields.images.clone(),
            ),
        };
        Self {
            actor,
            mode,
            existing_images,
            state: SubmissionState::Editing,
            history: vec![SubmissionState::Editing],
            form,
        }
    }

    /// Images already attached to the listing being edited.
    pub fn existing_images(&self) -> &[AssetId] {
        &self.existing_images
    }

    pub fn editing(&self) -> Option<&Listing> {
        match &self.mode {
            SessionMode::Edit(listing) => Some(listing),
            SessionMode::Create => None,
        }
    }

    fn transition(&mut self, next: SubmissionState) {
        debug!(from = ?self.state, to = ?next, "Listing submission transition");
        self.state = next;
        self.history.push(next);
    }

    /// Record the failure and hand the form back for another attempt.
    fn fail(&mut self, err: SubmitError) -> SubmitError {
        warn!(error = %err, message = %err.user_message(), "Listing submission failed");
        self.transition(SubmissionState::Failed);
        self.transition(SubmissionState::Editing);
        err
    }
}

#[cfg(test)]
impl ListingSession {
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn history(&self) -> &[SubmissionState] {
        &self.history
    }
}

/// Assets uploaded by the current submission that no record refers to yet.
struct UploadSaga<'a> {
    assets: &'a ImageAssetManager,
    pending: Vec<AssetId>,
}

impl<'a> UploadSaga<'a> {
    fn new(assets: &'a ImageAssetManager) -> Self {
        Self {
            assets,
            pending: Vec::new(),
        }
    }

    fn track(&mut self, ids: &[AssetId]) {
        self.pending.extend_from_slice(ids);
    }

    fn commit(self) {
        debug!(count = self.pending.len(), "Uploaded images confirmed");
    }

    async fn compensate(self) {
        if self.pending.is_empty() {
            return;
        }
        let released = self.assets.release_all(&self.pending).await;
        info!(
            released,
            total = self.pending.len(),
            "Rolled back images from failed submission"
        );
    }
}

/// A listing together with display URLs for its images.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingGallery {
    pub listing: Listing,
    pub cover_image: Option<AssetId>,
    pub image_urls: Vec<String>,
}

#[derive(Clone)]
pub struct ListingLifecycle {
    repository: ListingRepository,
    assets: ImageAssetManager,
    geocoder: GeocodingResolver,
}

impl ListingLifecycle {
    pub fn new(
        repository: ListingRepository,
        assets: ImageAssetManager,
        geocoder: GeocodingResolver,
    ) -> Self {
        Self {
            repository,
            assets,
            geocoder,
        }
    }

    pub fn start_create(&self, actor: impl Into<String>) -> ListingSession {
        ListingSession::new(actor.into(), SessionMode::Create)
    }

    /// Open an edit session. Only the owner may edit.
    pub async fn start_edit(
        &self,
        actor: impl Into<String>,
        listing_id: Uuid,
    ) -> Result<ListingSession, SubmitError> {
        let actor = actor.into();
        let listing = self.repository.get(listing_id).await?;
        if !listing.is_owned_by(&actor) {
            return Err(SubmitError::Forbidden(listing_id));
        }
        Ok(ListingSession::new(actor, SessionMode::Edit(listing)))
    }

    /// Remove an already attached image while editing. The asset is deleted
    /// right away; the listing record is only updated on submit.
    ///
    /// Refused when it would leave the listing with no image at all.
    pub async fn remove_existing_image(
        &self,
        session: &mut ListingSession,
        index: usize,
    ) -> Result<AssetId, SubmitError> {
        if session.state == SubmissionState::Done {
            return Err(SubmitError::SessionClosed);
        }
        if session.editing().is_none() {
            return Err(SubmitError::NotEditing);
        }
        let len = session.existing_images.len();
        if index >= len {
            return Err(ValidationError::ImageIndex { index, len }.into());
        }
        if len - 1 + session.form.files().len() == 0 {
            return Err(ValidationError::LastImage.into());
        }

        let id = session.existing_images[index];
        self.assets.delete(id).await?;
        session.existing_images.remove(index);
        Ok(id)
    }

    /// Submit the session's form.
    ///
    /// On failure the session is back in `Editing` with the form intact and
    /// any images uploaded by this attempt deleted again.
    pub async fn submit(
        &self,
        session: &mut ListingSession,
    ) -> Result<SubmissionOutcome, SubmitError> {
        if session.state == SubmissionState::Done {
            return Err(SubmitError::SessionClosed);
        }

        session.transition(SubmissionState::Validating);
        let validated = match session.form.validate(session.existing_images.len()) {
            Ok(validated) => validated,
            Err(err) => return Err(session.fail(err.into())),
        };

        let mut saga = UploadSaga::new(&self.assets);
        let mut images = session.existing_images.clone();
        if !session.form.files().is_empty() {
            session.transition(SubmissionState::UploadingImages);
            let uploaded = self.assets.upload_all(session.form.files()).await;
            match uploaded {
                Ok(ids) => {
                    saga.track(&ids);
                    images.extend(ids);
                }
                Err(err) => {
                    saga.track(&err.uploaded);
                    saga.compensate().await;
                    return Err(session.fail(err.into()));
                }
            }
        }

        session.transition(SubmissionState::Geocoding);
        let geolocation = match session.editing() {
            Some(listing)
                if listing.fields.address == validated.address
                    && listing.fields.geolocation.is_resolved() =>
            {
                listing.fields.geolocation
            }
            _ => self
                .geocoder
                .resolve(&validated.address)
                .await
                .unwrap_or(Geolocation::UNRESOLVED),
        };

        session.transition(SubmissionState::Persisting);
        let result = match session.editing() {
            None => {
                let fields = validated.into_fields(images, geolocation, session.actor.clone());
                self.repository.create(fields).await
            }
            Some(listing) => {
                let fields =
                    validated.into_fields(images, geolocation, listing.fields.user_id.clone());
                self.repository.update(listing.id, fields).await
            }
        };

        match result {
            Ok(listing) => {
                saga.commit();
                info!(listing_id = %listing.id, user_id = %session.actor, "Listing saved");
                session.form = ListingForm::from_listing(&listing);
                session.existing_images = listing.fields.images.clone();
                session.mode = SessionMode::Edit(listing.clone());
                session.transition(SubmissionState::Done);
                Ok(SubmissionOutcome {
                    listing,
                    next_view: NextView::Profile,
                    steps: session.history.clone(),
                })
            }
            Err(err) => {
                saga.compensate().await;
                Err(session.fail(err.into()))
            }
        }
    }

    /// Delete a listing owned by `actor`, then release its images.
    pub async fn delete_listing(&self, actor: &str, listing_id: Uuid) -> Result<(), SubmitError> {
        let listing = self.repository.get(listing_id).await?;
        if !listing.is_owned_by(actor) {
            return Err(SubmitError::Forbidden(listing_id));
        }
        self.repository.delete(listing_id).await?;
        let released = self.assets.release_all(&listing.fields.images).await;
        info!(%listing_id, released, "Listing deleted");
        Ok(())
    }

    /// Listing details plus preview URLs, skipping images that fail to resolve.
    pub async fn gallery(&self, listing_id: Uuid) -> Result<ListingGallery, SubmitError> {
        let listing = self.repository.get(listing_id).await?;
        let image_urls = self.assets.preview_gallery(&listing.fields.images).await;
        Ok(ListingGallery {
            cover_image: listing.cover_image(),
            listing,
            image_urls,
        })
    }
}
