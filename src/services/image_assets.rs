//! Image Asset Manager: upload, delete and preview of listing photos on top
//! of the object store capability.

use crate::models::asset::{AssetId, ImageFile};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::{
    StoreError,
    object_store::{ObjectStore, PreviewTransform},
};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("`{0}` is not a supported image file")]
    UnrecognizedFile(String),
    #[error("failed to upload `{filename}`: {source}")]
    Store {
        filename: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
#[error("failed to delete asset `{id}`: {source}")]
pub struct DeleteError {
    pub id: AssetId,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("asset id is required")]
    MissingAssetId,
    #[error("failed to fetch preview for `{id}`: {source}")]
    Store {
        id: AssetId,
        #[source]
        source: StoreError,
    },
}

/// A sequential batch upload stopped at `failed_index`.
///
/// `uploaded` holds the ids stored before the failure, in input order, so
/// the caller can compensate.
#[derive(Debug, Error)]
#[error("image upload aborted at file {failed_index}: {source}")]
pub struct BatchUploadError {
    pub uploaded: Vec<AssetId>,
    pub failed_index: usize,
    #[source]
    pub source: UploadError,
}

#[derive(Clone)]
pub struct ImageAssetManager {
    store: Arc<dyn ObjectStore>,
}

impl ImageAssetManager {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload a single image file and return its asset id.
    pub async fn upload(&self, file: &ImageFile) -> Result<AssetId, UploadError> {
        let format = file
            .format()
            .ok_or_else(|| UploadError::UnrecognizedFile(file.filename.clone()))?;

        let filename = file.filename.clone();
        let stored = ImageFile {
            content_type: Some(format.content_type().to_string()),
            ..file.clone()
        };
        match self.store.put(stored).await {
            Ok(asset) => {
                debug!(asset_id = %asset.id, filename = %filename, "Uploaded image");
                Ok(asset.id)
            }
            Err(source) => {
                error!(filename = %filename, error = %source, "Image upload failed");
                Err(UploadError::Store { filename, source })
            }
        }
    }

    /// Upload `files` one at a time, in order. Stops at the first failure
    /// without touching the assets already stored.
    pub async fn upload_all(&self, files: &[ImageFile]) -> Result<Vec<AssetId>, BatchUploadError> {
        let mut uploaded = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            match self.upload(file).await {
                Ok(id) => uploaded.push(id),
                Err(source) => {
                    return Err(BatchUploadError {
                        uploaded,
                        failed_index: index,
                        source,
                    });
                }
            }
        }
        Ok(uploaded)
    }

    pub async fn delete(&self, id: AssetId) -> Result<(), DeleteError> {
        self.store.delete(id).await.map_err(|source| {
            error!(asset_id = %id, error = %source, "Image delete failed");
            DeleteError { id, source }
        })
    }

    /// Delete every id, logging failures instead of returning them.
    /// Returns how many deletes succeeded.
    pub async fn release_all(&self, ids: &[AssetId]) -> usize {
        let mut released = 0;
        for id in ids {
            match self.delete(*id).await {
                Ok(()) => released += 1,
                Err(err) => warn!(error = %err, "Leaving orphaned image asset"),
            }
        }
        released
    }

    /// Display URL for `id` rendered with the listing preview transform.
    pub async fn preview(&self, id: AssetId) -> Result<String, PreviewError> {
        if id.is_nil() {
            return Err(PreviewError::MissingAssetId);
        }

        self.store
            .preview_url(id, &PreviewTransform::LISTING)
            .await
            .map_err(|source| {
                error!(asset_id = %id, error = %source, "Error fetching file preview");
                PreviewError::Store { id, source }
            })
    }

    /// Preview URLs for `ids` in order. Ids that fail to resolve, such as
    /// assets deleted out from under a listing, are skipped.
    pub async fn preview_gallery(&self, ids: &[AssetId]) -> Vec<String> {
        let mut urls = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(url) = self.preview(*id).await {
                urls.push(url);
            }
        }
        urls
    }
}
