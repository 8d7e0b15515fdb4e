//! Represents an uploaded image asset and the files submitted for upload.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Opaque reference to a stored image. Listings hold these, never the bytes.
pub type AssetId = Uuid;

/// Metadata the object store keeps for a stored image.
///
/// The payload itself lives on disk; this row only describes it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    /// Store-assigned identifier, referenced from `Listing.images`.
    pub id: AssetId,

    /// Original filename of the uploaded file.
    pub filename: String,

    /// Content type (MIME type) as submitted.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 checksum of the payload.
    pub etag: String,

    /// When the asset was stored.
    pub created_at: DateTime<Utc>,
}

/// Image encodings accepted for listing photos.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    fn from_content_type(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    fn from_filename(filename: &str) -> Option<Self> {
        let (_, extension) = filename.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }
}

/// A file picked by the user, held in memory until it is uploaded.
#[derive(Clone, Debug)]
pub struct ImageFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Detect the image encoding, or `None` when this is not a usable image.
    ///
    /// A declared content type wins; generic types such as
    /// `application/octet-stream` fall back to the file extension.
    pub fn format(&self) -> Option<ImageFormat> {
        if self.filename.trim().is_empty() || self.bytes.is_empty() {
            return None;
        }
        match self.content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => ImageFormat::from_content_type(ct),
            _ => ImageFormat::from_filename(&self.filename),
        }
    }
}
