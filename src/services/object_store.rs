//! src/services/object_store.rs
//!
//! Object store capability for listing images, plus the default backend:
//! SQLite for asset metadata and local disk for payloads sharded beneath
//! `base_path/{shard}/{shard}/{asset_id}`. Preview links point back at this
//! service; the transform parameters travel in the query string.

use crate::models::asset::{AssetId, ImageAsset, ImageFile};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

use super::{StoreError, StoreResult};

/// Rendering parameters for a preview link.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviewTransform {
    pub width: u32,
    /// `0` keeps the aspect ratio.
    pub height: u32,
    pub gravity: &'static str,
    pub quality: u8,
    pub border_width: u32,
    pub border_color: &'static str,
    pub border_radius: u32,
    pub opacity: u8,
    pub rotation: u16,
    pub background: &'static str,
    pub output: &'static str,
}

impl PreviewTransform {
    /// The single transform every listing image is displayed with.
    pub const LISTING: PreviewTransform = PreviewTransform {
        width: 1800,
        height: 0,
        gravity: "center",
        quality: 90,
        border_width: 5,
        border_color: "CDCA30",
        border_radius: 15,
        opacity: 1,
        rotation: 0,
        background: "FFFFFF",
        output: "jpg",
    };

    /// Query string in a fixed parameter order, so equal transforms always
    /// produce byte-identical URLs.
    pub fn query_string(&self) -> String {
        format!(
            "width={}&height={}&gravity={}&quality={}&borderWidth={}&borderColor={}\
             &borderRadius={}&opacity={}&rotation={}&background={}&output={}",
            self.width,
            self.height,
            self.gravity,
            self.quality,
            self.border_width,
            self.border_color,
            self.border_radius,
            self.opacity,
            self.rotation,
            self.background,
            self.output,
        )
    }
}

/// Create/delete/preview over binary assets keyed by opaque ids.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store one file; the store assigns its id.
    async fn put(&self, file: ImageFile) -> StoreResult<ImageAsset>;

    /// Remove an asset. Deleting a missing id is an error.
    async fn delete(&self, id: AssetId) -> StoreResult<()>;

    /// Resolve a display URL for an existing asset.
    async fn preview_url(&self, id: AssetId, transform: &PreviewTransform) -> StoreResult<String>;
}

/// Disk-backed object store with SQLite metadata.
#[derive(Clone)]
pub struct DiskObjectStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where asset payloads are stored.
    pub base_path: PathBuf,

    /// Externally reachable origin used to build preview links.
    pub public_base_url: String,
}

impl DiskObjectStore {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Two-level shard identifiers for an asset.
    ///
    /// Uses MD5(id) and returns the first two bytes as lowercase hexadecimal
    /// strings (00–ff). Reduces file count per directory.
    fn asset_shards(id: AssetId) -> (String, String) {
        let digest = md5::compute(id.as_bytes());
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path: base_path/{shard}/{shard}/{id}.
    /// Parent directories may not exist yet.
    fn asset_path(&self, id: AssetId) -> PathBuf {
        let (shard_a, shard_b) = Self::asset_shards(id);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(id.to_string());
        path
    }

    /// Fetch an asset metadata record.
    pub async fn fetch_asset(&self, id: AssetId) -> StoreResult<ImageAsset> {
        sqlx::query_as::<_, ImageAsset>(
            "SELECT id, filename, content_type, size_bytes, etag, created_at
             FROM assets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| StoreError::not_found("asset", id))
    }

    /// Stream an asset to disk and record its metadata.
    ///
    /// - Writes bytes incrementally to a temporary file.
    /// - Computes MD5/etag and size while streaming.
    /// - Renames into the final location, then inserts the metadata row.
    ///
    /// Temp files are removed on errors, and the payload is removed again if
    /// the metadata insert fails.
    pub async fn upload_stream<S>(
        &self,
        filename: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StoreResult<ImageAsset>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let file_path = self.asset_path(id);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "asset path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        let etag = format!("{:x}", digest.compute());
        let insert_result = sqlx::query_as::<_, ImageAsset>(
            r#"
            INSERT INTO assets (id, filename, content_type, size_bytes, etag, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, filename, content_type, size_bytes, etag, created_at
            "#,
        )
        .bind(id)
        .bind(filename)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(asset) => Ok(asset),
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StoreError::from(err))
            }
        }
    }

    /// Fetch an asset for reading.
    ///
    /// Returns metadata and an opened File handle ready for streaming out.
    /// Returns NotFound if metadata exists but the physical file is missing.
    pub async fn open(&self, id: AssetId) -> StoreResult<(ImageAsset, File)> {
        let asset = self.fetch_asset(id).await?;
        let file = File::open(self.asset_path(id)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::not_found("asset", id)
            } else {
                StoreError::Io(err)
            }
        })?;
        Ok((asset, file))
    }

    /// Recursively remove empty shard directories up to base_path.
    ///
    /// Stops when:
    /// - directory not empty
    /// - directory not found
    /// - reached root
    /// - encountered unexpected I/O errors
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn put(&self, file: ImageFile) -> StoreResult<ImageAsset> {
        let ImageFile {
            filename,
            content_type,
            bytes,
        } = file;
        let body = stream::once(async move { Ok::<_, io::Error>(bytes) });
        self.upload_stream(&filename, content_type, body).await
    }

    /// Remove the metadata row, then the payload.
    async fn delete(&self, id: AssetId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("asset", id));
        }

        let file_path = self.asset_path(id);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }

        Ok(())
    }

    async fn preview_url(&self, id: AssetId, transform: &PreviewTransform) -> StoreResult<String> {
        let asset = self.fetch_asset(id).await?;
        Ok(format!(
            "{}/assets/{}/preview?{}",
            self.public_base_url,
            asset.id,
            transform.query_string()
        ))
    }
}
