//! Streams stored image payloads back to clients.

use crate::{errors::AppError, models::asset::ImageAsset, state::AppState};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use std::collections::HashMap;
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

/// `GET /assets/{id}` - the stored bytes.
pub async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    stream_asset(&state, id).await
}

/// `GET /assets/{id}/preview` - target of preview links. The transform
/// parameters are accepted but the stored image is served unchanged.
pub async fn get_asset_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(transform): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    debug!(asset_id = %id, ?transform, "Serving preview");
    stream_asset(&state, id).await
}

async fn stream_asset(state: &AppState, id: Uuid) -> Result<Response, AppError> {
    let (asset, file) = state.objects.open(id).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_asset_headers(response.headers_mut(), &asset);
    Ok(response)
}

fn set_asset_headers(headers: &mut HeaderMap, asset: &ImageAsset) {
    let content_type = asset
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&asset.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", asset.etag)) {
        headers.insert(header::ETAG, value);
    }
}
