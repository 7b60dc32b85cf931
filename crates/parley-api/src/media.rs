use anyhow::anyhow;
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use uuid::Uuid;

use parley_types::api::{Claims, UploadResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::store::with_store;

/// 10 MB upload limit for images
const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// POST /media — accepts raw image bytes, saves them under the media
/// directory, records a row, and returns the stable reference URL messages
/// store instead of the payload.
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    bytes: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::Validation("empty upload".into()));
    }
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(ApiError::Validation("image too large".into()));
    }

    let media_id = Uuid::new_v4().to_string();
    let size = bytes.len() as i64;

    tokio::fs::create_dir_all(&state.media_dir)
        .await
        .map_err(|e| ApiError::Storage(anyhow!("failed to create media directory: {}", e)))?;

    let path = state.media_dir.join(&media_id);
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| ApiError::Storage(anyhow!("failed to write {}: {}", path.display(), e)))?;

    let mid = media_id.clone();
    let owner = claims.sub.to_string();
    with_store(&state, move |db| db.insert_media(&mid, &owner, size)).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            image_ref: format!("/media/{}", media_id),
            size: size as u64,
        }),
    ))
}

/// GET /media/{media_id} — stream the stored image back.
pub async fn download_media(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    // The id must be a UUID, which also rules out path traversal
    media_id
        .parse::<Uuid>()
        .map_err(|_| ApiError::Validation("malformed media id".into()))?;

    let mid = media_id.clone();
    if with_store(&state, move |db| db.get_media(&mid)).await?.is_none() {
        return Err(ApiError::NotFound("media"));
    }

    let path = state.media_dir.join(&media_id);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound("media"))?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}
