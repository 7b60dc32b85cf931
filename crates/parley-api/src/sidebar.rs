use axum::{Extension, Json, extract::State};

use parley_types::api::{Claims, SidebarRow};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::store::with_store;

/// Every other known user annotated with the pair's last-message timestamp
/// and how many of their messages the viewer has not read, most recently
/// active first. Users the viewer has never talked to carry the epoch
/// timestamp and sort last.
pub async fn get_users_for_sidebar(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<SidebarRow>>, ApiError> {
    let viewer = claims.sub.to_string();
    let entries = with_store(&state, move |db| db.sidebar_rows(&viewer)).await?;

    let rows = entries
        .into_iter()
        .map(|entry| entry.into_row())
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(ApiError::Storage)?;

    Ok(Json(rows))
}
