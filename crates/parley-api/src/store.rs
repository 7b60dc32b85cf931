use std::time::Duration;

use anyhow::anyhow;

use parley_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

/// Store I/O gets this long before the request fails. A timeout is a request
/// failure, never a retry.
const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a blocking store query off the async runtime, bounded by
/// [`STORE_TIMEOUT`].
pub(crate) async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let task = tokio::task::spawn_blocking(move || f(&state.db));

    match tokio::time::timeout(STORE_TIMEOUT, task).await {
        Ok(Ok(result)) => result.map_err(ApiError::Storage),
        Ok(Err(join_err)) => Err(ApiError::Storage(anyhow!(
            "storage task failed: {}",
            join_err
        ))),
        Err(_) => Err(ApiError::Storage(anyhow!("storage query timed out"))),
    }
}
