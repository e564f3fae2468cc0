use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StoreError, StoreResult};

/// What: Load a persisted collection from `path`.
///
/// Inputs:
/// - `path`: JSON file to read.
///
/// Output:
/// - Decoded value, or `T::default()` when the file does not exist yet.
///
/// # Errors
/// - Returns `StoreError` (`Io`) when the file exists but cannot be read.
/// - Returns `StoreError` (`Serialization`) when the content is not valid JSON for `T`.
///
/// Details:
/// - A missing file is the normal cold-start state, not a failure.
pub async fn load_json<T>(path: &Path) -> StoreResult<T>
where
    T: DeserializeOwned + Default,
{
    match tokio::fs::read_to_string(path).await {
        Ok(body) => {
            let value = serde_json::from_str::<T>(&body).map_err(|e| {
                StoreError::serialization(format!("{}: {e}", path.display()))
            })?;
            tracing::debug!(path = %path.display(), bytes = body.len(), "loaded collection");
            Ok(value)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no persisted collection yet");
            Ok(T::default())
        }
        Err(e) => Err(StoreError::io(format!("{}: {e}", path.display()))),
    }
}

/// What: Persist `value` to `path` as JSON.
///
/// Inputs:
/// - `path`: Destination file.
/// - `value`: Collection to serialize.
///
/// Output:
/// - `Ok(())` once the new content has replaced the old file.
///
/// # Errors
/// - Returns `StoreError` when the parent directory cannot be created, serialization
///   fails, or the temp-file write/rename fails.
///
/// Details:
/// - Writes to a sibling `.tmp` file then renames it over `path`, so readers of the file
///   see either the previous or the new content.
pub async fn save_json<T>(path: &Path, value: &T) -> StoreResult<()>
where
    T: Serialize + Sync,
{
    let body = serde_json::to_string(value)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to create parent directory for collection file"
            );
            StoreError::io(format!("{}: {e}", parent.display()))
        })?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    tokio::fs::write(&tmp, &body)
        .await
        .map_err(|e| StoreError::io(format!("{}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(format!("{}: {e}", path.display())))?;
    tracing::trace!(path = %path.display(), bytes = body.len(), "collection persisted");
    Ok(())
}
