//! Checkpoint codec for the frontier's pending sets.
//!
//! The checkpoint is a single JSON document with four fields, `tracks`,
//! `artists`, `labels` and `tracklists`, each a list of ids. It is written
//! atomically (temp file, then rename) so an interrupted save never replaces
//! a good checkpoint with a partial one.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::frontier::FrontierState;

/// Write the pending sets to `path`.
pub async fn save(state: &FrontierState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let bytes = serde_json::to_vec_pretty(state)?;

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read the pending sets from `path`, or `None` if there is no checkpoint yet.
pub async fn load(path: &Path) -> Result<Option<FrontierState>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}
