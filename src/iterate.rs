//! Walks a directory of records and collects the ids of every non-alternate record in it.

use crate::error::{GeoError, Result};
use crate::uri;
use async_recursion::async_recursion;
use futures::stream::StreamExt;
use path_clean::PathClean;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;
use tokio_stream::wrappers::ReadDirStream;
use tracing::debug;

macro_rules! io_err {
    ($path:expr, $err:expr) => {
        GeoError::Io {
            path: $path.display().to_string(),
            source: $err,
        }
    };
}

#[async_recursion]
async fn collect_record_ids(current_path: &Path, ids: &mut BTreeSet<i64>) -> Result<()> {
    let mut entries = ReadDirStream::new(
        fs::read_dir(current_path)
            .await
            .map_err(|e| io_err!(current_path, e))?,
    );

    while let Some(entry_result) = entries.next().await {
        let entry = entry_result.map_err(|e| io_err!(current_path, e))?;
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| io_err!(&path, e))?;

        if metadata.is_dir() {
            collect_record_ids(&path, ids).await?;
            continue;
        }

        if !metadata.is_file() {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            debug!("Skip non UTF-8 path {}", path.display());
            continue;
        };

        if uri::is_alternate_path(file_name) {
            continue;
        }

        if let Some(id) = uri::id_from_path(file_name) {
            ids.insert(id);
        }
    }

    Ok(())
}

/// Sorted, deduplicated ids of the records under `root`.
pub async fn record_ids(root: &Path) -> Result<Vec<i64>> {
    let root = root.to_path_buf().clean();
    let mut ids = BTreeSet::new();

    collect_record_ids(&root, &mut ids).await?;
    debug!("Found {} records in {}", ids.len(), root.display());

    Ok(ids.into_iter().collect())
}
