//! Compiled document snapshots
//!
//! The document of every successful compile is written to one file,
//! overwriting the previous one. A failed write is logged and otherwise
//! ignored; it never fails the compile.

use std::path::Path;
use tracing::{debug, warn};

/// Write `document` to `path`, creating parent directories as needed.
///
/// Returns whether the write succeeded.
pub async fn write_snapshot(path: &Path, document: &str) -> bool {
    let result = async {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, document).await
    }
    .await;

    match result {
        Ok(()) => {
            debug!(path = %path.display(), bytes = document.len(), "schema snapshot written");
            true
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to write schema snapshot");
            false
        }
    }
}
