//! Moving extracted files into the archive.

use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

use crate::error::{ArchiveError, Result};

/// Move `from` to `to`, replacing any existing file.
///
/// Tries a rename first. When that fails (typically because the working
/// area and the archive are on different filesystems) the file is copied,
/// the copy's length is checked against the source, and only then is the
/// source removed.
pub async fn move_file(from: &Path, to: &Path) -> Result<()> {
    debug!(from = %from.display(), to = %to.display(), "Archiving");

    let rename_err = match fs::rename(from, to).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    let expected = fs::metadata(from)
        .await
        .map_err(|e| ArchiveError::Archive {
            path: from.to_path_buf(),
            reason: format!("rename failed ({}) and source is unreadable: {}", rename_err, e),
        })?
        .len();
    warn!(
        from = %from.display(),
        error = %rename_err,
        "Rename failed, falling back to copy"
    );

    let copied = fs::copy(from, to).await.map_err(|e| ArchiveError::Archive {
        path: to.to_path_buf(),
        reason: format!("copy failed: {}", e),
    })?;

    if copied != expected {
        fs::remove_file(to).await.ok();
        return Err(ArchiveError::Archive {
            path: to.to_path_buf(),
            reason: format!("copied {} of {} bytes", copied, expected),
        });
    }

    fs::remove_file(from).await?;
    Ok(())
}
