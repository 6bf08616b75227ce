//! Utility modules for the sync client.

pub mod errors;
pub mod logger;

pub use errors::{Result, Stage, SyncError};

use std::path::Path;

/// Run filesystem-bound work off the async runtime. `context` names the path
/// reported if the blocking task itself dies.
pub(crate) async fn blocking<T, F>(context: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let context = context.to_path_buf();
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::io(context, std::io::Error::other(e.to_string())))?
}
