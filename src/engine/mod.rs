//! Async pipelines that drive the repository from blocking workers.

use std::sync::Arc;

use crate::persist::{JumpRepository, RepoResult, StorageError};

/// Per-entry background hydration.
pub mod hydration;
/// Conflict-aware save pipeline.
pub mod resolver;

/// Runs a repository call on the blocking pool.
pub(crate) async fn blocking<T, F>(repo: &Arc<dyn JumpRepository>, f: F) -> RepoResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn JumpRepository) -> RepoResult<T> + Send + 'static,
{
    let repo = Arc::clone(repo);
    tokio::task::spawn_blocking(move || f(repo.as_ref()))
        .await
        .map_err(|e| StorageError::Worker(format!("join error: {e}")))?
}
