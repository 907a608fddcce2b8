use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::warn;

use crate::{
    core::view::{Hydration, HydrationJob},
    persist::{JumpRepository, RepoResult, StorageError},
    types::ObjectId,
};

use super::blocking;

/// Outcome of one hydration job.
#[derive(Debug)]
pub struct HydrationResult {
    /// Job this result answers.
    pub job: HydrationJob,
    /// Resolved data; empty on failure.
    pub hydration: Hydration,
    /// Storage failure that degraded this entry to empty.
    pub error: Option<StorageError>,
}

/// Resolves exit object and thumbnail for one entry.
///
/// A missing or non-positive object id, or an object that no longer exists,
/// yields an empty hydration.
pub fn hydrate_entry(repo: &dyn JumpRepository, object_id: Option<ObjectId>) -> RepoResult<Hydration> {
    let Some(object_id) = object_id.filter(|id| *id > 0) else {
        return Ok(Hydration::empty());
    };
    let Some(object) = repo.get_object(object_id)? else {
        return Ok(Hydration::empty());
    };
    let thumbnail = repo.get_object_thumbnail(object_id)?;
    Ok(Hydration::from_object(object, thumbnail))
}

/// Spawns one task per job; results arrive on `tx` in completion order.
///
/// Each job is isolated: a storage failure becomes an empty hydration with
/// the error attached. `limit` bounds how many jobs hit the store at once.
pub fn spawn_hydration_batch(
    repo: &Arc<dyn JumpRepository>,
    jobs: Vec<HydrationJob>,
    limit: Option<Arc<Semaphore>>,
    tx: &mpsc::UnboundedSender<HydrationResult>,
) {
    for job in jobs {
        let repo = Arc::clone(repo);
        let limit = limit.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = match limit {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };

            let object_id = job.object_id;
            let result = match blocking(&repo, move |r| hydrate_entry(r, object_id)).await {
                Ok(hydration) => HydrationResult {
                    job,
                    hydration,
                    error: None,
                },
                Err(err) => {
                    warn!(id = job.id, object_id = ?job.object_id, %err, "hydration failed; showing entry without exit data");
                    HydrationResult {
                        job,
                        hydration: Hydration::empty(),
                        error: Some(err),
                    }
                }
            };
            let _ = tx.send(result);
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::{jump::ExitObject, persist::memory::MemoryRepository};

    use super::*;

    #[test]
    fn resolves_object_and_thumbnail() {
        let repo = MemoryRepository::new();
        repo.put_object(ExitObject {
            id: 3,
            name: "Brento".to_string(),
            region: Some("Trentino".to_string()),
            latitude: Some(45.98),
            longitude: Some(10.90),
            height: Some(1000.0),
        })
        .expect("object");
        repo.put_thumbnail(3, vec![1, 2, 3]).expect("thumb");

        let h = hydrate_entry(&repo, Some(3)).expect("hydrate");
        assert_eq!(h.exit_name.as_deref(), Some("Brento"));
        assert_eq!(h.location_name.as_deref(), Some("Trentino"));
        assert_eq!(h.thumbnail.as_deref(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn missing_or_invalid_object_is_empty() {
        let repo = MemoryRepository::new();
        assert!(hydrate_entry(&repo, None).expect("none").is_empty());
        assert!(hydrate_entry(&repo, Some(0)).expect("zero").is_empty());
        assert!(hydrate_entry(&repo, Some(99)).expect("missing").is_empty());
    }
}
