pub mod backend;
pub mod credential;
pub mod favorite;
pub mod job;
mod slot;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::generator::db::backend::{FileBackend, KvBackend};
use crate::generator::db::favorite::FavoriteRecord;
use crate::generator::db::job::{JobPatch, JobRecord};
use crate::generator::db::slot::ListSlot;

pub const JOBS_KEY: &str = "sora_generations";
pub const FAVORITES_KEY: &str = "sora_favorites";
pub const CREDENTIAL_KEY: &str = "sora_api_key";

pub const MAX_HISTORY: usize = 50;
pub const MAX_FAVORITES: usize = 20;

/// Local job history, favorites and credential, all in one key-value medium.
///
/// Never raises: an unavailable medium degrades to empty reads and no-op
/// writes. Cloning shares the underlying medium and write locks.
#[derive(Clone)]
pub struct JobDatabase {
    backend: Arc<dyn KvBackend>,
    jobs: ListSlot<JobRecord>,
    favorites: ListSlot<FavoriteRecord>,
}

impl JobDatabase {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            jobs: ListSlot::new(backend.clone(), JOBS_KEY, MAX_HISTORY),
            favorites: ListSlot::new(backend.clone(), FAVORITES_KEY, MAX_FAVORITES),
            backend,
        }
    }

    /// File-backed database under `db_path`
    pub fn open(db_path: PathBuf) -> Self {
        info!("Setting up job database at {}", db_path.display());
        Self::new(Arc::new(FileBackend::new(db_path)))
    }

    /// Insert a new job at the head of the history, evicting the oldest
    /// records beyond [`MAX_HISTORY`].
    pub async fn insert_job(&self, record: JobRecord) {
        debug!(job_id = %record.id, "Inserting job record");
        self.jobs
            .modify(|jobs| {
                jobs.insert(0, record);
                true
            })
            .await;
    }

    /// Merge `patch` into the record with `job_id`. Returns false, without
    /// error, when no such record exists (it may have been evicted) or when
    /// `live` reports false before the write lands.
    pub async fn update_job(
        &self,
        job_id: &str,
        patch: &JobPatch,
        live: &(dyn Fn() -> bool + Sync),
    ) -> bool {
        let updated = self
            .jobs
            .modify_while(live, |jobs| match jobs.iter_mut().find(|j| j.id == job_id) {
                Some(job) => {
                    job.apply(patch);
                    true
                }
                None => false,
            })
            .await;

        if !updated {
            debug!(job_id, "No stored record updated");
        }
        updated
    }

    /// Get job by ID
    pub async fn get_job(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.load().await.into_iter().find(|j| j.id == job_id)
    }

    /// All jobs, most recent first
    pub async fn get_all_jobs(&self) -> Vec<JobRecord> {
        self.jobs.load().await
    }

    /// Jobs still pending or processing
    pub async fn get_active_jobs(&self) -> Vec<JobRecord> {
        self.get_all_jobs()
            .await
            .into_iter()
            .filter(|j| j.status.is_active())
            .collect()
    }

    pub async fn delete_job(&self, job_id: &str) -> bool {
        self.jobs
            .modify(|jobs| {
                let before = jobs.len();
                jobs.retain(|j| j.id != job_id);
                jobs.len() != before
            })
            .await
    }

    pub async fn clear_history(&self) {
        self.jobs.clear().await;
    }

    /// Remove completed and failed jobs; returns how many were removed
    pub async fn clear_completed(&self) -> usize {
        let mut removed = 0;
        self.jobs
            .modify(|jobs| {
                let before = jobs.len();
                jobs.retain(|j| !j.status.is_terminal());
                removed = before - jobs.len();
                removed > 0
            })
            .await;
        removed
    }

}
