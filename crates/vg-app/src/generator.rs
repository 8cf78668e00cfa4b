use std::sync::Arc;

use tracing::info;
use vg_core::error::{Result, ValidationError};
use vg_core::{Credential, GenerationRequest, GenerationSettings};

use crate::analytics::GenerationStats;
use crate::generator::backend::JobBackend;
use crate::generator::db::JobDatabase;
use crate::generator::db::favorite::FavoriteRecord;
use crate::generator::db::job::JobRecord;
use crate::poller::{JobPoller, PollerConfig, TrackingHandle};

pub mod backend;
pub mod db;

/// Submission, tracking and history in one place.
pub struct Generator {
    backend: Arc<dyn JobBackend>,
    db: JobDatabase,
    poller: JobPoller,
}

impl Generator {
    pub fn new(backend: Arc<dyn JobBackend>, db: JobDatabase, poller_config: PollerConfig) -> Self {
        let poller = JobPoller::new(backend.clone(), db.clone(), poller_config);
        Self { backend, db, poller }
    }

    /// Start a job remotely and record it as in flight.
    ///
    /// Input is validated before anything else happens, so a rejected
    /// request leaves neither a stored record nor a network call behind.
    pub async fn submit_job(&self, request: &GenerationRequest, credential: &str) -> Result<JobRecord> {
        let credential = Credential::new(credential)?;
        request.validate()?;

        let handle = self.backend.start_job(request, &credential).await?;
        let record = JobRecord::new(
            handle.id,
            request.prompt.clone(),
            request.settings,
            handle.status,
        );
        info!(job_id = %record.id, settings = %request.settings.summary(), "Job submitted");

        self.db.insert_job(record.clone()).await;
        Ok(record)
    }

    pub fn track(&self, job_id: impl Into<String>, credential: Credential) -> TrackingHandle {
        self.poller.track(job_id, credential)
    }

    /// Pick tracking back up for every job still pending or processing.
    pub async fn resume(&self, credential: &Credential) -> Vec<TrackingHandle> {
        self.in_flight_jobs()
            .await
            .into_iter()
            .map(|job| self.track(job.id, credential.clone()))
            .collect()
    }

    pub async fn get_jobs(&self) -> Vec<JobRecord> {
        self.db.get_all_jobs().await
    }

    pub async fn get_job(&self, job_id: &str) -> Option<JobRecord> {
        self.db.get_job(job_id).await
    }

    pub async fn in_flight_jobs(&self) -> Vec<JobRecord> {
        self.db.get_active_jobs().await
    }

    pub async fn remove_job(&self, job_id: &str) -> bool {
        self.db.delete_job(job_id).await
    }

    pub async fn clear_history(&self) {
        self.db.clear_history().await
    }

    /// Clear all completed and failed jobs
    pub async fn clear_completed(&self) -> usize {
        self.db.clear_completed().await
    }

    pub async fn favorites(&self) -> Vec<FavoriteRecord> {
        self.db.get_favorites().await
    }

    pub async fn add_favorite(
        &self,
        name: &str,
        prompt: &str,
        settings: GenerationSettings,
    ) -> std::result::Result<FavoriteRecord, ValidationError> {
        self.db.add_favorite(name, prompt, settings).await
    }

    pub async fn remove_favorite(&self, id: &str) -> bool {
        self.db.remove_favorite(id).await
    }

    pub async fn clear_favorites(&self) {
        self.db.clear_favorites().await
    }

    pub async fn api_key(&self) -> Option<String> {
        self.db.get_api_key().await
    }

    pub async fn set_api_key(&self, key: &str) {
        self.db.set_api_key(key).await
    }

    pub async fn stats(&self) -> GenerationStats {
        let history = self.db.get_all_jobs().await;
        let favorites = self.db.get_favorites().await.len();
        GenerationStats::from_history(&history, favorites)
    }
}
