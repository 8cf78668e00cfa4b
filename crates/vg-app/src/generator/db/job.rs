use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use vg_core::{GenerationSettings, JobStatus};

/// One submitted generation job, as persisted in the history slot.
///
/// Field names on the wire match the history layout already found in
/// existing stores (`videoUrl`, `error`, epoch-millisecond timestamps).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub prompt: String,
    pub status: JobStatus,
    #[serde(rename = "videoUrl", default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub settings: GenerationSettings,
}

impl JobRecord {
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        settings: GenerationSettings,
        status: JobStatus,
    ) -> Self {
        let status = if status.is_active() {
            status
        } else {
            JobStatus::Pending
        };

        Self {
            id: id.into(),
            prompt: prompt.into(),
            status,
            result_url: None,
            error_message: None,
            // stored with millisecond precision
            created_at: Utc::now().trunc_subsecs(3),
            completed_at: None,
            settings,
        }
    }

    /// Merge `patch` into this record, then re-assert that `completed_at`
    /// and `result_url` only exist on completed records and
    /// `error_message` only on failed ones.
    pub fn apply(&mut self, patch: &JobPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(url) = &patch.result_url {
            self.result_url = Some(url.clone());
        }
        if let Some(message) = &patch.error_message {
            self.error_message = Some(message.clone());
        }
        if self.completed_at.is_none() {
            self.completed_at = patch.completed_at;
        }

        if self.status == JobStatus::Completed {
            self.completed_at.get_or_insert_with(Utc::now);
        } else {
            self.result_url = None;
            self.completed_at = None;
        }
        if self.status != JobStatus::Failed {
            self.error_message = None;
        }
    }

    /// Seconds between submission and completion, for completed jobs.
    pub fn generation_secs(&self) -> Option<f64> {
        self.completed_at
            .map(|done| (done - self.created_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// Partial update written by the poller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn completed(result_url: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            result_url: Some(result_url.into()),
            completed_at: Some(at),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}
