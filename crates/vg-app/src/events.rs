use vg_core::error::Error;
use vg_core::progress::ProgressView;
use vg_core::JobStatus;

/// Everything a tracked job reports to whoever holds its handle.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackEvent {
    /// A non-terminal status came back from the service.
    Status {
        job_id: String,
        status: JobStatus,
    },
    /// Once per second while in flight.
    Progress {
        job_id: String,
        view: ProgressView,
    },
    Completed {
        job_id: String,
        result_url: String,
    },
    Failed {
        job_id: String,
        error: Error,
    },
}

impl TrackEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// How a tracked job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { result_url: String },
    Failed(Error),
}

impl JobOutcome {
    pub fn from_event(event: TrackEvent) -> Option<Self> {
        match event {
            TrackEvent::Completed { result_url, .. } => Some(Self::Completed { result_url }),
            TrackEvent::Failed { error, .. } => Some(Self::Failed(error)),
            _ => None,
        }
    }
}
