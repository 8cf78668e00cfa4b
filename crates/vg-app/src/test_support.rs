//! Scripted stand-in for the generation service.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use vg_core::error::{Error, Result};
use vg_core::{Credential, GenerationRequest, JobStatus};

use crate::generator::backend::JobBackend;
use crate::generator::backend::schemas::{ErrorInfo, JobHandle, JobStatusReport};

#[derive(Clone)]
pub enum Scripted {
    Reply(Duration, Result<JobStatusReport>),
    /// Never answers.
    Hang,
}

impl Scripted {
    pub fn reply(status: JobStatus, url: Option<&str>, error: Option<&str>) -> Self {
        Self::Reply(
            Duration::ZERO,
            Ok(JobStatusReport {
                id: "vid_1".into(),
                status,
                result_url: url.map(str::to_string),
                error: error.map(|message| ErrorInfo {
                    message: message.to_string(),
                    code: None,
                }),
            }),
        )
    }

    pub fn error(message: &str) -> Self {
        Self::Reply(Duration::ZERO, Err(Error::remote(message)))
    }

    pub fn delayed(delay: Duration, step: Scripted) -> Self {
        match step {
            Self::Reply(_, result) => Self::Reply(delay, result),
            Self::Hang => Self::Hang,
        }
    }
}

pub fn processing() -> Scripted {
    Scripted::reply(JobStatus::Processing, None, None)
}

pub fn completed(url: &str) -> Scripted {
    Scripted::reply(JobStatus::Completed, Some(url), None)
}

pub fn failed(message: Option<&str>) -> Scripted {
    Scripted::reply(JobStatus::Failed, None, message)
}

/// Answers status checks from a script, then repeats `fallback` forever.
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    start: Mutex<Option<Result<JobHandle>>>,
    calls: AtomicUsize,
    starts: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Scripted>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: processing(),
            start: Mutex::new(None),
            calls: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
        }
    }

    pub fn repeating(step: Scripted) -> Self {
        Self {
            fallback: step,
            ..Self::new(Vec::new())
        }
    }

    /// Make the next `start_job` fail with `error`.
    pub fn failing_start(self, error: Error) -> Self {
        *self.start.lock().unwrap() = Some(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    async fn start_job(
        &self,
        request: &GenerationRequest,
        _credential: &Credential,
    ) -> Result<JobHandle> {
        request.validate()?;
        self.starts.fetch_add(1, Ordering::SeqCst);

        match self.start.lock().unwrap().take() {
            Some(result) => result,
            None => Ok(JobHandle {
                id: "vid_1".into(),
                status: JobStatus::Pending,
            }),
        }
    }

    async fn get_job_status(
        &self,
        _job_id: &str,
        _credential: &Credential,
    ) -> Result<JobStatusReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.steps.lock().unwrap();
            steps.pop_front().unwrap_or_else(|| self.fallback.clone())
        };

        match step {
            Scripted::Reply(delay, result) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            Scripted::Hang => std::future::pending().await,
        }
    }
}
