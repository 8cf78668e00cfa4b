use serde::{Deserialize, Serialize};
use vg_core::{GenerationRequest, JobStatus, Orientation, Quality, VideoModel};

/// Body of `POST {endpoint}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateVideoRequest {
    pub model: VideoModel,
    pub prompt: String,
    pub orientation: Orientation,
    pub duration: u32,
    pub quality: Quality,
}

impl From<&GenerationRequest> for CreateVideoRequest {
    fn from(req: &GenerationRequest) -> Self {
        Self {
            model: req.settings.model,
            prompt: req.prompt.clone(),
            orientation: req.settings.orientation,
            duration: req.settings.duration.seconds(),
            quality: req.settings.quality,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoGenerationResponse {
    pub id: String,
    #[serde(default)]
    pub created: Option<i64>,
    pub status: JobStatus,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoData {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Body of `GET {endpoint}/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoStatusResponse {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub data: Option<Vec<VideoData>>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

/// Shape of a non-2xx body, when the service sends one.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

/// What a successful submission hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub id: String,
    pub status: JobStatus,
}

impl From<VideoGenerationResponse> for JobHandle {
    fn from(resp: VideoGenerationResponse) -> Self {
        Self {
            id: resp.id,
            status: resp.status,
        }
    }
}

/// The part of a status response the poller acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusReport {
    pub id: String,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error: Option<ErrorInfo>,
}

impl JobStatusReport {
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

impl From<VideoStatusResponse> for JobStatusReport {
    fn from(resp: VideoStatusResponse) -> Self {
        let result_url = resp
            .data
            .and_then(|data| data.into_iter().next())
            .map(|d| d.url)
            .filter(|url| !url.is_empty());

        Self {
            id: resp.id,
            status: resp.status,
            result_url,
            error: resp.error,
        }
    }
}
