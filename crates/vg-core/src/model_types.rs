use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Video models offered by the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VideoModel {
    #[default]
    #[serde(rename = "sora-2")]
    Sora2,
    #[serde(rename = "sora-2-pro")]
    Sora2Pro,
}

impl VideoModel {
    /// Model name for display
    pub fn name(&self) -> &str {
        match self {
            Self::Sora2 => "Sora 2",
            Self::Sora2Pro => "Sora 2 Pro",
        }
    }

    /// Model ID for API communication
    pub fn id(&self) -> &str {
        match self {
            Self::Sora2 => "sora-2",
            Self::Sora2Pro => "sora-2-pro",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        match self {
            Self::Sora2 => "Fast text-to-video, good for drafts",
            Self::Sora2Pro => "Higher fidelity text-to-video, slower",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().into_iter().find(|m| m.id() == id)
    }

    /// All available models
    pub fn all() -> [VideoModel; 2] {
        [Self::Sora2, Self::Sora2Pro]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Standard,
    High,
}

impl Quality {
    pub fn id(&self) -> &str {
        match self {
            Self::Standard => "standard",
            Self::High => "high",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "standard" => Some(Self::Standard),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn id(&self) -> &str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Square => "square",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "landscape" => Some(Self::Landscape),
            "portrait" => Some(Self::Portrait),
            "square" => Some(Self::Square),
            _ => None,
        }
    }
}

/// Clip length. Persisted and sent over the wire as a plain number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum VideoDuration {
    #[default]
    Short,
    Medium,
    Long,
}

impl VideoDuration {
    pub fn seconds(&self) -> u32 {
        match self {
            Self::Short => 5,
            Self::Medium => 10,
            Self::Long => 20,
        }
    }
}

impl TryFrom<u32> for VideoDuration {
    type Error = ValidationError;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        match secs {
            5 => Ok(Self::Short),
            10 => Ok(Self::Medium),
            20 => Ok(Self::Long),
            other => Err(ValidationError::UnsupportedDuration(other)),
        }
    }
}

impl From<VideoDuration> for u32 {
    fn from(d: VideoDuration) -> Self {
        d.seconds()
    }
}

/// Generation parameters chosen at submission time.
///
/// Every field defaults so that records written before a field existed
/// still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    #[serde(default)]
    pub duration: VideoDuration,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub model: VideoModel,
}

impl GenerationSettings {
    /// Short one-line summary, e.g. `5s • landscape • standard`
    pub fn summary(&self) -> String {
        format!(
            "{}s • {} • {}",
            self.duration.seconds(),
            self.orientation.id(),
            self.quality.id()
        )
    }
}
