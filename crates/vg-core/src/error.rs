use thiserror::Error;

/// Longest prompt the generation service accepts, in characters.
pub const MAX_PROMPT_CHARS: usize = 500;

/// Bad caller input. Always raised before any network call or store write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a video prompt")]
    EmptyPrompt,
    #[error("Prompt must be {max} characters or less (got {len})")]
    PromptTooLong { len: usize, max: usize },
    #[error("Missing API key")]
    MissingCredential,
    #[error("API key must not contain whitespace")]
    MalformedCredential,
    #[error("Missing job id")]
    MissingJobId,
    #[error("Unsupported duration {0}s (expected 5, 10 or 20)")]
    UnsupportedDuration(u32),
    #[error("Favorite name must not be empty")]
    EmptyFavoriteName,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Non-2xx, transport failure or malformed body from the remote service.
    #[error("{message}")]
    Remote { message: String },

    /// Poll cap exceeded without a terminal status.
    #[error("Video generation timed out after {polls} status checks")]
    Timeout { polls: u32 },

    /// Persistence medium unavailable. The record store swallows these.
    #[error("Storage unavailable: {0}")]
    Storage(String),
}

impl Error {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote { message: message.into() }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
