pub mod error;
pub mod progress;
mod model_types;
mod request;
mod status;

pub use model_types::{GenerationSettings, Orientation, Quality, VideoDuration, VideoModel};
pub use request::{validate_prompt, Credential, GenerationRequest};
pub use status::JobStatus;
