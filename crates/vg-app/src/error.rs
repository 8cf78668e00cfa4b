use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Usage(String),
    #[error("No API key set. Run `vg-app key <value>` or set SORA_API_KEY")]
    NoCredential,
    #[error("No job with id {0}")]
    UnknownJob(String),
}
