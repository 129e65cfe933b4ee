use thiserror::Error;

/// Main error type for the loader application
#[derive(Error, Debug)]
pub enum LoaderError {
    /// gcloud CLI errors
    #[error("gcloud error: {0}")]
    Gcloud(#[from] GcloudError),

    /// BigQuery (bq CLI) errors
    #[error("BigQuery error: {0}")]
    BigQuery(#[from] BigQueryError),

    /// Dataflow pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON payload errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML config errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid input/arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors raised while invoking external cloud tooling
#[derive(Error, Debug)]
pub enum GcloudError {
    /// Binary missing from PATH or not executable
    #[error("Command not available: {0}")]
    NotInstalled(String),

    /// Command exceeded the configured timeout
    #[error("Timed out after {secs}s: {command}")]
    Timeout { command: String, secs: u64 },

    /// Command exited with a non-zero status
    #[error("Command failed: {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Output could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// BigQuery-specific errors
#[derive(Error, Debug)]
pub enum BigQueryError {
    /// bq CLI is missing
    #[error("bq CLI not available, install the Google Cloud SDK")]
    Unavailable,

    /// Dataset creation failed for a reason other than "already exists"
    #[error("Dataset creation failed: {0}")]
    DatasetFailed(String),

    /// Load job failed
    #[error("Load failed: {0}")]
    LoadFailed(String),

    /// Table metadata could not be read
    #[error("Table stats unavailable: {0}")]
    StatsUnavailable(String),
}

/// Dataflow pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A gs:// location is malformed
    #[error("Invalid Cloud Storage location '{0}'")]
    InvalidLocation(String),

    /// A template parameter cannot be passed to gcloud
    #[error("Invalid template parameter: {0}")]
    InvalidParameter(String),

    /// Job submission failed
    #[error("Submission failed: {0}")]
    SubmitFailed(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required configuration
    #[error("Missing required: {0}")]
    MissingRequired(String),

    /// Invalid configuration value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Configuration file error
    #[error("File error: {0}")]
    FileError(String),
}

/// Helper type alias for Results
pub type Result<T> = std::result::Result<T, LoaderError>;
