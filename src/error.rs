use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeotagError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("Unsupported file type: {0} (expected .jpeg, .jpg or .png)")]
    UnsupportedFile(String),

    #[error("No plants to export")]
    EmptyExport,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GeotagError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GeotagError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GeotagError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GeotagError>;
