use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("navigation to '{url}' failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("navigation to '{url}' timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("script evaluation failed: {0}")]
    ScriptFailed(String),

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{engine} engine failed: {reason}")]
    Engine { engine: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

impl AuditError {
    pub fn engine(engine: &'static str, reason: impl Into<String>) -> Self {
        AuditError::Engine {
            engine,
            reason: reason.into(),
        }
    }

    /// Status code an HTTP front end should answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            AuditError::InvalidUrl(_) => 400,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_maps_to_client_error() {
        let err = AuditError::InvalidUrl("ftp://example.com".to_string());
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.to_string(), "Invalid URL: ftp://example.com");
    }

    #[test]
    fn test_analysis_failures_map_to_server_error() {
        let err = AuditError::NavigationTimeout {
            url: "https://example.com".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.http_status(), 500);

        let err = AuditError::engine("lighthouse", "exit status 1");
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.to_string(), "lighthouse engine failed: exit status 1");
    }
}
