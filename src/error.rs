//! Error handling for the Roborock exporter crate.

/// A specialized `Result` type for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// The main error type for exporter operations.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The device sent something that does not follow the miIO protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The device answered the request with an error object
    #[error("Device error {code}: {message}")]
    Device { code: i64, message: String },

    /// The device did not answer in time
    #[error("Device did not respond within {0:?}")]
    Timeout(std::time::Duration),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Metric registration or rendering failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),
}

impl ExporterError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }
}
