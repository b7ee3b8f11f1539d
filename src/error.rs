use std::time::Duration;
use thiserror::Error;

/// Failures talking to the browser backend itself (connecting, restarting)
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to connect to WebDriver: {0}")]
    Connect(String),

    #[error("session creation timed out after {0:?}")]
    Timeout(Duration),
}

/// Session-level failures that end a company's attempt
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser session crashed again after {restarts} restart(s)")]
    Fatal { restarts: u32 },

    #[error("browser session could not be restarted: {0}")]
    Restart(#[from] DriverError),
}

/// Malformed, late, or unusable output from the decision capability
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("malformed decision: {0}")]
    Malformed(String),

    #[error("decision references element {0} which is not on the page")]
    StaleReference(String),

    #[error("decision cannot be applied: {0}")]
    Invalid(String),

    #[error("decision timed out after {0:?}")]
    Timeout(Duration),

    #[error("decision capability failed: {0}")]
    Capability(String),
}

/// Failures of the match-scoring capability
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring timed out after {0:?}")]
    Timeout(Duration),

    #[error("scoring API error: status {status}, {message}")]
    Api { status: u16, message: String },

    #[error("malformed scoring response: {0}")]
    Malformed(String),

    #[error("scoring request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures of the persistence collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("missing setting: {0}")]
    Missing(&'static str),
}

/// Reasons a company's attempt is aborted
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("navigation aborted: {0}")]
    Navigation(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("known listings unavailable: {0}")]
    Store(#[from] StoreError),
}
