use thiserror::Error;

/// How much of an upstream error body is kept for diagnostics.
pub const ERROR_BODY_LIMIT: usize = 200;

/// Failure of a single call to an external API (search, social, scoring, preview pages).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("missing configuration: {0}")]
    ConfigurationMissing(String),
}

impl UpstreamError {
    /// Non-success HTTP status; the body is cut to its first 200 characters.
    pub fn status(status: u16, body: &str) -> Self {
        UpstreamError::Status {
            status,
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        }
    }

    pub fn missing_credential(env_var: &str) -> Self {
        UpstreamError::ConfigurationMissing(format!("{} is not set", env_var))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::MalformedResponse(err.to_string())
        } else {
            UpstreamError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::MalformedResponse(err.to_string())
    }
}
