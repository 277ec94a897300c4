use thiserror::Error;

/// Error code the provider uses for an expired access token.
pub const EXPIRED_TOKEN_CODE: &str = "21327";

/// Error code the provider uses for a missing OAuth parameter.
pub const PARAMETER_ABSENT_CODE: &str = "21305";

/// Main error type for SNS API operations
#[derive(Debug, Error)]
pub enum SnsError {
    /// Failure reported by the provider in its JSON error envelope
    #[error("API error {code}: {message}, request: {request}")]
    Api {
        code: String,
        message: String,
        request: String,
    },

    /// Network failure, timeout, or an HTTP error without a decodable envelope
    #[error("transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The held access token is stale; raised before any network call
    #[error("expired_token, request: {request}")]
    ExpiredToken { request: String },

    /// A required parameter is missing; raised before any network call
    #[error("configuration error {code}: {message}, request: {request}")]
    Configuration {
        code: String,
        message: String,
        request: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl SnsError {
    /// Create a new API error from the envelope fields
    pub fn api(code: impl Into<String>, message: impl Into<String>, request: impl Into<String>) -> Self {
        SnsError::Api {
            code: code.into(),
            message: message.into(),
            request: request.into(),
        }
    }

    /// Create a new transport error
    pub fn transport(
        status: Option<u16>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        SnsError::Transport {
            status,
            message: message.into(),
            source,
        }
    }

    /// Configuration error for a call that names no usable parameter
    pub fn configuration(message: impl Into<String>, request: impl Into<String>) -> Self {
        SnsError::Configuration {
            code: PARAMETER_ABSENT_CODE.to_string(),
            message: message.into(),
            request: request.into(),
        }
    }

    /// The redirect URI is neither configured nor supplied
    pub fn missing_redirect_uri() -> Self {
        Self::configuration("Parameter absent: redirect_uri", "OAuth2 request")
    }

    /// Provider-style error code, when this error carries one
    pub fn code(&self) -> Option<&str> {
        match self {
            SnsError::Api { code, .. } | SnsError::Configuration { code, .. } => Some(code),
            SnsError::ExpiredToken { .. } => Some(EXPIRED_TOKEN_CODE),
            _ => None,
        }
    }

    /// Get the HTTP status code if the failure happened at the HTTP layer
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SnsError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if the token was stale, either locally or according to the provider
    pub fn is_expired_token(&self) -> bool {
        match self {
            SnsError::ExpiredToken { .. } => true,
            SnsError::Api { code, .. } => code == EXPIRED_TOKEN_CODE,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SnsError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else {
            e.to_string()
        };
        SnsError::Transport {
            status,
            message,
            source: Some(Box::new(e)),
        }
    }
}

/// Result type for SNS API operations
pub type Result<T> = std::result::Result<T, SnsError>;
