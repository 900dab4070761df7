use thiserror::Error;

/// Result type alias for dispatcher operations
pub type Result<T, E = DispatcherError> = std::result::Result<T, E>;

/// Semantic problems found while validating startup configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Empty query parameter key")]
    EmptyParamKey,

    #[error("query parameter {key:?} has range {range}, expected 1..={max}", max = u32::MAX)]
    InvalidParamRange { key: String, range: i64 },

    #[error("query parameter {key:?} has a value that is not a string, number or boolean")]
    InvalidParamValue { key: String },

    #[error("query parameters mix literal values and random ranges")]
    MixedParamModes,

    #[error("invalid schedule {expression:?}: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("request timeout cannot be 0")]
    InvalidTimeout,

    #[error("{0} cannot be used as an HTTP header value")]
    InvalidCredential(&'static str),
}

/// Errors raised while turning raw input into a validated `Config`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("malformed value for {field}: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Failure of a single outbound call, below the HTTP status level.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("request to {0} failed: {1}")]
    RequestFailed(String, String),
}

/// Errors that stop the dispatcher from starting or serving.
#[derive(Error, Debug)]
pub enum DispatcherError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
