use thiserror::Error;

/// Main error type for everything that can go wrong while loading or
/// validating a STAC document.
///
/// Errors are `Clone` so they can be shared by every waiter of a memoized
/// fetch, and each variant maps onto the `error_type` reported in a
/// [`ValidationRecord`](crate::report::ValidationRecord).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{}", format_violation(.message, .path))]
    SchemaValidation { path: Vec<String>, message: String },

    #[error("Network error: {url} - {details}")]
    Network {
        url: String,
        details: String,
        transient: bool,
    },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Parse error: {location} - {details}")]
    Parse { location: String, details: String },

    #[error("Not found: {location}")]
    NotFound { location: String },

    #[error("Missing required field '{field}' in {location}")]
    MissingField { field: String, location: String },

    #[error("Cannot classify document: {details}")]
    Classification { details: String },

    #[error("Invalid schema: {url} - {details}")]
    InvalidSchema { url: String, details: String },

    #[error("IO error: {location} - {details}")]
    Io { location: String, details: String },

    #[error("Link cycle: {location} links back to one of its own ancestors")]
    LinkCycle { location: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },

    #[error("{0}")]
    Generic(String),
}

fn format_violation(message: &str, path: &[String]) -> String {
    if path.is_empty() {
        format!("{} of the root of the STAC object", message)
    } else {
        format!("{}. Error is in {}", message, path.join(" -> "))
    }
}

impl ValidationError {
    /// Name reported in the `error_type` field of a failed record
    pub fn error_type(&self) -> &'static str {
        match self {
            ValidationError::SchemaValidation { .. } => "JSONSchemaValidationError",
            ValidationError::Network { .. }
            | ValidationError::Timeout { .. }
            | ValidationError::HttpStatus { .. } => "NetworkError",
            ValidationError::Parse { .. } => "ParseError",
            ValidationError::NotFound { .. } => "NotFoundError",
            ValidationError::MissingField { .. } => "MissingFieldError",
            ValidationError::Classification { .. } => "ClassificationError",
            ValidationError::InvalidSchema { .. } => "SchemaError",
            ValidationError::Io { .. } => "IOError",
            ValidationError::Config(_) => "ConfigError",
            ValidationError::LinkCycle { .. }
            | ValidationError::Concurrency { .. }
            | ValidationError::Generic(_) => "Exception",
        }
    }

    /// Whether a retry has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            ValidationError::Network { transient, .. } => *transient,
            ValidationError::Timeout { .. } => true,
            ValidationError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the document itself failed a schema
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, ValidationError::SchemaValidation { .. })
    }

    /// Classify a reqwest failure into the taxonomy
    pub fn from_reqwest(url: &str, error: &reqwest::Error, timeout_seconds: u64) -> Self {
        if error.is_timeout() {
            return ValidationError::Timeout {
                url: url.to_string(),
                timeout_seconds,
            };
        }

        if let Some(status) = error.status() {
            return ValidationError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        if error.is_decode() {
            return ValidationError::Parse {
                location: url.to_string(),
                details: error.to_string(),
            };
        }

        // Connection refused/reset and DNS failures all surface as connect or request errors
        ValidationError::Network {
            url: url.to_string(),
            details: error.to_string(),
            transient: error.is_connect() || error.is_request() || error.is_body(),
        }
    }

    /// Classify a filesystem failure
    pub fn from_io(location: &str, error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => ValidationError::NotFound {
                location: location.to_string(),
            },
            _ => ValidationError::Io {
                location: location.to_string(),
                details: error.to_string(),
            },
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;
