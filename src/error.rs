use thiserror::Error;

impl From<serde_json::Error> for ComplianceError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<config::ConfigError> for ComplianceError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ComplianceError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The entry could not be canonicalised for hashing. Fatal to the append.
    #[error("Entry hashing failed: {0}")]
    HashError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Unknown report type: {0}")]
    UnknownReportType(String),

    #[error("Alert not found: {0}")]
    AlertNotFound(String),

    #[error("Alert already resolved: {0}")]
    AlertAlreadyResolved(String),

    #[error("Export error: {0}")]
    ExportError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ComplianceError {
    pub fn invalid_time_range(
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self::InvalidTimeRange(format!(
            "start {} must be before end {}",
            start.to_rfc3339(),
            end.to_rfc3339()
        ))
    }

    /// True for errors caused by the caller's input rather than ledger state.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTimeRange(_)
                | Self::UnknownReportType(_)
                | Self::AlertNotFound(_)
                | Self::AlertAlreadyResolved(_)
                | Self::ValidationError(_)
        )
    }
}

pub type ComplianceResult<T> = Result<T, ComplianceError>;
