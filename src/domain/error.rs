//! Domain error types.

/// Top-level error type for stonks.
#[derive(Debug, thiserror::Error)]
pub enum StonksError {
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Transient provider failure. The data fetcher retries these and turns
    /// the last one into `DataUnavailable`.
    #[error("provider unreachable for {symbol}: {reason}")]
    ProviderUnreachable { symbol: String, reason: String },

    #[error("invalid range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },

    #[error("invalid strategy parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("malformed price data: {reason}")]
    MalformedData { reason: String },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StonksError> for std::process::ExitCode {
    fn from(err: &StonksError) -> Self {
        let code: u8 = match err {
            StonksError::Io(_) | StonksError::Report { .. } => 1,
            StonksError::ConfigParse { .. }
            | StonksError::ConfigInvalid { .. }
            | StonksError::InvalidParameters { .. }
            | StonksError::InvalidRange { .. } => 2,
            StonksError::DataUnavailable { .. }
            | StonksError::ProviderUnreachable { .. }
            | StonksError::MalformedData { .. }
            | StonksError::Cache { .. } => 3,
            StonksError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
