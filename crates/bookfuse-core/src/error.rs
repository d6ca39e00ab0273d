use std::path::PathBuf;

use thiserror::Error;

/// All errors that can occur in bookfuse-core.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Source file {} is unreadable: {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Unsupported source format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CatalogError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that mean an input collaborator produced nothing usable.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::SourceMissing(_) | Self::SourceUnreadable { .. } | Self::UnsupportedFormat(_)
        )
    }
}

/// Exit codes used by the `bookfuse` binary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InputError = 2,
    InvalidArgs = 3,
    InvariantViolation = 4,
}

pub type Result<T> = std::result::Result<T, CatalogError>;
