//! Error types for the ingestion and analysis pipeline

use std::fmt;

use thiserror::Error;

use crate::data::model::Field;

/// A required logical field whose source column was not found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingColumn {
    pub field: Field,
    pub column: String,
}

impl fmt::Display for MissingColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.field, self.column)
    }
}

/// Pipeline errors surfaced to the immediate caller.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("missing required columns: {}", join_missing(.missing))]
    Schema { missing: Vec<MissingColumn> },

    #[error("malformed tabular payload: {0}")]
    Format(String),

    #[error("internal error: {0}")]
    Internal(String),
}

fn join_missing(missing: &[MissingColumn]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl PipelineError {
    /// Whether the failure was caused by the caller's payload schema.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Schema { .. })
    }
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        PipelineError::Format(e.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Format(e.to_string())
    }
}

impl From<parquet::errors::ParquetError> for PipelineError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        PipelineError::Format(e.to_string())
    }
}

impl From<arrow::error::ArrowError> for PipelineError {
    fn from(e: arrow::error::ArrowError) -> Self {
        PipelineError::Format(e.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Internal(e.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_every_missing_field() {
        let err = PipelineError::Schema {
            missing: vec![
                MissingColumn {
                    field: Field::Temperature,
                    column: "T_degC".to_string(),
                },
                MissingColumn {
                    field: Field::Salinity,
                    column: "Salnty".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("temperature (T_degC)"));
        assert!(msg.contains("salinity (Salnty)"));
        assert!(err.is_client_error());
    }

    #[test]
    fn format_errors_are_not_client_errors() {
        let err = PipelineError::Format("bad quote".to_string());
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "malformed tabular payload: bad quote");
    }
}
