//! The request path: payload → dataset → TALK estimates → JSON-safe rows.

use log::{debug, info};
use serde_json::Value as JsonValue;

use crate::data::interpolate::TalkModel;
use crate::data::loader::{load_bytes, TableFormat};
use crate::data::model::{ColumnNames, Dataset, Field};
use crate::data::sanitize::{has_non_finite, sanitize};
use crate::error::Result;

/// Rows returned when the caller does not ask for a limit.
pub const DEFAULT_LIMIT: usize = 100;

/// Immutable configuration for one analysis; cheap to share between requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analyzer {
    pub names: ColumnNames,
    pub model: TalkModel,
}

impl Analyzer {
    pub fn new(names: ColumnNames, model: TalkModel) -> Self {
        Analyzer { names, model }
    }

    /// Interpolate and sanitize a whole dataset.
    pub fn process(&self, dataset: Dataset) -> Dataset {
        sanitize(self.model.interpolate(dataset))
    }

    /// Parse a payload, estimate TALK for every row, then return the first
    /// `limit` rows.  Truncation happens after processing the full dataset.
    pub fn analyze(
        &self,
        payload: &[u8],
        format: TableFormat,
        limit: usize,
    ) -> Result<Vec<JsonValue>> {
        let dataset = load_bytes(payload, format, &self.names, &Field::INTERPOLATION)?;
        debug!("parsed {} rows ({format:?})", dataset.len());

        let processed = self.process(dataset);
        debug_assert!(!has_non_finite(&processed));
        let estimated = processed
            .records
            .iter()
            .filter(|r| r.talk_estimate.is_some())
            .count();
        info!(
            "processed {} rows, {estimated} with a TALK estimate",
            processed.len()
        );

        Ok(processed.to_json_records(limit))
    }
}
