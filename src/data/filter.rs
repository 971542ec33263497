use std::collections::BTreeMap;

use log::debug;

use super::model::{Dataset, Field, Record};

/// Multiplier applied to the IQR on either side of the quartiles.
pub const FENCE_FACTOR: f64 = 1.5;

// ---------------------------------------------------------------------------
// Quantiles and the IQR fence
// ---------------------------------------------------------------------------

/// Linear-interpolation quantile of ascending `sorted` values (`q` in 0..=1).
///
/// Returns `None` for an empty slice or a `q` outside the unit interval.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    let a = sorted[idx];
    let b = sorted[(idx + 1).min(sorted.len() - 1)];
    Some(a + (b - a) * frac)
}

/// Interquartile-range outlier bounds `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFence {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFence {
    /// Fence over the finite values; `None` if there are none.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile(&sorted, 0.25)?;
        let q3 = quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        Some(IqrFence {
            q1,
            q3,
            iqr,
            lower: q1 - FENCE_FACTOR * iqr,
            upper: q3 + FENCE_FACTOR * iqr,
        })
    }

    /// Inclusive on both bounds.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn count_outliers<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = f64>,
    {
        values.into_iter().filter(|&v| !self.contains(v)).count()
    }
}

// ---------------------------------------------------------------------------
// Cleaning passes
// ---------------------------------------------------------------------------

/// How many records lack a usable value, per logical field.
pub fn missing_value_counts(dataset: &Dataset) -> BTreeMap<Field, usize> {
    Field::CLEANING
        .into_iter()
        .map(|field| {
            let missing = dataset.records.iter().filter(|r| !r.has(field)).count();
            (field, missing)
        })
        .collect()
}

/// Keep only records that carry every one of `fields`.
pub fn drop_incomplete(dataset: Dataset, fields: &[Field]) -> Dataset {
    let Dataset {
        columns,
        records,
        names,
    } = dataset;
    let records = records
        .into_iter()
        .filter(|r| fields.iter().all(|&f| r.has(f)))
        .collect();
    Dataset::new(columns, records, names)
}

/// Keep only records whose `field` value lies inside the IQR fence computed
/// over the input.  Records without a value never pass.
pub fn remove_outliers(dataset: Dataset, field: Field) -> (Dataset, Option<IqrFence>) {
    let fence = IqrFence::from_values(dataset.records.iter().filter_map(|r| r.number(field)));

    let Dataset {
        columns,
        records,
        names,
    } = dataset;
    let records: Vec<Record> = records
        .into_iter()
        .filter(|r| match (fence, r.number(field)) {
            (Some(fence), Some(v)) => fence.contains(v),
            _ => false,
        })
        .collect();

    (Dataset::new(columns, records, names), fence)
}

/// One outlier pass over a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierPass {
    pub field: Field,
    pub fence: Option<IqrFence>,
    pub removed: usize,
}

/// What the cleaner did to a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleaningReport {
    pub rows_in: usize,
    pub dropped_incomplete: usize,
    pub passes: Vec<OutlierPass>,
    pub rows_out: usize,
}

/// Drop incomplete rows, then filter outliers on each of `columns` in turn,
/// every pass seeing only the survivors of the previous one.
pub fn clean(dataset: Dataset, columns: &[Field]) -> (Dataset, CleaningReport) {
    let mut report = CleaningReport {
        rows_in: dataset.len(),
        ..Default::default()
    };

    let mut current = drop_incomplete(dataset, &Field::CLEANING);
    report.dropped_incomplete = report.rows_in - current.len();
    debug!("dropped {} incomplete rows", report.dropped_incomplete);

    for &field in columns {
        let before = current.len();
        let (next, fence) = remove_outliers(current, field);
        let removed = before - next.len();
        debug!("{field}: fence {fence:?}, removed {removed} rows");
        report.passes.push(OutlierPass {
            field,
            fence,
            removed,
        });
        current = next;
    }

    report.rows_out = current.len();
    (current, report)
}
