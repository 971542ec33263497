use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{Dataset, Field};

/// Round half away from zero to `digits` decimal places.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

/// Mean temperature per station, keyed in sorted station order.  Records
/// without a station or a finite temperature are skipped.
pub fn station_mean_temperature(dataset: &Dataset) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for r in &dataset.records {
        let (Some(station), Some(t)) = (r.station_id.as_ref(), r.temperature) else {
            continue;
        };
        if !t.is_finite() {
            continue;
        }
        let entry = sums.entry(station.clone()).or_insert((0.0, 0));
        entry.0 += t;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(station, (sum, n))| (station, sum / n as f64))
        .collect()
}

/// Pearson correlation of paired samples.  `None` with fewer than two pairs
/// or when either side has zero variance.
pub fn pearson<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let pairs: Vec<(f64, f64)> = pairs
        .into_iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Correlation between two numeric fields over rows where both are present.
pub fn field_correlation(dataset: &Dataset, x: Field, y: Field) -> Option<f64> {
    pearson(
        dataset
            .records
            .iter()
            .filter_map(|r| Some((r.number(x)?, r.number(y)?))),
    )
}

/// Salinity/depth correlation rounded to two decimals for reporting.
pub fn salinity_depth_correlation(dataset: &Dataset) -> Option<f64> {
    field_correlation(dataset, Field::Salinity, Field::Depth).map(|r| round_to(r, 2))
}

// ---------------------------------------------------------------------------
// Summary – descriptive statistics for one column
// ---------------------------------------------------------------------------

/// Count, range, mean and population standard deviation of a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl Summary {
    /// `None` if no finite values are present.
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        let count = values.len();
        if count == 0 {
            return None;
        }
        let n = count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Summary {
            count,
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
        })
    }

    pub fn of_field(dataset: &Dataset, field: Field) -> Option<Self> {
        Self::new(dataset.records.iter().filter_map(|r| r.number(field)))
    }
}
