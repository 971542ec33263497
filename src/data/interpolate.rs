//! Depth-segmented TALK (total alkalinity) estimation.
//!
//! Two fixed linear models in temperature and salinity, one for the
//! intermediate layer and one for deep water.  The surface layer is not
//! covered and always yields an absent estimate.

use serde::{Deserialize, Serialize};

use super::model::Dataset;

/// `a + b·temperature + c·salinity`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl LinearCoefficients {
    pub fn apply(&self, temperature: f64, salinity: f64) -> f64 {
        self.a + self.b * temperature + self.c * salinity
    }
}

/// Which model a depth falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthBand {
    /// Above the intermediate limit; no model.
    Surface,
    Intermediate,
    Deep,
}

/// Immutable model parameters, shared read-only by every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TalkModel {
    /// Shallowest depth (m, inclusive) covered by the intermediate model.
    pub intermediate_from: f64,
    /// Shallowest depth (m, inclusive) covered by the deep model.
    pub deep_from: f64,
    pub intermediate: LinearCoefficients,
    pub deep: LinearCoefficients,
}

impl Default for TalkModel {
    fn default() -> Self {
        Self {
            intermediate_from: 200.0,
            deep_from: 1000.0,
            intermediate: LinearCoefficients {
                a: 2300.0,
                b: -10.0,
                c: 5.0,
            },
            deep: LinearCoefficients {
                a: 2250.0,
                b: -8.0,
                c: 4.0,
            },
        }
    }
}

impl TalkModel {
    pub fn band(&self, depth: f64) -> DepthBand {
        if depth >= self.deep_from {
            DepthBand::Deep
        } else if depth >= self.intermediate_from {
            DepthBand::Intermediate
        } else {
            DepthBand::Surface
        }
    }

    /// Estimate TALK for one measurement.  Absent when any input is absent or
    /// non-finite, or when the depth lies in the surface band.
    pub fn estimate(
        &self,
        depth: Option<f64>,
        temperature: Option<f64>,
        salinity: Option<f64>,
    ) -> Option<f64> {
        let depth = depth.filter(|v| v.is_finite())?;
        let temperature = temperature.filter(|v| v.is_finite())?;
        let salinity = salinity.filter(|v| v.is_finite())?;

        match self.band(depth) {
            DepthBand::Surface => None,
            DepthBand::Intermediate => Some(self.intermediate.apply(temperature, salinity)),
            DepthBand::Deep => Some(self.deep.apply(temperature, salinity)),
        }
    }

    /// Attach an estimate to every record and add the TALK column to the
    /// schema.  Each row is computed independently of the others.
    pub fn interpolate(&self, dataset: Dataset) -> Dataset {
        let Dataset {
            mut columns,
            records,
            names,
        } = dataset;

        let records = records
            .into_iter()
            .map(|mut r| {
                r.talk_estimate = self.estimate(r.depth, r.temperature, r.salinity);
                r
            })
            .collect();

        if !columns.contains(&names.talk) {
            columns.push(names.talk.clone());
        }
        Dataset::new(columns, records, names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{ColumnNames, Record};

    #[test]
    fn intermediate_example() {
        let model = TalkModel::default();
        assert_eq!(model.estimate(Some(500.0), Some(10.0), Some(34.0)), Some(2370.0));
    }

    #[test]
    fn deep_example() {
        let model = TalkModel::default();
        assert_eq!(model.estimate(Some(1500.0), Some(4.0), Some(34.5)), Some(2356.0));
    }

    #[test]
    fn surface_is_absent() {
        let model = TalkModel::default();
        for depth in [0.0, 10.0, 199.999, -5.0] {
            assert_eq!(model.estimate(Some(depth), Some(10.0), Some(34.0)), None);
        }
    }

    #[test]
    fn band_boundaries_are_half_open() {
        let model = TalkModel::default();
        assert_eq!(model.band(200.0), DepthBand::Intermediate);
        assert_eq!(model.band(999.9), DepthBand::Intermediate);
        assert_eq!(model.band(1000.0), DepthBand::Deep);

        let t = 7.25;
        let s = 34.1;
        assert_eq!(
            model.estimate(Some(200.0), Some(t), Some(s)),
            Some(2300.0 - 10.0 * t + 5.0 * s)
        );
        assert_eq!(
            model.estimate(Some(1000.0), Some(t), Some(s)),
            Some(2250.0 - 8.0 * t + 4.0 * s)
        );
    }

    #[test]
    fn formulas_hold_across_the_water_column() {
        let model = TalkModel::default();
        for i in 0..60 {
            let depth = f64::from(i) * 50.0;
            let t = 20.0 - f64::from(i) * 0.3;
            let s = 33.0 + f64::from(i) * 0.02;
            let expected = if depth < 200.0 {
                None
            } else if depth < 1000.0 {
                Some(2300.0 - 10.0 * t + 5.0 * s)
            } else {
                Some(2250.0 - 8.0 * t + 4.0 * s)
            };
            assert_eq!(model.estimate(Some(depth), Some(t), Some(s)), expected);
        }
    }

    #[test]
    fn absent_or_non_finite_inputs_are_absent_at_any_depth() {
        let model = TalkModel::default();
        assert_eq!(model.estimate(None, Some(10.0), Some(34.0)), None);
        assert_eq!(model.estimate(Some(500.0), None, Some(34.0)), None);
        assert_eq!(model.estimate(Some(1500.0), Some(4.0), None), None);
        assert_eq!(model.estimate(Some(f64::NAN), Some(4.0), Some(34.0)), None);
        assert_eq!(model.estimate(Some(f64::INFINITY), Some(4.0), Some(34.0)), None);
        assert_eq!(model.estimate(Some(500.0), Some(f64::NEG_INFINITY), Some(34.0)), None);
    }

    #[test]
    fn injected_coefficients_are_used() {
        let model = TalkModel {
            intermediate_from: 0.0,
            intermediate: LinearCoefficients {
                a: 1.0,
                b: 2.0,
                c: 3.0,
            },
            ..TalkModel::default()
        };
        assert_eq!(model.estimate(Some(10.0), Some(1.0), Some(1.0)), Some(6.0));
    }

    #[test]
    fn interpolate_appends_column_and_keeps_order() {
        let records = vec![
            Record {
                depth: Some(10.0),
                temperature: Some(15.0),
                salinity: Some(33.5),
                ..Default::default()
            },
            Record {
                depth: Some(500.0),
                temperature: Some(10.0),
                salinity: Some(34.0),
                ..Default::default()
            },
        ];
        let ds = Dataset::new(
            vec!["Depthm".to_string(), "T_degC".to_string(), "Salnty".to_string()],
            records,
            ColumnNames::default(),
        );

        let out = TalkModel::default().interpolate(ds);
        assert!(out.has_talk_column());
        assert_eq!(out.columns.last().map(String::as_str), Some("TALK_interpolated"));
        assert_eq!(out.records[0].talk_estimate, None);
        assert_eq!(out.records[1].talk_estimate, Some(2370.0));

        let again = TalkModel::default().interpolate(out);
        assert_eq!(again.columns.len(), 4);
    }
}
