use super::model::{CellValue, Dataset, Record};

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|v| v.is_finite())
}

/// Replace every infinite or NaN value in a record with an absent value.
pub fn sanitize_record(record: Record) -> Record {
    let Record {
        depth,
        temperature,
        salinity,
        station_id,
        talk_estimate,
        extra,
    } = record;

    let extra = extra
        .into_iter()
        .map(|(col, cell)| match cell {
            CellValue::Float(v) if !v.is_finite() => (col, CellValue::Null),
            other => (col, other),
        })
        .collect();

    Record {
        depth: finite(depth),
        temperature: finite(temperature),
        salinity: finite(salinity),
        station_id,
        talk_estimate: finite(talk_estimate),
        extra,
    }
}

/// Make a dataset safe for transports without a representation for
/// non-finite floats.
pub fn sanitize(dataset: Dataset) -> Dataset {
    let Dataset {
        columns,
        records,
        names,
    } = dataset;
    let records = records.into_iter().map(sanitize_record).collect();
    Dataset::new(columns, records, names)
}

/// Whether any float in the dataset is infinite or NaN.
pub fn has_non_finite(dataset: &Dataset) -> bool {
    dataset.records.iter().any(|r| {
        [r.depth, r.temperature, r.salinity, r.talk_estimate]
            .into_iter()
            .flatten()
            .any(|v| !v.is_finite())
            || r
                .extra
                .values()
                .any(|c| matches!(c, CellValue::Float(v) if !v.is_finite()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ColumnNames;
    use std::collections::BTreeMap;

    #[test]
    fn non_finite_values_become_absent() {
        let mut extra = BTreeMap::new();
        extra.insert("O2ml_L".to_string(), CellValue::Float(f64::NAN));
        extra.insert("Btl_Cnt".to_string(), CellValue::Integer(3));
        extra.insert("PO4uM".to_string(), CellValue::Float(1.25));
        let ds = Dataset::new(
            vec![],
            vec![Record {
                depth: Some(f64::INFINITY),
                temperature: Some(f64::NEG_INFINITY),
                salinity: Some(34.0),
                station_id: Some("A".to_string()),
                talk_estimate: Some(f64::NAN),
                extra,
            }],
            ColumnNames::default(),
        );
        assert!(has_non_finite(&ds));

        let out = sanitize(ds);
        assert!(!has_non_finite(&out));
        let r = &out.records[0];
        assert_eq!(r.depth, None);
        assert_eq!(r.temperature, None);
        assert_eq!(r.salinity, Some(34.0));
        assert_eq!(r.talk_estimate, None);
        assert_eq!(r.extra["O2ml_L"], CellValue::Null);
        assert_eq!(r.extra["Btl_Cnt"], CellValue::Integer(3));
        assert_eq!(r.extra["PO4uM"], CellValue::Float(1.25));
    }

    #[test]
    fn zero_is_not_absent() {
        let record = Record {
            depth: Some(0.0),
            ..Default::default()
        };
        assert_eq!(sanitize_record(record).depth, Some(0.0));
    }
}
