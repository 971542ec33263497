//! Offline cleaning run: bottle file in, cleaned tables and reports out.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::config::AppConfig;
use crate::data::filter::{clean, missing_value_counts, CleaningReport, IqrFence};
use crate::data::loader::load_file;
use crate::data::model::{Dataset, Field};
use crate::data::stats::{salinity_depth_correlation, station_mean_temperature, Summary};
use crate::data::thermocline::detect_by_station;
use crate::pipeline::Analyzer;

/// Files written by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutputs {
    pub cleaned: PathBuf,
    pub station_means: PathBuf,
    pub correlation: PathBuf,
    pub with_talk: PathBuf,
    pub thermocline: PathBuf,
}

impl BatchOutputs {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            cleaned: dir.join("cleaned_bottle.csv"),
            station_means: dir.join("station_mean_temperature.csv"),
            correlation: dir.join("salinity_depth_correlation.txt"),
            with_talk: dir.join("bottle_with_talk.csv"),
            thermocline: dir.join("thermocline.json"),
        }
    }
}

/// What a run produced, for console reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub cleaning: CleaningReport,
    pub stations: usize,
    pub correlation: Option<f64>,
    pub estimated: usize,
    pub outputs: BatchOutputs,
}

pub fn run(config: &AppConfig, input: &Path, output_dir: &Path) -> Result<BatchSummary> {
    let names = &config.columns;
    let dataset = load_file(input, names, &Field::CLEANING)
        .with_context(|| format!("loading {}", input.display()))?;
    info!("loaded {} rows from {}", dataset.len(), input.display());

    for (field, missing) in missing_value_counts(&dataset) {
        debug!("missing {field} ({}): {missing}", names.column(field));
    }
    for field in config.outlier_fields() {
        let values: Vec<f64> = dataset.records.iter().filter_map(|r| r.number(field)).collect();
        if let Some(fence) = IqrFence::from_values(values.iter().copied()) {
            let outliers = fence.count_outliers(values.iter().copied());
            debug!("{field} outliers in raw data: {outliers}");
        }
    }

    let (cleaned, cleaning) = clean(dataset, &config.outlier_fields());
    for pass in &cleaning.passes {
        match pass.fence {
            Some(f) => info!(
                "{}: Q1={:.3} Q3={:.3} fence=[{:.3}, {:.3}], removed {}",
                pass.field, f.q1, f.q3, f.lower, f.upper, pass.removed
            ),
            None => info!("{}: no values, removed {}", pass.field, pass.removed),
        }
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let outputs = BatchOutputs::in_dir(output_dir);

    write_dataset_csv(&cleaned, &outputs.cleaned)?;
    info!("cleaned data: {} rows → {}", cleaned.len(), outputs.cleaned.display());

    let means = station_mean_temperature(&cleaned);
    write_station_means(&means, &names.station_id, &names.temperature, &outputs.station_means)?;

    let correlation = salinity_depth_correlation(&cleaned);
    write_correlation(correlation, &outputs.correlation)?;

    for field in [Field::Depth, Field::Temperature, Field::Salinity] {
        if let Some(s) = Summary::of_field(&cleaned, field) {
            debug!(
                "{field}: n={} min={} max={} mean={:.3} std={:.3}",
                s.count, s.min, s.max, s.mean, s.std_dev
            );
        }
    }

    let thermoclines = detect_by_station(&cleaned);
    let file = File::create(&outputs.thermocline)
        .with_context(|| format!("creating {}", outputs.thermocline.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &thermoclines)
        .context("writing thermocline report")?;
    writer.flush()?;

    let analyzer = Analyzer::new(names.clone(), config.model);
    let with_talk = analyzer.process(cleaned);
    write_dataset_csv(&with_talk, &outputs.with_talk)?;
    let estimated = with_talk
        .records
        .iter()
        .filter(|r| r.talk_estimate.is_some())
        .count();
    info!("TALK estimated for {estimated} of {} rows", with_talk.len());

    Ok(BatchSummary {
        cleaning,
        stations: means.len(),
        correlation,
        estimated,
        outputs,
    })
}

pub fn write_dataset_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(&dataset.columns)?;
    for record in &dataset.records {
        writer.write_record(dataset.csv_row(record))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_station_means<'a, I>(means: I, station_col: &str, temp_col: &str, path: &Path) -> Result<()>
where
    I: IntoIterator<Item = (&'a String, &'a f64)>,
{
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([station_col, temp_col])?;
    for (station, mean) in means {
        writer.write_record([station.as_str(), mean.to_string().as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_correlation(correlation: Option<f64>, path: &Path) -> Result<()> {
    let value = correlation.map_or_else(|| "n/a".to_string(), |r| format!("{r:.2}"));
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    writeln!(file, "Salinity-depth correlation: {value}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{load_bytes, TableFormat};
    use std::fmt::Write as _;

    fn bottle_csv() -> String {
        let mut csv = String::from("Cst_Cnt,Sta_ID,Depthm,T_degC,Salnty\n");
        for (station, offset) in [("A", 0.0), ("B", 1.0)] {
            for i in 0..15 {
                let depth = f64::from(i) * 100.0;
                let t = 16.0 + offset - f64::from(i) * 0.8;
                let s = 33.2 + f64::from(i) * 0.05;
                writeln!(csv, "1,{station},{depth},{t},{s}").unwrap();
            }
        }
        // incomplete rows and a salinity spike
        csv.push_str("2,,100,12,33.5\n");
        csv.push_str("2,A,200,,33.5\n");
        csv.push_str("2,A,300,10,80\n");
        csv
    }

    #[test]
    fn run_writes_every_sink() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bottle.csv");
        std::fs::write(&input, bottle_csv()).unwrap();
        let out_dir = dir.path().join("out");

        let summary = run(&AppConfig::default(), &input, &out_dir).unwrap();
        assert_eq!(summary.cleaning.rows_in, 33);
        assert_eq!(summary.cleaning.dropped_incomplete, 2);
        assert_eq!(summary.cleaning.rows_out, 30);
        assert_eq!(summary.stations, 2);
        assert!(summary.correlation.is_some_and(|r| r > 0.9));
        // depths 200..=1400 at both stations
        assert_eq!(summary.estimated, 26);

        let cleaned = std::fs::read_to_string(&summary.outputs.cleaned).unwrap();
        assert!(cleaned.starts_with("Cst_Cnt,Sta_ID,Depthm,T_degC,Salnty\n"));
        assert_eq!(cleaned.lines().count(), 31);
        assert!(!cleaned.contains(",80\n"));

        let means = std::fs::read_to_string(&summary.outputs.station_means).unwrap();
        let lines: Vec<&str> = means.lines().collect();
        assert_eq!(lines[0], "Sta_ID,T_degC");
        assert!(lines[1].starts_with("A,"));
        assert!(lines[2].starts_with("B,"));

        let corr = std::fs::read_to_string(&summary.outputs.correlation).unwrap();
        assert_eq!(corr.lines().count(), 1);
        assert!(corr.starts_with("Salinity-depth correlation: "));

        let with_talk = std::fs::read(&summary.outputs.with_talk).unwrap();
        let ds = load_bytes(
            &with_talk,
            TableFormat::Csv,
            &Default::default(),
            &Field::CLEANING,
        )
        .unwrap();
        assert_eq!(ds.len(), 30);
        let header = String::from_utf8_lossy(&with_talk);
        assert!(header.lines().next().unwrap().ends_with(",TALK_interpolated"));

        let thermo: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&summary.outputs.thermocline).unwrap()).unwrap();
        assert!(thermo.get("A").is_some());
        assert!(thermo.get("B").is_some());
    }

    #[test]
    fn missing_station_column_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bottle.csv");
        std::fs::write(&input, "Depthm,T_degC,Salnty\n10,5,33\n").unwrap();

        let err = run(&AppConfig::default(), &input, dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("station_id"));
    }

    #[test]
    fn undefined_correlation_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corr.txt");
        write_correlation(None, &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Salinity-depth correlation: n/a\n"
        );
    }
}
