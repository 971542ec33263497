use std::fs::File;
use std::path::Path;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, LargeStringArray, StringArray,
};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::DataType;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bytes::Bytes;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::ChunkReader;
use serde_json::Value as JsonValue;

use super::model::{CellValue, ColumnNames, Dataset, Field, Record};
use crate::error::{MissingColumn, PipelineError, Result};

const PARQUET_MAGIC: &[u8] = b"PAR1";

// ---------------------------------------------------------------------------
// Format selection
// ---------------------------------------------------------------------------

/// Tabular encodings the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
    Parquet,
}

impl TableFormat {
    /// Format implied by a file name's extension, if recognised.
    pub fn from_extension(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" => Some(TableFormat::Csv),
            "json" => Some(TableFormat::Json),
            "parquet" | "pq" => Some(TableFormat::Parquet),
            _ => None,
        }
    }

    /// Pick a format for an uploaded payload: extension first, then Parquet
    /// magic bytes, else CSV.
    pub fn detect(file_name: Option<&str>, payload: &[u8]) -> Self {
        if let Some(format) = file_name.and_then(Self::from_extension) {
            return format;
        }
        if payload.starts_with(PARQUET_MAGIC) {
            TableFormat::Parquet
        } else {
            TableFormat::Csv
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a dataset from a file.  Dispatch by extension, CSV when unknown.
pub fn load_file(path: &Path, names: &ColumnNames, required: &[Field]) -> Result<Dataset> {
    let format = path
        .to_str()
        .and_then(TableFormat::from_extension)
        .unwrap_or(TableFormat::Csv);
    debug!("loading {} as {format:?}", path.display());

    match format {
        TableFormat::Parquet => load_parquet(File::open(path)?, names, required),
        other => {
            let payload = std::fs::read(path)?;
            load_bytes(&payload, other, names, required)
        }
    }
}

/// Parse an in-memory payload.  The schema check runs before any row is read.
pub fn load_bytes(
    payload: &[u8],
    format: TableFormat,
    names: &ColumnNames,
    required: &[Field],
) -> Result<Dataset> {
    match format {
        TableFormat::Csv => load_csv(payload, names, required),
        TableFormat::Json => load_json(payload, names, required),
        TableFormat::Parquet => load_parquet(Bytes::copy_from_slice(payload), names, required),
    }
}

/// Fail with a schema error listing every required field whose column is absent.
pub fn check_schema<S: AsRef<str>>(
    columns: &[S],
    names: &ColumnNames,
    required: &[Field],
) -> Result<()> {
    let missing: Vec<MissingColumn> = required
        .iter()
        .filter(|&&field| !columns.iter().any(|c| c.as_ref() == names.column(field)))
        .map(|&field| MissingColumn {
            field,
            column: names.column(field).to_string(),
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema { missing })
    }
}

/// Assemble a record from `(column, cell)` pairs.  The derived TALK column is
/// never taken from input.
fn build_record<'a, I>(names: &ColumnNames, cells: I) -> Record
where
    I: IntoIterator<Item = (&'a str, CellValue)>,
{
    let mut record = Record::default();
    for (column, cell) in cells {
        if column == names.talk {
            continue;
        }
        match names.field_of(column) {
            Some(Field::Depth) => record.depth = cell.as_f64(),
            Some(Field::Temperature) => record.temperature = cell.as_f64(),
            Some(Field::Salinity) => record.salinity = cell.as_f64(),
            Some(Field::StationId) => match cell {
                CellValue::Null => record.station_id = None,
                CellValue::Float(v) if !v.is_finite() => record.station_id = None,
                CellValue::String(s) => record.station_id = Some(s),
                typed => {
                    // Grouping uses the text; responses keep the typed value.
                    record.station_id = Some(typed.to_string());
                    record.extra.insert(column.to_string(), typed);
                }
            },
            None => {
                record.extra.insert(column.to_string(), cell);
            }
        }
    }
    record
}

fn schema_columns(names: &ColumnNames, columns: Vec<String>) -> Vec<String> {
    columns.into_iter().filter(|c| *c != names.talk).collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one measurement per line.
/// Interpreted columns are kept as raw text until parsed; every other column
/// is type-guessed.
fn load_csv(payload: &[u8], names: &ColumnNames, required: &[Field]) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(payload);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(PipelineError::Format("payload has no header row".to_string()));
    }
    check_schema(&headers, names, required)?;

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = result?;
        // Short rows are padded with absent cells; long rows cannot be aligned.
        if row.len() > headers.len() {
            return Err(PipelineError::Format(format!(
                "row {} has {} fields, header has {}",
                i + 1,
                row.len(),
                headers.len()
            )));
        }
        let cells = headers.iter().enumerate().map(|(idx, col)| {
            let raw = row.get(idx).unwrap_or("");
            let cell = if names.field_of(col).is_some() {
                if raw.trim().is_empty() {
                    CellValue::Null
                } else {
                    CellValue::String(raw.trim().to_string())
                }
            } else {
                CellValue::guess(raw)
            };
            (col.as_str(), cell)
        });
        records.push(build_record(names, cells));
    }
    type_integer_stations(&mut records, &names.station_id);

    Ok(Dataset::new(
        schema_columns(names, headers),
        records,
        names.clone(),
    ))
}

/// A station column whose every present value is an integer is typed as one,
/// so it renders as a number.  Mixed columns stay text.
fn type_integer_stations(records: &mut [Record], column: &str) {
    let parsed: Option<Vec<Option<i64>>> = records
        .iter()
        .map(|r| match r.station_id.as_deref() {
            None => Some(None),
            Some(s) => s.parse::<i64>().ok().map(Some),
        })
        .collect();
    let Some(parsed) = parsed else { return };
    if parsed.iter().all(Option::is_none) {
        return;
    }

    for (record, id) in records.iter_mut().zip(parsed) {
        if let Some(id) = id {
            record.station_id = Some(id.to_string());
            record.extra.insert(column.to_string(), CellValue::Integer(id));
        }
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Sta_ID": "054.0 056.0", "Depthm": 0, "T_degC": 10.5, "Salnty": 33.44 },
///   ...
/// ]
/// ```
fn load_json(payload: &[u8], names: &ColumnNames, required: &[Field]) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_slice(payload)?;
    let rows = root
        .as_array()
        .ok_or_else(|| PipelineError::Format("expected top-level JSON array".to_string()))?;

    let mut columns: Vec<String> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let obj = row
            .as_object()
            .ok_or_else(|| PipelineError::Format(format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    check_schema(&columns, names, required)?;

    let records = rows
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|obj| {
            let cells = columns.iter().map(|col| {
                let cell = obj.get(col).map_or(CellValue::Null, json_to_cell);
                (col.as_str(), cell)
            });
            build_record(names, cells)
        })
        .collect();

    Ok(Dataset::new(
        schema_columns(names, columns),
        records,
        names.clone(),
    ))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load Parquet data written by Pandas (`df.to_parquet()`) or Polars.
/// Interpreted numeric columns of any width are cast to Float64; categorical
/// (dictionary) columns are decoded; Utf8 columns holding numbers are parsed
/// leniently.
fn load_parquet<R>(reader: R, names: &ColumnNames, required: &[Field]) -> Result<Dataset>
where
    R: ChunkReader + 'static,
{
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    check_schema(&columns, names, required)?;

    let batches = builder.build()?;
    let mut records = Vec::new();

    for batch_result in batches {
        let batch = batch_result?;
        let schema = batch.schema();
        let arrays = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, col)| normalize_column(col, names.field_of(field.name())))
            .collect::<Result<Vec<ArrayRef>>>()?;

        for row in 0..batch.num_rows() {
            let cells = schema
                .fields()
                .iter()
                .zip(&arrays)
                .map(|(field, col)| (field.name().as_str(), extract_cell(col, row)));
            records.push(build_record(names, cells));
        }
    }

    Ok(Dataset::new(
        schema_columns(names, columns),
        records,
        names.clone(),
    ))
}

/// Cast a column to one of the types `extract_cell` reads directly.
///
/// Numeric fields become Float64.  Elsewhere integers widen to Int64, other
/// floats and decimals become Float64, and dictionaries are unpacked.  Types
/// with no such cast are left for the display fallback.
fn normalize_column(col: &ArrayRef, field: Option<Field>) -> Result<ArrayRef> {
    let data_type = col.data_type();
    if let DataType::Dictionary(_, values) = data_type {
        let decoded = cast(col, values.as_ref())?;
        return normalize_column(&decoded, field);
    }

    let numeric_field = matches!(
        field,
        Some(Field::Depth | Field::Temperature | Field::Salinity)
    );
    let target = match data_type {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Null => return Ok(col.clone()),
        _ if numeric_field => DataType::Float64,
        DataType::Float64 | DataType::Int64 | DataType::Boolean => return Ok(col.clone()),
        t if t.is_integer() => DataType::Int64,
        t if t.is_floating() || matches!(t, DataType::Decimal128(..) | DataType::Decimal256(..)) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    };

    if can_cast_types(data_type, &target) {
        Ok(cast(col, &target)?)
    } else {
        Ok(col.clone())
    }
}

/// Extract a single cell from a normalized Arrow column at a given row.
fn extract_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        CellValue::Float(arr.value(row))
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        CellValue::Integer(arr.value(row))
    } else if let Some(arr) = any.downcast_ref::<StringArray>() {
        CellValue::String(arr.value(row).to_string())
    } else if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        CellValue::String(arr.value(row).to_string())
    } else if let Some(arr) = any.downcast_ref::<BooleanArray>() {
        CellValue::Bool(arr.value(row))
    } else {
        ArrayFormatter::try_new(col.as_ref(), &FormatOptions::default())
            .map_or(CellValue::Null, |formatter| {
                CellValue::String(formatter.value(row).to_string())
            })
    }
}
