use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

// ---------------------------------------------------------------------------
// CellValue – a single pass-through cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell for columns the pipeline does not interpret,
/// mirroring common Pandas dtypes.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Text used when writing the cell back into a CSV file.
    pub fn to_csv_field(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// JSON rendering; non-finite floats become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            CellValue::String(s) => JsonValue::String(s.clone()),
            CellValue::Integer(i) => JsonValue::from(*i),
            CellValue::Float(v) => float_to_json(Some(*v)),
            CellValue::Bool(b) => JsonValue::Bool(*b),
            CellValue::Null => JsonValue::Null,
        }
    }

    /// Guess the type of a raw text cell the way the CSV loader does.
    pub fn guess(s: &str) -> CellValue {
        let s = s.trim();
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        if s == "true" || s == "false" {
            return CellValue::Bool(s == "true");
        }
        CellValue::String(s.to_string())
    }
}

/// Lenient numeric parse: anything unparseable is absent rather than an error.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}

pub(crate) fn float_to_json(v: Option<f64>) -> JsonValue {
    v.and_then(serde_json::Number::from_f64)
        .map_or(JsonValue::Null, JsonValue::Number)
}

fn csv_float(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Field / ColumnNames – logical fields and their source columns
// ---------------------------------------------------------------------------

/// Logical fields the pipeline interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Depth,
    Temperature,
    Salinity,
    StationId,
}

impl Field {
    /// Fields the API path needs to compute an estimate.
    pub const INTERPOLATION: [Field; 3] = [Field::Depth, Field::Temperature, Field::Salinity];

    /// Fields a row must carry to survive cleaning.
    pub const CLEANING: [Field; 4] = [
        Field::Depth,
        Field::Temperature,
        Field::Salinity,
        Field::StationId,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Depth => "depth",
            Field::Temperature => "temperature",
            Field::Salinity => "salinity",
            Field::StationId => "station_id",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source column names for each logical field (bottle-file schema by default).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub depth: String,
    pub temperature: String,
    pub salinity: String,
    pub station_id: String,
    /// Name of the derived column appended by interpolation.
    pub talk: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            depth: "Depthm".to_string(),
            temperature: "T_degC".to_string(),
            salinity: "Salnty".to_string(),
            station_id: "Sta_ID".to_string(),
            talk: "TALK_interpolated".to_string(),
        }
    }
}

impl ColumnNames {
    pub fn column(&self, field: Field) -> &str {
        match field {
            Field::Depth => &self.depth,
            Field::Temperature => &self.temperature,
            Field::Salinity => &self.salinity,
            Field::StationId => &self.station_id,
        }
    }

    /// Reverse lookup: which logical field a source column holds, if any.
    pub fn field_of(&self, column: &str) -> Option<Field> {
        Field::CLEANING
            .into_iter()
            .find(|&field| self.column(field) == column)
    }
}

// ---------------------------------------------------------------------------
// Record – one row of the bottle table
// ---------------------------------------------------------------------------

/// A single water-column measurement (one row of the source table).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Depth in metres.
    pub depth: Option<f64>,
    /// Temperature in °C.
    pub temperature: Option<f64>,
    pub salinity: Option<f64>,
    pub station_id: Option<String>,
    /// Derived by the interpolator, never read from input.
    pub talk_estimate: Option<f64>,
    /// Every other source column: column_name → value.  A station id read as
    /// a number is also kept here under its column so it renders typed.
    pub extra: BTreeMap<String, CellValue>,
}

impl Record {
    /// Numeric value of a logical field (`None` for the station id).
    pub fn number(&self, field: Field) -> Option<f64> {
        match field {
            Field::Depth => self.depth,
            Field::Temperature => self.temperature,
            Field::Salinity => self.salinity,
            Field::StationId => None,
        }
    }

    /// Whether the field holds a usable value: finite for numbers, non-empty
    /// for the station id.
    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::StationId => self.station_id.as_deref().is_some_and(|s| !s.is_empty()),
            numeric => self.number(numeric).is_some_and(f64::is_finite),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// An ordered set of records sharing one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Source column names, in file order.
    pub columns: Vec<String>,
    pub records: Vec<Record>,
    pub names: ColumnNames,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<Record>, names: ColumnNames) -> Self {
        Dataset {
            columns,
            records,
            names,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the derived TALK column is part of the schema.
    pub fn has_talk_column(&self) -> bool {
        self.columns.iter().any(|c| *c == self.names.talk)
    }

    /// Column values of one record, in schema order, ready for a CSV writer.
    pub fn csv_row(&self, record: &Record) -> Vec<String> {
        self.columns
            .iter()
            .map(|col| {
                if *col == self.names.talk {
                    return csv_float(record.talk_estimate);
                }
                match self.names.field_of(col) {
                    Some(Field::StationId) => record.station_id.clone().unwrap_or_default(),
                    Some(field) => csv_float(record.number(field)),
                    None => record
                        .extra
                        .get(col)
                        .map(CellValue::to_csv_field)
                        .unwrap_or_default(),
                }
            })
            .collect()
    }

    /// One record as a JSON object keyed by source column name.
    pub fn json_row(&self, record: &Record) -> JsonMap<String, JsonValue> {
        self.columns
            .iter()
            .map(|col| {
                let value = if *col == self.names.talk {
                    float_to_json(record.talk_estimate)
                } else {
                    match self.names.field_of(col) {
                        Some(Field::StationId) => match record.extra.get(col) {
                            Some(typed) => typed.to_json(),
                            None => record
                                .station_id
                                .clone()
                                .map_or(JsonValue::Null, JsonValue::String),
                        },
                        Some(field) => float_to_json(record.number(field)),
                        None => record.extra.get(col).map_or(JsonValue::Null, CellValue::to_json),
                    }
                };
                (col.clone(), value)
            })
            .collect()
    }

    /// The leading `limit` records as JSON objects.
    pub fn to_json_records(&self, limit: usize) -> Vec<JsonValue> {
        self.records
            .iter()
            .take(limit)
            .map(|r| JsonValue::Object(self.json_row(r)))
            .collect()
    }
}
