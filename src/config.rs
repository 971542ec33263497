//! Configuration file support (TOML)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::interpolate::TalkModel;
use crate::data::model::{ColumnNames, Field};
use crate::pipeline::DEFAULT_LIMIT;

/// Complete application configuration.  Every section has defaults, so an
/// empty file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub batch: BatchConfig,
    pub columns: ColumnNames,
    pub model: TalkModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub default_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            default_limit: DEFAULT_LIMIT,
        }
    }
}

/// Where the offline cleaning run reads from and writes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Columns filtered for outliers, in order.
    pub outlier_columns: Vec<OutlierColumn>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/bottle.csv"),
            output_dir: PathBuf::from("data"),
            outlier_columns: vec![OutlierColumn::Temperature, OutlierColumn::Salinity],
        }
    }
}

/// Numeric fields the cleaner may filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierColumn {
    Depth,
    Temperature,
    Salinity,
}

impl From<OutlierColumn> for Field {
    fn from(c: OutlierColumn) -> Self {
        match c {
            OutlierColumn::Depth => Field::Depth,
            OutlierColumn::Temperature => Field::Temperature,
            OutlierColumn::Salinity => Field::Salinity,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        if config.server.default_limit == 0 {
            anyhow::bail!("server.default_limit must be at least 1");
        }
        Ok(config)
    }

    /// `load` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn outlier_fields(&self) -> Vec<Field> {
        self.batch
            .outlier_columns
            .iter()
            .copied()
            .map(Field::from)
            .collect()
    }
}
