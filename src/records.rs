//! Microdata loading and sampling.
//!
//! Records are read once and shared read-only behind an `Arc`; every
//! calculator fork points at the same table until it needs to change it.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BrainError, BrainResult, ExecutionError, ValidationError};
use crate::snapshot::Snapshot;

/// Kind of sample the records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    /// Public-use survey sample.
    Cps,
    /// Restricted-access administrative sample.
    Puf,
    /// Restricted-access sample built on top of the administrative one.
    Tmd,
    /// Anything the caller supplied directly.
    Custom,
}

impl DataKind {
    /// Whether results from this data must be fuzzed before release.
    #[must_use]
    pub const fn is_restricted(self) -> bool {
        matches!(self, Self::Puf | Self::Tmd)
    }

    /// Year the raw data describe.
    #[must_use]
    pub const fn default_data_year(self) -> Option<i32> {
        match self {
            Self::Cps => Some(2014),
            Self::Puf => Some(2011),
            Self::Tmd => Some(2021),
            Self::Custom => None,
        }
    }

    /// File stem looked up in the data directory.
    #[must_use]
    pub const fn file_stem(self) -> Option<&'static str> {
        match self {
            Self::Cps => Some("cps"),
            Self::Puf => Some("puf"),
            Self::Tmd => Some("tmd"),
            Self::Custom => None,
        }
    }
}

/// Where microdata come from.
#[derive(Debug, Clone)]
pub enum MicrodataSource {
    /// Named public-use sample.
    Cps,
    /// Named restricted sample.
    Puf,
    /// Named restricted sample.
    Tmd,
    /// A CSV (or zstd-compressed CSV) file of custom data.
    File(PathBuf),
    /// An in-memory table of custom data.
    Table(Snapshot),
}

impl MicrodataSource {
    /// Kind of data this source yields.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::Cps => DataKind::Cps,
            Self::Puf => DataKind::Puf,
            Self::Tmd => DataKind::Tmd,
            Self::File(_) | Self::Table(_) => DataKind::Custom,
        }
    }
}

/// Partial-sample request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSpec {
    /// Fraction of rows kept, in `(0, 1]`.
    pub fraction: f64,
    /// Seed for row selection.
    pub seed: u64,
}

impl SampleSpec {
    /// Fixed default sampling for each named source.
    #[must_use]
    pub const fn default_for(kind: DataKind) -> Self {
        match kind {
            DataKind::Cps => Self { fraction: 0.03, seed: 180 },
            DataKind::Puf | DataKind::Tmd => Self { fraction: 0.05, seed: 2222 },
            DataKind::Custom => Self { fraction: 1.0, seed: 0 },
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            return Err(ValidationError::InvalidSampling {
                reason: format!("fraction {} is outside (0, 1]", self.fraction),
            });
        }
        Ok(())
    }
}

/// Microdata settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicrodataConfig {
    /// Directory holding `cps.csv[.zst]`, `puf.csv[.zst]`, `tmd.csv[.zst]`.
    pub data_dir: PathBuf,
    /// Data year assumed for custom files and tables.
    pub custom_data_year: i32,
}

impl Default for MicrodataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            custom_data_year: 2014,
        }
    }
}

/// Weighted filing-unit table plus where it came from.
#[derive(Debug, Clone)]
pub struct Records {
    table: Arc<Snapshot>,
    kind: DataKind,
    data_year: i32,
}

fn io_err(path: &Path, err: &std::io::Error) -> BrainError {
    ExecutionError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
    .into()
}

/// Parse CSV text with a header row into a snapshot. Empty cells read as 0.
pub fn read_csv<R: Read>(reader: R) -> BrainResult<Snapshot> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| ExecutionError::Csv { message: e.to_string() })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| ExecutionError::Csv { message: e.to_string() })?;
        for (idx, field) in record.iter().enumerate() {
            let field = field.trim();
            let value = if field.is_empty() {
                0.0
            } else {
                field.parse::<f64>().map_err(|_| ExecutionError::Csv {
                    message: format!("row {}: '{}' in column '{}' is not a number", line + 1, field, headers[idx]),
                })?
            };
            columns[idx].push(value);
        }
    }

    Ok(Snapshot::new(headers.into_iter().zip(columns))?)
}

fn read_csv_path(path: &Path) -> BrainResult<Snapshot> {
    let file = File::open(path).map_err(|e| io_err(path, &e))?;
    let compressed = path.extension().is_some_and(|ext| ext == "zst");
    if compressed {
        let decoder = zstd::stream::read::Decoder::new(file).map_err(|e| io_err(path, &e))?;
        read_csv(decoder)
    } else {
        read_csv(file)
    }
}

fn locate(dir: &Path, stem: &str) -> Option<PathBuf> {
    [format!("{stem}.csv"), format!("{stem}.csv.zst")]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

impl Records {
    /// Wrap an existing table.
    #[must_use]
    pub fn from_table(table: Snapshot, kind: DataKind, data_year: i32) -> Self {
        Self {
            table: Arc::new(table),
            kind,
            data_year,
        }
    }

    /// Load records from a source.
    pub fn load(source: MicrodataSource, config: &MicrodataConfig) -> BrainResult<Self> {
        let kind = source.kind();
        let data_year = kind.default_data_year().unwrap_or(config.custom_data_year);
        let table = match source {
            MicrodataSource::Table(table) => table,
            MicrodataSource::File(path) => read_csv_path(&path)?,
            MicrodataSource::Cps | MicrodataSource::Puf | MicrodataSource::Tmd => {
                let stem = kind.file_stem().unwrap_or("cps");
                let path = locate(&config.data_dir, stem).ok_or_else(|| ExecutionError::Io {
                    path: config.data_dir.join(format!("{stem}.csv")).display().to_string(),
                    message: "microdata file not found".to_string(),
                })?;
                read_csv_path(&path)?
            }
        };
        debug!(rows = table.len(), ?kind, data_year, "loaded microdata");
        Ok(Self::from_table(table, kind, data_year))
    }

    /// Deterministic sample without replacement; original row order is kept.
    pub fn sample(&self, spec: SampleSpec) -> Result<Self, ValidationError> {
        spec.validate()?;
        let rows = self.table.len();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let amount = ((rows as f64) * spec.fraction).round() as usize;
        let amount = amount.min(rows);
        if amount == rows {
            return Ok(self.clone());
        }
        let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
        let mut picked = rand::seq::index::sample(&mut rng, rows, amount).into_vec();
        picked.sort_unstable();
        Ok(Self {
            table: Arc::new(self.table.take_rows(&picked)),
            kind: self.kind,
            data_year: self.data_year,
        })
    }

    /// Shared table.
    #[must_use]
    pub fn table(&self) -> &Arc<Snapshot> {
        &self.table
    }

    /// Kind of data.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        self.kind
    }

    /// Year the raw data describe.
    #[must_use]
    pub const fn data_year(&self) -> i32 {
        self.data_year
    }

    /// Number of filing units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when there are no filing units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Content fingerprint (blake3, hex) over column names and values.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in self.table.column_names() {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            if let Ok(values) = self.table.column(name) {
                for v in values {
                    hasher.update(&v.to_le_bytes());
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
